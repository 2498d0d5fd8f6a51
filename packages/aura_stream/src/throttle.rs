//! Coalescing of high-frequency delta events.
//!
//! Deltas are concatenated into a pending buffer and released at most once
//! per interval. Any other event first flushes the pending text, then goes
//! out immediately, so content order is preserved and a terminal event is
//! always seen after the last piece of content.

use std::time::Duration;

use tokio::time::Instant;

use crate::event::StreamEvent;

/// Default minimum spacing between two delta emissions.
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(50);

/// Per-session throttle state.
#[derive(Debug)]
pub struct UpdateThrottler {
    interval: Duration,
    pending: String,
    last_emit: Option<Instant>,
}

impl UpdateThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: String::new(),
            last_emit: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Feed one classified event and return what should be delivered now,
    /// in order.
    pub fn admit(&mut self, event: StreamEvent, now: Instant) -> Vec<StreamEvent> {
        match event {
            StreamEvent::Delta(content) => {
                self.pending.push_str(&content);
                if self.is_due(now) {
                    self.take(now).map(StreamEvent::Delta).into_iter().collect()
                } else {
                    Vec::new()
                }
            }
            other => {
                let mut out = Vec::with_capacity(2);
                if let Some(text) = self.take(now) {
                    out.push(StreamEvent::Delta(text));
                }
                out.push(other);
                out
            }
        }
    }

    /// When pending text must be released even if nothing else arrives.
    pub fn deadline(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        Some(match self.last_emit {
            Some(at) => at + self.interval,
            None => Instant::now(),
        })
    }

    /// Release pending text if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        if self.is_due(now) {
            self.take(now)
        } else {
            None
        }
    }

    /// Release pending text unconditionally.
    pub fn flush(&mut self, now: Instant) -> Option<String> {
        self.take(now)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn is_due(&self, now: Instant) -> bool {
        match self.last_emit {
            Some(at) => now.saturating_duration_since(at) >= self.interval,
            None => true,
        }
    }

    fn take(&mut self, now: Instant) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_emit = Some(now);
        Some(std::mem::take(&mut self.pending))
    }
}

impl Default for UpdateThrottler {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_INTERVAL)
    }
}
