//! Session lifecycle: one streaming request at a time, with cooperative
//! cancellation of whatever was running before.
//!
//! A session's task reads the body, runs it through [`StreamDecoder`] and the
//! [`UpdateThrottler`], and hands the result to the consumer. Cancellation
//! detaches the consumer, so once [`SessionHandle::cancel`] returns no new
//! callback begins on the old consumer, and it is never told about the
//! cancellation itself.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::StreamConfig;
use crate::error::SessionError;
use crate::event::{StreamConsumer, StreamEvent, dispatch};
use crate::pipeline::StreamDecoder;
use crate::request::SelectRequest;
use crate::throttle::{DEFAULT_THROTTLE_INTERVAL, UpdateThrottler};
use crate::transport::{BodyStream, HttpTransport, Transport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    id: Uuid,
    cancel: CancellationToken,
    consumer: Mutex<Option<Box<dyn StreamConsumer>>>,
    finished: watch::Sender<bool>,
}

/// Handle to one streaming session. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    fn new(consumer: Box<dyn StreamConsumer>) -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                cancel: CancellationToken::new(),
                consumer: Mutex::new(Some(consumer)),
                finished,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Stop the session. Silent: the consumer receives no further callback.
    /// It is dropped here, or when a callback already in progress returns.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
        let consumer = lock(&self.shared.consumer).take();
        drop(consumer);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// True once the session's task has stopped, for any reason.
    pub fn is_finished(&self) -> bool {
        *self.shared.finished.borrow()
    }

    /// Wait until the session's task has stopped.
    pub async fn finished(&self) {
        let mut rx = self.shared.finished.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|done| *done).await;
    }

    fn token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Hand one event to the consumer. Returns false when the consumer has
    /// been detached, in which case nothing was delivered.
    ///
    /// The consumer is taken out of its slot for the callback, so the
    /// callback may start or cancel sessions without deadlocking. A consumer
    /// whose session was cancelled during the callback is not put back.
    fn deliver(&self, event: &StreamEvent) -> bool {
        let Some(mut consumer) = lock(&self.shared.consumer).take() else {
            return false;
        };
        if self.shared.cancel.is_cancelled() {
            return false;
        }

        dispatch(consumer.as_mut(), event);

        let detached = {
            let mut slot = lock(&self.shared.consumer);
            if self.shared.cancel.is_cancelled() {
                Some(consumer)
            } else {
                *slot = Some(consumer);
                None
            }
        };
        drop(detached);
        true
    }

    fn close(&self) {
        let consumer = lock(&self.shared.consumer).take();
        drop(consumer);
        self.shared.finished.send_replace(true);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.shared.id)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// How a session's task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed(String),
    Cancelled,
}

/// Owns the single current session.
pub struct SessionController<T: Transport> {
    transport: Arc<T>,
    throttle_interval: Duration,
    current: Arc<Mutex<Option<SessionHandle>>>,
}

impl SessionController<HttpTransport> {
    /// Controller talking HTTP to `config.base_url`.
    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(HttpTransport::new(config.base_url.clone()))
            .with_throttle_interval(config.throttle_interval)
    }
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            throttle_interval: DEFAULT_THROTTLE_INTERVAL,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start streaming `request` into `consumer`.
    ///
    /// Any session still running is cancelled first, so its consumer is
    /// detached before the new request is sent. Must be called from within a
    /// Tokio runtime.
    pub fn start<C: StreamConsumer>(&self, request: SelectRequest, consumer: C) -> SessionHandle {
        let handle = SessionHandle::new(Box::new(consumer));

        {
            let mut current = lock(&self.current);
            if let Some(previous) = current.replace(handle.clone()) {
                if !previous.is_finished() {
                    info!(previous = %previous.id(), next = %handle.id(), "superseding session");
                }
                previous.cancel();
            }
        }

        let span = info_span!("session", id = %handle.id());
        tokio::spawn(
            run_session(
                Arc::clone(&self.transport),
                request,
                handle.clone(),
                self.throttle_interval,
                Arc::clone(&self.current),
            )
            .instrument(span),
        );

        handle
    }

    /// Cancel the current session, if any. Returns whether one was running.
    pub fn cancel_current(&self) -> bool {
        let previous = lock(&self.current).take();
        match previous {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.cancel();
                was_running
            }
            None => false,
        }
    }

    pub fn current(&self) -> Option<SessionHandle> {
        lock(&self.current).clone()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.current)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

async fn run_session<T: Transport>(
    transport: Arc<T>,
    request: SelectRequest,
    session: SessionHandle,
    throttle_interval: Duration,
    current: Arc<Mutex<Option<SessionHandle>>>,
) {
    info!(
        owner = %request.owner,
        repo = %request.repo,
        file = %request.file,
        language = %request.language,
        "session started"
    );

    match drive(transport.as_ref(), request, &session, throttle_interval).await {
        Outcome::Completed => info!("session done"),
        Outcome::Failed(message) => warn!(%message, "session failed"),
        Outcome::Cancelled => debug!("session cancelled"),
    }

    {
        let mut slot = lock(&current);
        if slot.as_ref().is_some_and(|h| h.id() == session.id()) {
            *slot = None;
        }
    }
    session.close();
}

/// Throttled delivery into one session's consumer.
struct Delivery<'a> {
    session: &'a SessionHandle,
    throttle: UpdateThrottler,
}

impl Delivery<'_> {
    /// Deliver events through the throttler. Returns the outcome once the
    /// session has ended, either by a terminal event or by cancellation.
    fn emit(&mut self, events: Vec<StreamEvent>) -> Option<Outcome> {
        for event in events {
            let now = Instant::now();
            for out in self.throttle.admit(event, now) {
                if let Some(outcome) = self.send(out) {
                    return Some(outcome);
                }
            }
        }
        None
    }

    fn flush_due(&mut self) -> Option<Outcome> {
        let text = self.throttle.poll(Instant::now())?;
        self.send(StreamEvent::Delta(text))
    }

    fn fail(&mut self, err: SessionError) -> Outcome {
        self.emit(vec![StreamEvent::Error(err.to_string())])
            .unwrap_or(Outcome::Cancelled)
    }

    fn send(&mut self, event: StreamEvent) -> Option<Outcome> {
        if !self.session.deliver(&event) {
            return Some(Outcome::Cancelled);
        }
        match event {
            StreamEvent::Done => Some(Outcome::Completed),
            StreamEvent::Error(message) => Some(Outcome::Failed(message)),
            _ => None,
        }
    }
}

async fn drive<T: Transport>(
    transport: &T,
    request: SelectRequest,
    session: &SessionHandle,
    throttle_interval: Duration,
) -> Outcome {
    let cancel = session.token();
    let mut out = Delivery {
        session,
        throttle: UpdateThrottler::new(throttle_interval),
    };

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Outcome::Cancelled,
        opened = transport.open(request) => opened,
    };
    let response = match opened {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "transport failed");
            return out.fail(e.into());
        }
    };

    if !response.is_success() {
        let status = response.status;
        let body = match response.body {
            Some(body) => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Outcome::Cancelled,
                text = read_text(body) => text,
            },
            None => String::new(),
        };
        return out.fail(SessionError::Status { status, body });
    }

    let Some(mut body) = response.body else {
        return out.fail(SessionError::NoBody);
    };

    let mut decoder = StreamDecoder::for_content_type(response.content_type.as_deref());
    let mut chunks = 0usize;

    loop {
        let deadline = out.throttle.deadline();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(outcome) = out.flush_due() {
                    return outcome;
                }
            }
            chunk = body.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        chunks += 1;
                        let events = decoder.feed(&bytes);
                        debug!(chunk = chunks, len = bytes.len(), events = events.len(), "chunk decoded");
                        if let Some(outcome) = out.emit(events) {
                            return outcome;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, chunks, "body read failed");
                        return out.fail(SessionError::Interrupted(e));
                    }
                    None => {
                        debug!(chunks, format = %decoder.format(), "end of body");
                        let mut events = decoder.finish();
                        events.push(StreamEvent::Done);
                        return out.emit(events).unwrap_or(Outcome::Completed);
                    }
                }
            }
        }
    }
}

/// Collect a body as text, keeping whatever arrived before a read error.
async fn read_text(mut body: BodyStream) -> String {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(e) => {
                debug!(error = %e, "error body truncated");
                break;
            }
        }
    }
    String::from_utf8_lossy(&bytes).trim().to_string()
}
