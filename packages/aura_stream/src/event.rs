//! Decoded stream events and the consumer surface that receives them.

use serde_json::Value;
use tokio::sync::mpsc;

/// A classified unit of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental content to append to the result.
    Delta(String),
    /// Auxiliary metadata, delivered as the full JSON payload.
    Context(Value),
    /// Terminal success.
    Done,
    /// Terminal failure with a human-readable message.
    Error(String),
}

impl StreamEvent {
    /// Returns true for `Done` and `Error`; nothing follows these in a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }

    pub fn as_delta(&self) -> Option<&str> {
        match self {
            Self::Delta(content) => Some(content),
            _ => None,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delta(_) => "delta",
            Self::Context(_) => "context",
            Self::Done => "done",
            Self::Error(_) => "error",
        }
    }
}

/// Receiver of a session's events.
///
/// Callbacks run on the session's task, one at a time and in order. They
/// must not block. They may start or cancel sessions on the controller that
/// drives them; starting a new session from a callback supersedes the one
/// delivering it.
pub trait StreamConsumer: Send + 'static {
    fn on_delta(&mut self, text: &str);
    fn on_context(&mut self, payload: &Value);
    fn on_done(&mut self);
    fn on_error(&mut self, message: &str);
}

/// Route one event to the matching callback.
pub(crate) fn dispatch(consumer: &mut dyn StreamConsumer, event: &StreamEvent) {
    match event {
        StreamEvent::Delta(text) => consumer.on_delta(text),
        StreamEvent::Context(payload) => consumer.on_context(payload),
        StreamEvent::Done => consumer.on_done(),
        StreamEvent::Error(message) => consumer.on_error(message),
    }
}

/// Consumer that forwards every callback into an unbounded channel.
///
/// The receiving side sees the channel close when the session finishes or
/// is cancelled, since the consumer is dropped at that point.
pub struct ChannelConsumer {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelConsumer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: StreamEvent) {
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

impl StreamConsumer for ChannelConsumer {
    fn on_delta(&mut self, text: &str) {
        self.forward(StreamEvent::Delta(text.to_string()));
    }

    fn on_context(&mut self, payload: &Value) {
        self.forward(StreamEvent::Context(payload.clone()));
    }

    fn on_done(&mut self) {
        self.forward(StreamEvent::Done);
    }

    fn on_error(&mut self, message: &str) {
        self.forward(StreamEvent::Error(message.to_string()));
    }
}
