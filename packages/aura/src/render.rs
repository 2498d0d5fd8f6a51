//! Terminal rendering of a streamed explanation.

use std::io::Write;

use aura_stream::StreamConsumer;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// How a rendered session ended. A dropped sender means it was cancelled.
pub type Finished = Result<(), String>;

/// Writes deltas to `out` as they arrive and reports the terminal event
/// through a oneshot channel.
pub struct TerminalConsumer<W> {
    out: W,
    wrote_any: bool,
    write_error: Option<std::io::Error>,
    finished: Option<oneshot::Sender<Finished>>,
}

impl<W: Write + Send + 'static> TerminalConsumer<W> {
    pub fn new(out: W) -> (Self, oneshot::Receiver<Finished>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                out,
                wrote_any: false,
                write_error: None,
                finished: Some(tx),
            },
            rx,
        )
    }

    fn write(&mut self, text: &str) {
        if self.write_error.is_some() {
            return;
        }
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            warn!(error = %e, "output write failed");
            self.write_error = Some(e);
        }
    }

    fn finish(&mut self, result: Finished) {
        if self.wrote_any {
            self.write("\n");
        }
        let result = match self.write_error.take() {
            Some(e) if result.is_ok() => Err(format!("failed to write output: {e}")),
            _ => result,
        };
        if let Some(tx) = self.finished.take() {
            let _ = tx.send(result);
        }
    }
}

impl<W: Write + Send + 'static> StreamConsumer for TerminalConsumer<W> {
    fn on_delta(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.wrote_any = true;
        self.write(text);
    }

    fn on_context(&mut self, payload: &Value) {
        debug!(context = %payload, "context received");
    }

    fn on_done(&mut self) {
        self.finish(Ok(()));
    }

    fn on_error(&mut self, message: &str) {
        self.finish(Err(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Shared in-memory sink, so the test can read what the consumer wrote.
    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Sink {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_deltas_then_done() {
        let sink = Sink::default();
        let (mut consumer, mut rx) = TerminalConsumer::new(sink.clone());

        consumer.on_delta("This parses ");
        consumer.on_context(&serde_json::json!({"type": "context"}));
        consumer.on_delta("input.");
        consumer.on_done();

        assert_eq!(sink.contents(), "This parses input.\n");
        assert_eq!(rx.try_recv().unwrap(), Ok(()));
    }

    #[test]
    fn test_error_is_reported() {
        let sink = Sink::default();
        let (mut consumer, mut rx) = TerminalConsumer::new(sink.clone());

        consumer.on_error("not found");

        assert_eq!(sink.contents(), "");
        assert_eq!(rx.try_recv().unwrap(), Err("not found".to_string()));
    }

    #[test]
    fn test_write_failure_turns_done_into_error() {
        let (mut consumer, mut rx) = TerminalConsumer::new(Broken);
        consumer.on_delta("text");
        consumer.on_done();

        let result = rx.try_recv().unwrap();
        assert!(result.unwrap_err().starts_with("failed to write output"));
    }

    #[test]
    fn test_drop_without_terminal_closes_channel() {
        let (consumer, mut rx) = TerminalConsumer::new(Sink::default());
        drop(consumer);
        assert!(rx.try_recv().is_err());
    }
}
