//! Frame classification into typed events.
//!
//! Servers speak three incompatible shapes: discriminated JSON objects
//! (`{"type": "delta", "content": ...}`), the older key-shaped objects
//! (`{"delta": ...}`, `{"done": true}`, `{"error": ...}`), and raw text.
//! Classification never fails: anything that cannot be interpreted is
//! passed through verbatim as a delta.

use serde_json::Value;
use tracing::debug;

use crate::event::StreamEvent;
use crate::frame::{Frame, STREAM_ERROR_SENTINEL};

/// Message used when a server reports an error without saying what it was.
pub const UNKNOWN_SERVER_ERROR: &str = "Unknown server error";

/// Interpret one frame. Usually yields a single event; a text tail carrying
/// the error sentinel can yield leading content followed by the error.
pub fn classify(frame: Frame) -> Vec<StreamEvent> {
    match frame {
        Frame::Record(text) | Frame::Text(text) => vec![classify_payload(text)],
        Frame::TextTail(text) => classify_tail(text),
    }
}

/// Interpret a single payload, falling back to a verbatim delta.
pub fn classify_payload(text: String) -> StreamEvent {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return StreamEvent::Delta(text);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => match event_from_value(value) {
            Some(event) => event,
            None => {
                debug!("structured frame has no recognised event shape, passing through");
                StreamEvent::Delta(text)
            }
        },
        Err(e) => {
            debug!(error = %e, "frame looks structured but is not JSON, passing through");
            StreamEvent::Delta(text)
        }
    }
}

fn classify_tail(text: String) -> Vec<StreamEvent> {
    let Some(pos) = text.find(STREAM_ERROR_SENTINEL) else {
        return vec![classify_payload(text)];
    };

    let mut events = Vec::with_capacity(2);
    let before = &text[..pos];
    if !before.is_empty() {
        events.push(classify_payload(before.to_string()));
    }
    let message = text[pos + STREAM_ERROR_SENTINEL.len()..].trim();
    events.push(StreamEvent::Error(if message.is_empty() {
        UNKNOWN_SERVER_ERROR.to_string()
    } else {
        message.to_string()
    }));
    events
}

fn event_from_value(value: Value) -> Option<StreamEvent> {
    if !value.is_object() {
        return None;
    }

    let kind = match value.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => return None,
        None => return legacy_event(&value),
    };

    match kind.as_str() {
        "delta" => value
            .get("content")
            .and_then(Value::as_str)
            .map(|content| StreamEvent::Delta(content.to_string())),
        "context" => Some(StreamEvent::Context(value)),
        "done" => Some(StreamEvent::Done),
        "error" => Some(StreamEvent::Error(error_message(&value))),
        _ => None,
    }
}

/// Key-shaped events without a `type` discriminator.
fn legacy_event(value: &Value) -> Option<StreamEvent> {
    if let Some(content) = value.get("delta").and_then(Value::as_str) {
        return Some(StreamEvent::Delta(content.to_string()));
    }
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Some(StreamEvent::Error(message.to_string()));
    }
    if value.get("done") == Some(&Value::Bool(true)) {
        return Some(StreamEvent::Done);
    }
    None
}

fn error_message(value: &Value) -> String {
    ["error", "message"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|message| !message.trim().is_empty())
        .unwrap_or(UNKNOWN_SERVER_ERROR)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one(text: &str) -> StreamEvent {
        classify_payload(text.to_string())
    }

    #[test]
    fn delta_with_content() {
        assert_eq!(
            one(r#"{"type":"delta","content":"Hel"}"#),
            StreamEvent::Delta("Hel".into())
        );
    }

    #[test]
    fn context_keeps_full_payload() {
        let event = one(r#"{"type":"context","files":["a.rs"],"score":0.5}"#);
        assert_eq!(
            event,
            StreamEvent::Context(json!({"type": "context", "files": ["a.rs"], "score": 0.5}))
        );
    }

    #[test]
    fn done_and_error() {
        assert_eq!(one(r#"{"type":"done"}"#), StreamEvent::Done);
        assert_eq!(
            one(r#"{"type":"error","error":"not found"}"#),
            StreamEvent::Error("not found".into())
        );
    }

    #[test]
    fn error_message_fallbacks() {
        assert_eq!(
            one(r#"{"type":"error","message":"rate limited"}"#),
            StreamEvent::Error("rate limited".into())
        );
        assert_eq!(
            one(r#"{"type":"error"}"#),
            StreamEvent::Error(UNKNOWN_SERVER_ERROR.into())
        );
        assert_eq!(
            one(r#"{"type":"error","error":"  ","message":"second"}"#),
            StreamEvent::Error("second".into())
        );
    }

    #[test]
    fn malformed_json_passes_through_verbatim() {
        let raw = r#"{"type": "delta", content: bad}"#;
        assert_eq!(one(raw), StreamEvent::Delta(raw.into()));
    }

    #[test]
    fn unknown_discriminator_passes_through() {
        let raw = r#"{"type":"usage","tokens":12}"#;
        assert_eq!(one(raw), StreamEvent::Delta(raw.into()));
    }

    #[test]
    fn delta_without_string_content_passes_through() {
        let raw = r#"{"type":"delta","content":42}"#;
        assert_eq!(one(raw), StreamEvent::Delta(raw.into()));
    }

    #[test]
    fn non_string_type_passes_through() {
        let raw = r#"{"type":7}"#;
        assert_eq!(one(raw), StreamEvent::Delta(raw.into()));
    }

    #[test]
    fn json_array_passes_through() {
        let raw = "[1, 2, 3]";
        assert_eq!(one(raw), StreamEvent::Delta(raw.into()));
    }

    #[test]
    fn plain_text_is_delta() {
        assert_eq!(
            one("  This function parses "),
            StreamEvent::Delta("  This function parses ".into())
        );
    }

    #[test]
    fn legacy_shapes() {
        assert_eq!(one(r#"{"delta":"lo"}"#), StreamEvent::Delta("lo".into()));
        assert_eq!(one(r#"{"done":true}"#), StreamEvent::Done);
        assert_eq!(
            one(r#"{"error":"boom"}"#),
            StreamEvent::Error("boom".into())
        );
        let raw = r#"{"done":false}"#;
        assert_eq!(one(raw), StreamEvent::Delta(raw.into()));
    }

    #[test]
    fn text_tail_with_sentinel_becomes_error() {
        assert_eq!(
            classify(Frame::TextTail("[stream-error] disk full".into())),
            vec![StreamEvent::Error("disk full".into())]
        );
    }

    #[test]
    fn text_tail_keeps_content_before_sentinel() {
        assert_eq!(
            classify(Frame::TextTail("last words [stream-error]  quota  ".into())),
            vec![
                StreamEvent::Delta("last words ".into()),
                StreamEvent::Error("quota".into())
            ]
        );
    }

    #[test]
    fn text_tail_with_bare_sentinel() {
        assert_eq!(
            classify(Frame::TextTail("[stream-error]".into())),
            vec![StreamEvent::Error(UNKNOWN_SERVER_ERROR.into())]
        );
    }

    #[test]
    fn text_tail_without_sentinel_is_delta() {
        assert_eq!(
            classify(Frame::TextTail("the end".into())),
            vec![StreamEvent::Delta("the end".into())]
        );
    }

    #[test]
    fn sentinel_in_record_is_plain_content() {
        let raw = "[stream-error] not special here";
        assert_eq!(
            classify(Frame::Record(raw.into())),
            vec![StreamEvent::Delta(raw.into())]
        );
    }
}
