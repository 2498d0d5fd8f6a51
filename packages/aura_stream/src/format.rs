//! Wire format detection from the response's declared content type.

use std::fmt;

/// The framing a response body uses, chosen once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `text/event-stream`: frames separated by a blank line.
    Sse,
    /// `application/x-ndjson`: one JSON document per line.
    Ndjson,
    /// Any other declared type: raw text, no framing.
    Text,
    /// No content type at all. Treated like `Text`.
    Unknown,
}

impl WireFormat {
    /// Pick the framing from a `Content-Type` header value.
    ///
    /// Parameters such as `; charset=utf-8` are ignored and the comparison
    /// is case-insensitive.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(raw) = content_type else {
            return Self::Unknown;
        };
        let essence = raw
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "" => Self::Unknown,
            "text/event-stream" => Self::Sse,
            "application/x-ndjson" | "application/ndjson" | "application/jsonl"
            | "application/x-jsonlines" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// True for formats with explicit frame boundaries.
    pub fn is_framed(self) -> bool {
        matches!(self, Self::Sse | Self::Ndjson)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::Ndjson => "ndjson",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_event_stream() {
        assert_eq!(
            WireFormat::from_content_type(Some("text/event-stream")),
            WireFormat::Sse
        );
        assert_eq!(
            WireFormat::from_content_type(Some("Text/Event-Stream; charset=utf-8")),
            WireFormat::Sse
        );
    }

    #[test]
    fn detects_ndjson_variants() {
        for ct in [
            "application/x-ndjson",
            "application/ndjson",
            "application/x-ndjson; charset=utf-8",
            "application/jsonl",
        ] {
            assert_eq!(
                WireFormat::from_content_type(Some(ct)),
                WireFormat::Ndjson,
                "{ct}"
            );
        }
    }

    #[test]
    fn other_types_are_text() {
        assert_eq!(
            WireFormat::from_content_type(Some("text/plain; charset=utf-8")),
            WireFormat::Text
        );
        assert_eq!(
            WireFormat::from_content_type(Some("application/json")),
            WireFormat::Text
        );
    }

    #[test]
    fn missing_or_blank_is_unknown() {
        assert_eq!(WireFormat::from_content_type(None), WireFormat::Unknown);
        assert_eq!(WireFormat::from_content_type(Some("  ")), WireFormat::Unknown);
    }

    #[test]
    fn framed_formats() {
        assert!(WireFormat::Sse.is_framed());
        assert!(WireFormat::Ndjson.is_framed());
        assert!(!WireFormat::Text.is_framed());
        assert!(!WireFormat::Unknown.is_framed());
        assert_eq!(WireFormat::Ndjson.to_string(), "ndjson");
    }
}
