//! Streaming decode core for selection explanations.
//!
//! A [`SessionController`] sends a [`SelectRequest`] through a [`Transport`]
//! and turns the arbitrarily chunked response body into [`StreamEvent`]s:
//!
//! ```text
//! body chunks -> ByteDecoder -> FrameParser -> classify -> UpdateThrottler -> StreamConsumer
//! ```
//!
//! The wire framing (`sse`, `ndjson` or raw text) is picked once per session
//! from the response content type. At most one session is current; starting
//! another cancels the previous one without telling its consumer.

pub mod classify;
pub mod config;
pub mod decoder;
pub mod error;
pub mod event;
pub mod format;
pub mod frame;
pub mod pipeline;
pub mod request;
pub mod session;
pub mod throttle;
pub mod transport;

pub use classify::{UNKNOWN_SERVER_ERROR, classify, classify_payload};
pub use config::{DEFAULT_BASE_URL, StreamConfig};
pub use decoder::ByteDecoder;
pub use error::{RequestError, SessionError, TransportError};
pub use event::{ChannelConsumer, StreamConsumer, StreamEvent};
pub use format::WireFormat;
pub use frame::{Frame, FrameParser, STREAM_ERROR_SENTINEL};
pub use pipeline::StreamDecoder;
pub use request::{RepoLocation, SelectRequest, language_for_file};
pub use session::{SessionController, SessionHandle};
pub use throttle::{DEFAULT_THROTTLE_INTERVAL, UpdateThrottler};
pub use transport::{BodyStream, HttpTransport, Transport, TransportResponse};
