//! The network seam: opening a streamed response for a selection request.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::TransportError;
use crate::request::SelectRequest;

/// Raw response body chunks, in arrival order.
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// An opened response: handshake metadata plus the body, if there is one.
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Option<BodyStream>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Something that can send a [`SelectRequest`] and hand back its response.
pub trait Transport: Send + Sync + 'static {
    fn open(
        &self,
        request: SelectRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, TransportError>>;
}

/// reqwest-backed transport posting to `{base_url}/select`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn select_url(&self) -> String {
        format!("{}/select", self.base_url)
    }
}

impl Transport for HttpTransport {
    fn open(
        &self,
        request: SelectRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let url = self.select_url();

        async move {
            debug!(%url, file = %request.file, "opening stream");
            let resp = client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| TransportError::from_reqwest(e, &base_url))?;

            let status = resp.status().as_u16();
            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            // These statuses are defined to carry no content
            let body = if status == 204 || status == 205 {
                None
            } else {
                Some(
                    resp.bytes_stream()
                        .map_err(move |e| TransportError::from_reqwest(e, &base_url))
                        .boxed(),
                )
            };

            Ok(TransportResponse {
                status,
                content_type,
                body,
            })
        }
        .boxed()
    }
}
