//! HTTP client for the playground API.
//!
//! Mirrors the browser UI: inputs are checked locally before anything is
//! sent, trivial requests are answered without the server, and only one
//! request may be in flight at a time (the UI disables its buttons while
//! waiting; here a second call fails with [`ClientError::Busy`]).

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::request::{DisasmRequest, RenderRequest, MAX_SOURCE_LEN};

/// Longest data text, in characters, the client will send.
pub const MAX_DATA_LEN: usize = 512;

/// Listing returned for an empty template without asking the server.
pub const EMPTY_DISASSEMBLY: &str = "  RETURN";

/// Errors returned by [`PlaygroundClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Another request from this client is still in flight.
    #[error("a request is already in progress")]
    Busy,

    /// The template source is at or over the size limit.
    #[error("template source is too big")]
    SourceTooBig,

    /// The data text is over [`MAX_DATA_LEN`] characters.
    #[error("template data is too big")]
    DataTooBig,

    /// The data text is not valid JSON.
    #[error("{0}")]
    InvalidData(#[source] serde_json::Error),

    /// The server answered with an `{error}` envelope.
    #[error("{0}")]
    Template(String),

    /// The server answered with neither `result` nor `error`.
    #[error("unexpected response from the server")]
    UnexpectedResponse,

    /// Transport or decoding failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Response body as the client sees it: any mix of the envelope keys.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    result: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    kphp_version: String,
}

/// Clears the busy flag when a request finishes, however it finishes.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Client for one playground server.
#[derive(Debug)]
pub struct PlaygroundClient {
    http: reqwest::Client,
    /// Base URL including the mount prefix, without trailing slash.
    base_url: String,
    busy: AtomicBool,
}

impl PlaygroundClient {
    /// Create a client for the playground at `base_url`
    /// (e.g. `http://localhost:8080/ktemplate`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            http: reqwest::Client::new(),
            base_url,
            busy: AtomicBool::new(false),
        }
    }

    /// Whether a request is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<BusyGuard<'_>, ClientError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BusyGuard(&self.busy))
            .map_err(|_already_busy| ClientError::Busy)
    }

    fn url(&self, route: &str) -> String {
        format!("{}/api/{route}", self.base_url)
    }

    /// Render `source` with `data`, the JSON text of the data field.
    pub async fn render(&self, source: &str, data: &str) -> Result<String, ClientError> {
        let _guard = self.acquire()?;
        if source.is_empty() {
            return Ok(String::new());
        }
        check_source(source)?;
        if data.chars().count() > MAX_DATA_LEN {
            return Err(ClientError::DataTooBig);
        }
        let data: Value = serde_json::from_str(data).map_err(ClientError::InvalidData)?;

        let body = RenderRequest {
            source: source.to_owned(),
            data,
        };
        self.post("render", &body).await
    }

    /// Disassemble the entry-point template of `source`.
    pub async fn disassemble(&self, source: &str) -> Result<String, ClientError> {
        let _guard = self.acquire()?;
        if source.is_empty() {
            return Ok(EMPTY_DISASSEMBLY.to_owned());
        }
        check_source(source)?;

        let body = DisasmRequest {
            source: source.to_owned(),
        };
        self.post("disasm", &body).await
    }

    /// The engine version reported by the server.
    pub async fn info(&self) -> Result<String, ClientError> {
        let _guard = self.acquire()?;
        let info: InfoResponse = self
            .http
            .get(self.url("info"))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .json()
            .await?;
        Ok(info.kphp_version)
    }

    async fn post(&self, route: &str, body: &impl serde::Serialize) -> Result<String, ClientError> {
        debug!(route, "sending playground request");
        let envelope: RawEnvelope = self
            .http
            .post(self.url(route))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        match envelope {
            RawEnvelope {
                error: Some(error), ..
            } => Err(ClientError::Template(error)),
            RawEnvelope {
                result: Some(result),
                ..
            } => Ok(result),
            RawEnvelope { .. } => Err(ClientError::UnexpectedResponse),
        }
    }
}

fn check_source(source: &str) -> Result<(), ClientError> {
    if source.len() >= MAX_SOURCE_LEN {
        return Err(ClientError::SourceTooBig);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // Nothing listens here; any attempt to reach the server fails.
    const NOWHERE: &str = "http://127.0.0.1:9/ktemplate/";

    #[tokio::test]
    async fn empty_source_is_answered_locally() {
        let client = PlaygroundClient::new(NOWHERE);
        assert_eq!(client.render("", "{}").await.unwrap(), "");
        assert_eq!(client.disassemble("").await.unwrap(), EMPTY_DISASSEMBLY);
    }

    #[tokio::test]
    async fn local_checks() {
        let client = PlaygroundClient::new(NOWHERE);
        let big = "x".repeat(MAX_SOURCE_LEN);
        assert!(matches!(client.render(&big, "{}").await, Err(ClientError::SourceTooBig)));
        assert!(matches!(client.disassemble(&big).await, Err(ClientError::SourceTooBig)));

        let data = format!("\"{}\"", "d".repeat(MAX_DATA_LEN));
        let err = client.render("x", &data).await.unwrap_err();
        assert_eq!(err.to_string(), "template data is too big");

        assert!(matches!(
            client.render("x", "{oops").await,
            Err(ClientError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn busy_flag_is_released_after_failure() {
        let client = PlaygroundClient::new(NOWHERE);
        assert!(client.render("x", "{}").await.is_err());
        assert!(!client.is_busy());
    }

    #[test]
    fn base_url_trailing_slash() {
        let client = PlaygroundClient::new("http://h/ktemplate/");
        assert_eq!(client.url("info"), "http://h/ktemplate/api/info");
    }
}
