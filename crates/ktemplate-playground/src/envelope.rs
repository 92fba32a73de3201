//! Response envelopes and the outcome of dispatching one request.
//!
//! Every API answer is `200 OK` with exactly one of the shapes
//! `{"result": ...}`, `{"error": ...}` or, for `GET /api/info`,
//! `{"kphp_version": ...}`.

use axum::http::header::{self, HeaderValue};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// JSON body of an API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "bindings/")]
pub enum Envelope {
    /// Rendered output or disassembly listing.
    Result {
        /// The text produced by the engine.
        result: String,
    },
    /// Validation, compilation or runtime failure.
    Error {
        /// User-facing message.
        error: String,
    },
    /// Answer to `GET /api/info`. The field name is kept for existing
    /// clients; it carries the engine version.
    Info {
        /// Engine version string.
        kphp_version: String,
    },
}

impl Envelope {
    /// A `{result}` envelope.
    pub fn result(text: impl Into<String>) -> Self {
        Self::Result {
            result: text.into(),
        }
    }

    /// An `{error}` envelope.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Whether this is an `{error}` envelope.
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let body = serde_json::to_string(&self)
            .unwrap_or_else(|e| format!(r#"{{"error":"failed to encode response: {e}"}}"#));
        (
            [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
            body,
        )
            .into_response()
    }
}

/// What the dispatcher decided to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An API handler ran and produced an envelope.
    Handled(Envelope),
    /// The request was refused with a plain-text explanation.
    PlainText(String),
    /// Not an API path: serve it as a static asset.
    Passthrough,
}

/// Plain-text response for refused requests. Still `200 OK`.
pub fn plain_text(message: String) -> Response {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_CONTENT_TYPE))],
        message,
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn shapes() {
        assert_eq!(
            serde_json::to_string(&Envelope::result("3")).unwrap(),
            r#"{"result":"3"}"#
        );
        assert_eq!(
            serde_json::to_string(&Envelope::error("boom")).unwrap(),
            r#"{"error":"boom"}"#
        );
        let info = Envelope::Info {
            kphp_version: "ktemplate 0.1.0".into(),
        };
        assert_eq!(
            serde_json::to_string(&info).unwrap(),
            r#"{"kphp_version":"ktemplate 0.1.0"}"#
        );
    }

    #[test]
    fn response_headers() {
        let response = Envelope::result("x").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
    }
}
