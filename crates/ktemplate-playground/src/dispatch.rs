//! Route dispatch: (method, path) to an API handler, a plain-text
//! refusal, or static passthrough.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/api/render` | [`handlers::render`] |
//! | `POST` | `/api/disasm` | [`handlers::disasm`] |
//! | `GET` | `/api/info` | [`handlers::info`] |
//!
//! Paths outside `/api` are passed through to static file serving.

use std::future::Future;

use axum::body::Bytes;
use axum::http::Method;
use tracing::{info, warn};

use crate::envelope::Outcome;
use crate::error::ValidationError;
use crate::handlers;

/// Path every API route lives under.
const API_PREFIX: &str = "/api";

/// Path served for the site root.
pub const INDEX_PATH: &str = "/index.html";

/// An API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `POST /api/render`
    Render,
    /// `POST /api/disasm`
    Disasm,
    /// `GET /api/info`
    Info,
}

impl Route {
    const POST: &[(&str, Self)] = &[("/api/render", Self::Render), ("/api/disasm", Self::Disasm)];
    const GET: &[(&str, Self)] = &[("/api/info", Self::Info)];

    /// Route path, for logging.
    pub const fn path(self) -> &'static str {
        match self {
            Self::Render => "/api/render",
            Self::Disasm => "/api/disasm",
            Self::Info => "/api/info",
        }
    }
}

/// Where a request goes, before any handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An API endpoint.
    Api(Route),
    /// Refused with this plain-text message.
    Reject(String),
    /// Not an API path.
    Passthrough,
}

/// Reduce a request path to a route path.
///
/// Strips `mount_prefix` when present, maps the root to
/// [`INDEX_PATH`], and drops one trailing slash.
pub fn normalize_path(path: &str, mount_prefix: &str) -> String {
    let path = if mount_prefix.is_empty() {
        path
    } else {
        path.strip_prefix(mount_prefix).unwrap_or(path)
    };
    match path {
        "" | "/" => INDEX_PATH.to_owned(),
        other => other.strip_suffix('/').unwrap_or(other).to_owned(),
    }
}

/// Decide where a normalized path goes.
pub fn resolve(method: &Method, path: &str) -> Resolution {
    if !path.starts_with(API_PREFIX) {
        return Resolution::Passthrough;
    }
    let table = match *method {
        Method::POST => Route::POST,
        Method::GET => Route::GET,
        _ => return Resolution::Reject(format!("unsupported request method: {method}")),
    };
    table
        .iter()
        .find(|(route_path, _)| *route_path == path)
        .map_or_else(
            || Resolution::Reject("unknown route".to_owned()),
            |(_, route)| Resolution::Api(*route),
        )
}

/// Resolve and, for API routes, read the body and run the handler.
///
/// `read_body` is only awaited once the request is known to target an
/// API route, so refusals and passthrough never touch the body.
pub async fn dispatch<B>(method: &Method, path: &str, read_body: B) -> Outcome
where
    B: Future<Output = Result<Bytes, ValidationError>>,
{
    match resolve(method, path) {
        Resolution::Passthrough => Outcome::Passthrough,
        Resolution::Reject(message) => {
            warn!(%method, path, error = %message, "request error");
            Outcome::PlainText(message)
        }
        Resolution::Api(route) => {
            let body = match read_body.await {
                Ok(body) => body,
                Err(e) => {
                    warn!(%method, route = route.path(), error = %e, "failed to read request body");
                    return Outcome::Handled(e.into());
                }
            };
            let envelope = match route {
                Route::Render => handlers::render(&body).await,
                Route::Disasm => handlers::disasm(&body).await,
                Route::Info => handlers::info(),
            };
            info!(
                %method,
                route = route.path(),
                ok = !envelope.is_error(),
                "api request"
            );
            Outcome::Handled(envelope)
        }
    }
}
