//! Axum router construction for the playground.
//!
//! All requests go through a single fallback handler so that routing can
//! follow the playground's own rules: mount-prefix stripping, per-method
//! route tables, plain-text refusals and static passthrough.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::{Request, State};
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Router;
use tower::ServiceExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::dispatch::{self, INDEX_PATH};
use crate::envelope::{self, Outcome};
use crate::error::ValidationError;
use crate::state::AppState;

/// Build the complete Axum router for the playground server.
///
/// Every path is handled by [`handle`]:
/// - `POST /api/render`, `POST /api/disasm`, `GET /api/info` -- the API
/// - `/index.html` (and the root) -- the rendered UI page
/// - anything else outside `/api` -- files from the static directory
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .fallback(handle)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Route one request.
pub async fn handle(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let method = request.method().clone();
    let path = dispatch::normalize_path(request.uri().path(), &state.mount_prefix);
    let request_id = Uuid::new_v4();
    let span = info_span!("request", %request_id, %method, path = %path);

    async move {
        let (parts, body) = request.into_parts();
        let read_body = async {
            body::to_bytes(body, state.max_body_bytes)
                .await
                .map_err(|e| ValidationError::Body(e.to_string()))
        };

        match dispatch::dispatch(&method, &path, read_body).await {
            Outcome::Handled(envelope) => envelope.into_response(),
            Outcome::PlainText(message) => envelope::plain_text(message),
            Outcome::Passthrough if path == INDEX_PATH => Html(state.index_html.clone()).into_response(),
            Outcome::Passthrough => {
                let Ok(uri) = path.parse::<Uri>() else {
                    return StatusCode::BAD_REQUEST.into_response();
                };
                let mut request = Request::from_parts(parts, Body::empty());
                *request.uri_mut() = uri;
                serve_static(&state, request).await
            }
        }
    }
    .instrument(span)
    .await
}

async fn serve_static(state: &AppState, request: Request) -> Response {
    let result: Result<_, Infallible> = state.static_files.clone().oneshot(request).await;
    match result {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
