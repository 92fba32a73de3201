//! Shared application state for the playground server.
//!
//! Nothing in here changes after startup: request handling builds its
//! own engine per request and never writes to shared state.

use tower_http::services::ServeDir;

use crate::config::ServerConfig;
use crate::ui;

/// Read-only state shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Prefix stripped from request paths before routing.
    pub mount_prefix: String,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
    /// The rendered index page.
    pub index_html: String,
    /// Static asset service for passthrough paths.
    pub static_files: ServeDir,
}

impl AppState {
    /// Build the state for `config`, rendering the index page up front.
    pub fn new(config: &ServerConfig) -> Result<Self, minijinja::Error> {
        Ok(Self {
            mount_prefix: config.mount_prefix.clone(),
            max_body_bytes: config.max_body_bytes,
            index_html: ui::render_index(&config.mount_prefix)?,
            static_files: ServeDir::new(&config.static_dir),
        })
    }
}
