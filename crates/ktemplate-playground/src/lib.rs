//! KTemplate playground: an HTTP API and browser UI for trying out the
//! `ktemplate` engine.
//!
//! The API accepts a template blob (optionally several files separated by
//! `--- name` lines) and either renders it or disassembles it:
//!
//! | Method | Path | Body | Answer |
//! |--------|------|------|--------|
//! | `POST` | `/api/render` | `{source, data}` | `{result}` or `{error}` |
//! | `POST` | `/api/disasm` | `{source}` | `{result}` or `{error}` |
//! | `GET` | `/api/info` | | `{kphp_version}` |
//!
//! Every API answer is `200 OK` JSON; refused requests get a plain-text
//! explanation. Everything outside `/api` is the UI: the rendered index
//! page plus static assets.
//!
//! # Request flow
//!
//! [`router`] normalizes the path, [`dispatch`] picks a route,
//! [`request`] validates the body, [`fileset`] splits the blob,
//! [`adapter`] runs a fresh engine, and [`envelope`] encodes the answer.
//!
//! [`client`] is a Rust client with the same local checks as the UI.

pub mod adapter;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod fileset;
pub mod handlers;
pub mod request;
pub mod router;
pub mod server;
pub mod snippets;
pub mod state;
pub mod ui;

pub use client::{ClientError, PlaygroundClient};
pub use config::PlaygroundConfig;
pub use envelope::{Envelope, Outcome};
pub use fileset::{decompose, FileSet};
pub use router::build_router;
pub use server::{start_server, ServerError};
pub use state::AppState;
