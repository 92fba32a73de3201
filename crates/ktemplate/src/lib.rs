//! KTemplate: a Twig-like template engine compiled to a small bytecode VM.
//!
//! Templates are lexed, parsed and compiled per file into a [`Template`]
//! program. Rendering executes that program against a [`DataProvider`]
//! (external data addressed by dotted key paths such as `a.b.c`) and
//! template-local variables (`$name`). Templates are fetched by name
//! through a [`Loader`], so one [`Engine`] can serve a whole set of files
//! that include each other.
//!
//! # Example
//!
//! ```
//! use ktemplate::{ArrayLoader, Engine, JsonDataProvider};
//!
//! let loader = ArrayLoader::new([("main.template", "{{ greeting ~ \", \" ~ name }}")]);
//! let mut engine = Engine::new(loader);
//! ktemplate::filters::register_all(&mut engine);
//! ktemplate::functions::register_all(&mut engine);
//!
//! let data = JsonDataProvider::new(serde_json::json!({"greeting": "Hello", "name": "World"}));
//! let out = engine.render("main.template", &data);
//! assert_eq!(out.ok().as_deref(), Some("Hello, World"));
//! ```
//!
//! # Modules
//!
//! - [`engine`] -- the [`Engine`] entry point and filter/function registry
//! - [`error`] -- [`CompilationError`], [`RuntimeError`] and the unified [`Error`]
//! - [`filters`] / [`functions`] -- the standard libraries
//! - [`loader`] -- template source lookup
//! - [`data`] -- external data providers
//! - [`escape`] -- output escaping strategies

mod ast;
mod bytecode;
mod compiler;
pub mod data;
mod disasm;
pub mod engine;
pub mod error;
pub mod escape;
pub mod filters;
pub mod functions;
mod lexer;
pub mod loader;
mod parser;
mod value;
mod vm;

pub use bytecode::Template;
pub use data::{DataProvider, JsonDataProvider};
pub use engine::{Engine, FilterFn, FunctionFn};
pub use error::{CompilationError, Error, RuntimeError};
pub use loader::{ArrayLoader, Loader};

/// Longest string, in bytes, a render may build or print.
pub const MAX_OUTPUT_LEN: usize = 1_048_576;

/// Engine version reported to clients.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the engine version string (`ktemplate <version>`).
pub fn engine_version() -> String {
    format!("ktemplate {VERSION}")
}
