//! Wiring a [`FileSet`] into a fresh template engine.
//!
//! Each request gets its own [`Engine`] bound to a read-only loader over
//! the submitted files, with the standard filters and functions. Nothing
//! is cached between requests.

use ktemplate::{ArrayLoader, Engine, Error, JsonDataProvider};
use serde_json::Value;
use tracing::debug;

use crate::fileset::{FileSet, MAIN_TEMPLATE};

/// Opcode column width of disassembly listings.
pub const DISASM_WIDTH: usize = 24;

/// Build an engine serving exactly the files of `files`.
pub fn build_engine(files: &FileSet) -> Engine {
    let loader = ArrayLoader::new(files.iter());
    let mut engine = Engine::new(loader);
    ktemplate::filters::register_all(&mut engine);
    ktemplate::functions::register_all(&mut engine);
    engine
}

/// Render the entry-point template of `files` against `data`.
pub fn render(files: &FileSet, data: Value) -> Result<String, Error> {
    let main = files.main().unwrap_or(MAIN_TEMPLATE);
    debug!(main, files = files.len(), "rendering");
    let engine = build_engine(files);
    engine.render(main, &JsonDataProvider::new(data))
}

/// Disassemble the entry-point template of `files`, one instruction per
/// line.
pub fn disassemble(files: &FileSet) -> Result<String, Error> {
    let main = files.main().unwrap_or(MAIN_TEMPLATE);
    debug!(main, files = files.len(), "disassembling");
    let engine = build_engine(files);
    let template = engine.get_template(main)?;
    Ok(engine.disassemble(&template, DISASM_WIDTH).join("\n"))
}

/// Version string reported by `GET /api/info`.
pub fn engine_version() -> String {
    ktemplate::engine_version()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fileset::decompose;
    use serde_json::json;

    #[test]
    fn renders_main_template() {
        let files = decompose("{{ 1 + 2 }}");
        assert_eq!(render(&files, json!({})).unwrap(), "3");
    }

    #[test]
    fn first_file_is_the_entry_point() {
        let files = decompose("--- page.t\n{% include \"part.t\" %}{% end %}!\n--- part.t\n{{ who }}");
        assert_eq!(render(&files, json!({"who": "me"})).unwrap(), "me!\n");
    }

    #[test]
    fn compilation_errors_are_full_messages() {
        let files = decompose("{{ }}");
        let err = render(&files, json!({})).unwrap_err();
        assert!(err.full_message().starts_with("main.template:1: "));
    }

    #[test]
    fn disassembly_ends_with_return() {
        let listing = disassemble(&decompose("{{ 1 }}")).unwrap();
        assert!(listing.ends_with("  RETURN"));
        assert!(listing.lines().count() >= 2);
    }

    #[test]
    fn empty_source_disassembles_to_return() {
        assert_eq!(disassemble(&decompose("")).unwrap(), "  RETURN");
    }
}
