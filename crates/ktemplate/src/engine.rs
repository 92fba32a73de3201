//! The [`Engine`]: template cache, filter/function registry and the
//! render and disassemble entry points.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::bytecode::Template;
use crate::compiler;
use crate::data::DataProvider;
use crate::error::Error;
use crate::loader::Loader;
use crate::vm::Vm;

/// A filter: receives the filtered value and the call arguments.
///
/// An `Err` message becomes a [`RuntimeError`](crate::RuntimeError)
/// located at the call site.
pub type FilterFn = fn(&Value, &[Value]) -> Result<Value, String>;

/// A function callable from expressions as `name(args)`.
pub type FunctionFn = fn(&[Value]) -> Result<Value, String>;

/// Registered filters and functions, consulted at compile time.
#[derive(Debug, Default, Clone)]
pub(crate) struct Registry {
    filters: HashMap<String, FilterFn>,
    functions: HashMap<String, FunctionFn>,
}

impl Registry {
    pub(crate) fn add_filter(&mut self, name: &str, func: FilterFn) {
        self.filters.insert(name.to_owned(), func);
    }

    pub(crate) fn add_function(&mut self, name: &str, func: FunctionFn) {
        self.functions.insert(name.to_owned(), func);
    }

    pub(crate) fn filter(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).copied()
    }

    pub(crate) fn function(&self, name: &str) -> Option<FunctionFn> {
        self.functions.get(name).copied()
    }
}

/// Compiles templates from a [`Loader`] and executes them.
///
/// Compiled templates are cached for the lifetime of the engine. An engine
/// is single-threaded and meant to be cheap to build, so callers that
/// serve unrelated template sets should build one per set.
pub struct Engine {
    loader: Box<dyn Loader>,
    registry: Registry,
    templates: RefCell<HashMap<String, Rc<Template>>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("cached", &self.templates.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine with no filters or functions registered.
    pub fn new(loader: impl Loader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            registry: Registry::default(),
            templates: RefCell::new(HashMap::new()),
        }
    }

    /// Register (or replace) a filter. Only affects templates compiled
    /// afterwards.
    pub fn register_filter(&mut self, name: &str, func: FilterFn) {
        self.registry.add_filter(name, func);
    }

    /// Register (or replace) a function.
    pub fn register_function(&mut self, name: &str, func: FunctionFn) {
        self.registry.add_function(name, func);
    }

    /// Load and compile `name`, or return the cached program.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the loader has no such template, or
    /// [`Error::Compilation`] when its source does not compile.
    pub fn get_template(&self, name: &str) -> Result<Rc<Template>, Error> {
        if let Some(template) = self.templates.borrow().get(name) {
            return Ok(Rc::clone(template));
        }

        let source = self
            .loader
            .load(name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        let template = compiler::compile_source(name, &source, &self.registry)
            .map_err(|e| e.with_source(&source))?;
        debug!(
            template = name,
            instructions = template.len(),
            "compiled template"
        );

        let template = Rc::new(template);
        self.templates
            .borrow_mut()
            .insert(name.to_owned(), Rc::clone(&template));
        Ok(template)
    }

    /// Compile (if needed) and render `name` against `data`.
    ///
    /// # Errors
    ///
    /// Any error from [`get_template`](Self::get_template), including those
    /// of included templates, or a [`RuntimeError`](crate::RuntimeError)
    /// raised while executing.
    pub fn render(&self, name: &str, data: &dyn DataProvider) -> Result<String, Error> {
        let template = self.get_template(name)?;
        Vm::new(self, data).run(&template)
    }

    /// Listing of a compiled program, one instruction per line.
    ///
    /// Each line is two spaces, the opcode padded to `max_width`, then the
    /// operands (trailing spaces trimmed). Jump targets get an `Ln:` label
    /// line of their own.
    pub fn disassemble(&self, template: &Template, max_width: usize) -> Vec<String> {
        template.disassemble(max_width)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{ArrayLoader, JsonDataProvider};
    use serde_json::json;

    fn shout(value: &Value, _args: &[Value]) -> Result<Value, String> {
        Ok(Value::String(format!("{}!", crate::value::to_output(value))))
    }

    #[test]
    fn templates_are_cached() {
        let engine = Engine::new(ArrayLoader::new([("a.t", "x")]));
        let first = engine.get_template("a.t").unwrap();
        let second = engine.get_template("a.t").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_template() {
        let engine = Engine::new(ArrayLoader::default());
        let err = engine.get_template("nope.t").unwrap_err();
        assert!(matches!(err, Error::NotFound(name) if name == "nope.t"));
    }

    #[test]
    fn compilation_error_carries_source_line() {
        let engine = Engine::new(ArrayLoader::new([("a.t", "ok\n{{ }}")]));
        let err = engine.get_template("a.t").unwrap_err();
        let message = err.full_message();
        assert!(message.starts_with("a.t:2: "));
        assert!(message.contains("{{ }}"));
    }

    #[test]
    fn custom_filter() {
        let mut engine = Engine::new(ArrayLoader::new([("a.t", "{{ name|shout }}")]));
        engine.register_filter("shout", shout);
        let data = JsonDataProvider::new(json!({"name": "hey"}));
        assert_eq!(engine.render("a.t", &data).unwrap(), "hey!");
    }
}
