//! External template data.
//!
//! Bare identifiers in expressions (`page.items`, `a.b.c`) are not
//! variables: the compiler turns the whole dotted path into a single
//! lookup against the render's [`DataProvider`].

use serde_json::Value;

/// Supplies values for dotted data paths.
pub trait DataProvider {
    /// Value at `path` (segments joined by `.`). Unknown paths are `null`.
    fn get(&self, path: &str) -> Value;
}

/// A [`DataProvider`] over a JSON document.
///
/// Each path segment indexes an object by key, or an array by position.
#[derive(Debug, Clone, Default)]
pub struct JsonDataProvider {
    root: Value,
}

impl JsonDataProvider {
    /// Wrap a JSON document.
    pub const fn new(root: Value) -> Self {
        Self { root }
    }
}

impl DataProvider for JsonDataProvider {
    fn get(&self, path: &str) -> Value {
        path.split('.')
            .try_fold(&self.root, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| items.get(idx)),
                _ => None,
            })
            .cloned()
            .unwrap_or(Value::Null)
    }
}
