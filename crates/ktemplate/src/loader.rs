//! Template source lookup.

use std::collections::HashMap;

/// Resolves a template name to its source text.
pub trait Loader {
    /// Source of the template called `name`, or `None` if there is none.
    fn load(&self, name: &str) -> Option<String>;
}

/// A read-only in-memory set of named template sources.
#[derive(Debug, Clone, Default)]
pub struct ArrayLoader {
    sources: HashMap<String, String>,
}

impl ArrayLoader {
    /// Build a loader from `(name, source)` pairs. A repeated name keeps
    /// the last source.
    pub fn new<K, V>(sources: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            sources: sources
                .into_iter()
                .map(|(name, source)| (name.into(), source.into()))
                .collect(),
        }
    }

    /// Number of templates in the set.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Loader for ArrayLoader {
    fn load(&self, name: &str) -> Option<String> {
        self.sources.get(name).cloned()
    }
}
