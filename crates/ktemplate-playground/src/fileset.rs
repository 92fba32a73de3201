//! Decomposition of one submitted text blob into a named template set.
//!
//! A blob may hold several files, each introduced by a delimiter line:
//!
//! ```text
//! --- main.template
//! {% include "ui/button.template" %}{% end %}
//! --- ui/button.template
//! <input type="button">
//! ```
//!
//! Without any delimiter the whole blob is a single [`MAIN_TEMPLATE`].

/// Name given to the only file of a blob without delimiters.
pub const MAIN_TEMPLATE: &str = "main.template";

const DELIMITER: &str = "--- ";

/// Ordered mapping of file name to source. The first file is the entry
/// point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<(String, String)>,
}

impl FileSet {
    /// Add a file. A name that is already present keeps its position and
    /// takes the new body.
    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        let name = name.into();
        let body = body.into();
        match self.files.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing_body)) => *existing_body = body,
            None => self.files.push((name, body)),
        }
    }

    /// Name of the entry-point template: the first file.
    pub fn main(&self) -> Option<&str> {
        self.files.first().map(|(name, _)| name.as_str())
    }

    /// Source of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, body)| body.as_str())
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .map(|(name, body)| (name.as_str(), body.as_str()))
    }
}

/// Split `raw` into files.
///
/// A delimiter is a whole line `--- <name>` terminated by `\n`, where
/// `<name>` is one or more of `[A-Za-z0-9_/]`, a dot, and one or more of
/// `[A-Za-z0-9_]`. Text before the first delimiter is dropped; each file
/// runs up to the next delimiter or the end of input.
pub fn decompose(raw: &str) -> FileSet {
    let mut set = FileSet::default();
    let mut current: Option<(&str, String)> = None;

    for line in raw.split_inclusive('\n') {
        if let Some(name) = delimiter_name(line) {
            if let Some((name, body)) = current.take() {
                set.insert(name, body);
            }
            current = Some((name, String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
        }
    }

    match current {
        Some((name, body)) => set.insert(name, body),
        None => set.insert(MAIN_TEMPLATE, raw),
    }
    set
}

/// The file name declared by `line`, if it is a delimiter line.
fn delimiter_name(line: &str) -> Option<&str> {
    let name = line.strip_prefix(DELIMITER)?.strip_suffix('\n')?;
    is_file_name(name).then_some(name)
}

fn is_file_name(name: &str) -> bool {
    let Some((stem, ext)) = name.split_once('.') else {
        return false;
    };
    !stem.is_empty()
        && !ext.is_empty()
        && stem.bytes().all(|b| is_word(b) || b == b'/')
        && ext.bytes().all(is_word)
}

const fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn files(set: &FileSet) -> Vec<(&str, &str)> {
        set.iter().collect()
    }

    #[test]
    fn no_delimiter_is_a_single_main_template() {
        let set = decompose("Hello {{ name }}\n");
        assert_eq!(files(&set), [(MAIN_TEMPLATE, "Hello {{ name }}\n")]);
        assert_eq!(set.main(), Some(MAIN_TEMPLATE));
    }

    #[test]
    fn empty_input() {
        assert_eq!(files(&decompose("")), [(MAIN_TEMPLATE, "")]);
    }

    #[test]
    fn two_files() {
        let set = decompose("--- a.t\nX\n--- b.t\nY\n");
        assert_eq!(files(&set), [("a.t", "X\n"), ("b.t", "Y\n")]);
        assert_eq!(set.main(), Some("a.t"));
    }

    #[test]
    fn preamble_is_discarded() {
        let set = decompose("ignored\n--- main.template\nbody");
        assert_eq!(files(&set), [("main.template", "body")]);
    }

    #[test]
    fn consecutive_delimiters_give_empty_body() {
        let set = decompose("--- a.t\n--- b.t\nY");
        assert_eq!(files(&set), [("a.t", ""), ("b.t", "Y")]);
    }

    #[test]
    fn mid_line_delimiter_is_text() {
        let set = decompose("x --- a.t\ny");
        assert_eq!(files(&set), [(MAIN_TEMPLATE, "x --- a.t\ny")]);
    }

    #[test]
    fn delimiter_needs_trailing_newline() {
        let set = decompose("--- a.t\nX\n--- b.t");
        assert_eq!(files(&set), [("a.t", "X\n--- b.t")]);
    }

    #[test]
    fn nested_paths_are_names() {
        let set = decompose("--- main.template\nA\n--- ui/button.template\nB\n");
        assert_eq!(set.get("ui/button.template"), Some("B\n"));
    }

    #[test]
    fn invalid_names_are_text() {
        for raw in ["--- noext\nX", "--- a.b.c\nX", "--- .t\nX", "--- a.\nX", "--- a-b.t\nX"] {
            let set = decompose(raw);
            assert_eq!(set.main(), Some(MAIN_TEMPLATE), "{raw:?}");
        }
    }

    #[test]
    fn repeated_name_keeps_first_position_and_last_body() {
        let set = decompose("--- a.t\n1\n--- b.t\n2\n--- a.t\n3\n");
        assert_eq!(files(&set), [("a.t", "3\n"), ("b.t", "2\n")]);
    }

    #[test]
    fn rewrapping_single_file_is_stable() {
        let single = decompose("Hello\n{{ x }}");
        let body = single.get(MAIN_TEMPLATE).unwrap();
        let wrapped = decompose(&format!("--- {MAIN_TEMPLATE}\n{body}"));
        assert_eq!(single, wrapped);
    }
}
