//! Error types for template compilation and rendering.
//!
//! Every failure carries the template file name and the 1-based line of
//! the offending construct so that a playground user can find it in a
//! multi-file template set. [`Error::full_message`] produces the
//! user-facing text.

/// A lex, parse or compile failure in one template file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{template}:{line}: {message}")]
pub struct CompilationError {
    /// Name of the template file that failed to compile.
    pub template: String,
    /// 1-based line of the offending construct.
    pub line: u32,
    /// Human-readable reason.
    pub message: String,
    /// Text of the offending source line, when it could be located.
    pub source_line: Option<String>,
}

impl CompilationError {
    pub(crate) fn new(template: &str, line: u32, message: impl Into<String>) -> Self {
        Self {
            template: template.to_owned(),
            line,
            message: message.into(),
            source_line: None,
        }
    }

    /// Attach the offending line of `source` for display.
    pub(crate) fn with_source(mut self, source: &str) -> Self {
        self.source_line = self
            .line
            .checked_sub(1)
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| source.lines().nth(idx))
            .map(str::to_owned);
        self
    }

    /// The multi-line message: location, reason and the offending line.
    pub fn full_message(&self) -> String {
        match &self.source_line {
            Some(text) => format!("{self}\n  {} | {text}", self.line),
            None => self.to_string(),
        }
    }
}

/// A failure while executing a compiled template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{template}:{line}: {message}")]
pub struct RuntimeError {
    /// Name of the template that was executing.
    pub template: String,
    /// 1-based line of the instruction that failed.
    pub line: u32,
    /// Human-readable reason.
    pub message: String,
}

/// Any error the engine can return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The template (or one it includes) failed to compile.
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    /// Rendering failed after the template compiled.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The loader has no template with this name.
    #[error("template \"{0}\" not found")]
    NotFound(String),
}

impl Error {
    /// The formatted, user-facing message for this error.
    pub fn full_message(&self) -> String {
        match self {
            Self::Compilation(e) => e.full_message(),
            Self::Runtime(e) => e.to_string(),
            Self::NotFound(_) => self.to_string(),
        }
    }
}
