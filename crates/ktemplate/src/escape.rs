//! Output escaping strategies.
//!
//! `{{ expr }}` escapes for HTML unless the outermost filter is `raw`,
//! `escape` or `e`. The `escape` filter selects a strategy by name.

use std::fmt::Write as _;

/// A named escaping strategy accepted by the `escape` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// HTML body and attribute text.
    Html,
    /// A URL path segment or query value (RFC 3986 unreserved kept).
    Url,
}

impl Strategy {
    /// Look up a strategy by its template-facing name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "html" => Some(Self::Html),
            "url" => Some(Self::Url),
            _ => None,
        }
    }

    /// Escape `text` with this strategy.
    pub fn apply(self, text: &str) -> String {
        match self {
            Self::Html => escape_html(text),
            Self::Url => escape_url(text),
        }
    }
}

/// Replace `& < > " '` with HTML entities.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Percent-encode every byte outside `A-Z a-z 0-9 - _ . ~`.
pub fn escape_url(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html() {
        assert_eq!(escape_html("<i>boom</i>"), "&lt;i&gt;boom&lt;/i&gt;");
        assert_eq!(escape_html("a & 'b'"), "a &amp; &#039;b&#039;");
    }

    #[test]
    fn url() {
        assert_eq!(escape_url("Status: OK"), "Status%3A%20OK");
        assert_eq!(escape_url("é"), "%C3%A9");
    }

    #[test]
    fn strategy_names() {
        assert_eq!(Strategy::from_name("url"), Some(Strategy::Url));
        assert_eq!(Strategy::from_name("js"), None);
    }
}
