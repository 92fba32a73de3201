//! Tokenizer for template sources.
//!
//! The lexer alternates between two modes: raw text, and the inside of a
//! `{{ ... }}` / `{% ... %}` delimiter pair where expression tokens are
//! produced. Comments (`{# ... #}`) are dropped here. Whitespace control
//! is also resolved here so the parser only ever sees final text:
//!
//! - `{{-` / `{%-` / `{#-` trims whitespace before the delimiter
//! - `-}}` / `-%}` / `-#}` trims whitespace after it
//!
//! Everything else, newlines after tags included, is kept verbatim.

use crate::error::CompilationError;

/// A single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Text(String),
    EchoOpen,
    EchoClose,
    TagOpen,
    TagClose,
    Ident(String),
    Var(String),
    Int(i64),
    Float(f64),
    Str(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Tilde,
    Pipe,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Assign,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Eof,
}

impl Tok {
    /// How the token is named in error messages.
    pub(crate) fn describe(&self) -> String {
        let fixed = match self {
            Self::Text(_) => "text",
            Self::EchoOpen => "{{",
            Self::EchoClose => "}}",
            Self::TagOpen => "{%",
            Self::TagClose => "%}",
            Self::Ident(name) => return format!("\"{name}\""),
            Self::Var(name) => return format!("${name}"),
            Self::Int(v) => return v.to_string(),
            Self::Float(v) => return v.to_string(),
            Self::Str(_) => "string literal",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Tilde => "~",
            Self::Pipe => "|",
            Self::Dot => ".",
            Self::Comma => ",",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Assign => "=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eof => "end of template",
        };
        fixed.to_owned()
    }
}

/// A token with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    Echo,
    Tag,
    Comment,
}

/// Split `source` into tokens. The result always ends with [`Tok::Eof`].
pub(crate) fn tokenize(template: &str, source: &str) -> Result<Vec<Token>, CompilationError> {
    let mut lexer = Lexer {
        template,
        src: source,
        pos: 0,
        line: 1,
        trim_next: false,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    template: &'a str,
    src: &'a str,
    pos: usize,
    line: u32,
    /// Strip leading whitespace off the next text chunk.
    trim_next: bool,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn rest(&self) -> &str {
        self.src.get(self.pos..).unwrap_or("")
    }

    fn error(&self, message: impl Into<String>) -> CompilationError {
        CompilationError::new(self.template, self.line, message)
    }

    fn push(&mut self, tok: Tok, line: u32) {
        self.tokens.push(Token { tok, line });
    }

    /// Consume `len` bytes, counting the newlines they contain.
    fn advance(&mut self, len: usize) {
        let end = self.pos.saturating_add(len).min(self.src.len());
        let consumed = self.src.get(self.pos..end).unwrap_or("");
        let newlines = u32::try_from(consumed.matches('\n').count()).unwrap_or(u32::MAX);
        self.line = self.line.saturating_add(newlines);
        self.pos = end;
    }

    fn run(&mut self) -> Result<(), CompilationError> {
        while self.pos < self.src.len() {
            match find_open(self.rest()) {
                Some((offset, delim)) => {
                    self.text(offset);
                    self.delimited(delim)?;
                }
                None => {
                    let len = self.rest().len();
                    self.text(len);
                }
            }
        }
        self.push(Tok::Eof, self.line);
        Ok(())
    }

    /// Emit the next `len` bytes as a text token, applying pending trims.
    fn text(&mut self, len: usize) {
        let line = self.line;
        let end = self.pos.saturating_add(len);
        let raw = self.src.get(self.pos..end).unwrap_or("");
        let text = if std::mem::take(&mut self.trim_next) {
            raw.trim_start()
        } else {
            raw
        };
        if !text.is_empty() {
            let text = text.to_owned();
            self.push(Tok::Text(text), line);
        }
        self.advance(len);
    }

    /// Trim trailing whitespace off the previously emitted text token.
    fn trim_previous_text(&mut self) {
        if let Some(Token { tok: Tok::Text(text), .. }) = self.tokens.last_mut() {
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
            if text.is_empty() {
                self.tokens.pop();
            }
        }
    }

    fn delimited(&mut self, delim: Delim) -> Result<(), CompilationError> {
        self.advance(2);
        if self.rest().starts_with('-') {
            self.trim_previous_text();
            self.advance(1);
        }
        match delim {
            Delim::Comment => self.comment(),
            Delim::Echo => {
                self.push(Tok::EchoOpen, self.line);
                self.expression(delim)
            }
            Delim::Tag => {
                self.push(Tok::TagOpen, self.line);
                self.expression(delim)
            }
        }
    }

    fn comment(&mut self) -> Result<(), CompilationError> {
        let Some(end) = self.rest().find("#}") else {
            return Err(self.error("unclosed comment, expected #}"));
        };
        let trims = end > 0 && self.rest().get(..end).is_some_and(|body| body.ends_with('-'));
        self.advance(end.saturating_add(2));
        if trims {
            self.trim_next = true;
        }
        Ok(())
    }

    fn expression(&mut self, delim: Delim) -> Result<(), CompilationError> {
        let (close, tok) = match delim {
            Delim::Echo => ("}}", Tok::EchoClose),
            _ => ("%}", Tok::TagClose),
        };
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(format!("unexpected end of template, expected {close}")));
            }
            if rest.starts_with('-') && rest.get(1..).is_some_and(|r| r.starts_with(close)) {
                self.push(tok, self.line);
                self.advance(3);
                self.trim_next = true;
                return Ok(());
            }
            if rest.starts_with(close) {
                self.push(tok, self.line);
                self.advance(2);
                return Ok(());
            }
            self.token()?;
        }
    }

    fn skip_whitespace(&mut self) {
        let len = self.rest().len().saturating_sub(self.rest().trim_start().len());
        self.advance(len);
    }

    fn token(&mut self) -> Result<(), CompilationError> {
        let line = self.line;
        let rest = self.rest();
        let Some(first) = rest.chars().next() else {
            return Err(self.error("unexpected end of template"));
        };

        if first.is_ascii_digit() {
            return self.number();
        }
        if first == '$' {
            let name_len = ident_len(rest.get(1..).unwrap_or(""));
            if name_len == 0 {
                return Err(self.error("expected a variable name after $"));
            }
            let name = rest.get(1..=name_len).unwrap_or("").to_owned();
            self.push(Tok::Var(name), line);
            self.advance(name_len.saturating_add(1));
            return Ok(());
        }
        if first.is_ascii_alphabetic() || first == '_' {
            let len = ident_len(rest);
            let name = rest.get(..len).unwrap_or("").to_owned();
            self.push(Tok::Ident(name), line);
            self.advance(len);
            return Ok(());
        }
        if matches!(first, '\'' | '"' | '`') {
            return self.string(first);
        }

        let two = rest.get(..2).unwrap_or("");
        let (tok, len) = match two {
            "==" => (Tok::Eq, 2),
            "!=" => (Tok::Ne, 2),
            "<=" => (Tok::Le, 2),
            ">=" => (Tok::Ge, 2),
            _ => {
                let tok = match first {
                    '+' => Tok::Plus,
                    '-' => Tok::Minus,
                    '*' => Tok::Star,
                    '/' => Tok::Slash,
                    '%' => Tok::Percent,
                    '~' => Tok::Tilde,
                    '|' => Tok::Pipe,
                    '.' => Tok::Dot,
                    ',' => Tok::Comma,
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    '[' => Tok::LBracket,
                    ']' => Tok::RBracket,
                    '=' => Tok::Assign,
                    '<' => Tok::Lt,
                    '>' => Tok::Gt,
                    other => return Err(self.error(format!("unexpected character '{other}'"))),
                };
                (tok, 1)
            }
        };
        self.push(tok, line);
        self.advance(len);
        Ok(())
    }

    fn number(&mut self) -> Result<(), CompilationError> {
        let line = self.line;
        let rest = self.rest();
        let int_len = leading_len(rest, |c| c.is_ascii_digit());
        let after = rest.get(int_len..).unwrap_or("");
        let frac_len = after
            .strip_prefix('.')
            .filter(|tail| tail.starts_with(|c: char| c.is_ascii_digit()))
            .map_or(0, |tail| {
                let digits = leading_len(tail, |c| c.is_ascii_digit());
                digits.saturating_add(1)
            });
        let len = int_len.saturating_add(frac_len);
        let literal = rest.get(..len).unwrap_or("");

        let tok = if frac_len > 0 {
            literal
                .parse::<f64>()
                .map(Tok::Float)
                .map_err(|e| self.error(format!("invalid number {literal}: {e}")))?
        } else {
            literal
                .parse::<i64>()
                .map(Tok::Int)
                .map_err(|e| self.error(format!("invalid integer {literal}: {e}")))?
        };
        self.push(tok, line);
        self.advance(len);
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<(), CompilationError> {
        let line = self.line;
        let mut value = String::new();
        let mut chars = self.rest().char_indices().skip(1);
        let mut end = None;
        while let Some((idx, c)) = chars.next() {
            if c == quote {
                end = Some(idx.saturating_add(1));
                break;
            }
            if c == '\\' && quote != '`' {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                continue;
            }
            value.push(c);
        }
        let Some(len) = end else {
            return Err(self.error("unterminated string literal"));
        };
        self.push(Tok::Str(value), line);
        self.advance(len);
        Ok(())
    }
}

/// Byte length of the identifier at the start of `s`.
fn ident_len(s: &str) -> usize {
    if !s.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return 0;
    }
    leading_len(s, |c| c.is_ascii_alphanumeric() || c == '_')
}

/// Byte length of the prefix of `s` whose chars all satisfy `pred`.
fn leading_len(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.len().saturating_sub(s.trim_start_matches(pred).len())
}

/// Find the first opening delimiter in `rest`.
fn find_open(rest: &str) -> Option<(usize, Delim)> {
    rest.match_indices('{').find_map(|(idx, _)| {
        let delim = match rest.get(idx.saturating_add(1)..)?.chars().next()? {
            '{' => Delim::Echo,
            '%' => Delim::Tag,
            '#' => Delim::Comment,
            _ => return None,
        };
        Some((idx, delim))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize("t", src)
            .unwrap()
            .into_iter()
            .map(|t| t.tok)
            .collect()
    }

    #[test]
    fn text_and_echo() {
        assert_eq!(
            toks("a {{ 1 + x.y }} b"),
            vec![
                Tok::Text("a ".into()),
                Tok::EchoOpen,
                Tok::Int(1),
                Tok::Plus,
                Tok::Ident("x".into()),
                Tok::Dot,
                Tok::Ident("y".into()),
                Tok::EchoClose,
                Tok::Text(" b".into()),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(toks("a{# hidden #}b"), vec![
            Tok::Text("a".into()),
            Tok::Text("b".into()),
            Tok::Eof
        ]);
    }

    #[test]
    fn newline_after_tag_is_kept() {
        assert_eq!(
            toks("{% end %}\n\nx"),
            vec![
                Tok::TagOpen,
                Tok::Ident("end".into()),
                Tok::TagClose,
                Tok::Text("\n\nx".into()),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn dash_trims_whitespace() {
        assert_eq!(
            toks("a  \n {{- $v -}}  \n b"),
            vec![
                Tok::Text("a".into()),
                Tok::EchoOpen,
                Tok::Var("v".into()),
                Tok::EchoClose,
                Tok::Text("b".into()),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            toks(r#"{{ 5.1 'it\'s' "a\nb" `/\d+/` }}"#),
            vec![
                Tok::EchoOpen,
                Tok::Float(5.1),
                Tok::Str("it's".into()),
                Tok::Str("a\nb".into()),
                Tok::Str(r"/\d+/".into()),
                Tok::EchoClose,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            toks("{{ a == b != c <= d >= e }}")
                .into_iter()
                .filter(|t| !matches!(t, Tok::Ident(_)))
                .collect::<Vec<_>>(),
            vec![Tok::EchoOpen, Tok::Eq, Tok::Ne, Tok::Le, Tok::Ge, Tok::EchoClose, Tok::Eof]
        );
    }

    #[test]
    fn lines_are_tracked() {
        let tokens = tokenize("t", "a\nb\n{{ x }}").unwrap();
        let var = tokens.iter().find(|t| t.tok == Tok::Ident("x".into())).unwrap();
        assert_eq!(var.line, 3);
    }

    #[test]
    fn unterminated_echo_is_an_error() {
        let err = tokenize("t", "{{ 1 ").unwrap_err();
        assert_eq!(err.message, "unexpected end of template, expected }}");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("t", "{{ 'abc }}").unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn unexpected_character() {
        let err = tokenize("t", "{{ @ }}").unwrap_err();
        assert_eq!(err.message, "unexpected character '@'");
    }
}
