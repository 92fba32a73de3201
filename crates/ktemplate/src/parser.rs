//! Recursive-descent parser from tokens to [`Stmt`] trees.
//!
//! Expression precedence, loosest first:
//!
//! | Level | Operators |
//! |-------|-----------|
//! | 1 | `or` |
//! | 2 | `and` |
//! | 3 | `==` `!=` `<` `>` `<=` `>=` `matches` |
//! | 4 | `~` |
//! | 5 | `+` `-` |
//! | 6 | `*` `/` `%` |
//! | 7 | unary `-`, `not` |
//! | 8 | `.attr`, `[index]`, `\|filter` |

use serde_json::Value;

use crate::ast::{Assigned, BinaryOp, Expr, IncludeArg, Stmt, StmtKind};
use crate::error::CompilationError;
use crate::lexer::{Tok, Token};

/// Deepest nesting of parenthesized expressions and block tags.
pub(crate) const MAX_NESTING: usize = 64;

static EOF: Token = Token {
    tok: Tok::Eof,
    line: 0,
};

/// Parse a whole template file.
pub(crate) fn parse(template: &str, tokens: Vec<Token>) -> Result<Vec<Stmt>, CompilationError> {
    let mut parser = Parser {
        template,
        tokens,
        pos: 0,
        depth: 0,
    };
    let (body, end) = parser.body()?;
    match end {
        Terminator::Eof => Ok(body),
        Terminator::Tag(keyword, line) => Err(parser.error(
            line,
            format!("unexpected {{% {keyword} %}} without a matching opening tag"),
        )),
    }
}

/// What stopped a [`Parser::body`] call.
enum Terminator {
    Eof,
    /// `end`, `else` or `elseif`, with the line of the tag.
    Tag(&'static str, u32),
}

struct Parser<'a> {
    template: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Current expression and block nesting.
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&EOF)
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if token.tok != Tok::Eof {
            self.pos = self.pos.saturating_add(1);
        }
        token
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if &self.peek().tok == tok {
            self.next();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(&self.peek().tok, Tok::Ident(name) if name == keyword) {
            self.next();
            true
        } else {
            false
        }
    }

    fn error(&self, line: u32, message: impl Into<String>) -> CompilationError {
        CompilationError::new(self.template, line, message)
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        what: &str,
        parse: impl FnOnce(&mut Self) -> Result<T, CompilationError>,
    ) -> Result<T, CompilationError> {
        if self.depth >= MAX_NESTING {
            let line = self.peek().line;
            return Err(self.error(
                line,
                format!("{what} nesting too deep (limit is {MAX_NESTING})"),
            ));
        }
        self.depth = self.depth.saturating_add(1);
        let result = parse(self);
        self.depth = self.depth.saturating_sub(1);
        result
    }

    fn unexpected(&self, token: &Token, expected: &str) -> CompilationError {
        self.error(
            token.line,
            format!("unexpected {}, expected {expected}", token.tok.describe()),
        )
    }

    fn expect(&mut self, tok: &Tok) -> Result<Token, CompilationError> {
        let token = self.next();
        if &token.tok == tok {
            Ok(token)
        } else {
            Err(self.unexpected(&token, &tok.describe()))
        }
    }

    fn expect_var(&mut self) -> Result<String, CompilationError> {
        let token = self.next();
        match token.tok {
            Tok::Var(name) => Ok(name),
            _ => Err(self.unexpected(&token, "a $variable")),
        }
    }

    /// Parse statements until end of input or a block-closing tag.
    fn body(&mut self) -> Result<(Vec<Stmt>, Terminator), CompilationError> {
        let mut stmts = Vec::new();
        loop {
            let token = self.next();
            let line = token.line;
            match token.tok {
                Tok::Eof => return Ok((stmts, Terminator::Eof)),
                Tok::Text(text) => stmts.push(Stmt {
                    kind: StmtKind::Text(text),
                    line,
                }),
                Tok::EchoOpen => {
                    let expr = self.expr()?;
                    self.expect(&Tok::EchoClose)?;
                    stmts.push(Stmt {
                        kind: StmtKind::Echo(expr),
                        line,
                    });
                }
                Tok::TagOpen => {
                    let keyword = self.next();
                    let Tok::Ident(name) = &keyword.tok else {
                        return Err(self.unexpected(&keyword, "a tag name"));
                    };
                    match name.as_str() {
                        "end" => return Ok((stmts, Terminator::Tag("end", line))),
                        "else" => return Ok((stmts, Terminator::Tag("else", line))),
                        "elseif" => return Ok((stmts, Terminator::Tag("elseif", line))),
                        _ => {
                            let kind = self.nested("block", |p| p.tag(name, line))?;
                            stmts.push(Stmt { kind, line });
                        }
                    }
                }
                _ => return Err(self.unexpected(&token, "text or a tag")),
            }
        }
    }

    /// Parse a block body that must be closed by `{% end %}`.
    fn block(&mut self, opener: &str, line: u32) -> Result<Vec<Stmt>, CompilationError> {
        let (body, end) = self.body()?;
        match end {
            Terminator::Tag("end", _) => {
                self.expect(&Tok::TagClose)?;
                Ok(body)
            }
            Terminator::Tag(other, at) => Err(self.error(
                at,
                format!("unexpected {{% {other} %}} inside {{% {opener} %}}"),
            )),
            Terminator::Eof => Err(self.error(line, format!("unclosed {{% {opener} %}} block"))),
        }
    }

    fn tag(&mut self, keyword: &str, line: u32) -> Result<StmtKind, CompilationError> {
        match keyword {
            "if" => self.if_tag(line),
            "for" => self.for_tag(line),
            "let" => {
                let name = self.expect_var()?;
                let value = self.assigned("let", line)?;
                Ok(StmtKind::Let { name, value })
            }
            "set" => {
                let name = self.expect_var()?;
                let value = self.assigned("set", line)?;
                Ok(StmtKind::Set { name, value })
            }
            "param" => {
                let name = self.expect_var()?;
                let default = self.assigned("param", line)?;
                Ok(StmtKind::Param { name, default })
            }
            "include" => self.include_tag(line),
            "arg" => Err(self.error(line, "{% arg %} is only allowed inside {% include %}")),
            other => Err(self.error(line, format!("unknown tag \"{other}\""))),
        }
    }

    /// `= expr %}` or `%}` followed by a captured block.
    fn assigned(&mut self, opener: &str, line: u32) -> Result<Assigned, CompilationError> {
        if self.eat(&Tok::Assign) {
            let expr = self.expr()?;
            self.expect(&Tok::TagClose)?;
            return Ok(Assigned::Expr(expr));
        }
        let token = self.next();
        if token.tok != Tok::TagClose {
            return Err(self.unexpected(&token, "= or %}"));
        }
        Ok(Assigned::Block(self.block(opener, line)?))
    }

    fn if_tag(&mut self, line: u32) -> Result<StmtKind, CompilationError> {
        let mut branches = Vec::new();
        let mut cond = self.expr()?;
        self.expect(&Tok::TagClose)?;
        loop {
            let (body, end) = self.body()?;
            branches.push((cond, body));
            match end {
                Terminator::Tag("elseif", _) => {
                    cond = self.expr()?;
                    self.expect(&Tok::TagClose)?;
                }
                Terminator::Tag("else", _) => {
                    self.expect(&Tok::TagClose)?;
                    let otherwise = self.block("if", line)?;
                    return Ok(StmtKind::If {
                        branches,
                        otherwise,
                    });
                }
                Terminator::Tag(_, _) => {
                    self.expect(&Tok::TagClose)?;
                    return Ok(StmtKind::If {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
                Terminator::Eof => return Err(self.error(line, "unclosed {% if %} block")),
            }
        }
    }

    fn for_tag(&mut self, line: u32) -> Result<StmtKind, CompilationError> {
        let first = self.expect_var()?;
        let (key, value) = if self.eat(&Tok::Comma) {
            (Some(first), self.expect_var()?)
        } else {
            (None, first)
        };
        if !self.eat_keyword("in") {
            let token = self.next();
            return Err(self.unexpected(&token, "\"in\""));
        }
        let iterable = self.expr()?;
        self.expect(&Tok::TagClose)?;
        let body = self.block("for", line)?;
        Ok(StmtKind::For {
            key,
            value,
            iterable,
            body,
        })
    }

    fn include_tag(&mut self, line: u32) -> Result<StmtKind, CompilationError> {
        let token = self.next();
        let Tok::Str(template) = token.tok else {
            return Err(self.unexpected(&token, "a template name string"));
        };
        self.expect(&Tok::TagClose)?;

        let mut args: Vec<IncludeArg> = Vec::new();
        loop {
            let token = self.next();
            match &token.tok {
                Tok::Text(text) if text.trim().is_empty() => {}
                Tok::TagOpen => {
                    let keyword = self.next();
                    match &keyword.tok {
                        Tok::Ident(name) if name == "end" => {
                            self.expect(&Tok::TagClose)?;
                            return Ok(StmtKind::Include { template, args });
                        }
                        Tok::Ident(name) if name == "arg" => {
                            let name = self.expect_var()?;
                            if args.iter().any(|arg| arg.name == name) {
                                return Err(self.error(
                                    keyword.line,
                                    format!("duplicate {{% arg ${name} %}}"),
                                ));
                            }
                            let value = self.assigned("arg", keyword.line)?;
                            args.push(IncludeArg {
                                name,
                                value,
                                line: keyword.line,
                            });
                        }
                        _ => {
                            return Err(self.error(
                                keyword.line,
                                "only {% arg %} tags are allowed inside {% include %}",
                            ))
                        }
                    }
                }
                Tok::Eof => return Err(self.error(line, "unclosed {% include %} block")),
                _ => {
                    return Err(self.error(
                        token.line,
                        "only {% arg %} tags are allowed inside {% include %}",
                    ))
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn expr(&mut self) -> Result<Expr, CompilationError> {
        self.nested("expression", Self::or)
    }

    fn or(&mut self) -> Result<Expr, CompilationError> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, CompilationError> {
        let mut left = self.comparison()?;
        while self.eat_keyword("and") {
            let right = self.comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, CompilationError> {
        let mut left = self.concat()?;
        loop {
            let op = match &self.peek().tok {
                Tok::Eq => BinaryOp::Eq,
                Tok::Ne => BinaryOp::Ne,
                Tok::Lt => BinaryOp::Lt,
                Tok::Gt => BinaryOp::Gt,
                Tok::Le => BinaryOp::Le,
                Tok::Ge => BinaryOp::Ge,
                Tok::Ident(name) if name == "matches" => BinaryOp::Matches,
                _ => return Ok(left),
            };
            self.next();
            let right = self.concat()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn concat(&mut self) -> Result<Expr, CompilationError> {
        let mut left = self.additive()?;
        while self.eat(&Tok::Tilde) {
            let right = self.additive()?;
            left = Expr::Binary(BinaryOp::Concat, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, CompilationError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().tok {
                Tok::Plus => BinaryOp::Add,
                Tok::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.next();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, CompilationError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().tok {
                Tok::Star => BinaryOp::Mul,
                Tok::Slash => BinaryOp::Div,
                Tok::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.next();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, CompilationError> {
        if self.eat(&Tok::Minus) {
            let inner = self.nested("expression", Self::unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if self.eat_keyword("not") {
            let inner = self.nested("expression", Self::unary)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, CompilationError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Tok::Dot) {
                let token = self.next();
                let Tok::Ident(key) = token.tok else {
                    return Err(self.unexpected(&token, "an attribute name"));
                };
                expr = Expr::Attr(Box::new(expr), key);
            } else if self.eat(&Tok::LBracket) {
                let index = self.expr()?;
                self.expect(&Tok::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat(&Tok::Pipe) {
                let token = self.next();
                let Tok::Ident(name) = token.tok else {
                    return Err(self.unexpected(&token, "a filter name"));
                };
                let args = if self.eat(&Tok::LParen) {
                    self.call_args()?
                } else {
                    Vec::new()
                };
                expr = Expr::Filter {
                    name,
                    subject: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Arguments after an already consumed `(`.
    fn call_args(&mut self) -> Result<Vec<Expr>, CompilationError> {
        let mut args = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Tok::RParen) {
                return Ok(args);
            }
            let token = self.next();
            if token.tok != Tok::Comma {
                return Err(self.unexpected(&token, ", or )"));
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, CompilationError> {
        let token = self.next();
        match token.tok {
            Tok::Int(v) => Ok(Expr::Literal(Value::from(v))),
            Tok::Float(v) => Ok(Expr::Literal(
                serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number),
            )),
            Tok::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Tok::Var(name) => Ok(Expr::Local(name)),
            Tok::LParen => {
                let expr = self.expr()?;
                self.expect(&Tok::RParen)?;
                Ok(expr)
            }
            Tok::Ident(name) => {
                let keyword = match name.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" => Some(Value::Null),
                    _ => None,
                };
                if let Some(value) = keyword {
                    return Ok(Expr::Literal(value));
                }
                if self.eat(&Tok::LParen) {
                    let args = self.call_args()?;
                    return Ok(Expr::Call { name, args });
                }
                Ok(Expr::Data(self.data_path(name)))
            }
            _ => Err(self.unexpected(&token, "an expression")),
        }
    }

    /// Extend `head` with `.segment` parts into a dotted data path.
    fn data_path(&mut self, head: String) -> String {
        let mut path = head;
        while self.peek().tok == Tok::Dot {
            let Some(Token {
                tok: Tok::Ident(segment),
                ..
            }) = self.tokens.get(self.pos.saturating_add(1))
            else {
                break;
            };
            path.push('.');
            path.push_str(segment);
            self.pos = self.pos.saturating_add(2);
        }
        path
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_src(src: &str) -> Result<Vec<Stmt>, CompilationError> {
        parse("t", tokenize("t", src)?)
    }

    fn echo_expr(src: &str) -> Expr {
        let stmts = parse_src(src).unwrap();
        match stmts.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Echo(expr)) => expr,
            other => panic!("expected echo, got {other:?}"),
        }
    }

    fn lit(v: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::from(v)))
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(
            echo_expr("{{ 1 + 2 * 3 }}"),
            Expr::Binary(
                BinaryOp::Add,
                lit(1),
                Box::new(Expr::Binary(BinaryOp::Mul, lit(2), lit(3)))
            )
        );
    }

    #[test]
    fn data_paths_collapse() {
        assert_eq!(echo_expr("{{ a.b.c }}"), Expr::Data("a.b.c".into()));
    }

    #[test]
    fn filters_bind_tighter_than_unary() {
        assert_eq!(
            echo_expr("{{ -x|abs }}"),
            Expr::Neg(Box::new(Expr::Filter {
                name: "abs".into(),
                subject: Box::new(Expr::Data("x".into())),
                args: vec![],
            }))
        );
    }

    #[test]
    fn local_index_and_filter_args() {
        assert_eq!(
            echo_expr("{{ $item['name']|e(\"url\") }}"),
            Expr::Filter {
                name: "e".into(),
                subject: Box::new(Expr::Index(
                    Box::new(Expr::Local("item".into())),
                    Box::new(Expr::Literal(Value::from("name")))
                )),
                args: vec![Expr::Literal(Value::from("url"))],
            }
        );
    }

    #[test]
    fn empty_echo_is_rejected() {
        let err = parse_src("{{ }}").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.message, "unexpected }}, expected an expression");
    }

    #[test]
    fn if_elseif_else() {
        let stmts = parse_src("{% if a %}1{% elseif b %}2{% else %}3{% end %}").unwrap();
        let Some(StmtKind::If {
            branches,
            otherwise,
        }) = stmts.into_iter().next().map(|s| s.kind)
        else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(otherwise.len(), 1);
    }

    #[test]
    fn for_with_key() {
        let stmts = parse_src("{% for $k, $v in items %}{{ $k }}{% end %}").unwrap();
        assert!(matches!(
            stmts.first().map(|s| &s.kind),
            Some(StmtKind::For { key: Some(k), value, .. }) if k == "k" && value == "v"
        ));
    }

    #[test]
    fn include_with_args() {
        let stmts = parse_src(
            "{% include \"b.t\" %}\n  {% arg $x = 1 %}\n  {% arg $y %}text{% end %}\n{% end %}",
        )
        .unwrap();
        let Some(StmtKind::Include { template, args }) = stmts.into_iter().next().map(|s| s.kind)
        else {
            panic!("expected include");
        };
        assert_eq!(template, "b.t");
        assert_eq!(
            args.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            ["x", "y"]
        );
        assert!(matches!(args.get(1).map(|a| &a.value), Some(Assigned::Block(_))));
    }

    #[test]
    fn unclosed_block() {
        let err = parse_src("{% for $x in xs %}").unwrap_err();
        assert_eq!(err.message, "unclosed {% for %} block");
    }

    #[test]
    fn stray_end() {
        let err = parse_src("a\n{% end %}").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("{% end %}"));
    }

    #[test]
    fn unknown_tag() {
        let err = parse_src("{% while x %}").unwrap_err();
        assert_eq!(err.message, "unknown tag \"while\"");
    }

    #[test]
    fn deeply_nested_parentheses_are_rejected() {
        let src = format!("{{{{ {}1{} }}}}", "(".repeat(1000), ")".repeat(1000));
        let err = parse_src(&src).unwrap_err();
        assert_eq!(err.message, "expression nesting too deep (limit is 64)");
    }

    #[test]
    fn deeply_nested_unary_is_rejected() {
        let src = format!("{{{{ {}1 }}}}", "-".repeat(500));
        let err = parse_src(&src).unwrap_err();
        assert!(err.message.starts_with("expression nesting too deep"));
    }

    #[test]
    fn moderate_nesting_is_fine() {
        let src = format!("{{{{ {}1{} }}}}", "(".repeat(40), ")".repeat(40));
        assert_eq!(echo_expr(&src), Expr::Literal(Value::from(1)));
    }

    #[test]
    fn deeply_nested_blocks_are_rejected() {
        let src = format!("{}{}", "{% let $x %}".repeat(200), "{% end %}".repeat(200));
        let err = parse_src(&src).unwrap_err();
        assert_eq!(err.message, "block nesting too deep (limit is 64)");
    }

    #[test]
    fn text_inside_include_is_rejected() {
        let err = parse_src("{% include \"x.t\" %}hello{% end %}").unwrap_err();
        assert!(err.message.contains("only {% arg %} tags"));
    }
}
