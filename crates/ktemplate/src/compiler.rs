//! Code generation from the syntax tree to a [`Template`] program.
//!
//! Local variables are resolved to frame slots here, so referencing an
//! undeclared `$name`, assigning to one, or calling an unregistered
//! filter or function is a compile-time error rather than a render-time
//! surprise.

use crate::ast::{Assigned, Expr, IncludeArg, Stmt, StmtKind};
use crate::bytecode::{Instruction, Template};
use crate::engine::Registry;
use crate::error::CompilationError;
use crate::{lexer, parser};

/// Lex, parse and compile one template file.
pub(crate) fn compile_source(
    name: &str,
    source: &str,
    registry: &Registry,
) -> Result<Template, CompilationError> {
    let tokens = lexer::tokenize(name, source)?;
    let stmts = parser::parse(name, tokens)?;
    let mut compiler = Compiler {
        template: name,
        registry,
        code: Vec::new(),
        lines: Vec::new(),
        scopes: vec![Vec::new()],
        next_slot: 0,
        params: Vec::new(),
        line: 1,
    };
    compiler.stmts(&stmts)?;
    compiler.emit(Instruction::Return);
    Ok(Template {
        name: name.to_owned(),
        code: compiler.code,
        lines: compiler.lines,
        params: compiler.params,
        frame_size: usize::from(compiler.next_slot),
    })
}

struct Compiler<'a> {
    template: &'a str,
    registry: &'a Registry,
    code: Vec<Instruction>,
    lines: Vec<u32>,
    /// Innermost scope last; each maps a variable name to its slot.
    scopes: Vec<Vec<(String, u16)>>,
    next_slot: u16,
    params: Vec<(String, u16)>,
    /// Line of the statement being compiled.
    line: u32,
}

impl Compiler<'_> {
    fn error(&self, message: impl Into<String>) -> CompilationError {
        CompilationError::new(self.template, self.line, message)
    }

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.code.push(instruction);
        self.lines.push(self.line);
        self.code.len().saturating_sub(1)
    }

    fn here(&self) -> usize {
        self.code.len()
    }

    /// Point the jump at `at` to the current position.
    fn patch(&mut self, at: usize) {
        let here = self.here();
        if let Some(instruction) = self.code.get_mut(at) {
            instruction.retarget(here);
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str) -> Result<u16, CompilationError> {
        let slot = self.next_slot;
        let Some(scope) = self.scopes.last_mut() else {
            return Err(self.error("internal error: no open scope"));
        };
        if scope.iter().any(|(declared, _)| declared == name) {
            return Err(self.error(format!("variable ${name} is already declared")));
        }
        scope.push((name.to_owned(), slot));
        self.next_slot = slot
            .checked_add(1)
            .ok_or_else(|| self.error("too many local variables"))?;
        Ok(slot)
    }

    fn lookup(&self, name: &str) -> Option<u16> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().find(|(declared, _)| declared == name))
            .map(|(_, slot)| *slot)
    }

    fn stmts(&mut self, stmts: &[Stmt]) -> Result<(), CompilationError> {
        for stmt in stmts {
            self.line = stmt.line;
            self.stmt(stmt)?;
        }
        Ok(())
    }

    /// Compile a nested block in its own variable scope.
    fn scoped(&mut self, stmts: &[Stmt]) -> Result<(), CompilationError> {
        self.push_scope();
        let result = self.stmts(stmts);
        self.pop_scope();
        result
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), CompilationError> {
        match &stmt.kind {
            StmtKind::Text(text) => {
                self.emit(Instruction::OutputText(text.clone()));
            }
            StmtKind::Echo(expr) => self.echo(expr)?,
            StmtKind::If {
                branches,
                otherwise,
            } => {
                let mut exits = Vec::new();
                for (cond, body) in branches {
                    self.expr(cond)?;
                    let skip = self.emit(Instruction::JumpIfFalse(0));
                    self.scoped(body)?;
                    self.line = stmt.line;
                    exits.push(self.emit(Instruction::Jump(0)));
                    self.patch(skip);
                }
                self.scoped(otherwise)?;
                for exit in exits {
                    self.patch(exit);
                }
            }
            StmtKind::For {
                key,
                value,
                iterable,
                body,
            } => {
                self.expr(iterable)?;
                self.emit(Instruction::ForPrepare);
                let start = self.here();
                self.push_scope();
                let key = match key {
                    Some(name) => Some((self.declare(name)?, name.clone())),
                    None => None,
                };
                let value = (self.declare(value)?, value.clone());
                let next = self.emit(Instruction::ForNext {
                    key,
                    value,
                    exit: 0,
                });
                let result = self.stmts(body);
                self.pop_scope();
                result?;
                self.line = stmt.line;
                self.emit(Instruction::Jump(start));
                self.patch(next);
                self.emit(Instruction::ForEnd);
            }
            StmtKind::Let { name, value } => {
                self.assigned(value)?;
                self.line = stmt.line;
                let slot = self.declare(name)?;
                self.emit(Instruction::StoreLocal {
                    slot,
                    name: name.clone(),
                });
            }
            StmtKind::Set { name, value } => {
                let Some(slot) = self.lookup(name) else {
                    return Err(self.error(format!(
                        "cannot assign to undeclared variable ${name}, use {{% let %}} to declare it"
                    )));
                };
                self.assigned(value)?;
                self.emit(Instruction::StoreLocal {
                    slot,
                    name: name.clone(),
                });
            }
            StmtKind::Param { name, default } => {
                if self.scopes.len() > 1 {
                    return Err(self.error("{% param %} is only allowed at the top level"));
                }
                let slot = self.declare(name)?;
                self.params.push((name.clone(), slot));
                let skip = self.emit(Instruction::ParamDefault {
                    slot,
                    name: name.clone(),
                    skip: 0,
                });
                self.assigned(default)?;
                self.line = stmt.line;
                self.emit(Instruction::StoreLocal {
                    slot,
                    name: name.clone(),
                });
                self.patch(skip);
            }
            StmtKind::Include { template, args } => self.include(template, args, stmt.line)?,
        }
        Ok(())
    }

    fn echo(&mut self, expr: &Expr) -> Result<(), CompilationError> {
        match expr {
            Expr::Filter { name, subject, args } if name == "raw" && args.is_empty() => {
                self.expr(subject)?;
                self.emit(Instruction::OutputSafe);
            }
            Expr::Filter { name, .. } if name == "escape" || name == "e" => {
                self.expr(expr)?;
                self.emit(Instruction::OutputSafe);
            }
            _ => {
                self.expr(expr)?;
                self.emit(Instruction::Output);
            }
        }
        Ok(())
    }

    fn assigned(&mut self, value: &Assigned) -> Result<(), CompilationError> {
        match value {
            Assigned::Expr(expr) => self.expr(expr),
            Assigned::Block(body) => {
                self.emit(Instruction::StartCapture);
                self.scoped(body)?;
                self.emit(Instruction::EndCapture);
                Ok(())
            }
        }
    }

    fn include(
        &mut self,
        template: &str,
        args: &[IncludeArg],
        line: u32,
    ) -> Result<(), CompilationError> {
        for arg in args {
            self.line = arg.line;
            self.assigned(&arg.value)?;
        }
        self.line = line;
        self.emit(Instruction::Include {
            template: template.to_owned(),
            args: args.iter().map(|arg| arg.name.clone()).collect(),
        });
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), CompilationError> {
        match expr {
            Expr::Literal(value) => {
                self.emit(Instruction::Push(value.clone()));
            }
            Expr::Data(path) => {
                self.emit(Instruction::LoadData(path.clone()));
            }
            Expr::Local(name) => {
                let Some(slot) = self.lookup(name) else {
                    return Err(self.error(format!("referencing undefined variable ${name}")));
                };
                self.emit(Instruction::LoadLocal {
                    slot,
                    name: name.clone(),
                });
            }
            Expr::Attr(object, key) => {
                self.expr(object)?;
                self.emit(Instruction::GetAttr(key.clone()));
            }
            Expr::Index(object, index) => {
                self.expr(object)?;
                self.expr(index)?;
                self.emit(Instruction::GetIndex);
            }
            Expr::Neg(inner) => {
                self.expr(inner)?;
                self.emit(Instruction::Neg);
            }
            Expr::Not(inner) => {
                self.expr(inner)?;
                self.emit(Instruction::Not);
            }
            Expr::Binary(op, left, right) => {
                self.expr(left)?;
                self.expr(right)?;
                self.emit(Instruction::Binary(*op));
            }
            Expr::And(left, right) => {
                self.expr(left)?;
                let jump = self.emit(Instruction::JumpIfFalseOrPop(0));
                self.expr(right)?;
                self.patch(jump);
                self.emit(Instruction::ToBool);
            }
            Expr::Or(left, right) => {
                self.expr(left)?;
                let jump = self.emit(Instruction::JumpIfTrueOrPop(0));
                self.expr(right)?;
                self.patch(jump);
                self.emit(Instruction::ToBool);
            }
            Expr::Filter {
                name,
                subject,
                args,
            } => {
                let Some(func) = self.registry.filter(name) else {
                    return Err(self.error(format!("unknown filter \"{name}\"")));
                };
                self.expr(subject)?;
                for arg in args {
                    self.expr(arg)?;
                }
                self.emit(Instruction::CallFilter {
                    name: name.clone(),
                    func,
                    argc: args.len(),
                });
            }
            Expr::Call { name, args } => {
                let Some(func) = self.registry.function(name) else {
                    return Err(self.error(format!("unknown function \"{name}\"")));
                };
                for arg in args {
                    self.expr(arg)?;
                }
                self.emit(Instruction::CallFunction {
                    name: name.clone(),
                    func,
                    argc: args.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::default();
        for (name, func) in crate::filters::FILTERS {
            registry.add_filter(name, *func);
        }
        for (name, func) in crate::functions::FUNCTIONS {
            registry.add_function(name, *func);
        }
        registry
    }

    fn compile(src: &str) -> Result<Template, CompilationError> {
        compile_source("main.template", src, &registry())
    }

    #[test]
    fn every_program_ends_with_return() {
        let template = compile("").unwrap();
        assert_eq!(template.len(), 1);
        assert!(matches!(template.code.last(), Some(Instruction::Return)));
    }

    #[test]
    fn undefined_local_is_a_compile_error() {
        let err = compile("line one\n{{ $missing }}").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "referencing undefined variable $missing");
    }

    #[test]
    fn set_requires_declaration() {
        let err = compile("{% set $x = 1 %}").unwrap_err();
        assert!(err.message.starts_with("cannot assign to undeclared variable $x"));
    }

    #[test]
    fn redeclaration_in_same_scope() {
        let err = compile("{% let $x = 1 %}{% let $x = 2 %}").unwrap_err();
        assert_eq!(err.message, "variable $x is already declared");
    }

    #[test]
    fn loop_variables_go_out_of_scope() {
        let err = compile("{% for $v in xs %}{% end %}{{ $v }}").unwrap_err();
        assert_eq!(err.message, "referencing undefined variable $v");
    }

    #[test]
    fn unknown_filter_and_function() {
        let err = compile("{{ x|nope }}").unwrap_err();
        assert_eq!(err.message, "unknown filter \"nope\"");
        let err = compile("{{ nope(1) }}").unwrap_err();
        assert_eq!(err.message, "unknown function \"nope\"");
    }

    #[test]
    fn params_are_recorded() {
        let template = compile("{% param $a = 1 %}{% param $b %}x{% end %}").unwrap();
        assert_eq!(template.params().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(template.frame_size, 2);
    }

    #[test]
    fn nested_param_is_rejected() {
        let err = compile("{% if x %}{% param $a = 1 %}{% end %}").unwrap_err();
        assert_eq!(err.message, "{% param %} is only allowed at the top level");
    }

    #[test]
    fn raw_output_skips_escaping() {
        let template = compile("{{ x|raw }}").unwrap();
        assert!(matches!(
            template.code.as_slice(),
            [Instruction::LoadData(_), Instruction::OutputSafe, Instruction::Return]
        ));
    }
}
