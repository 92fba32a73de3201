//! Syntax tree produced by the parser and consumed by the compiler.

use serde_json::Value;

/// Binary operators, in no particular precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Matches,
}

impl BinaryOp {
    /// Opcode mnemonic used by the disassembler.
    pub(crate) const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Concat => "CONCAT",
            Self::Eq => "EQ",
            Self::Ne => "NOT_EQ",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::Le => "LT_EQ",
            Self::Ge => "GT_EQ",
            Self::Matches => "MATCHES",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    /// External data addressed by a dotted key path.
    Data(String),
    Local(String),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Filter {
        name: String,
        subject: Box<Expr>,
        args: Vec<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

/// Right-hand side of `let`, `set`, `param` and `arg`: either an
/// expression or a captured block of template output.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Assigned {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IncludeArg {
    pub name: String,
    pub value: Assigned,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StmtKind {
    Text(String),
    Echo(Expr),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Vec<Stmt>,
    },
    For {
        key: Option<String>,
        value: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Let {
        name: String,
        value: Assigned,
    },
    Set {
        name: String,
        value: Assigned,
    },
    Param {
        name: String,
        default: Assigned,
    },
    Include {
        template: String,
        args: Vec<IncludeArg>,
    },
}
