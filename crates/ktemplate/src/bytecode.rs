//! Compiled template programs.

use serde_json::Value;

use crate::ast::BinaryOp;
use crate::engine::{FilterFn, FunctionFn};

/// One VM instruction. Jump targets are instruction indices.
#[derive(Debug, Clone)]
pub(crate) enum Instruction {
    /// Append constant text to the output.
    OutputText(String),
    /// Pop a value and append it HTML-escaped.
    Output,
    /// Pop a value and append it as is.
    OutputSafe,
    Push(Value),
    LoadData(String),
    LoadLocal {
        slot: u16,
        name: String,
    },
    StoreLocal {
        slot: u16,
        name: String,
    },
    GetAttr(String),
    GetIndex,
    Neg,
    Not,
    ToBool,
    Binary(BinaryOp),
    Jump(usize),
    JumpIfFalse(usize),
    /// Short-circuit `and`: jump keeping the value if falsy, else pop it.
    JumpIfFalseOrPop(usize),
    /// Short-circuit `or`: jump keeping the value if truthy, else pop it.
    JumpIfTrueOrPop(usize),
    CallFilter {
        name: String,
        func: FilterFn,
        argc: usize,
    },
    CallFunction {
        name: String,
        func: FunctionFn,
        argc: usize,
    },
    /// Pop an iterable and start a loop over it.
    ForPrepare,
    /// Bind the next loop item or jump to `exit` when exhausted.
    ForNext {
        key: Option<(u16, String)>,
        value: (u16, String),
        exit: usize,
    },
    ForEnd,
    /// Redirect output into a fresh buffer.
    StartCapture,
    /// Push the captured buffer as a string value.
    EndCapture,
    /// Skip the default value code when the includer supplied the param.
    ParamDefault {
        slot: u16,
        name: String,
        skip: usize,
    },
    Include {
        template: String,
        args: Vec<String>,
    },
    Return,
}

impl Instruction {
    /// Jump target of this instruction, if any.
    pub(crate) const fn target(&self) -> Option<usize> {
        match self {
            Self::Jump(t)
            | Self::JumpIfFalse(t)
            | Self::JumpIfFalseOrPop(t)
            | Self::JumpIfTrueOrPop(t)
            | Self::ForNext { exit: t, .. }
            | Self::ParamDefault { skip: t, .. } => Some(*t),
            _ => None,
        }
    }

    /// Point this instruction's jump target at `to`.
    pub(crate) fn retarget(&mut self, to: usize) {
        match self {
            Self::Jump(t)
            | Self::JumpIfFalse(t)
            | Self::JumpIfFalseOrPop(t)
            | Self::JumpIfTrueOrPop(t)
            | Self::ForNext { exit: t, .. }
            | Self::ParamDefault { skip: t, .. } => *t = to,
            _ => {}
        }
    }
}

/// A compiled template file.
///
/// Obtained from [`Engine::get_template`](crate::Engine::get_template).
/// A template is immutable once compiled; the engine caches it for the
/// rest of its own lifetime.
#[derive(Debug, Clone)]
pub struct Template {
    pub(crate) name: String,
    pub(crate) code: Vec<Instruction>,
    pub(crate) lines: Vec<u32>,
    /// Declared `{% param %}` names and their local slots.
    pub(crate) params: Vec<(String, u16)>,
    pub(crate) frame_size: usize,
}

impl Template {
    /// The name this template was loaded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of compiled instructions (always at least one `RETURN`).
    pub const fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether the program has no instructions.
    pub const fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Names of the declared `{% param %}` variables, in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(name, _)| name.as_str())
    }

    /// Human-readable listing of the program. See
    /// [`Engine::disassemble`](crate::Engine::disassemble).
    pub fn disassemble(&self, max_width: usize) -> Vec<String> {
        crate::disasm::disassemble(self, max_width)
    }

    pub(crate) fn line_at(&self, pc: usize) -> u32 {
        self.lines.get(pc).copied().unwrap_or(0)
    }

    pub(crate) fn param_slot(&self, name: &str) -> Option<u16> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, slot)| *slot)
    }
}
