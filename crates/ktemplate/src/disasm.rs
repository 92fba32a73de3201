//! Human-readable listings of compiled programs.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::bytecode::{Instruction, Template};

pub(crate) fn disassemble(template: &Template, max_width: usize) -> Vec<String> {
    let labels: BTreeMap<usize, usize> = {
        let mut targets: Vec<usize> = template.code.iter().filter_map(Instruction::target).collect();
        targets.sort_unstable();
        targets.dedup();
        targets.into_iter().enumerate().map(|(n, pc)| (pc, n)).collect()
    };
    let label = |pc: usize| labels.get(&pc).map_or_else(|| format!("@{pc}"), |n| format!("L{n}"));

    let mut out = Vec::with_capacity(template.code.len().saturating_add(labels.len()));
    for (pc, instruction) in template.code.iter().enumerate() {
        if labels.contains_key(&pc) {
            out.push(format!("{}:", label(pc)));
        }
        let (name, operands) = describe(instruction, max_width, &label);
        let line = format!("  {name:<max_width$} {operands}");
        out.push(line.trim_end().to_owned());
    }
    if let Some(n) = labels.get(&template.code.len()) {
        out.push(format!("L{n}:"));
    }
    out
}

fn describe(
    instruction: &Instruction,
    width: usize,
    label: &dyn Fn(usize) -> String,
) -> (&'static str, String) {
    let none = String::new;
    match instruction {
        Instruction::OutputText(text) => ("OUTPUT_TEXT", clip(&quote(text), width)),
        Instruction::Output => ("OUTPUT", none()),
        Instruction::OutputSafe => ("OUTPUT_SAFE", none()),
        Instruction::Push(v) => ("PUSH", clip(&literal(v), width)),
        Instruction::LoadData(path) => ("LOAD_DATA", clip(path, width)),
        Instruction::LoadLocal { name, .. } => ("LOAD_LOCAL", format!("${name}")),
        Instruction::StoreLocal { name, .. } => ("STORE_LOCAL", format!("${name}")),
        Instruction::GetAttr(key) => ("GET_ATTR", clip(key, width)),
        Instruction::GetIndex => ("GET_INDEX", none()),
        Instruction::Neg => ("NEG", none()),
        Instruction::Not => ("NOT", none()),
        Instruction::ToBool => ("TO_BOOL", none()),
        Instruction::Binary(op) => (op.mnemonic(), none()),
        Instruction::Jump(t) => ("JUMP", label(*t)),
        Instruction::JumpIfFalse(t) => ("JUMP_FALSY", label(*t)),
        Instruction::JumpIfFalseOrPop(t) => ("JUMP_FALSY_OR_POP", label(*t)),
        Instruction::JumpIfTrueOrPop(t) => ("JUMP_TRUTHY_OR_POP", label(*t)),
        Instruction::CallFilter { name, argc, .. } => ("CALL_FILTER", format!("{name}/{argc}")),
        Instruction::CallFunction { name, argc, .. } => ("CALL_FUNC", format!("{name}/{argc}")),
        Instruction::ForPrepare => ("FOR_PREPARE", none()),
        Instruction::ForNext { key, value, exit } => {
            let vars = match key {
                Some((_, key)) => format!("${key}, ${}", value.1),
                None => format!("${}", value.1),
            };
            ("FOR_NEXT", format!("{vars} {}", label(*exit)))
        }
        Instruction::ForEnd => ("FOR_END", none()),
        Instruction::StartCapture => ("START_CAPTURE", none()),
        Instruction::EndCapture => ("END_CAPTURE", none()),
        Instruction::ParamDefault { name, skip, .. } => {
            ("PARAM_DEFAULT", format!("${name} {}", label(*skip)))
        }
        Instruction::Include { template, args } => {
            let mut operands = quote(template);
            for arg in args {
                operands.push_str(" $");
                operands.push_str(arg);
            }
            ("INCLUDE", clip(&operands, width))
        }
        Instruction::Return => ("RETURN", none()),
    }
}

fn quote(text: &str) -> String {
    Value::String(text.to_owned()).to_string()
}

fn literal(value: &Value) -> String {
    value.to_string()
}

/// Shorten `text` to at most `width` characters, marking the cut with `...`.
fn clip(text: &str, width: usize) -> String {
    if width < 4 || text.chars().count() <= width {
        return text.to_owned();
    }
    let mut clipped: String = text.chars().take(width.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}
