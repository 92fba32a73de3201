//! Value semantics shared by the VM and the standard libraries.
//!
//! Template values are plain [`serde_json::Value`]s. Conversions follow
//! the loose scripting-language conventions template authors expect:
//! `null` prints as nothing, `true` prints as `1`, integer arithmetic
//! overflows into floats, and division of integers that do not divide
//! evenly produces a float.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::{Number, Value};

use crate::ast::BinaryOp;
use crate::MAX_OUTPUT_LEN;

/// A numeric operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    #[allow(clippy::cast_precision_loss)]
    const fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

/// A float value; non-finite results become `null`.
pub(crate) fn float(v: f64) -> Value {
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}

pub(crate) const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// The text a value renders as.
pub(crate) fn to_output(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => "1".to_owned(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) => f.to_string(),
            (None, None, None) => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub(crate) fn to_num(value: &Value) -> Result<Num, String> {
    match value {
        Value::Null => Ok(Num::Int(0)),
        Value::Bool(b) => Ok(Num::Int(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(Num::Int)
            .or_else(|| n.as_f64().map(Num::Float))
            .ok_or_else(|| format!("unsupported number {n}")),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .map(Num::Int)
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(Num::Float))
                .ok_or_else(|| format!("string \"{s}\" is not a number"))
        }
        other => Err(format!("{} is not a number", type_name(other))),
    }
}

pub(crate) fn negate(value: &Value) -> Result<Value, String> {
    Ok(match to_num(value)? {
        Num::Int(v) => v
            .checked_neg()
            .map_or_else(|| float(-Num::Int(v).as_f64()), Value::from),
        Num::Float(v) => float(-v),
    })
}

pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    match op {
        BinaryOp::Concat => concat(&to_output(left), &to_output(right)).map(Value::String),
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::Lt => Ok(Value::Bool(compare(left, right)? == Ordering::Less)),
        BinaryOp::Gt => Ok(Value::Bool(compare(left, right)? == Ordering::Greater)),
        BinaryOp::Le => Ok(Value::Bool(compare(left, right)? != Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(left, right)? != Ordering::Less)),
        BinaryOp::Matches => {
            let pattern = compile_pattern(&to_output(right))?;
            Ok(Value::Bool(pattern.is_match(&to_output(left))))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, to_num(left)?, to_num(right)?)
        }
    }
}

/// Join two strings, refusing results over [`MAX_OUTPUT_LEN`].
pub(crate) fn concat(left: &str, right: &str) -> Result<String, String> {
    check_len(left.len().saturating_add(right.len()))?;
    let mut joined = String::with_capacity(left.len().saturating_add(right.len()));
    joined.push_str(left);
    joined.push_str(right);
    Ok(joined)
}

pub(crate) fn check_len(len: usize) -> Result<(), String> {
    if len > MAX_OUTPUT_LEN {
        return Err(format!("string exceeds the limit of {MAX_OUTPUT_LEN} bytes"));
    }
    Ok(())
}

fn arithmetic(op: BinaryOp, left: Num, right: Num) -> Result<Value, String> {
    if let (Num::Int(a), Num::Int(b)) = (left, right) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => {
                if b == 0 {
                    return Err("division by zero".to_owned());
                }
                a.checked_rem(b)
                    .filter(|rem| *rem == 0)
                    .and_then(|_| a.checked_div(b))
            }
            BinaryOp::Mod => {
                if b == 0 {
                    return Err("modulo by zero".to_owned());
                }
                return Ok(Value::from(a.checked_rem(b).unwrap_or(0)));
            }
            _ => None,
        };
        if let Some(v) = exact {
            return Ok(Value::from(v));
        }
    }

    let (a, b) = (left.as_f64(), right.as_f64());
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err("division by zero".to_owned());
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err("modulo by zero".to_owned());
            }
            a % b
        }
        other => return Err(format!("{} is not an arithmetic operator", other.mnemonic())),
    };
    Ok(float(result))
}

pub(crate) fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => match (to_num(left), to_num(right)) {
            (Ok(Num::Int(a)), Ok(Num::Int(b))) => a == b,
            (Ok(a), Ok(b)) => a.as_f64().partial_cmp(&b.as_f64()) == Some(Ordering::Equal),
            _ => false,
        },
        _ => left == right,
    }
}

pub(crate) fn compare(left: &Value, right: &Value) -> Result<Ordering, String> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    let (a, b) = match (to_num(left), to_num(right)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => {
            return Err(format!(
                "cannot compare {} with {}",
                type_name(left),
                type_name(right)
            ))
        }
    };
    if let (Num::Int(a), Num::Int(b)) = (a, b) {
        return Ok(a.cmp(&b));
    }
    a.as_f64()
        .partial_cmp(&b.as_f64())
        .ok_or_else(|| "cannot compare NaN".to_owned())
}

/// Compile a `matches` pattern. `/body/flags` delimiters are optional.
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, String> {
    let (body, flags) = pattern
        .strip_prefix('/')
        .and_then(|rest| {
            let end = rest.rfind('/')?;
            Some((rest.get(..end)?, rest.get(end.saturating_add(1)..)?))
        })
        .unwrap_or((pattern, ""));

    let mut builder = RegexBuilder::new(body);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            'u' => {}
            other => return Err(format!("unsupported regex flag '{other}'")),
        }
    }
    builder
        .build()
        .map_err(|e| format!("invalid regex {pattern}: {e}"))
}

/// `object.key`: object fields, or array elements by numeric key.
pub(crate) fn get_attr(object: &Value, key: &str) -> Value {
    match object {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|idx| items.get(idx))
            .cloned()
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// `object[key]` with a computed key.
pub(crate) fn get_index(object: &Value, key: &Value) -> Value {
    match (object, key) {
        (Value::Array(items), Value::Number(n)) => n
            .as_u64()
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| items.get(idx))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::String(s), Value::Number(n)) => n
            .as_u64()
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| s.chars().nth(idx))
            .map_or(Value::Null, |c| Value::String(c.to_string())),
        (_, key) => get_attr(object, &to_output(key)),
    }
}

/// Materialize loop items as `(key, value)` pairs.
pub(crate) fn iterate(value: &Value) -> Result<Vec<(Value, Value)>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(idx, item)| (Value::from(idx), item.clone()))
            .collect()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(key, item)| (Value::String(key.clone()), item.clone()))
            .collect()),
        other => Err(format!("cannot iterate over {}", type_name(other))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(binary(BinaryOp::Add, &json!(1), &json!(2)).unwrap(), json!(3));
        assert_eq!(binary(BinaryOp::Div, &json!(4), &json!(2)).unwrap(), json!(2));
        assert_eq!(binary(BinaryOp::Mod, &json!(7), &json!(3)).unwrap(), json!(1));
    }

    #[test]
    fn uneven_division_produces_float() {
        assert_eq!(binary(BinaryOp::Div, &json!(5), &json!(2)).unwrap(), json!(2.5));
    }

    #[test]
    fn overflow_promotes_to_float() {
        let result = binary(BinaryOp::Add, &json!(i64::MAX), &json!(1)).unwrap();
        assert!(result.is_f64());
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(
            binary(BinaryOp::Div, &json!(1), &json!(0)).unwrap_err(),
            "division by zero"
        );
    }

    #[test]
    fn output_formatting() {
        assert_eq!(to_output(&json!(null)), "");
        assert_eq!(to_output(&json!(true)), "1");
        assert_eq!(to_output(&json!(false)), "");
        assert_eq!(to_output(&json!(10.2)), "10.2");
        assert_eq!(to_output(&json!(2.0)), "2");
        assert_eq!(to_output(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!(0.5)));
        assert!(is_truthy(&json!({"a": 1})));
    }

    #[test]
    fn comparisons() {
        assert_eq!(compare(&json!(1), &json!(1.5)).unwrap(), Ordering::Less);
        assert_eq!(compare(&json!("b"), &json!("a")).unwrap(), Ordering::Greater);
        assert!(compare(&json!([]), &json!(1)).is_err());
        assert!(loose_eq(&json!(1), &json!(1.0)));
    }

    #[test]
    fn delimited_patterns() {
        assert!(compile_pattern(r"/\d+/").unwrap().is_match("5293"));
        assert!(compile_pattern("/abc/i").unwrap().is_match("xABCx"));
        assert!(compile_pattern("/a/q").is_err());
    }

    #[test]
    fn attribute_and_index_access() {
        let v = json!({"items": [{"name": "a"}]});
        let items = get_attr(&v, "items");
        assert_eq!(get_index(&items, &json!(0)), json!({"name": "a"}));
        assert_eq!(get_attr(&items, "0"), json!({"name": "a"}));
        assert_eq!(get_attr(&v, "missing"), Value::Null);
    }
}
