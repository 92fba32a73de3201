//! The standard function library, called as `name(args)`.

use std::cmp::Ordering;

use serde_json::Value;

use crate::engine::{Engine, FunctionFn};
use crate::value;

/// Upper bound on the number of items `range` may produce.
pub const MAX_RANGE_LEN: usize = 10_000;

pub(crate) const FUNCTIONS: &[(&str, FunctionFn)] = &[
    ("starts_with", starts_with),
    ("ends_with", ends_with),
    ("min", min),
    ("max", max),
    ("range", range),
];

/// Register the whole standard function library on `engine`.
pub fn register_all(engine: &mut Engine) {
    for (name, func) in FUNCTIONS {
        engine.register_function(name, *func);
    }
}

fn two_strings(args: &[Value]) -> Result<(String, String), String> {
    match args {
        [a, b] => Ok((value::to_output(a), value::to_output(b))),
        _ => Err(format!("expected 2 arguments, got {}", args.len())),
    }
}

fn starts_with(args: &[Value]) -> Result<Value, String> {
    let (s, prefix) = two_strings(args)?;
    Ok(Value::Bool(s.starts_with(&prefix)))
}

fn ends_with(args: &[Value]) -> Result<Value, String> {
    let (s, suffix) = two_strings(args)?;
    Ok(Value::Bool(s.ends_with(&suffix)))
}

/// Arguments to `min`/`max`: either the values themselves or one array.
fn candidates(args: &[Value]) -> &[Value] {
    match args {
        [Value::Array(items)] => items,
        _ => args,
    }
}

fn extreme(args: &[Value], keep: Ordering) -> Result<Value, String> {
    let mut items = candidates(args).iter();
    let Some(mut best) = items.next() else {
        return Err("expected at least 1 argument".to_owned());
    };
    for item in items {
        if value::compare(item, best)? == keep {
            best = item;
        }
    }
    Ok(best.clone())
}

fn min(args: &[Value]) -> Result<Value, String> {
    extreme(args, Ordering::Less)
}

fn max(args: &[Value]) -> Result<Value, String> {
    extreme(args, Ordering::Greater)
}

/// `range(end)`, `range(start, end)` or `range(start, end, step)`;
/// `end` is inclusive.
fn range(args: &[Value]) -> Result<Value, String> {
    let int = |v: &Value| -> Result<i64, String> {
        v.as_i64()
            .ok_or_else(|| format!("range expects integers, got {}", value::type_name(v)))
    };
    let (start, end, step) = match args {
        [end] => (0, int(end)?, 1),
        [start, end] => (int(start)?, int(end)?, 1),
        [start, end, step] => (int(start)?, int(end)?, int(step)?),
        _ => return Err(format!("expected 1 to 3 arguments, got {}", args.len())),
    };
    if step == 0 {
        return Err("range step cannot be zero".to_owned());
    }
    let magnitude = step
        .checked_abs()
        .ok_or_else(|| format!("range step {step} is out of bounds"))?;
    let step = if start <= end {
        magnitude
    } else {
        magnitude.wrapping_neg()
    };

    let mut items = Vec::new();
    let mut current = Some(start);
    while let Some(n) = current {
        if (step > 0 && n > end) || (step < 0 && n < end) {
            break;
        }
        if items.len() >= MAX_RANGE_LEN {
            return Err(format!("range is too long (limit is {MAX_RANGE_LEN} items)"));
        }
        items.push(Value::from(n));
        current = n.checked_add(step);
    }
    Ok(Value::Array(items))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefix_and_suffix() {
        assert_eq!(starts_with(&[json!("432"), json!("4")]).unwrap(), json!(true));
        assert_eq!(ends_with(&[json!("432"), json!("4")]).unwrap(), json!(false));
        assert!(starts_with(&[json!("x")]).is_err());
    }

    #[test]
    fn min_max() {
        assert_eq!(min(&[json!(3), json!(1), json!(2)]).unwrap(), json!(1));
        assert_eq!(max(&[json!([3, 7.5, 2])]).unwrap(), json!(7.5));
        assert!(max(&[]).is_err());
    }

    #[test]
    fn ranges() {
        assert_eq!(range(&[json!(3)]).unwrap(), json!([0, 1, 2, 3]));
        assert_eq!(range(&[json!(5), json!(1), json!(2)]).unwrap(), json!([5, 3, 1]));
        assert!(range(&[json!(0), json!(1_000_000)]).is_err());
        assert!(range(&[json!(0), json!(3), json!(0)]).is_err());
    }
}
