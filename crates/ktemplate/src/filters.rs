//! The standard filter library.
//!
//! Filters are applied as `value|name` or `value|name(args)`. Register
//! all of them on an engine with [`register_all`].

use serde_json::Value;

use crate::engine::{Engine, FilterFn};
use crate::escape::Strategy;
use crate::value::{self, Num};

/// Every standard filter by template-facing name.
pub(crate) const FILTERS: &[(&str, FilterFn)] = &[
    ("length", length),
    ("upper", upper),
    ("lower", lower),
    ("capitalize", capitalize),
    ("trim", trim),
    ("first", first),
    ("last", last),
    ("keys", keys),
    ("join", join),
    ("default", default),
    ("abs", abs),
    ("raw", raw),
    ("escape", escape),
    ("e", escape),
];

/// Register the whole standard filter library on `engine`.
pub fn register_all(engine: &mut Engine) {
    for (name, func) in FILTERS {
        engine.register_filter(name, *func);
    }
}

fn expect_args(args: &[Value], max: usize) -> Result<(), String> {
    if args.len() > max {
        return Err(format!(
            "too many arguments: expected at most {max}, got {}",
            args.len()
        ));
    }
    Ok(())
}

fn text_filter(value: &Value, args: &[Value], f: impl FnOnce(&str) -> String) -> Result<Value, String> {
    expect_args(args, 0)?;
    Ok(Value::String(f(&value::to_output(value))))
}

fn length(value: &Value, args: &[Value]) -> Result<Value, String> {
    expect_args(args, 0)?;
    let len = match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => value::to_output(other).chars().count(),
    };
    Ok(Value::from(len))
}

fn upper(value: &Value, args: &[Value]) -> Result<Value, String> {
    text_filter(value, args, str::to_uppercase)
}

fn lower(value: &Value, args: &[Value]) -> Result<Value, String> {
    text_filter(value, args, str::to_lowercase)
}

fn capitalize(value: &Value, args: &[Value]) -> Result<Value, String> {
    text_filter(value, args, |s| {
        let mut chars = s.chars();
        chars.next().map_or_else(String::new, |head| {
            head.to_uppercase().chain(chars).collect()
        })
    })
}

fn trim(value: &Value, args: &[Value]) -> Result<Value, String> {
    text_filter(value, args, |s| s.trim().to_owned())
}

fn first(value: &Value, args: &[Value]) -> Result<Value, String> {
    expect_args(args, 0)?;
    Ok(match value {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        Value::Object(map) => map.values().next().cloned().unwrap_or(Value::Null),
        Value::String(s) => s
            .chars()
            .next()
            .map_or(Value::Null, |c| Value::String(c.to_string())),
        _ => Value::Null,
    })
}

fn last(value: &Value, args: &[Value]) -> Result<Value, String> {
    expect_args(args, 0)?;
    Ok(match value {
        Value::Array(items) => items.last().cloned().unwrap_or(Value::Null),
        Value::Object(map) => map.values().next_back().cloned().unwrap_or(Value::Null),
        Value::String(s) => s
            .chars()
            .next_back()
            .map_or(Value::Null, |c| Value::String(c.to_string())),
        _ => Value::Null,
    })
}

fn keys(value: &Value, args: &[Value]) -> Result<Value, String> {
    expect_args(args, 0)?;
    Ok(match value {
        Value::Array(items) => Value::Array((0..items.len()).map(Value::from).collect()),
        Value::Object(map) => Value::Array(map.keys().cloned().map(Value::String).collect()),
        _ => Value::Array(Vec::new()),
    })
}

fn join(value: &Value, args: &[Value]) -> Result<Value, String> {
    expect_args(args, 1)?;
    let separator = args.first().map(value::to_output).unwrap_or_default();
    let parts: Vec<String> = match value {
        Value::Array(items) => items.iter().map(value::to_output).collect(),
        Value::Object(map) => map.values().map(value::to_output).collect(),
        other => vec![value::to_output(other)],
    };
    let total = parts
        .iter()
        .map(String::len)
        .chain(std::iter::repeat_n(separator.len(), parts.len().saturating_sub(1)))
        .fold(0usize, usize::saturating_add);
    value::check_len(total)?;
    Ok(Value::String(parts.join(&separator)))
}

fn default(value: &Value, args: &[Value]) -> Result<Value, String> {
    expect_args(args, 1)?;
    let empty = match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        Ok(args.first().cloned().unwrap_or_else(|| Value::String(String::new())))
    } else {
        Ok(value.clone())
    }
}

fn abs(value: &Value, args: &[Value]) -> Result<Value, String> {
    expect_args(args, 0)?;
    Ok(match value::to_num(value)? {
        Num::Int(v) => v
            .checked_abs()
            .map_or_else(|| value::negate(value).unwrap_or(Value::Null), Value::from),
        Num::Float(v) => value::float(v.abs()),
    })
}

fn raw(value: &Value, args: &[Value]) -> Result<Value, String> {
    expect_args(args, 0)?;
    Ok(value.clone())
}

fn escape(value: &Value, args: &[Value]) -> Result<Value, String> {
    expect_args(args, 1)?;
    let strategy = match args.first() {
        None => Strategy::Html,
        Some(name) => {
            let name = value::to_output(name);
            Strategy::from_name(&name)
                .ok_or_else(|| format!("unknown escaping strategy \"{name}\""))?
        }
    };
    Ok(Value::String(strategy.apply(&value::to_output(value))))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn length_of_values() {
        assert_eq!(length(&json!([1, 2, 3]), &[]).unwrap(), json!(3));
        assert_eq!(length(&json!({"a": 1}), &[]).unwrap(), json!(1));
        assert_eq!(length(&json!("héllo"), &[]).unwrap(), json!(5));
        assert_eq!(length(&Value::Null, &[]).unwrap(), json!(0));
    }

    #[test]
    fn string_filters() {
        assert_eq!(capitalize(&json!("alex"), &[]).unwrap(), json!("Alex"));
        assert_eq!(upper(&json!("abc"), &[]).unwrap(), json!("ABC"));
        assert_eq!(trim(&json!("  x "), &[]).unwrap(), json!("x"));
    }

    #[test]
    fn first_last_keys() {
        let langs = json!(["KPHP", "PHP"]);
        assert_eq!(first(&langs, &[]).unwrap(), json!("KPHP"));
        assert_eq!(first(&json!("KPHP"), &[]).unwrap(), json!("K"));
        assert_eq!(last(&langs, &[]).unwrap(), json!("PHP"));
        assert_eq!(keys(&langs, &[]).unwrap(), json!([0, 1]));
    }

    #[test]
    fn join_and_default() {
        assert_eq!(join(&json!([1, "a"]), &[json!(", ")]).unwrap(), json!("1, a"));
        assert_eq!(default(&json!(""), &[json!("x")]).unwrap(), json!("x"));
        assert_eq!(default(&json!(0), &[json!("x")]).unwrap(), json!(0));
    }

    #[test]
    fn join_result_is_bounded() {
        let items = Value::Array((0..3).map(Value::from).collect());
        let separator = json!("-".repeat(crate::MAX_OUTPUT_LEN / 2));
        let err = join(&items, &[separator]).unwrap_err();
        assert!(err.starts_with("string exceeds the limit"));
    }

    #[test]
    fn escape_strategies() {
        assert_eq!(escape(&json!("<b>"), &[]).unwrap(), json!("&lt;b&gt;"));
        assert_eq!(
            escape(&json!("Status: OK"), &[json!("url")]).unwrap(),
            json!("Status%3A%20OK")
        );
        assert!(escape(&json!("x"), &[json!("css")]).is_err());
    }

    #[test]
    fn too_many_arguments() {
        assert!(upper(&json!("a"), &[json!(1)]).is_err());
    }

    #[test]
    fn abs_values() {
        assert_eq!(abs(&json!(-3), &[]).unwrap(), json!(3));
        assert_eq!(abs(&json!(-1.5), &[]).unwrap(), json!(1.5));
    }
}
