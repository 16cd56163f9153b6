//! Property-list helpers over `lexpr` values.
//!
//! Config files and replay frames are plists such as
//! `(:frame-rate 30 :server "10.0.0.2:8080" :mirror-x t)`.  Keywords may
//! arrive as `Value::Keyword("key")` or as `Value::Symbol(":key")`
//! depending on parser options; both are accepted.

use anyhow::Context;
use lexpr::Value;

/// Parse a single s-expression.
pub fn parse(raw: &str) -> anyhow::Result<Value> {
    lexpr::from_str(raw).with_context(|| format!("invalid s-expression: {}", preview(raw)))
}

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(40) {
        Some((i, _)) => format!("{}...", &trimmed[..i]),
        None => trimmed.to_string(),
    }
}

/// Keyword name without the leading colon, if `value` is a keyword.
pub fn keyword_name(value: &Value) -> Option<&str> {
    match value {
        Value::Keyword(k) => Some(k.as_ref()),
        Value::Symbol(s) => s.strip_prefix(':'),
        _ => None,
    }
}

/// All `(key, value)` pairs of a plist, in order.  Stops at the first
/// non-keyword in key position.
pub fn plist_entries(plist: &Value) -> Vec<(&str, &Value)> {
    let mut entries = Vec::new();
    let mut current = plist;
    while let Value::Cons(pair) = current {
        let Some(key) = keyword_name(pair.car()) else {
            break;
        };
        let Value::Cons(next) = pair.cdr() else {
            break;
        };
        entries.push((key, next.car()));
        current = next.cdr();
    }
    entries
}

/// Value stored under `:key`.
pub fn get_value<'a>(plist: &'a Value, key: &str) -> Option<&'a Value> {
    plist_entries(plist)
        .into_iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// True for the plist "false" values: `nil`, `()` and `#f`.
pub fn is_nil(value: &Value) -> bool {
    match value {
        Value::Nil | Value::Null => true,
        Value::Bool(b) => !*b,
        Value::Symbol(s) => s.as_ref() == "nil",
        _ => false,
    }
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// `nil`-like values are false; `t`, `#t` and other symbols are true.
pub fn as_bool(value: &Value) -> Option<bool> {
    if is_nil(value) {
        return Some(false);
    }
    match value {
        Value::Bool(b) => Some(*b),
        Value::Symbol(_) | Value::Keyword(_) => Some(true),
        _ => None,
    }
}

/// Strings, symbols and keywords as text.
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_string()),
        Value::Symbol(s) => Some(s.strip_prefix(':').unwrap_or(s.as_ref()).to_string()),
        Value::Keyword(k) => Some(k.to_string()),
        _ => None,
    }
}

pub fn get_bool(plist: &Value, key: &str) -> Option<bool> {
    get_value(plist, key).and_then(as_bool)
}

/// Top-level elements of a proper list.  `nil` and `()` are empty.
pub fn list_items(value: &Value) -> Option<Vec<&Value>> {
    if is_nil(value) {
        return Some(Vec::new());
    }
    let mut items = Vec::new();
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                items.push(pair.car());
                current = pair.cdr();
            }
            Value::Null | Value::Nil => return Some(items),
            _ => return None,
        }
    }
}

/// Every element of a list as a number; `None` if any is not numeric.
pub fn number_list(value: &Value) -> Option<Vec<f64>> {
    list_items(value)?.into_iter().map(as_f64).collect()
}

/// Escape a string for embedding in a quoted s-expression string.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
