//! Helpers for plain payload values: rendering, equality, ordering.

use std::cmp::Ordering;
use std::fmt::Write as _;

use crouton_protocol::Value;

/// Renders a value the way the wire peers expect `repr` output to look.
#[must_use]
pub fn render_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Nil => out.push_str("None"),
        Value::Boolean(true) => out.push_str("True"),
        Value::Boolean(false) => out.push_str("False"),
        Value::Integer(integer) => {
            let _ = write!(out, "{integer}");
        }
        Value::F32(float) => write_float(out, f64::from(*float)),
        Value::F64(float) => write_float(out, *float),
        Value::String(text) => match text.as_str() {
            Some(text) => write_quoted(out, text),
            None => {
                out.push('b');
                write_bytes(out, text.as_bytes());
            }
        },
        Value::Binary(bytes) => {
            out.push('b');
            write_bytes(out, bytes);
        }
        Value::Array(items) => {
            out.push('[');
            for (position, item) in items.iter().enumerate() {
                if position > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Map(entries) => {
            out.push('{');
            for (position, (key, item)) in entries.iter().enumerate() {
                if position > 0 {
                    out.push_str(", ");
                }
                write_value(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
        Value::Ext(kind, bytes) => {
            let _ = write!(out, "ext({kind}, ");
            out.push('b');
            write_bytes(out, bytes);
            out.push(')');
        }
    }
}

fn write_float(out: &mut String, float: f64) {
    if float.is_nan() {
        out.push_str("nan");
    } else if float.is_infinite() {
        out.push_str(if float > 0.0 { "inf" } else { "-inf" });
    } else if float.fract() == 0.0 && float.abs() < 1e16 {
        let _ = write!(out, "{float:.1}");
    } else {
        let _ = write!(out, "{float}");
    }
}

fn write_quoted(out: &mut String, text: &str) {
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
}

fn write_bytes(out: &mut String, bytes: &[u8]) {
    out.push('\'');
    for byte in bytes {
        match byte {
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(char::from(*byte)),
            other => {
                let _ = write!(out, "\\x{other:02x}");
            }
        }
    }
    out.push('\'');
}

enum Number {
    Int(i128),
    Float(f64),
}

fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Boolean(flag) => Some(Number::Int(i128::from(*flag))),
        Value::Integer(integer) => integer
            .as_i64()
            .map(i128::from)
            .or_else(|| integer.as_u64().map(i128::from))
            .map(Number::Int),
        Value::F32(float) => Some(Number::Float(f64::from(*float))),
        Value::F64(float) => Some(Number::Float(*float)),
        _ => None,
    }
}

// Mixed integer/float comparisons follow float semantics.
fn compare_numbers(left: Number, right: Number) -> Option<Ordering> {
    match (left, right) {
        (Number::Int(left), Number::Int(right)) => Some(left.cmp(&right)),
        (Number::Int(left), Number::Float(right)) => (left as f64).partial_cmp(&right),
        (Number::Float(left), Number::Int(right)) => left.partial_cmp(&(right as f64)),
        (Number::Float(left), Number::Float(right)) => left.partial_cmp(&right),
    }
}

/// Equality with numeric coercion, so `1 == 1.0 == True`.
///
/// Maps compare without regard to entry order.
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(left), Some(right)) = (number(left), number(right)) {
        return compare_numbers(left, right) == Some(Ordering::Equal);
    }
    match (left, right) {
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(left, right)| values_equal(left, right))
        }
        (Value::Map(left), Value::Map(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, item)| {
                    right.iter().any(|(other_key, other_item)| {
                        values_equal(key, other_key) && values_equal(item, other_item)
                    })
                })
        }
        _ => left == right,
    }
}

/// Orders two values when they are comparable: numbers with numbers,
/// strings with strings, blobs with blobs, and sequences lexicographically.
#[must_use]
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(left), Some(right)) = (number(left), number(right)) {
        return compare_numbers(left, right);
    }
    match (left, right) {
        (Value::String(left), Value::String(right)) => Some(left.as_bytes().cmp(right.as_bytes())),
        (Value::Binary(left), Value::Binary(right)) => Some(left.cmp(right)),
        (Value::Array(left), Value::Array(right)) => {
            for (left, right) in left.iter().zip(right) {
                if values_equal(left, right) {
                    continue;
                }
                return compare_values(left, right);
            }
            Some(left.len().cmp(&right.len()))
        }
        _ => None,
    }
}
