//! Operator semantics shared by the VM and the evaluator.
//!
//! Both engines route every prefix, infix, index, and hash-literal operation
//! through here, so they agree on results and on error text. Misuse produces
//! a [`Value::Error`]; an error operand is passed through unchanged.

use std::rc::Rc;

use crate::object::Value;

/// Applies a prefix operator (`!` or `-`).
#[must_use]
pub fn prefix(operator: &str, right: &Value) -> Value {
    match (operator, right) {
        (_, Value::Error(_)) => right.clone(),
        ("!", _) => Value::Bool(!right.is_truthy()),
        ("-", Value::Int(n)) => Value::Int(n.wrapping_neg()),
        _ => Value::error(format!(
            "unknown operator: {operator}{}",
            right.object_type()
        )),
    }
}

/// Applies an infix operator.
///
/// Integers support arithmetic and ordering, strings support `+`, and every
/// pair of values supports `==` and `!=`.
#[must_use]
pub fn infix(operator: &str, left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Error(_), _) => left.clone(),
        (_, Value::Error(_)) => right.clone(),
        (Value::Int(a), Value::Int(b)) => integer_infix(operator, *a, *b),
        (Value::String(a), Value::String(b)) => string_infix(operator, a, b),
        _ if operator == "==" => Value::Bool(left.equals(right)),
        _ if operator == "!=" => Value::Bool(!left.equals(right)),
        _ if left.object_type() != right.object_type() => Value::error(format!(
            "type mismatch: {} {operator} {}",
            left.object_type(),
            right.object_type()
        )),
        _ => unknown_infix(operator, left, right),
    }
}

fn integer_infix(operator: &str, a: i64, b: i64) -> Value {
    match operator {
        "+" => Value::Int(a.wrapping_add(b)),
        "-" => Value::Int(a.wrapping_sub(b)),
        "*" => Value::Int(a.wrapping_mul(b)),
        "/" if b == 0 => Value::error("division by zero"),
        "/" => Value::Int(a.wrapping_div(b)),
        "<" => Value::Bool(a < b),
        ">" => Value::Bool(a > b),
        "==" => Value::Bool(a == b),
        "!=" => Value::Bool(a != b),
        _ => unknown_infix(operator, &Value::Int(a), &Value::Int(b)),
    }
}

fn string_infix(operator: &str, a: &Rc<str>, b: &Rc<str>) -> Value {
    match operator {
        "+" => Value::string(format!("{a}{b}")),
        "==" => Value::Bool(a == b),
        "!=" => Value::Bool(a != b),
        _ => unknown_infix(
            operator,
            &Value::String(Rc::clone(a)),
            &Value::String(Rc::clone(b)),
        ),
    }
}

fn unknown_infix(operator: &str, left: &Value, right: &Value) -> Value {
    Value::error(format!(
        "unknown operator: {} {operator} {}",
        left.object_type(),
        right.object_type()
    ))
}

/// Indexes an array by integer or a hash by key.
///
/// Out-of-range indexes and missing keys yield `null`.
#[must_use]
pub fn index(left: &Value, index: &Value) -> Value {
    match (left, index) {
        (Value::Error(_), _) => left.clone(),
        (_, Value::Error(_)) => index.clone(),
        (Value::Array(elements), Value::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| elements.get(i))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Hash(pairs), key) => match key.hash_key() {
            Some(key) => pairs.get(&key).cloned().unwrap_or(Value::Null),
            None => unusable_as_hash_key(key),
        },
        _ => Value::error(format!(
            "index operator not supported: {}",
            left.object_type()
        )),
    }
}

/// Builds a hash from evaluated key-value pairs.
///
/// Later duplicates of a key replace earlier ones.
#[must_use]
pub fn hash(pairs: impl IntoIterator<Item = (Value, Value)>) -> Value {
    let mut entries = Vec::new();
    for (key, value) in pairs {
        if key.is_error() {
            return key;
        }
        if value.is_error() {
            return value;
        }
        match key.hash_key() {
            Some(hash_key) => entries.push((hash_key, value)),
            None => return unusable_as_hash_key(&key),
        }
    }
    Value::hash(entries)
}

fn unusable_as_hash_key(key: &Value) -> Value {
    Value::error(format!("unusable as hash key: {}", key.object_type()))
}
