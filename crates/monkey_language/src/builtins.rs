//! Builtin function registry.
//!
//! The registry is built once and handed explicitly to the compiler, the VM,
//! and the evaluator. Its order is the `OpGetBuiltin` index space, so the
//! compiler and the VM must be given the same registry.

use std::rc::Rc;

use crate::object::{Builtin, BuiltinFn, Value};

/// An ordered, immutable table of builtin functions.
#[derive(Clone, Debug)]
pub struct Builtins {
    entries: Rc<[Builtin]>,
}

impl Builtins {
    /// Creates a registry from builtins in index order.
    #[must_use]
    pub fn new(entries: Vec<Builtin>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// The standard library: `len`, `puts`, `first`, `last`, `rest`, `push`.
    #[must_use]
    pub fn standard() -> Self {
        let table: [(&'static str, BuiltinFn); 6] = [
            ("len", len),
            ("puts", puts),
            ("first", first),
            ("last", last),
            ("rest", rest),
            ("push", push),
        ];
        Self::new(
            table
                .into_iter()
                .map(|(name, func)| Builtin { name, func })
                .collect(),
        )
    }

    /// Returns the builtin at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Builtin> {
        self.entries.get(index).copied()
    }

    /// Finds a builtin by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Builtin> {
        self.entries.iter().find(|b| b.name == name).copied()
    }

    /// Iterates over builtins in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Builtin> {
        self.entries.iter()
    }

    /// Returns the number of builtins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::standard()
    }
}

fn wrong_arity(got: usize, want: usize) -> Value {
    Value::error(format!("wrong number of arguments. got={got}, want={want}"))
}

fn must_be_array(name: &str, arg: &Value) -> Value {
    Value::error(format!(
        "argument to \"{name}\" must be Array, got {}",
        arg.object_type()
    ))
}

fn count(n: usize) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn len(args: &[Value], _out: &mut Vec<String>) -> Value {
    match args {
        [Value::String(s)] => count(s.len()),
        [Value::Array(elements)] => count(elements.len()),
        [other] => Value::error(format!(
            "argument to \"len\" not supported, got {}",
            other.object_type()
        )),
        _ => wrong_arity(args.len(), 1),
    }
}

fn puts(args: &[Value], out: &mut Vec<String>) -> Value {
    out.extend(args.iter().map(ToString::to_string));
    Value::Null
}

fn first(args: &[Value], _out: &mut Vec<String>) -> Value {
    match args {
        [Value::Array(elements)] => elements.first().cloned().unwrap_or(Value::Null),
        [other] => must_be_array("first", other),
        _ => wrong_arity(args.len(), 1),
    }
}

fn last(args: &[Value], _out: &mut Vec<String>) -> Value {
    match args {
        [Value::Array(elements)] => elements.last().cloned().unwrap_or(Value::Null),
        [other] => must_be_array("last", other),
        _ => wrong_arity(args.len(), 1),
    }
}

fn rest(args: &[Value], _out: &mut Vec<String>) -> Value {
    match args {
        [Value::Array(elements)] => elements
            .rest()
            .map_or(Value::Null, |tail| Value::Array(Rc::new(tail))),
        [other] => must_be_array("rest", other),
        _ => wrong_arity(args.len(), 1),
    }
}

fn push(args: &[Value], _out: &mut Vec<String>) -> Value {
    match args {
        [Value::Array(elements), value] => {
            Value::Array(Rc::new(elements.push_back(value.clone())))
        }
        [other, _] => must_be_array("push", other),
        _ => wrong_arity(args.len(), 2),
    }
}
