//! Runtime values shared by the compiler, the VM, and the evaluator.
//!
//! Values are immutable and cheap to clone. Strings, arrays, hashes, and
//! functions are reference counted, so cloning a value never copies its
//! payload. Both engines run on one thread, and the evaluator's closures
//! hold `RefCell` environments, so the counts are `Rc`.

use std::fmt;
use std::rc::Rc;

use monkey_foundation::{MonkeyMap, MonkeyVec, ObjectType};

use crate::ast::{Block, Ident};
use crate::code::Instructions;
use crate::evaluator::Env;

/// A Monkey runtime value.
#[derive(Clone)]
pub enum Value {
    /// The null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// Immutable string.
    String(Rc<str>),
    /// Array of values.
    Array(Rc<MonkeyVec<Value>>),
    /// Hash keyed by integers, booleans, or strings.
    Hash(Rc<MonkeyMap<HashKey, Value>>),
    /// Language-level runtime error carrying its message.
    Error(Rc<str>),
    /// Native builtin function.
    Builtin(Builtin),
    /// Bytecode function from the constant pool.
    CompiledFunction(Rc<CompiledFunction>),
    /// Bytecode function with its captured free variables.
    Closure(Rc<Closure>),
    /// Evaluator function closing over its defining environment.
    Function(Rc<Function>),
    /// Evaluator wrapper unwinding a `return` through enclosing blocks.
    ReturnValue(Box<Value>),
}

/// A value usable as a hash key.
///
/// Only integers, booleans, and strings can key a hash.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashKey {
    /// Integer key.
    Int(i64),
    /// Boolean key.
    Bool(bool),
    /// String key.
    String(Rc<str>),
}

impl HashKey {
    /// Converts the key back into the value it was made from.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::Int(*n),
            Self::Bool(b) => Value::Bool(*b),
            Self::String(s) => Value::String(Rc::clone(s)),
        }
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Native function signature.
///
/// Builtins never fail the host: misuse is reported as a [`Value::Error`].
/// Anything a builtin prints is appended to the output buffer, one entry
/// per line.
pub type BuiltinFn = fn(&[Value], &mut Vec<String>) -> Value;

/// A native builtin function.
#[derive(Clone, Copy)]
pub struct Builtin {
    /// Name the builtin is bound to.
    pub name: &'static str,
    /// Implementation.
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// A function compiled to bytecode.
///
/// Produced once per function literal and immutable afterwards.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct CompiledFunction {
    /// Function body.
    pub instructions: Instructions,
    /// Local slots to reserve, parameters included.
    pub num_locals: usize,
    /// Declared parameter count.
    pub num_parameters: usize,
    /// Free variables `OpClosure` must supply.
    pub num_free: usize,
    /// Name given by an enclosing `let`, if any.
    pub name: Option<String>,
}

/// A compiled function paired with the free variables it captured.
#[derive(Clone, Debug)]
pub struct Closure {
    /// The function being closed over.
    pub function: Rc<CompiledFunction>,
    /// Captured values, in the function's free-symbol order.
    pub free: Vec<Value>,
}

/// A function value in the tree-walking evaluator.
#[derive(Clone)]
pub struct Function {
    /// Parameters in declaration order.
    pub parameters: Vec<Ident>,
    /// Function body.
    pub body: Block,
    /// Environment the literal was evaluated in.
    pub env: Env,
}

impl fmt::Debug for Function {
    // The environment may contain this function, so it is not printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl Value {
    /// Creates a string value.
    #[must_use]
    pub fn string(s: impl AsRef<str>) -> Self {
        Self::String(Rc::from(s.as_ref()))
    }

    /// Creates an error value.
    #[must_use]
    pub fn error(message: impl AsRef<str>) -> Self {
        Self::Error(Rc::from(message.as_ref()))
    }

    /// Creates an array value.
    #[must_use]
    pub fn array(elements: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(Rc::new(elements.into_iter().collect()))
    }

    /// Creates a hash value from key-value pairs.
    #[must_use]
    pub fn hash(pairs: impl IntoIterator<Item = (HashKey, Value)>) -> Self {
        Self::Hash(Rc::new(pairs.into_iter().collect()))
    }

    /// Returns the type tag of this value.
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        match self {
            Self::Null => ObjectType::Null,
            Self::Bool(_) => ObjectType::Boolean,
            Self::Int(_) => ObjectType::Integer,
            Self::String(_) => ObjectType::String,
            Self::Array(_) => ObjectType::Array,
            Self::Hash(_) => ObjectType::Hash,
            Self::Error(_) => ObjectType::Error,
            Self::Builtin(_) => ObjectType::Builtin,
            Self::CompiledFunction(_) => ObjectType::CompiledFunction,
            Self::Closure(_) => ObjectType::Closure,
            Self::Function(_) => ObjectType::Function,
            Self::ReturnValue(_) => ObjectType::ReturnValue,
        }
    }

    /// Returns true if this value is truthy.
    ///
    /// Only `null` and `false` are falsy.
    #[must_use]
    pub const fn is_truthy(&self) -> bool {
        !matches!(self, Self::Null | Self::Bool(false))
    }

    /// Returns true if this value is a runtime error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Converts this value into a hash key, if its type allows it.
    #[must_use]
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Self::Int(n) => Some(HashKey::Int(*n)),
            Self::Bool(b) => Some(HashKey::Bool(*b)),
            Self::String(s) => Some(HashKey::String(Rc::clone(s))),
            _ => None,
        }
    }

    /// Language-level equality used by `==` and `!=`.
    ///
    /// Integers, booleans, null, and strings compare by value; arrays,
    /// hashes, and functions compare by identity.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Hash(a), Self::Hash(b)) => Rc::ptr_eq(a, b),
            (Self::Error(a), Self::Error(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a.name == b.name,
            (Self::CompiledFunction(a), Self::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Self::Closure(a), Self::Closure(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

// Structural equality, used by tests and by constant-pool comparisons.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Hash(a), Self::Hash(b)) => a == b,
            (Self::Error(a), Self::Error(b)) => a == b,
            (Self::CompiledFunction(a), Self::CompiledFunction(b)) => a == b,
            (Self::Closure(a), Self::Closure(b)) => a.function == b.function && a.free == b.free,
            (Self::ReturnValue(a), Self::ReturnValue(b)) => a == b,
            _ => self.equals(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Error(msg) => write!(f, "Error({msg:?})"),
            Self::Array(elements) => f.debug_list().entries(elements.iter()).finish(),
            Self::Hash(pairs) => f.debug_map().entries(pairs.iter()).finish(),
            Self::Builtin(b) => write!(f, "{b:?}"),
            Self::CompiledFunction(func) => write!(f, "{func:?}"),
            Self::Closure(closure) => write!(f, "{closure:?}"),
            Self::Function(func) => write!(f, "{func:?}"),
            Self::ReturnValue(value) => write!(f, "ReturnValue({value:?})"),
            Self::Null | Self::Bool(_) | Self::Int(_) => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Array(elements) => {
                f.write_str("[")?;
                for (i, item) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Hash(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Error(msg) => write!(f, "ERROR: {msg}"),
            Self::Builtin(b) => write!(f, "builtin function {}", b.name),
            Self::CompiledFunction(func) => write!(f, "CompiledFunction[{}]", func.num_parameters),
            Self::Closure(closure) => write!(f, "Closure[{}]", closure.function.num_parameters),
            Self::Function(func) => {
                f.write_str("fn(")?;
                for (i, param) in func.parameters.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") {{\n{}\n}}", func.body)
            }
            Self::ReturnValue(value) => write!(f, "{value}"),
        }
    }
}
