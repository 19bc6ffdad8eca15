//! Type tags for runtime values.

use std::fmt;

/// The type tag of a Monkey runtime value.
///
/// The `Display` text is what appears in runtime error messages such as
/// `type mismatch: Integer + String`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// The null value.
    Null,
    /// `true` or `false`.
    Boolean,
    /// 64-bit signed integer.
    Integer,
    /// Immutable string.
    String,
    /// Array of values.
    Array,
    /// Hash from integer, boolean, or string keys to values.
    Hash,
    /// Language-level runtime error.
    Error,
    /// Native builtin function.
    Builtin,
    /// Evaluator function closing over its environment.
    Function,
    /// Bytecode function as stored in the constant pool.
    CompiledFunction,
    /// Bytecode function paired with captured free variables.
    Closure,
    /// Evaluator wrapper that unwinds a `return`.
    ReturnValue,
}

impl ObjectType {
    /// Returns the tag name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean => "Boolean",
            Self::Integer => "Integer",
            Self::String => "String",
            Self::Array => "Array",
            Self::Hash => "Hash",
            Self::Error => "Error",
            Self::Builtin => "Builtin",
            Self::Function => "Function",
            Self::CompiledFunction => "CompiledFunction",
            Self::Closure => "Closure",
            Self::ReturnValue => "ReturnValue",
        }
    }

    /// Returns true if values of this type can key a hash.
    #[must_use]
    pub const fn is_hashable(self) -> bool {
        matches!(self, Self::Integer | Self::Boolean | Self::String)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
