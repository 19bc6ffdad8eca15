//! Error types for the Monkey toolchain.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//!
//! Two families of errors live here and are never conflated:
//!
//! - **Compile-time** errors (parse errors, undefined variables, unknown
//!   operators, malformed literals, exceeded encoding limits). These are
//!   collected and reported before anything executes.
//! - **Fatal** VM errors (unknown opcodes, stack overflow, free-variable
//!   mismatches). These abort a run and indicate a compiler/VM contract
//!   violation rather than a mistake in the user program.
//!
//! Language-level runtime errors (type mismatches, division by zero) are
//! *not* represented here; they are ordinary error values that flow
//! through the VM's operand stack.

use std::fmt;

use thiserror::Error;

use crate::types::ObjectType;

/// The main error type for Monkey operations.
#[derive(Debug, Error)]
#[error("{kind}{}", context_suffix(.context.as_ref()))]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

fn context_suffix(context: Option<&ErrorContext>) -> String {
    match context {
        Some(ctx) if ctx.line.is_some() => format!(" ({ctx})"),
        _ => String::new(),
    }
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Attaches a source position to this error.
    #[must_use]
    pub fn at(self, line: u32, column: u32) -> Self {
        self.with_context(ErrorContext::new().with_position(line as usize, column as usize))
    }

    /// Names the input this error came from, including every collected error.
    #[must_use]
    pub fn in_source(self, source: &str) -> Self {
        let kind = match self.kind {
            ErrorKind::Collected(errors) => ErrorKind::Collected(
                errors.into_iter().map(|e| e.in_source(source)).collect(),
            ),
            other => other,
        };
        Self {
            kind,
            context: Some(self.context.unwrap_or_default().with_source(source)),
        }
    }

    /// Creates an undefined variable error.
    #[must_use]
    pub fn undefined_variable(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UndefinedVariable(name.into()))
    }

    /// Creates an unknown operator error.
    #[must_use]
    pub fn unknown_operator(operator: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownOperator(operator.into()))
    }

    /// Creates an encoding limit error.
    #[must_use]
    pub fn limit_exceeded(what: &'static str, limit: usize) -> Self {
        Self::new(ErrorKind::LimitExceeded { what, limit })
    }

    /// Creates a stack overflow error for the given stack.
    #[must_use]
    pub fn stack_overflow(stack: Overflow) -> Self {
        Self::new(ErrorKind::StackOverflow(stack))
    }

    /// Bundles several collected errors into one.
    ///
    /// A single error is returned unchanged.
    #[must_use]
    pub fn collected(mut errors: Vec<Error>) -> Self {
        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }
        Self::new(ErrorKind::Collected(errors))
    }

    /// Returns the individual errors, flattening a collected error.
    #[must_use]
    pub fn into_errors(self) -> Vec<Error> {
        match self.kind {
            ErrorKind::Collected(errors) => errors,
            _ => vec![self],
        }
    }

    /// Returns true if this error aborted a VM run.
    ///
    /// Fatal errors signal a broken compiler/VM contract, not a user mistake.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UnknownOpcode(_)
                | ErrorKind::StackOverflow(_)
                | ErrorKind::StackUnderflow
                | ErrorKind::FreeVariableMismatch { .. }
                | ErrorKind::NotCallable(_)
                | ErrorKind::ArityMismatch { .. }
                | ErrorKind::MalformedInstruction { .. }
                | ErrorKind::InvalidConstant { .. }
        )
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Syntax error reported by the parser.
    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Line number (1-indexed).
        line: u32,
        /// Column number (1-indexed).
        column: u32,
    },

    /// Identifier could not be resolved in any enclosing scope.
    #[error("undefined variable {0}")]
    UndefinedVariable(String),

    /// Prefix or infix operator the compiler does not know.
    #[error("unknown operator {0}")]
    UnknownOperator(String),

    /// Literal that could not be converted to a value.
    #[error("could not parse {0:?} as integer")]
    MalformedLiteral(String),

    /// A count exceeded what the instruction encoding can express.
    #[error("too many {what} (limit {limit})")]
    LimitExceeded {
        /// What overflowed (constants, locals, arguments...).
        what: &'static str,
        /// The largest encodable value.
        limit: usize,
    },

    /// Several errors collected in a single pass.
    #[error("{}", join_errors(.0))]
    Collected(Vec<Error>),

    /// Opcode byte has no registered definition.
    #[error("opcode {0} undefined")]
    UnknownOpcode(u8),

    /// The operand stack or the frame stack exceeded its bound.
    #[error("stack overflow ({0})")]
    StackOverflow(Overflow),

    /// Attempted to pop from an empty operand stack.
    #[error("stack underflow")]
    StackUnderflow,

    /// Closure creation popped a different number of free variables than
    /// the function declared.
    #[error("free variable mismatch: function declares {expected}, got {actual}")]
    FreeVariableMismatch {
        /// Number of free variables the function was compiled with.
        expected: usize,
        /// Number of free variables supplied by `OpClosure`.
        actual: usize,
    },

    /// `OpCall` found something other than a closure or builtin.
    #[error("calling non-function: {0}")]
    NotCallable(ObjectType),

    /// Closure called with the wrong number of arguments.
    #[error("wrong number of arguments: want={expected}, got={actual}")]
    ArityMismatch {
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// Instruction stream ended in the middle of an instruction's operands.
    #[error("malformed instruction at offset {offset}")]
    MalformedInstruction {
        /// Byte offset of the offending opcode.
        offset: usize,
    },

    /// Constant pool index is missing or holds the wrong kind of value.
    #[error("invalid constant at index {index}")]
    InvalidConstant {
        /// The referenced constant pool index.
        index: usize,
    },

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Which bounded stack overflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// The shared operand stack.
    Operand {
        /// Configured operand stack size.
        limit: usize,
    },
    /// The call-frame stack.
    Frames {
        /// Configured maximum frame depth.
        limit: usize,
    },
}

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operand { limit } => write!(f, "operand stack limit {limit}"),
            Self::Frames { limit } => write!(f, "frame depth limit {limit}"),
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Source file or input name.
    pub source: Option<String>,
    /// Line number in source.
    pub line: Option<usize>,
    /// Column number in source.
    pub column: Option<usize>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            line: None,
            column: None,
        }
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the line and column.
    #[must_use]
    pub fn with_position(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{source}:")?;
        }
        if let (Some(line), Some(col)) = (self.line, self.column) {
            write!(f, "{line}:{col}")?;
        }
        Ok(())
    }
}
