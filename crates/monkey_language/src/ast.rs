//! Abstract Syntax Tree for the Monkey language.
//!
//! Statements and expressions are closed enums, so the compiler and the
//! evaluator match them exhaustively. Every node carries the [`Span`] of
//! the token that introduced it.
//!
//! `Display` renders a fully parenthesized form (`((-a) * b)`) that makes
//! operator precedence visible in tests.

use std::fmt;

use crate::span::Span;

/// A parsed program: a sequence of top-level statements.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
    /// Top-level statements in source order.
    pub statements: Vec<Statement>,
}

/// An identifier occurrence.
#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    /// The identifier text.
    pub name: String,
    /// Where it appeared.
    pub span: Span,
}

/// A braced sequence of statements.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Statements in source order.
    pub statements: Vec<Statement>,
    /// Span of the opening brace.
    pub span: Span,
}

/// A statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `let <name> = <value>;`
    Let {
        /// The bound name.
        name: Ident,
        /// The bound value.
        value: Expression,
        /// Span of the `let` keyword.
        span: Span,
    },
    /// `return <value>;`
    Return {
        /// The returned value.
        value: Expression,
        /// Span of the `return` keyword.
        span: Span,
    },
    /// An expression evaluated for its value.
    Expression(Expression),
}

/// An expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// Identifier reference.
    Ident(Ident),
    /// Integer literal like `42`.
    Int(i64, Span),
    /// `true` or `false`.
    Bool(bool, Span),
    /// String literal like `"hello"`.
    String(String, Span),
    /// Prefix operator application like `-x` or `!ok`.
    Prefix {
        /// Operator text.
        operator: String,
        /// Operand.
        right: Box<Expression>,
        /// Span of the operator.
        span: Span,
    },
    /// Infix operator application like `a + b`.
    Infix {
        /// Operator text.
        operator: String,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
        /// Span of the operator.
        span: Span,
    },
    /// `if (<condition>) { ... } else { ... }`
    If {
        /// The tested condition.
        condition: Box<Expression>,
        /// Block run when the condition is truthy.
        consequence: Block,
        /// Optional block run otherwise.
        alternative: Option<Block>,
        /// Span of the `if` keyword.
        span: Span,
    },
    /// `fn(<params>) { ... }`
    Function {
        /// Name given by an enclosing `let`, used for self-reference.
        name: Option<String>,
        /// Parameters in declaration order.
        parameters: Vec<Ident>,
        /// Function body.
        body: Block,
        /// Span of the `fn` keyword.
        span: Span,
    },
    /// Call like `add(1, 2)`.
    Call {
        /// The callee.
        function: Box<Expression>,
        /// Arguments in source order.
        arguments: Vec<Expression>,
        /// Span of the opening parenthesis.
        span: Span,
    },
    /// Array literal like `[1, 2, 3]`.
    Array(Vec<Expression>, Span),
    /// Hash literal like `{"a": 1}`.
    Hash(Vec<(Expression, Expression)>, Span),
    /// Index like `arr[0]`.
    Index {
        /// The indexed value.
        left: Box<Expression>,
        /// The index.
        index: Box<Expression>,
        /// Span of the opening bracket.
        span: Span,
    },
}

impl Expression {
    /// Returns the source span of this expression.
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Ident(ident) => ident.span,
            Self::Int(_, s)
            | Self::Bool(_, s)
            | Self::String(_, s)
            | Self::Array(_, s)
            | Self::Hash(_, s)
            | Self::Prefix { span: s, .. }
            | Self::Infix { span: s, .. }
            | Self::If { span: s, .. }
            | Self::Function { span: s, .. }
            | Self::Call { span: s, .. }
            | Self::Index { span: s, .. } => *s,
        }
    }
}

impl Statement {
    /// Returns the source span of this statement.
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Let { span, .. } | Self::Return { span, .. } => *span,
            Self::Expression(expr) => expr.span(),
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{statement}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{statement}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Let { name, value, .. } => write!(f, "let {name} = {value};"),
            Self::Return { value, .. } => write!(f, "return {value};"),
            Self::Expression(expr) => write!(f, "{expr}"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(ident) => write!(f, "{ident}"),
            Self::Int(n, _) => write!(f, "{n}"),
            Self::Bool(b, _) => write!(f, "{b}"),
            Self::String(s, _) => f.write_str(s),
            Self::Prefix {
                operator, right, ..
            } => write!(f, "({operator}{right})"),
            Self::Infix {
                operator,
                left,
                right,
                ..
            } => write!(f, "({left} {operator} {right})"),
            Self::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                write!(f, "if {condition} {consequence}")?;
                if let Some(alt) = alternative {
                    write!(f, " else {alt}")?;
                }
                Ok(())
            }
            Self::Function {
                name,
                parameters,
                body,
                ..
            } => {
                f.write_str("fn")?;
                if let Some(name) = name {
                    write!(f, "<{name}>")?;
                }
                f.write_str("(")?;
                write_joined(f, parameters)?;
                write!(f, ") {body}")
            }
            Self::Call {
                function,
                arguments,
                ..
            } => {
                write!(f, "{function}(")?;
                write_joined(f, arguments)?;
                f.write_str(")")
            }
            Self::Array(elements, _) => {
                f.write_str("[")?;
                write_joined(f, elements)?;
                f.write_str("]")
            }
            Self::Hash(pairs, _) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}:{value}")?;
                }
                f.write_str("}")
            }
            Self::Index { left, index, .. } => write!(f, "({left}[{index}])"),
        }
    }
}
