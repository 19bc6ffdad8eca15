//! Lexer, parser, bytecode compiler, and VM for the Monkey language.
//!
//! This crate provides:
//! - [`Lexer`] - Tokenization of Monkey source
//! - [`Parser`] - Pratt parsing of tokens into an AST
//! - [`Compiler`] - Compiling the AST to bytecode
//! - [`Vm`] - Stack-based bytecode interpreter
//! - [`Evaluator`] - Tree-walking interpreter over the same AST
//!
//! ```
//! use monkey_language::{Value, vm};
//!
//! let value = vm::eval("let add = fn(a, b) { a + b }; add(1, 2)").unwrap();
//! assert_eq!(value, Value::Int(3));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ast;
pub mod builtins;
pub mod code;
pub mod compiler;
pub mod evaluator;
pub mod lexer;
pub mod object;
pub mod operators;
pub mod parser;
pub mod span;
pub mod symbol_table;
pub mod token;
pub mod vm;

pub use ast::{Block, Expression, Ident, Program, Statement};
pub use builtins::Builtins;
pub use code::{Definition, Instructions, Opcode, lookup, make, read_operands};
pub use compiler::{Bytecode, Compiler, compile};
pub use evaluator::{Env, Environment, Evaluator};
pub use lexer::Lexer;
pub use object::{Builtin, BuiltinFn, Closure, CompiledFunction, Function, HashKey, Value};
pub use parser::{Parser, parse};
pub use span::Span;
pub use symbol_table::{Symbol, SymbolScope, SymbolTable};
pub use token::{Token, TokenKind};
pub use vm::{Frame, Vm, VmConfig};
