//! Monkey: a small dynamically typed language with a bytecode compiler and
//! a stack virtual machine.
//!
//! This crate re-exports all layers for convenient access.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: monkey_runtime    REPL, session state, CLI
//! Layer 1: monkey_language   Lexer, parser, compiler, VM, evaluator
//! Layer 0: monkey_foundation Errors, object type tags, collections
//! ```

pub use monkey_foundation as foundation;
pub use monkey_language as language;
pub use monkey_runtime as runtime;
