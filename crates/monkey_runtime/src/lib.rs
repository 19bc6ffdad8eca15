//! REPL, session state, and CLI for the Monkey language.
//!
//! This crate provides:
//! - [`Repl`] - Interactive read-eval-print loop
//! - [`Session`] - Compiler and VM state carried between inputs
//! - [`LineEditor`] - Line editing abstraction with a rustyline backend
//!
//! ```
//! use monkey_runtime::{Engine, Session};
//! use monkey_language::Value;
//!
//! let mut session = Session::new(Engine::Vm);
//! session.eval("let double = fn(x) { x * 2 };").unwrap();
//! assert_eq!(session.eval("double(21)").unwrap().value, Value::Int(42));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod editor;
pub mod highlight;
pub mod repl;
pub mod session;

pub use editor::{LineEditor, ReadResult, RustylineEditor, is_complete};
pub use highlight::MonkeyHighlighter;
pub use repl::{Repl, print_error, print_evaluation, print_output};
pub use session::{Engine, Evaluation, Session};
