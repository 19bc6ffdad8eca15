//! Core error types, object type tags, and persistent collections for Monkey.
//!
//! This crate provides:
//! - [`Error`] - Compile-time and fatal runtime errors with source context
//! - [`ObjectType`] - The type tag of every runtime value
//! - Persistent collections ([`MonkeyVec`], [`MonkeyMap`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod error;
pub mod types;

pub use collections::{MonkeyMap, MonkeyVec};
pub use error::{Error, ErrorContext, ErrorKind, Overflow};
pub use types::ObjectType;

/// Result type alias using Monkey's error type.
pub type Result<T> = std::result::Result<T, Error>;
