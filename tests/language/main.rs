//! Integration tests for Layer 1: Language
//!
//! Tests for the front end, compiler, VM, and evaluator working together.

mod compiler;
mod engines;
mod front_end;
mod vm;
