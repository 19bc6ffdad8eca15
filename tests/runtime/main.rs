//! Integration tests for Layer 2: Runtime
//!
//! Tests for sessions and the REPL driving both engines.

mod repl;
mod session;
