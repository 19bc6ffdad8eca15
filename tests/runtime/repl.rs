//! Integration tests for the REPL
//!
//! Drives the REPL with scripted input and inspects the session it leaves
//! behind.

use monkey_foundation::Result;
use monkey_language::Value;
use monkey_runtime::{Engine, LineEditor, ReadResult, Repl, Session};

const FIB: [&str; 4] = [
    "let fib = fn(n) {",
    "  if (n < 2) { n } else { fib(n - 1) + fib(n - 2) }",
    "};",
    "let answer = fib(10);",
];

/// Replays a fixed script, then reports end of input.
struct Script {
    lines: Vec<String>,
    next: usize,
    prompts: Vec<String>,
}

impl Script {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(ToString::to_string).collect(),
            next: 0,
            prompts: Vec::new(),
        }
    }
}

impl LineEditor for Script {
    fn read_line(&mut self, prompt: &str) -> Result<ReadResult> {
        self.prompts.push(prompt.to_string());
        let line = self.lines.get(self.next).cloned();
        self.next += 1;
        Ok(line.map_or(ReadResult::Eof, ReadResult::Line))
    }

    fn add_history(&mut self, _line: &str) {}

    fn set_completions(&mut self, _words: Vec<String>) {}
}

fn repl(engine: Engine, lines: &[&str]) -> Repl<Script> {
    Repl::with_editor(Script::new(lines))
        .with_session(Session::new(engine))
        .without_banner()
}

#[test]
fn multi_line_definitions_are_evaluated_once_complete() {
    for engine in [Engine::Vm, Engine::Eval] {
        let mut repl = repl(engine, &FIB);
        repl.run().unwrap();
        assert_eq!(
            repl.session_mut().eval("answer").unwrap().value,
            Value::Int(55),
            "{engine}"
        );
    }
}

#[test]
fn continuation_lines_use_the_continuation_prompt() {
    let mut repl = repl(Engine::Vm, &FIB).with_prompt("monkey> ");
    repl.run().unwrap();
    let prompts = repl.into_editor().prompts;
    assert_eq!(prompts, ["monkey> ", ".. ", ".. ", "monkey> ", "monkey> "]);
}

#[test]
fn completions_follow_new_definitions() {
    let mut repl = repl(Engine::Vm, &["let velocity = 3;"]);
    repl.run().unwrap();
    let words = repl.session().completions();
    assert!(words.iter().any(|w| w == "velocity"));
}

#[test]
fn quit_stops_reading() {
    let mut repl = repl(Engine::Eval, &["let a = 1;", ":quit", "let b = 2;"]);
    repl.run().unwrap();
    assert!(repl.session_mut().eval("a").is_ok());
    assert_eq!(
        repl.session_mut().eval("b").unwrap().value,
        Value::error("identifier not found: b")
    );
}
