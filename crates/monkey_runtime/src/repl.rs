//! The interactive read-eval-print loop.

use std::io::{self, Write};

use monkey_foundation::{Error, ErrorKind, Result};
use monkey_language::Value;

use crate::editor::{LineEditor, ReadResult, RustylineEditor, is_complete};
use crate::session::{Evaluation, Session};

const HELP: &str = "\
Commands:
  :help    Show this message
  :dis     Toggle bytecode disassembly of each input
  :quit    Exit (Ctrl+D also works)

Input continues on the next line while brackets are open.";

/// A REPL command, entered with a leading `:`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Quit,
    Help,
    ToggleDisassembly,
    Unknown(String),
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        let name = input.trim().strip_prefix(':')?;
        Some(match name {
            "q" | "quit" | "exit" => Self::Quit,
            "h" | "help" => Self::Help,
            "dis" | "disassemble" => Self::ToggleDisassembly,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// The interactive REPL.
pub struct Repl<E: LineEditor = RustylineEditor> {
    editor: E,
    session: Session,
    show_banner: bool,
    prompt: String,
    continuation_prompt: String,
}

impl Repl<RustylineEditor> {
    /// Creates a REPL with the default rustyline editor.
    ///
    /// # Errors
    ///
    /// Returns an error if the editor fails to initialize.
    pub fn new() -> Result<Self> {
        Ok(Self::with_editor(RustylineEditor::new()?))
    }
}

impl<E: LineEditor> Repl<E> {
    /// Creates a REPL with the given editor and a fresh VM session.
    pub fn with_editor(editor: E) -> Self {
        Self {
            editor,
            session: Session::default(),
            show_banner: true,
            prompt: ">> ".to_string(),
            continuation_prompt: ".. ".to_string(),
        }
    }

    /// Replaces the session.
    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Disables the welcome banner.
    #[must_use]
    pub const fn without_banner(mut self) -> Self {
        self.show_banner = false;
        self
    }

    /// Sets the primary prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Returns the session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session mutably.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Consumes the REPL, returning its editor.
    pub fn into_editor(self) -> E {
        self.editor
    }

    /// Runs the loop until `:quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the editor fails.
    pub fn run(&mut self) -> Result<()> {
        if self.show_banner {
            self.print_banner();
        }
        self.editor.set_completions(self.session.completions());

        while self.read_eval_print()? {}

        println!("\nGoodbye!");
        Ok(())
    }

    /// Executes one iteration. Returns `Ok(false)` to exit.
    fn read_eval_print(&mut self) -> Result<bool> {
        let Some(input) = self.read_input()? else {
            return Ok(false);
        };

        if input.trim().is_empty() {
            return Ok(true);
        }
        self.editor.add_history(&input);

        if let Some(command) = Command::parse(&input) {
            return Ok(self.run_command(&command));
        }

        match self.eval(&input) {
            Ok(evaluation) => print_evaluation(&evaluation),
            Err(e) => {
                print_output(&self.session.take_output());
                print_error(&e);
            }
        }
        self.editor.set_completions(self.session.completions());
        Ok(true)
    }

    /// Reads one complete input, joining lines while brackets are open.
    ///
    /// Returns `None` at end of input.
    fn read_input(&mut self) -> Result<Option<String>> {
        let mut input = match self.editor.read_line(&self.prompt)? {
            ReadResult::Line(line) => line,
            ReadResult::Interrupted => {
                println!();
                return Ok(Some(String::new()));
            }
            ReadResult::Eof => return Ok(None),
        };

        while !is_complete(&input) {
            match self.editor.read_continuation(&self.continuation_prompt)? {
                ReadResult::Line(line) => {
                    input.push('\n');
                    input.push_str(&line);
                }
                ReadResult::Interrupted => {
                    println!("\nInput cancelled.");
                    return Ok(Some(String::new()));
                }
                ReadResult::Eof => {
                    return Err(Error::new(ErrorKind::Internal(
                        "unexpected end of input inside an open bracket".to_string(),
                    )));
                }
            }
        }

        Ok(Some(input))
    }

    /// Runs a command. Returns false when the REPL should exit.
    fn run_command(&mut self, command: &Command) -> bool {
        match command {
            Command::Quit => return false,
            Command::Help => println!("{HELP}"),
            Command::ToggleDisassembly => {
                let on = self.session.toggle_disassembly();
                println!("disassembly {}", if on { "on" } else { "off" });
            }
            Command::Unknown(name) => {
                eprintln!("\x1b[31mUnknown command :{name} (try :help)\x1b[0m");
            }
        }
        true
    }

    /// Evaluates one input in the session.
    ///
    /// # Errors
    ///
    /// Returns parse, compile, and fatal VM errors.
    pub fn eval(&mut self, input: &str) -> Result<Evaluation> {
        self.session.eval(input)
    }

    fn print_banner(&self) {
        println!(
            "\x1b[1;36mMonkey v{}\x1b[0m ({} engine)",
            env!("CARGO_PKG_VERSION"),
            self.session.engine()
        );
        println!("Type :help for commands. Use Ctrl+D to exit.\n");
        let _ = io::stdout().flush();
    }
}

/// Prints disassembly, `puts` output, and the value of an input.
pub fn print_evaluation(evaluation: &Evaluation) {
    if let Some(listing) = &evaluation.disassembly {
        print!("\x1b[2m{listing}\x1b[0m");
    }
    print_output(&evaluation.output);
    match &evaluation.value {
        Value::Null => {}
        Value::Error(_) => println!("\x1b[31m{}\x1b[0m", evaluation.value),
        value => println!("\x1b[1m{value}\x1b[0m"),
    }
}

/// Prints lines written by `puts`.
pub fn print_output(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

/// Prints an error to stderr.
pub fn print_error(error: &Error) {
    eprintln!("\x1b[31mError: {error}\x1b[0m");
}
