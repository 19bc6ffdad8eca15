//! Session state for the REPL.
//!
//! A session evaluates one input at a time and carries everything a later
//! input may refer to. With the VM engine that is the compiler's symbol
//! table, the constant pool, and the VM's globals; with the evaluator
//! engine it is the environment.

use std::fmt;
use std::mem;
use std::str::FromStr;

use monkey_foundation::{Error, ErrorKind, Result};
use monkey_language::{
    Builtins, Compiler, Env, Environment, Evaluator, Program, Statement, SymbolTable, Value, Vm,
    VmConfig, parse,
};
use tracing::debug;

use crate::editor::KEYWORDS;

/// Which execution strategy a session uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Engine {
    /// Compile to bytecode and run on the VM.
    #[default]
    Vm,
    /// Walk the AST directly.
    Eval,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vm => f.write_str("vm"),
            Self::Eval => f.write_str("eval"),
        }
    }
}

impl FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vm" => Ok(Self::Vm),
            "eval" => Ok(Self::Eval),
            other => Err(Error::new(ErrorKind::Internal(format!(
                "unknown engine {other:?} (expected vm or eval)"
            )))),
        }
    }
}

/// The outcome of evaluating one input.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Value of the input. `Null` when the input ends in a `let`.
    pub value: Value,
    /// Lines printed by `puts`.
    pub output: Vec<String>,
    /// Bytecode listing, when disassembly is enabled on the VM engine.
    pub disassembly: Option<String>,
}

/// State carried between REPL inputs.
pub struct Session {
    engine: Engine,
    builtins: Builtins,
    config: VmConfig,
    disassemble: bool,
    /// `puts` output of an input that ended in a fatal error.
    unreported: Vec<String>,

    // VM engine
    symbol_table: SymbolTable,
    constants: Vec<Value>,
    globals: Vec<Value>,

    // Evaluator engine
    evaluator: Evaluator,
    env: Env,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Engine::default())
    }
}

impl Session {
    /// Creates a session for the given engine with the standard builtins.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        let builtins = Builtins::standard();
        Self {
            engine,
            symbol_table: Compiler::global_symbols(&builtins),
            constants: Vec::new(),
            globals: Vec::new(),
            evaluator: Evaluator::new(builtins.clone()),
            env: Environment::new(),
            builtins,
            config: VmConfig::default(),
            disassemble: false,
            unreported: Vec::new(),
        }
    }

    /// Builder method to set the VM bounds.
    #[must_use]
    pub fn with_config(mut self, config: VmConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder method to enable disassembly of every compiled input.
    #[must_use]
    pub fn with_disassembly(mut self, disassemble: bool) -> Self {
        self.disassemble = disassemble;
        self
    }

    /// Returns the engine in use.
    #[must_use]
    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Returns whether disassembly is enabled.
    #[must_use]
    pub fn disassembles(&self) -> bool {
        self.disassemble
    }

    /// Flips disassembly on or off, returning the new setting.
    pub fn toggle_disassembly(&mut self) -> bool {
        self.disassemble = !self.disassemble;
        self.disassemble
    }

    /// Returns the VM globals defined so far.
    #[must_use]
    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    /// Takes the lines printed by the last input before it failed.
    ///
    /// A fatal VM error replaces the [`Evaluation`], so whatever `puts`
    /// wrote up to that point is held here until the caller collects it.
    pub fn take_output(&mut self) -> Vec<String> {
        mem::take(&mut self.unreported)
    }

    /// Returns the words worth offering for completion: keywords, builtins,
    /// and every name bound at the top level of this session.
    #[must_use]
    pub fn completions(&self) -> Vec<String> {
        let mut words: Vec<String> = KEYWORDS.iter().map(ToString::to_string).collect();
        match self.engine {
            Engine::Vm => words.extend(self.symbol_table.names().map(String::from)),
            Engine::Eval => {
                words.extend(self.builtins.iter().map(|b| b.name.to_string()));
                words.extend(self.env.borrow().names().map(String::from));
            }
        }
        words.sort();
        words.dedup();
        words
    }

    /// Evaluates one input.
    ///
    /// # Errors
    ///
    /// Returns parse and compile errors, and fatal VM errors. Language-level
    /// errors are returned as [`Value::Error`] in the evaluation. After a
    /// fatal error, [`Session::take_output`] returns what the input printed.
    pub fn eval(&mut self, source: &str) -> Result<Evaluation> {
        self.unreported.clear();
        let program = parse(source)?;
        let ends_in_let = matches!(program.statements.last(), Some(Statement::Let { .. }));

        let mut evaluation = match self.engine {
            Engine::Vm => self.run_vm(&program)?,
            Engine::Eval => {
                let value = self.evaluator.eval(&program, &self.env);
                Evaluation {
                    value,
                    output: self.evaluator.take_output(),
                    disassembly: None,
                }
            }
        };

        if ends_in_let {
            evaluation.value = Value::Null;
        }
        Ok(evaluation)
    }

    fn run_vm(&mut self, program: &Program) -> Result<Evaluation> {
        // Compile against copies so a failed input leaves the session as it was.
        let mut compiler = Compiler::with_state(self.symbol_table.clone(), self.constants.clone());
        compiler.compile(program)?;

        let bytecode = compiler.bytecode();
        let disassembly = self
            .disassemble
            .then(|| bytecode.instructions.to_string());
        (self.symbol_table, self.constants) = compiler.into_state();
        debug!(
            constants = self.constants.len(),
            globals = bytecode.num_globals,
            "session input compiled"
        );

        let mut vm = Vm::with_globals(
            bytecode,
            self.builtins.clone(),
            mem::take(&mut self.globals),
            self.config,
        );
        let result = vm.run();
        let output = vm.take_output();
        let value = vm.last_popped();
        self.globals = vm.into_globals();
        if let Err(error) = result {
            self.unreported = output;
            return Err(error);
        }

        Ok(Evaluation {
            value,
            output,
            disassembly,
        })
    }
}
