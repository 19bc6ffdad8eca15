//! Monkey CLI entry point.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use monkey_foundation::Error;
use monkey_language::VmConfig;
use monkey_runtime::{
    Engine, Evaluation, Repl, Session, print_error, print_evaluation, print_output,
};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "monkey", version, about = "Monkey language compiler, VM, and REPL")]
struct Cli {
    /// Script to run. Starts the REPL when omitted.
    script: Option<PathBuf>,

    /// Evaluate a snippet and print its value
    #[arg(short = 'e', long = "eval", conflicts_with = "script")]
    eval: Option<String>,

    /// Execution engine
    #[arg(long, value_enum, default_value_t = EngineArg::Vm)]
    engine: EngineArg,

    /// Print the bytecode of every compiled input
    #[arg(long)]
    disassemble: bool,

    /// Operand stack slots available to the VM
    #[arg(long, default_value_t = VmConfig::default().stack_size)]
    stack_size: usize,

    /// Maximum call depth of the VM
    #[arg(long, default_value_t = VmConfig::default().max_frames)]
    max_frames: usize,

    /// Log compiler and VM activity to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Skip the REPL welcome banner
    #[arg(long)]
    no_banner: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    /// Bytecode compiler and stack VM
    Vm,
    /// Tree-walking evaluator
    Eval,
}

impl From<EngineArg> for Engine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Vm => Self::Vm,
            EngineArg::Eval => Self::Eval,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Language(#[from] Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(CliError::Language(e)) => {
            print_error(&e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = VmConfig::default()
        .with_stack_size(cli.stack_size)
        .with_max_frames(cli.max_frames);
    let mut session = Session::new(cli.engine.into())
        .with_config(config)
        .with_disassembly(cli.disassemble);

    if let Some(source) = cli.eval {
        let evaluation = evaluate(&mut session, &source)?;
        print_evaluation(&evaluation);
        return Ok(exit_code(&evaluation.value));
    }

    if let Some(path) = cli.script {
        let source = fs::read_to_string(&path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;
        let evaluation = evaluate(&mut session, &source)
            .map_err(|e| e.in_source(&path.display().to_string()))?;
        if let Some(listing) = &evaluation.disassembly {
            print!("{listing}");
        }
        print_output(&evaluation.output);
        if evaluation.value.is_error() {
            eprintln!("{}", evaluation.value);
        }
        return Ok(exit_code(&evaluation.value));
    }

    let mut repl = Repl::new()?.with_session(session);
    if cli.no_banner {
        repl = repl.without_banner();
    }
    repl.run()?;
    Ok(ExitCode::SUCCESS)
}

/// Evaluates `source`, flushing what it printed before a fatal error.
fn evaluate(session: &mut Session, source: &str) -> Result<Evaluation, Error> {
    session.eval(source).inspect_err(|_| print_output(&session.take_output()))
}

/// A program whose final value is an error exits unsuccessfully.
fn exit_code(value: &monkey_language::Value) -> ExitCode {
    if value.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
