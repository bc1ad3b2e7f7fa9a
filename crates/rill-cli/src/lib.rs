#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use rill_engine::{compile, CompileError, PipelineError, RuntimeError, Vm};
use rill_lang::{parse, tokenize, ParseError};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub script: PathBuf,
    pub dump_tokens: bool,
    pub dump_plan: bool,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("cannot read {}: {source}", path.display())]
    Source {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<PipelineError> for RunError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Parse(e) => Self::Parse(e),
            PipelineError::Compile(e) => Self::Compile(e),
            PipelineError::Runtime(e) => Self::Runtime(e),
        }
    }
}

/// One stderr line per failure, prefixed by its category.
#[must_use]
pub fn report(error: &RunError) -> String {
    match error {
        RunError::Parse(e) => {
            format!("Parse error at line {}, column {}: {}", e.line, e.column, e.message)
        }
        RunError::Compile(e) => format!("Compile error: {e}"),
        RunError::Runtime(e) => format!("Runtime error: {e}"),
        RunError::Source { .. } => format!("Error: {error}"),
    }
}

/// Parse command-line arguments. `Ok(None)` means help was requested and
/// printed; the caller should exit successfully.
pub fn parse_args(args: impl Iterator<Item = String>) -> Result<Option<CliArgs>, String> {
    let mut script = None;
    let mut dump_tokens = false;
    let mut dump_plan = false;

    for arg in args {
        match arg.as_str() {
            "--dump-tokens" => dump_tokens = true,
            "--dump-plan" => dump_plan = true,
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown argument: {other}"));
            }
            _ => {
                if script.replace(PathBuf::from(&arg)).is_some() {
                    return Err("expected exactly one script path".to_owned());
                }
            }
        }
    }

    let Some(script) = script else {
        return Err("missing script path (see --help)".to_owned());
    };

    Ok(Some(CliArgs {
        script,
        dump_tokens,
        dump_plan,
    }))
}

pub fn print_help() {
    println!("Usage: rill [options] <script.rill>");
    println!();
    println!("Options:");
    println!("  --dump-tokens   print the token stream before executing");
    println!("  --dump-plan     print the compiled execution plan before executing");
    println!("  -h, --help      show this help");
}

/// Run a script file through the whole pipeline.
pub fn run(args: &CliArgs) -> Result<(), RunError> {
    let source = fs::read_to_string(&args.script).map_err(|source| RunError::Source {
        path: args.script.clone(),
        source,
    })?;

    let tokens = tokenize(&source)?;
    if args.dump_tokens {
        for token in &tokens {
            println!("{}:{}\t{:?}", token.line, token.column, token.kind);
        }
    }

    let program = parse(tokens)?;
    let plan = compile(&program)?;
    if args.dump_plan {
        for op in &plan.operators {
            println!("{op:?}");
        }
    }

    let mut vm = Vm::new();
    vm.execute(&plan)?;
    Ok(())
}
