use rill_lang::{parse, tokenize, ParseError};
use thiserror::Error;

use crate::compiler::{compile, CompileError};
use crate::vm::{RuntimeError, Vm};

/// Any failure along the source-to-output pipeline, keeping its category
/// so callers can report it under the right prefix.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Run a script end to end: tokenize, parse, compile, execute. File paths
/// in the script resolve relative to the process working directory.
pub fn run_source(source: &str) -> Result<(), PipelineError> {
    let tokens = tokenize(source)?;
    let program = parse(tokens)?;
    let plan = compile(&program)?;
    let mut vm = Vm::new();
    vm.execute(&plan)?;
    Ok(())
}
