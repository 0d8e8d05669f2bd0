//! Fatal compile errors.
//!
//! User-facing problems (type mismatches, bad node titles, ...) are never
//! errors: they are collected as [`crate::diagnostics::Diagnostic`]s and the
//! job keeps going. A `CompileError` means the job itself could not finish.

use crate::bytecode::BytecodeError;

#[derive(Debug)]
pub enum CompileError {
    /// The job's cancellation token was triggered.
    Cancelled,
    /// An invariant the earlier passes guarantee did not hold.
    Internal(String),
    /// A configuration or library description could not be read.
    Config(String),
    Bytecode(BytecodeError),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Cancelled => write!(f, "compilation was cancelled"),
            CompileError::Internal(msg) => write!(f, "internal compiler error: {}", msg),
            CompileError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            CompileError::Bytecode(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<BytecodeError> for CompileError {
    fn from(err: BytecodeError) -> Self {
        CompileError::Bytecode(err)
    }
}

pub type CResult<T> = Result<T, CompileError>;

pub fn internal<T>(m: impl Into<String>) -> CResult<T> {
    Err(CompileError::Internal(m.into()))
}
