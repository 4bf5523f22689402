//! Runtime errors for check evaluation

use thiserror::Error;

/// Runtime error during evaluation
#[derive(Debug, Clone, Error)]
#[error("Runtime error: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Kinds of runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UndefinedVariable,
    TypeError,
    DivisionByZero,
    /// Integer arithmetic left the i64 range
    Overflow,
    IndexOutOfBounds,
    /// An argument could not be bound to its declared parameter
    BadArgument,
}

impl RuntimeError {
    pub fn undefined_variable(name: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::UndefinedVariable,
            message: format!("undefined variable: {name}"),
        }
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::TypeError,
            message: format!("type error: expected {expected}, got {got}"),
        }
    }

    pub fn division_by_zero() -> Self {
        RuntimeError {
            kind: ErrorKind::DivisionByZero,
            message: "division by zero".to_string(),
        }
    }

    pub fn overflow(op: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::Overflow,
            message: format!("integer overflow in `{op}`"),
        }
    }

    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        RuntimeError {
            kind: ErrorKind::IndexOutOfBounds,
            message: format!("index {index} out of bounds for length {len}"),
        }
    }

    pub fn bad_argument(name: &str, detail: &str) -> Self {
        RuntimeError {
            kind: ErrorKind::BadArgument,
            message: format!("argument `{name}`: {detail}"),
        }
    }
}

/// Result type for evaluator operations
pub type InterpResult<T> = Result<T, RuntimeError>;
