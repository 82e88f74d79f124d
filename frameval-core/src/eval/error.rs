//! Evaluation error types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    // Operand errors
    #[error("Cannot use {found} value as {expected}")]
    Coercion { expected: String, found: String },

    #[error("Operand is not an assignable location: {found}")]
    Unaddressable { found: String },

    // Arithmetic errors
    #[error("Division by zero")]
    DivisionByZero,

    // Errors raised by the target
    #[error("Exception in target: {message}")]
    RemoteException { message: String },

    #[error("Null pointer dereference: {context}")]
    NullPointer { context: String },

    #[error("Index out of bounds: index {index}, length {length}")]
    IndexOutOfBounds { index: i64, length: u32 },

    #[error("Connection to target lost: {message}")]
    ConnectionLost { message: String },

    #[error("Evaluation cancelled")]
    Cancelled,

    // Program errors
    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Stack overflow: depth limit {limit} exceeded")]
    StackOverflow { limit: usize },

    #[error("Invalid jump target {target} (program length {length})")]
    InvalidJumpTarget { target: usize, length: usize },

    #[error("Evaluation ended with {depth} values on the stack, expected 1")]
    UnbalancedStack { depth: usize },

    #[error("Step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },
}

impl EvalError {
    pub fn coercion(expected: impl Into<String>, found: impl Into<String>) -> Self {
        EvalError::Coercion {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        EvalError::RemoteException {
            message: message.into(),
        }
    }

    pub fn unaddressable(found: impl Into<String>) -> Self {
        EvalError::Unaddressable {
            found: found.into(),
        }
    }

    pub fn connection_lost(message: impl Into<String>) -> Self {
        EvalError::ConnectionLost {
            message: message.into(),
        }
    }

    /// Caller-facing classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Coercion { .. } => ErrorKind::CoercionFault,
            EvalError::Unaddressable { .. } => ErrorKind::UnaddressableOperand,
            EvalError::DivisionByZero => ErrorKind::DivisionByZero,
            EvalError::RemoteException { .. }
            | EvalError::NullPointer { .. }
            | EvalError::IndexOutOfBounds { .. } => ErrorKind::RemoteEvaluationFault,
            EvalError::ConnectionLost { .. } => ErrorKind::ConnectionLost,
            EvalError::Cancelled => ErrorKind::Cancelled,
            EvalError::StackUnderflow
            | EvalError::StackOverflow { .. }
            | EvalError::InvalidJumpTarget { .. }
            | EvalError::UnbalancedStack { .. }
            | EvalError::StepLimitExceeded { .. } => ErrorKind::MalformedProgram,
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CoercionFault,
    DivisionByZero,
    RemoteEvaluationFault,
    UnaddressableOperand,
    Cancelled,
    ConnectionLost,
    MalformedProgram,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CoercionFault => "CoercionFault",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::RemoteEvaluationFault => "RemoteEvaluationFault",
            ErrorKind::UnaddressableOperand => "UnaddressableOperand",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::ConnectionLost => "ConnectionLost",
            ErrorKind::MalformedProgram => "MalformedProgram",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of an evaluation run, located at the failing instruction
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind} at offset {offset}: {message}")]
pub struct Fault {
    pub kind: ErrorKind,
    pub offset: usize,
    pub message: String,
}

impl Fault {
    pub fn new(error: &EvalError, offset: usize) -> Self {
        Self {
            kind: error.kind(),
            offset,
            message: error.to_string(),
        }
    }
}
