//! Expression evaluation module
//!
//! Interprets compiled expression instructions against a suspended frame
//! reached through a [`ValueService`].

pub mod config;
pub mod context;
pub mod error;
pub mod instruction;
pub mod interpreter;
pub mod operator;
pub mod service;
pub mod value;

pub use config::EvalConfig;
pub use context::{EvaluationContext, Operand, OperandStack};
pub use error::{ErrorKind, EvalError, EvalResult, Fault};
pub use instruction::{
    BinaryOp, BinaryOperator, Instruction, InstructionKind, InstructionSequence, LogicalOp,
    UnaryOp, UnaryOperator,
};
pub use interpreter::{run, CancelToken, Interpreter, RunState};
pub use service::{NativeOp, Reference, ValueService};
pub use value::{ObjectId, RuntimeValue, TypeId};
