//! Boundary to the suspended target process
//!
//! Every call on a [`ValueService`] is a blocking round-trip to the target.

use serde::{Deserialize, Serialize};

use super::error::EvalResult;
use super::instruction::BinaryOp;
use super::value::{ObjectId, RuntimeValue};

/// Addressable location inside the suspended frame
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
    Local(String),
    This,
    Field { object: ObjectId, name: String },
    StaticField { type_name: String, name: String },
    ArrayElement { array: ObjectId, index: u32 },
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::Local(name) => write!(f, "{}", name),
            Reference::This => write!(f, "this"),
            Reference::Field { object, name } => write!(f, "(id={}).{}", object, name),
            Reference::StaticField { type_name, name } => write!(f, "{}.{}", type_name, name),
            Reference::ArrayElement { array, index } => write!(f, "(id={})[{}]", array, index),
        }
    }
}

/// Operation evaluated inside the target rather than locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeOp {
    /// Operator on non-primitive operands, e.g. reference equality
    Binary(BinaryOp),
    /// Text of a value for string concatenation
    ToString,
    /// Method call; operands are the receiver (unless static) then arguments
    Invoke {
        method: String,
        static_type: Option<String>,
    },
}

/// Remote value access for one suspended frame
pub trait ValueService {
    fn fetch(&mut self, reference: &Reference) -> EvalResult<RuntimeValue>;

    fn store(&mut self, reference: &Reference, value: RuntimeValue) -> EvalResult<()>;

    fn invoke_native(&mut self, op: &NativeOp, operands: &[RuntimeValue]) -> EvalResult<RuntimeValue>;
}
