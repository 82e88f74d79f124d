//! frameval Core Library
//!
//! Debugger expression evaluation against suspended frames:
//! - Runtime value model and instruction set
//! - Operator semantics with numeric promotion and compound assignment
//! - Instruction sequence interpreter with cancellation
//! - Frame snapshots usable as an in-memory value service
//! - JSON-RPC protocol types

pub mod eval;
pub mod frame;
pub mod protocol;

pub use eval::{run, EvalError, Fault, Instruction, InstructionSequence, Interpreter, RuntimeValue, ValueService};
pub use frame::{FrameSnapshot, SnapshotService};
pub use protocol::{Request, Response};
