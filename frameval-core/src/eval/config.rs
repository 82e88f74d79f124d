//! Evaluation limits
//!
//! Limits are checked by the interpreter on every step.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Maximum operand stack depth
    pub max_stack_depth: usize,

    /// Maximum number of executed instructions per run
    pub max_steps: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_stack_depth: 1024,
            max_steps: 100_000,
        }
    }
}

impl EvalConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
