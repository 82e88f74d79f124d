//! JSON-RPC Protocol definitions
//!
//! Defines the communication protocol between a debugger front end and
//! frameval-server.

use crate::eval::{Fault, InstructionSequence, RuntimeValue};
use crate::frame::FrameSnapshot;
use serde::{Deserialize, Serialize};

/// Request from the front end to frameval-server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Request {
    /// Install (or replace) the frame a session evaluates against
    #[serde(rename = "load_frame")]
    LoadFrame { session: String, frame: FrameSnapshot },

    /// Evaluate a compiled expression in a session
    #[serde(rename = "evaluate")]
    Evaluate {
        session: String,
        program: InstructionSequence,
    },

    /// Cancel the evaluation started by request `id`
    #[serde(rename = "cancel")]
    Cancel { id: u64 },

    /// Current state of a session's frame, including committed stores
    #[serde(rename = "frame")]
    Frame { session: String },

    /// Shutdown the server
    #[serde(rename = "shutdown")]
    Shutdown,
}

/// Response from frameval-server to the front end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    EvalResult {
        value: String,
        value_type: String,
        raw: RuntimeValue,
    },
    Fault { fault: Fault },
    Frame { frame: FrameSnapshot },
    Success { ok: bool },
    Error { error: String },
}

impl Response {
    pub fn success() -> Self {
        Response::Success { ok: true }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error { error: msg.into() }
    }

    pub fn fault(fault: Fault) -> Self {
        Response::Fault { fault }
    }

    pub fn eval_result(value: RuntimeValue) -> Self {
        Response::EvalResult {
            value: value.to_string(),
            value_type: value.type_id().name().to_string(),
            raw: value,
        }
    }
}

/// JSON-RPC message wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage<T> {
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(flatten)]
    pub content: T,
}

impl<T> RpcMessage<T> {
    pub fn new(id: u64, content: T) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalError, Instruction};

    #[test]
    fn test_request_serialize() {
        let req = Request::Evaluate {
            session: "main".to_string(),
            program: InstructionSequence::new(vec![Instruction::local("x", 0)]),
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"method\":\"evaluate\""));
        assert!(json.contains("\"push_local\":\"x\""));
    }

    #[test]
    fn test_request_parse() {
        let line = r#"{"jsonrpc":"2.0","id":7,"method":"cancel","params":{"id":3}}"#;
        let msg: RpcMessage<Request> = serde_json::from_str(line).unwrap();
        assert_eq!(msg.id, Some(7));
        assert!(matches!(msg.content, Request::Cancel { id: 3 }));
    }

    #[test]
    fn test_response_serialize() {
        let resp = Response::eval_result(RuntimeValue::Long(6));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"value\":\"6\""));
        assert!(json.contains("\"value_type\":\"long\""));

        let resp = Response::fault(Fault::new(&EvalError::DivisionByZero, 4));
        let json = serde_json::to_string(&RpcMessage::new(2, resp)).unwrap();
        assert!(json.contains("\"kind\":\"division_by_zero\""));
        assert!(json.contains("\"offset\":4"));
    }
}
