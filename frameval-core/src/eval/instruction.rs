//! Instruction definitions for compiled expressions

use serde::{Deserialize, Serialize};

use super::value::{RuntimeValue, TypeId};

/// Binary operators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    // Arithmetic
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Rem, // %

    // Bitwise (logical on booleans)
    And, // &
    Or,  // |
    Xor, // ^

    // Shifts
    Shl,  // <<
    Shr,  // >>
    UShr, // >>>

    // Relational
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
    Eq, // ==
    Ne, // !=

    // Conditional
    LogicalAnd, // &&
    LogicalOr,  // ||
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }

    /// Relational and equality operators always produce a boolean
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Minus,         // -
    Plus,          // +
    Not,           // !
    Complement,    // ~
    PreIncrement,  // ++x
    PreDecrement,  // --x
    PostIncrement, // x++
    PostDecrement, // x--
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::Complement => "~",
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => "++",
            UnaryOp::PreDecrement | UnaryOp::PostDecrement => "--",
        }
    }

    /// Increment and decrement mutate their operand's slot
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            UnaryOp::PreIncrement
                | UnaryOp::PreDecrement
                | UnaryOp::PostIncrement
                | UnaryOp::PostDecrement
        )
    }
}

/// Conditional operator that may skip its right operand
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    /// Left operand value that decides the result without the right operand
    pub fn deciding_value(&self) -> bool {
        match self {
            LogicalOp::And => false,
            LogicalOp::Or => true,
        }
    }
}

/// Binary operator configuration fixed by the compiler
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinaryOperator {
    pub op: BinaryOp,
    pub result: TypeId,
    pub left: TypeId,
    pub right: TypeId,
    /// Compound assignment (`x op= y`): store the result into the left slot
    #[serde(default)]
    pub assign: bool,
}

impl BinaryOperator {
    pub fn new(op: BinaryOp, result: TypeId, left: TypeId, right: TypeId) -> Self {
        Self {
            op,
            result,
            left,
            right,
            assign: false,
        }
    }

    /// `left op= right`; the result type is the left operand's type
    pub fn compound(op: BinaryOp, left: TypeId, right: TypeId) -> Self {
        Self {
            op,
            result: left,
            left,
            right,
            assign: true,
        }
    }
}

/// Unary operator configuration fixed by the compiler
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnaryOperator {
    pub op: UnaryOp,
    pub result: TypeId,
    pub operand: TypeId,
}

impl UnaryOperator {
    pub fn new(op: UnaryOp, result: TypeId, operand: TypeId) -> Self {
        Self {
            op,
            result,
            operand,
        }
    }
}

/// Instruction variants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// Push a constant: 42, 'c', "text", null
    PushLiteral(RuntimeValue),
    /// Push a local variable slot
    PushLocal(String),
    /// Push the receiver of the suspended frame
    PushThis,
    /// Pop an object, push its field slot
    PushField(String),
    PushStaticField { type_name: String, name: String },
    /// Pop index then array, push the element slot
    PushArrayElement,
    /// Pop an array, push its length
    ArrayLength,

    Binary(BinaryOperator),
    Unary(UnaryOperator),

    /// Pop value then slot, store the converted value, push it
    Assign { result: TypeId },
    Cast { target: TypeId },

    /// Pop `arg_count` arguments and the receiver (absent for static calls),
    /// evaluate the call inside the target
    Invoke {
        method: String,
        arg_count: usize,
        #[serde(default)]
        static_type: Option<String>,
    },

    Jump { target: usize },
    /// Pop a boolean, jump when it equals `jump_on`
    ConditionalJump { jump_on: bool, target: usize },
    /// Inspect the left operand of `&&`/`||`, jump past the right operand
    /// when it already decides the result
    ShortCircuit { op: LogicalOp, target: usize },

    Pop,
    Noop,
}

/// A single instruction with its location in the expression text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    /// Offset into the source expression, reported with faults
    pub offset: usize,
}

impl Instruction {
    pub fn new(kind: InstructionKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    pub fn literal(value: RuntimeValue, offset: usize) -> Self {
        Self::new(InstructionKind::PushLiteral(value), offset)
    }

    pub fn local(name: impl Into<String>, offset: usize) -> Self {
        Self::new(InstructionKind::PushLocal(name.into()), offset)
    }

    pub fn binary(
        op: BinaryOp,
        result: TypeId,
        left: TypeId,
        right: TypeId,
        offset: usize,
    ) -> Self {
        Self::new(
            InstructionKind::Binary(BinaryOperator::new(op, result, left, right)),
            offset,
        )
    }

    pub fn compound(op: BinaryOp, left: TypeId, right: TypeId, offset: usize) -> Self {
        Self::new(
            InstructionKind::Binary(BinaryOperator::compound(op, left, right)),
            offset,
        )
    }

    pub fn unary(op: UnaryOp, result: TypeId, operand: TypeId, offset: usize) -> Self {
        Self::new(
            InstructionKind::Unary(UnaryOperator::new(op, result, operand)),
            offset,
        )
    }
}

/// Compiled expression: instructions in program order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct InstructionSequence {
    instructions: Vec<Instruction>,
}

impl InstructionSequence {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }
}

impl From<Vec<Instruction>> for InstructionSequence {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}
