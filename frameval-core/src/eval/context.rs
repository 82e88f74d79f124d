//! Operand stack and per-run evaluation state

use log::trace;

use super::config::EvalConfig;
use super::error::{EvalError, EvalResult};
use super::service::{NativeOp, Reference, ValueService};
use super::value::RuntimeValue;

/// Stack entry: a plain value, or a slot together with the value fetched
/// from it when it was pushed
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(RuntimeValue),
    Slot {
        reference: Reference,
        value: RuntimeValue,
    },
}

impl Operand {
    pub fn value(&self) -> &RuntimeValue {
        match self {
            Operand::Value(value) | Operand::Slot { value, .. } => value,
        }
    }

    pub fn into_value(self) -> RuntimeValue {
        match self {
            Operand::Value(value) | Operand::Slot { value, .. } => value,
        }
    }
}

/// LIFO operand stack with a depth limit
#[derive(Debug)]
pub struct OperandStack {
    entries: Vec<Operand>,
    max_depth: usize,
}

impl OperandStack {
    pub fn new(max_depth: usize) -> Self {
        OperandStack {
            entries: Vec::new(),
            max_depth,
        }
    }

    pub fn push(&mut self, operand: Operand) -> EvalResult<()> {
        if self.entries.len() >= self.max_depth {
            return Err(EvalError::StackOverflow {
                limit: self.max_depth,
            });
        }
        self.entries.push(operand);
        Ok(())
    }

    pub fn pop(&mut self) -> EvalResult<Operand> {
        self.entries.pop().ok_or(EvalError::StackUnderflow)
    }

    pub fn peek(&self) -> EvalResult<&Operand> {
        self.entries.last().ok_or(EvalError::StackUnderflow)
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from bottom to top
    pub fn entries(&self) -> &[Operand] {
        &self.entries
    }
}

/// Mutable state of one evaluation run.
///
/// The value service stands for the suspended frame and is borrowed for the
/// lifetime of the run only.
pub struct EvaluationContext<'a> {
    stack: OperandStack,
    service: &'a mut dyn ValueService,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(service: &'a mut dyn ValueService, config: &EvalConfig) -> Self {
        Self {
            stack: OperandStack::new(config.max_stack_depth),
            service,
        }
    }

    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    pub fn push_value(&mut self, value: RuntimeValue) -> EvalResult<()> {
        self.stack.push(Operand::Value(value))
    }

    /// Fetch the slot's current value and push both
    pub fn push_slot(&mut self, reference: Reference) -> EvalResult<()> {
        let value = self.fetch(&reference)?;
        self.stack.push(Operand::Slot { reference, value })
    }

    pub fn pop(&mut self) -> EvalResult<Operand> {
        self.stack.pop()
    }

    pub fn pop_value(&mut self) -> EvalResult<RuntimeValue> {
        self.stack.pop().map(Operand::into_value)
    }

    /// Pop an entry that must name a storable location
    pub fn pop_slot(&mut self) -> EvalResult<(Reference, RuntimeValue)> {
        match self.stack.pop()? {
            Operand::Slot { reference, value } => Ok((reference, value)),
            Operand::Value(value) => Err(EvalError::unaddressable(value.to_string())),
        }
    }

    pub fn fetch(&mut self, reference: &Reference) -> EvalResult<RuntimeValue> {
        trace!("fetch {}", reference);
        self.service.fetch(reference)
    }

    pub fn store(&mut self, reference: &Reference, value: RuntimeValue) -> EvalResult<()> {
        trace!("store {} = {}", reference, value);
        self.service.store(reference, value)
    }

    pub fn invoke_native(
        &mut self,
        op: &NativeOp,
        operands: &[RuntimeValue],
    ) -> EvalResult<RuntimeValue> {
        trace!("invoke {:?} with {} operands", op, operands.len());
        self.service.invoke_native(op, operands)
    }
}
