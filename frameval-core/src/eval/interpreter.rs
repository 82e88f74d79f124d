//! Instruction sequence interpreter
//!
//! Runs a compiled expression against one suspended frame. A run moves from
//! `Ready` through `Running` to exactly one terminal state, `Completed` or
//! `Faulted`, and stays there. Stores committed before a fault are not rolled
//! back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};

use super::config::EvalConfig;
use super::context::{EvaluationContext, OperandStack};
use super::error::{EvalError, EvalResult, Fault};
use super::instruction::{Instruction, InstructionKind, InstructionSequence};
use super::service::{NativeOp, Reference, ValueService};
use super::value::RuntimeValue;

/// Cancellation flag shared with the thread that requested the evaluation
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Ready,
    Running,
    Completed(RuntimeValue),
    Faulted(Fault),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed(_) | RunState::Faulted(_))
    }
}

/// Single-use interpreter for one instruction sequence
pub struct Interpreter<'a> {
    sequence: &'a InstructionSequence,
    context: EvaluationContext<'a>,
    config: EvalConfig,
    cancel: CancelToken,
    pc: usize,
    steps: usize,
    state: RunState,
}

impl<'a> Interpreter<'a> {
    pub fn new(sequence: &'a InstructionSequence, service: &'a mut dyn ValueService) -> Self {
        Self::with_config(sequence, service, EvalConfig::default())
    }

    pub fn with_config(
        sequence: &'a InstructionSequence,
        service: &'a mut dyn ValueService,
        config: EvalConfig,
    ) -> Self {
        Self {
            sequence,
            context: EvaluationContext::new(service, &config),
            config,
            cancel: CancelToken::new(),
            pc: 0,
            steps: 0,
            state: RunState::Ready,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn stack(&self) -> &OperandStack {
        self.context.stack()
    }

    /// Index of the next instruction to execute
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Execute one instruction, or finish the run when the program is
    /// exhausted. Has no effect once the run is terminal.
    pub fn step(&mut self) -> &RunState {
        match self.state {
            RunState::Completed(_) | RunState::Faulted(_) => return &self.state,
            RunState::Ready => {
                debug!("evaluating {} instructions", self.sequence.len());
                self.state = RunState::Running;
            }
            RunState::Running => {}
        }

        let offset = self.current_offset();
        if self.cancel.is_cancelled() {
            self.fault(EvalError::Cancelled, offset);
            return &self.state;
        }

        let sequence = self.sequence;
        let Some(instruction) = sequence.get(self.pc) else {
            self.finish();
            return &self.state;
        };

        if self.steps >= self.config.max_steps {
            self.fault(
                EvalError::StepLimitExceeded {
                    limit: self.config.max_steps,
                },
                offset,
            );
            return &self.state;
        }
        self.steps += 1;

        trace!("[{}] {:?}", self.pc, instruction.kind);
        match self.execute(instruction) {
            Ok(next) => self.pc = next,
            Err(err) => self.fault(err, instruction.offset),
        }
        &self.state
    }

    /// Step until the run reaches a terminal state
    pub fn run_to_end(&mut self) -> &RunState {
        while !self.state.is_terminal() {
            self.step();
        }
        &self.state
    }

    /// Run to the end and hand back the outcome, releasing the frame
    pub fn run(mut self) -> Result<RuntimeValue, Fault> {
        self.run_to_end();
        match self.state {
            RunState::Completed(value) => Ok(value),
            RunState::Faulted(fault) => Err(fault),
            RunState::Ready | RunState::Running => unreachable!("run_to_end stops on terminal states"),
        }
    }

    fn current_offset(&self) -> usize {
        self.sequence
            .get(self.pc)
            .or_else(|| self.sequence.iter().last())
            .map(|instruction| instruction.offset)
            .unwrap_or(0)
    }

    fn fault(&mut self, error: EvalError, offset: usize) {
        let fault = Fault::new(&error, offset);
        warn!("evaluation faulted: {}", fault);
        self.state = RunState::Faulted(fault);
    }

    fn finish(&mut self) {
        let depth = self.context.stack().depth();
        if depth != 1 {
            let offset = self.current_offset();
            self.fault(EvalError::UnbalancedStack { depth }, offset);
            return;
        }
        match self.context.pop_value() {
            Ok(value) => {
                debug!("evaluation completed: {}", value);
                self.state = RunState::Completed(value);
            }
            Err(err) => {
                let offset = self.current_offset();
                self.fault(err, offset);
            }
        }
    }

    /// Execute one instruction and return the next program counter
    fn execute(&mut self, instruction: &Instruction) -> EvalResult<usize> {
        let next = self.pc + 1;
        let program_len = self.sequence.len();
        let ctx = &mut self.context;

        match &instruction.kind {
            InstructionKind::PushLiteral(value) => ctx.push_value(value.clone())?,
            InstructionKind::PushLocal(name) => ctx.push_slot(Reference::Local(name.clone()))?,
            InstructionKind::PushThis => {
                let receiver = ctx.fetch(&Reference::This)?;
                ctx.push_value(receiver)?;
            }
            InstructionKind::PushField(name) => match ctx.pop_value()? {
                RuntimeValue::Object { id, .. } => ctx.push_slot(Reference::Field {
                    object: id,
                    name: name.clone(),
                })?,
                RuntimeValue::Null => {
                    return Err(EvalError::NullPointer {
                        context: format!("read of field '{}'", name),
                    })
                }
                other => return Err(EvalError::coercion("object", other.type_id().name())),
            },
            InstructionKind::PushStaticField { type_name, name } => {
                ctx.push_slot(Reference::StaticField {
                    type_name: type_name.clone(),
                    name: name.clone(),
                })?
            }
            InstructionKind::PushArrayElement => {
                let index = ctx.pop_value()?.as_int()?;
                match ctx.pop_value()? {
                    RuntimeValue::Array { id, length, .. } => {
                        if index < 0 || index as u32 >= length {
                            return Err(EvalError::IndexOutOfBounds {
                                index: index as i64,
                                length,
                            });
                        }
                        ctx.push_slot(Reference::ArrayElement {
                            array: id,
                            index: index as u32,
                        })?
                    }
                    RuntimeValue::Null => {
                        return Err(EvalError::NullPointer {
                            context: "array element read".to_string(),
                        })
                    }
                    other => return Err(EvalError::coercion("array", other.type_id().name())),
                }
            }
            InstructionKind::ArrayLength => match ctx.pop_value()? {
                RuntimeValue::Array { length, .. } => {
                    ctx.push_value(RuntimeValue::Int(length as i32))?
                }
                RuntimeValue::Null => {
                    return Err(EvalError::NullPointer {
                        context: "array length".to_string(),
                    })
                }
                other => return Err(EvalError::coercion("array", other.type_id().name())),
            },

            InstructionKind::Binary(operator) => operator.execute(ctx)?,
            InstructionKind::Unary(operator) => operator.execute(ctx)?,

            InstructionKind::Assign { result } => {
                let value = ctx.pop_value()?;
                let (reference, _) = ctx.pop_slot()?;
                let value = value.convert_to(*result)?;
                ctx.store(&reference, value.clone())?;
                ctx.push_value(value)?;
            }
            InstructionKind::Cast { target } => {
                let value = ctx.pop_value()?;
                ctx.push_value(value.convert_to(*target)?)?;
            }
            InstructionKind::Invoke {
                method,
                arg_count,
                static_type,
            } => {
                let receiver_count = usize::from(static_type.is_none());
                let count = arg_count
                    .checked_add(receiver_count)
                    .filter(|count| *count <= ctx.stack().depth())
                    .ok_or(EvalError::StackUnderflow)?;
                let mut operands = Vec::with_capacity(count);
                for _ in 0..count {
                    operands.push(ctx.pop_value()?);
                }
                operands.reverse();
                let op = NativeOp::Invoke {
                    method: method.clone(),
                    static_type: static_type.clone(),
                };
                let result = ctx.invoke_native(&op, &operands)?;
                ctx.push_value(result)?;
            }

            InstructionKind::Jump { target } => return jump_target(*target, program_len),
            InstructionKind::ConditionalJump { jump_on, target } => {
                if ctx.pop_value()?.as_boolean()? == *jump_on {
                    return jump_target(*target, program_len);
                }
            }
            InstructionKind::ShortCircuit { op, target } => {
                let left = ctx.pop_value()?;
                let decided = left.as_boolean()?;
                if decided == op.deciding_value() {
                    ctx.push_value(RuntimeValue::Boolean(decided))?;
                    return jump_target(*target, program_len);
                }
                ctx.push_value(left)?;
            }

            InstructionKind::Pop => {
                ctx.pop()?;
            }
            InstructionKind::Noop => {}
        }

        Ok(next)
    }
}

/// Jumps may land one past the last instruction, which ends the program
fn jump_target(target: usize, length: usize) -> EvalResult<usize> {
    if target > length {
        return Err(EvalError::InvalidJumpTarget { target, length });
    }
    Ok(target)
}

/// Evaluate `sequence` against `service` with default limits
pub fn run(
    sequence: &InstructionSequence,
    service: &mut dyn ValueService,
) -> Result<RuntimeValue, Fault> {
    Interpreter::new(sequence, service).run()
}
