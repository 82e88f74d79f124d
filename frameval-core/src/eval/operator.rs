//! Operator semantics
//!
//! Each operator dispatches on its compute type to exactly one typed path:
//! boolean, int, long, float, double or string. A path that has no meaning
//! for an operator (bitwise xor on doubles, subtraction of strings) returns a
//! fixed sentinel so the dispatch table stays total.

use super::context::EvaluationContext;
use super::error::{EvalError, EvalResult};
use super::instruction::{BinaryOp, BinaryOperator, UnaryOp, UnaryOperator};
use super::service::NativeOp;
use super::value::{RuntimeValue, TypeId};

impl BinaryOperator {
    /// Type the operation is carried out in, before conversion to `result`
    pub fn compute_type(&self) -> TypeId {
        if self.op.is_shift() {
            self.left.unary_promotion()
        } else if self.op.is_relational() || self.assign {
            TypeId::binary_promotion(self.left, self.right)
        } else {
            self.result.unary_promotion()
        }
    }

    /// Pop right then left, compute, store back for compound assignment,
    /// push the computed value.
    pub fn execute(&self, ctx: &mut EvaluationContext<'_>) -> EvalResult<()> {
        let right = ctx.pop_value()?;
        let (slot, left) = if self.assign {
            let (reference, current) = ctx.pop_slot()?;
            (Some(reference), current)
        } else {
            (None, ctx.pop_value()?)
        };

        let computed = self.compute(ctx, &left, &right)?;
        let value = if self.op.is_relational() {
            computed
        } else {
            computed.convert_to(self.result)?
        };

        if let Some(reference) = slot {
            ctx.store(&reference, value.clone())?;
        }
        ctx.push_value(value)
    }

    fn compute(
        &self,
        ctx: &mut EvaluationContext<'_>,
        left: &RuntimeValue,
        right: &RuntimeValue,
    ) -> EvalResult<RuntimeValue> {
        let op = self.op;
        match self.compute_type() {
            TypeId::Boolean => Ok(boolean_result(op, left.as_boolean()?, right.as_boolean()?)),
            TypeId::Long => long_result(op, left.as_long()?, right.as_long()?),
            TypeId::Float => Ok(float_result(op, left.as_float()?, right.as_float()?)),
            TypeId::Double => Ok(double_result(op, left.as_double()?, right.as_double()?)),
            TypeId::String => string_result(ctx, op, left, right),
            TypeId::Object | TypeId::Array | TypeId::Void => {
                reference_result(ctx, op, left, right)
            }
            // byte, char, short and int
            _ => int_result(op, left.as_int()?, right.as_int()?),
        }
    }
}

fn boolean_result(op: BinaryOp, l: bool, r: bool) -> RuntimeValue {
    RuntimeValue::Boolean(match op {
        BinaryOp::And | BinaryOp::LogicalAnd => l & r,
        BinaryOp::Or | BinaryOp::LogicalOr => l | r,
        BinaryOp::Xor | BinaryOp::Ne => l ^ r,
        BinaryOp::Eq => l == r,
        _ => false,
    })
}

fn int_result(op: BinaryOp, l: i32, r: i32) -> EvalResult<RuntimeValue> {
    Ok(match op {
        BinaryOp::Add => RuntimeValue::Int(l.wrapping_add(r)),
        BinaryOp::Sub => RuntimeValue::Int(l.wrapping_sub(r)),
        BinaryOp::Mul => RuntimeValue::Int(l.wrapping_mul(r)),
        BinaryOp::Div | BinaryOp::Rem if r == 0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => RuntimeValue::Int(l.wrapping_div(r)),
        BinaryOp::Rem => RuntimeValue::Int(l.wrapping_rem(r)),
        BinaryOp::And => RuntimeValue::Int(l & r),
        BinaryOp::Or => RuntimeValue::Int(l | r),
        BinaryOp::Xor => RuntimeValue::Int(l ^ r),
        // shift distances are masked to the low five bits
        BinaryOp::Shl => RuntimeValue::Int(l.wrapping_shl(r as u32)),
        BinaryOp::Shr => RuntimeValue::Int(l.wrapping_shr(r as u32)),
        BinaryOp::UShr => RuntimeValue::Int((l as u32).wrapping_shr(r as u32) as i32),
        BinaryOp::Lt => RuntimeValue::Boolean(l < r),
        BinaryOp::Le => RuntimeValue::Boolean(l <= r),
        BinaryOp::Gt => RuntimeValue::Boolean(l > r),
        BinaryOp::Ge => RuntimeValue::Boolean(l >= r),
        BinaryOp::Eq => RuntimeValue::Boolean(l == r),
        BinaryOp::Ne => RuntimeValue::Boolean(l != r),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => RuntimeValue::Int(0),
    })
}

fn long_result(op: BinaryOp, l: i64, r: i64) -> EvalResult<RuntimeValue> {
    Ok(match op {
        BinaryOp::Add => RuntimeValue::Long(l.wrapping_add(r)),
        BinaryOp::Sub => RuntimeValue::Long(l.wrapping_sub(r)),
        BinaryOp::Mul => RuntimeValue::Long(l.wrapping_mul(r)),
        BinaryOp::Div | BinaryOp::Rem if r == 0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => RuntimeValue::Long(l.wrapping_div(r)),
        BinaryOp::Rem => RuntimeValue::Long(l.wrapping_rem(r)),
        BinaryOp::And => RuntimeValue::Long(l & r),
        BinaryOp::Or => RuntimeValue::Long(l | r),
        BinaryOp::Xor => RuntimeValue::Long(l ^ r),
        // six bits for long shifts
        BinaryOp::Shl => RuntimeValue::Long(l.wrapping_shl(r as u32)),
        BinaryOp::Shr => RuntimeValue::Long(l.wrapping_shr(r as u32)),
        BinaryOp::UShr => RuntimeValue::Long((l as u64).wrapping_shr(r as u32) as i64),
        BinaryOp::Lt => RuntimeValue::Boolean(l < r),
        BinaryOp::Le => RuntimeValue::Boolean(l <= r),
        BinaryOp::Gt => RuntimeValue::Boolean(l > r),
        BinaryOp::Ge => RuntimeValue::Boolean(l >= r),
        BinaryOp::Eq => RuntimeValue::Boolean(l == r),
        BinaryOp::Ne => RuntimeValue::Boolean(l != r),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => RuntimeValue::Long(0),
    })
}

fn float_result(op: BinaryOp, l: f32, r: f32) -> RuntimeValue {
    match op {
        BinaryOp::Add => RuntimeValue::Float(l + r),
        BinaryOp::Sub => RuntimeValue::Float(l - r),
        BinaryOp::Mul => RuntimeValue::Float(l * r),
        BinaryOp::Div => RuntimeValue::Float(l / r),
        BinaryOp::Rem => RuntimeValue::Float(l % r),
        BinaryOp::Lt => RuntimeValue::Boolean(l < r),
        BinaryOp::Le => RuntimeValue::Boolean(l <= r),
        BinaryOp::Gt => RuntimeValue::Boolean(l > r),
        BinaryOp::Ge => RuntimeValue::Boolean(l >= r),
        BinaryOp::Eq => RuntimeValue::Boolean(l == r),
        BinaryOp::Ne => RuntimeValue::Boolean(l != r),
        // bitwise, shift and conditional operators have no floating form
        _ => RuntimeValue::Float(0.0),
    }
}

fn double_result(op: BinaryOp, l: f64, r: f64) -> RuntimeValue {
    match op {
        BinaryOp::Add => RuntimeValue::Double(l + r),
        BinaryOp::Sub => RuntimeValue::Double(l - r),
        BinaryOp::Mul => RuntimeValue::Double(l * r),
        BinaryOp::Div => RuntimeValue::Double(l / r),
        BinaryOp::Rem => RuntimeValue::Double(l % r),
        BinaryOp::Lt => RuntimeValue::Boolean(l < r),
        BinaryOp::Le => RuntimeValue::Boolean(l <= r),
        BinaryOp::Gt => RuntimeValue::Boolean(l > r),
        BinaryOp::Ge => RuntimeValue::Boolean(l >= r),
        BinaryOp::Eq => RuntimeValue::Boolean(l == r),
        BinaryOp::Ne => RuntimeValue::Boolean(l != r),
        _ => RuntimeValue::Double(0.0),
    }
}

fn string_result(
    ctx: &mut EvaluationContext<'_>,
    op: BinaryOp,
    left: &RuntimeValue,
    right: &RuntimeValue,
) -> EvalResult<RuntimeValue> {
    match op {
        BinaryOp::Add => {
            let mut text = concat_text(ctx, left)?;
            text.push_str(&concat_text(ctx, right)?);
            Ok(RuntimeValue::String(text))
        }
        BinaryOp::Eq | BinaryOp::Ne => reference_result(ctx, op, left, right),
        _ => Ok(RuntimeValue::Null),
    }
}

/// Text of an operand of `+` on strings; objects render inside the target
fn concat_text(ctx: &mut EvaluationContext<'_>, value: &RuntimeValue) -> EvalResult<String> {
    if let Some(text) = value.plain_text() {
        return Ok(text);
    }
    match ctx.invoke_native(&NativeOp::ToString, std::slice::from_ref(value))? {
        RuntimeValue::String(text) => Ok(text),
        RuntimeValue::Null => Ok("null".to_string()),
        other => Err(EvalError::coercion("string", other.type_id().name())),
    }
}

/// Equality on references is answered by the target
fn reference_result(
    ctx: &mut EvaluationContext<'_>,
    op: BinaryOp,
    left: &RuntimeValue,
    right: &RuntimeValue,
) -> EvalResult<RuntimeValue> {
    match op {
        BinaryOp::Eq | BinaryOp::Ne => {
            let operands = [left.clone(), right.clone()];
            let result = ctx.invoke_native(&NativeOp::Binary(op), &operands)?;
            Ok(RuntimeValue::Boolean(result.as_boolean()?))
        }
        _ => Ok(RuntimeValue::Null),
    }
}

impl UnaryOperator {
    pub fn execute(&self, ctx: &mut EvaluationContext<'_>) -> EvalResult<()> {
        if self.op.is_update() {
            return self.execute_update(ctx);
        }
        let operand = ctx.pop_value()?;
        let value = self.compute(&operand)?.convert_to(self.result)?;
        ctx.push_value(value)
    }

    fn compute(&self, operand: &RuntimeValue) -> EvalResult<RuntimeValue> {
        let op = self.op;
        Ok(match self.result.unary_promotion() {
            TypeId::Boolean => RuntimeValue::Boolean(match op {
                UnaryOp::Not => !operand.as_boolean()?,
                _ => false,
            }),
            TypeId::Int => {
                let v = operand.as_int()?;
                RuntimeValue::Int(match op {
                    UnaryOp::Minus => v.wrapping_neg(),
                    UnaryOp::Plus => v,
                    UnaryOp::Complement => !v,
                    _ => 0,
                })
            }
            TypeId::Long => {
                let v = operand.as_long()?;
                RuntimeValue::Long(match op {
                    UnaryOp::Minus => v.wrapping_neg(),
                    UnaryOp::Plus => v,
                    UnaryOp::Complement => !v,
                    _ => 0,
                })
            }
            TypeId::Float => {
                let v = operand.as_float()?;
                RuntimeValue::Float(match op {
                    UnaryOp::Minus => -v,
                    UnaryOp::Plus => v,
                    _ => 0.0,
                })
            }
            TypeId::Double => {
                let v = operand.as_double()?;
                RuntimeValue::Double(match op {
                    UnaryOp::Minus => -v,
                    UnaryOp::Plus => v,
                    _ => 0.0,
                })
            }
            _ => RuntimeValue::Null,
        })
    }

    /// `++`/`--`: store `old ± 1` narrowed to the operand type, push the new
    /// value for prefix forms and the old one for postfix forms.
    fn execute_update(&self, ctx: &mut EvaluationContext<'_>) -> EvalResult<()> {
        let (reference, old) = ctx.pop_slot()?;
        let delta: i64 = match self.op {
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => 1,
            _ => -1,
        };

        let stepped = match self.operand.unary_promotion() {
            TypeId::Int => RuntimeValue::Int(old.as_int()?.wrapping_add(delta as i32)),
            TypeId::Long => RuntimeValue::Long(old.as_long()?.wrapping_add(delta)),
            TypeId::Float => RuntimeValue::Float(old.as_float()? + delta as f32),
            TypeId::Double => RuntimeValue::Double(old.as_double()? + delta as f64),
            other => return Err(EvalError::coercion("numeric", other.name())),
        };
        let updated = stepped.convert_to(self.operand)?;
        ctx.store(&reference, updated.clone())?;

        let pushed = match self.op {
            UnaryOp::PreIncrement | UnaryOp::PreDecrement => updated,
            _ => old,
        };
        ctx.push_value(pushed.convert_to(self.result)?)
    }
}
