//! Evaluation against a scripted value service that records every round-trip

use std::collections::HashMap;

use frameval_core::eval::{
    BinaryOp, CancelToken, ErrorKind, EvalError, EvalResult, Instruction, InstructionKind,
    InstructionSequence, Interpreter, LogicalOp, NativeOp, Reference, RunState, RuntimeValue,
    TypeId, ValueService,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Fetch(Reference),
    Store(Reference, RuntimeValue),
    Invoke(NativeOp),
}

#[derive(Default)]
struct ScriptedService {
    values: HashMap<Reference, RuntimeValue>,
    calls: Vec<Call>,
    disconnected: bool,
    /// Tripped after every store, as a client cancelling mid-run would
    cancel_on_store: Option<CancelToken>,
}

impl ScriptedService {
    fn with(mut self, name: &str, value: RuntimeValue) -> Self {
        self.values.insert(Reference::Local(name.to_string()), value);
        self
    }

    fn stores(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Store(..)))
            .collect()
    }

    fn invokes(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Invoke(_)))
            .count()
    }
}

impl ValueService for ScriptedService {
    fn fetch(&mut self, reference: &Reference) -> EvalResult<RuntimeValue> {
        self.calls.push(Call::Fetch(reference.clone()));
        if self.disconnected {
            return Err(EvalError::connection_lost("target VM disconnected"));
        }
        self.values
            .get(reference)
            .cloned()
            .ok_or_else(|| EvalError::remote(format!("no such variable: {}", reference)))
    }

    fn store(&mut self, reference: &Reference, value: RuntimeValue) -> EvalResult<()> {
        self.calls.push(Call::Store(reference.clone(), value.clone()));
        self.values.insert(reference.clone(), value);
        if let Some(token) = &self.cancel_on_store {
            token.cancel();
        }
        Ok(())
    }

    fn invoke_native(
        &mut self,
        op: &NativeOp,
        _operands: &[RuntimeValue],
    ) -> EvalResult<RuntimeValue> {
        self.calls.push(Call::Invoke(op.clone()));
        Ok(RuntimeValue::Boolean(true))
    }
}

fn static_call(method: &str, offset: usize) -> Instruction {
    Instruction::new(
        InstructionKind::Invoke {
            method: method.to_string(),
            arg_count: 0,
            static_type: Some("Checks".to_string()),
        },
        offset,
    )
}

#[test]
fn test_xor_literals_complete_as_long() {
    let program = InstructionSequence::new(vec![
        Instruction::literal(RuntimeValue::Int(5), 0),
        Instruction::literal(RuntimeValue::Long(3), 4),
        Instruction::binary(BinaryOp::Xor, TypeId::Long, TypeId::Int, TypeId::Long, 2),
    ]);
    let mut service = ScriptedService::default();

    let value = frameval_core::run(&program, &mut service).unwrap();
    assert_eq!(value, RuntimeValue::Long(6));
    assert_eq!(value.type_id(), TypeId::Long);
    assert!(service.calls.is_empty());
}

#[test]
fn test_division_by_zero_faults_at_div_offset() {
    let program = InstructionSequence::new(vec![
        Instruction::literal(RuntimeValue::Int(7), 0),
        Instruction::literal(RuntimeValue::Int(0), 4),
        Instruction::binary(BinaryOp::Div, TypeId::Int, TypeId::Int, TypeId::Int, 2),
    ]);
    let mut service = ScriptedService::default();

    let fault = frameval_core::run(&program, &mut service).unwrap_err();
    assert_eq!(fault.kind, ErrorKind::DivisionByZero);
    assert_eq!(fault.offset, 2);
}

#[test]
fn test_short_circuit_skips_remote_call() {
    // false && Checks.expensive()
    let program = InstructionSequence::new(vec![
        Instruction::literal(RuntimeValue::Boolean(false), 0),
        Instruction::new(
            InstructionKind::ShortCircuit {
                op: LogicalOp::And,
                target: 4,
            },
            6,
        ),
        static_call("expensive", 9),
        Instruction::binary(
            BinaryOp::LogicalAnd,
            TypeId::Boolean,
            TypeId::Boolean,
            TypeId::Boolean,
            6,
        ),
    ]);
    let mut service = ScriptedService::default();

    let value = frameval_core::run(&program, &mut service).unwrap();
    assert_eq!(value, RuntimeValue::Boolean(false));
    assert!(service.calls.is_empty());

    // true && Checks.expensive() evaluates the right operand exactly once
    let mut program: Vec<Instruction> = program.iter().cloned().collect();
    program[0] = Instruction::literal(RuntimeValue::Boolean(true), 0);
    let program = InstructionSequence::new(program);
    let mut service = ScriptedService::default();

    let value = frameval_core::run(&program, &mut service).unwrap();
    assert_eq!(value, RuntimeValue::Boolean(true));
    assert_eq!(service.invokes(), 1);
}

#[test]
fn test_compound_xor_stores_once() {
    // x ^= y
    let program = InstructionSequence::new(vec![
        Instruction::local("x", 0),
        Instruction::local("y", 5),
        Instruction::compound(BinaryOp::Xor, TypeId::Int, TypeId::Int, 2),
    ]);
    let mut service = ScriptedService::default()
        .with("x", RuntimeValue::Int(12))
        .with("y", RuntimeValue::Int(10));

    let value = frameval_core::run(&program, &mut service).unwrap();
    assert_eq!(value, RuntimeValue::Int(6));
    assert_eq!(
        service.stores(),
        vec![&Call::Store(
            Reference::Local("x".to_string()),
            RuntimeValue::Int(6)
        )]
    );
    // target read before the right operand, store last
    assert_eq!(
        service.calls.first(),
        Some(&Call::Fetch(Reference::Local("x".to_string())))
    );
    assert!(matches!(service.calls.last(), Some(Call::Store(..))));
}

#[test]
fn test_fault_keeps_committed_stores() {
    // x = 7, 1 / 0
    let program = InstructionSequence::new(vec![
        Instruction::local("x", 0),
        Instruction::literal(RuntimeValue::Int(7), 4),
        Instruction::new(InstructionKind::Assign { result: TypeId::Int }, 2),
        Instruction::new(InstructionKind::Pop, 5),
        Instruction::literal(RuntimeValue::Int(1), 7),
        Instruction::literal(RuntimeValue::Int(0), 11),
        Instruction::binary(BinaryOp::Div, TypeId::Int, TypeId::Int, TypeId::Int, 9),
    ]);
    let mut service = ScriptedService::default().with("x", RuntimeValue::Int(1));

    {
        let mut interpreter = Interpreter::new(&program, &mut service);
        match interpreter.run_to_end() {
            RunState::Faulted(fault) => {
                assert_eq!(fault.kind, ErrorKind::DivisionByZero);
                assert_eq!(fault.offset, 9);
            }
            other => panic!("Expected fault, got {:?}", other),
        }
        // stopped on the failing instruction, operands consumed
        assert_eq!(interpreter.pc(), 6);
        assert!(interpreter.stack().is_empty());
    }

    assert_eq!(
        service.values.get(&Reference::Local("x".to_string())),
        Some(&RuntimeValue::Int(7))
    );
}

#[test]
fn test_rerun_is_deterministic() {
    let program = InstructionSequence::new(vec![
        Instruction::local("a", 0),
        Instruction::local("b", 4),
        Instruction::binary(BinaryOp::Add, TypeId::Long, TypeId::Int, TypeId::Long, 2),
        Instruction::literal(RuntimeValue::Int(3), 8),
        Instruction::binary(BinaryOp::Shl, TypeId::Long, TypeId::Long, TypeId::Int, 6),
    ]);
    let service = || {
        ScriptedService::default()
            .with("a", RuntimeValue::Int(i32::MAX))
            .with("b", RuntimeValue::Long(1))
    };

    let mut first = service();
    let mut second = service();
    let a = frameval_core::run(&program, &mut first).unwrap();
    let b = frameval_core::run(&program, &mut second).unwrap();

    assert_eq!(a, RuntimeValue::Long((i32::MAX as i64 + 1) << 3));
    assert_eq!(a, b);
    assert_eq!(first.calls, second.calls);
}

#[test]
fn test_connection_lost_faults_at_fetch() {
    let program = InstructionSequence::new(vec![
        Instruction::literal(RuntimeValue::Int(1), 0),
        Instruction::local("x", 4),
        Instruction::binary(BinaryOp::Add, TypeId::Int, TypeId::Int, TypeId::Int, 2),
    ]);
    let mut service = ScriptedService {
        disconnected: true,
        ..Default::default()
    };

    let fault = frameval_core::run(&program, &mut service).unwrap_err();
    assert_eq!(fault.kind, ErrorKind::ConnectionLost);
    assert_eq!(fault.offset, 4);
    assert!(fault.message.contains("disconnected"));
}

#[test]
fn test_cancelled_before_start_makes_no_calls() {
    let program = InstructionSequence::new(vec![Instruction::local("x", 0)]);
    let mut service = ScriptedService::default().with("x", RuntimeValue::Int(1));
    let token = CancelToken::new();
    token.cancel();

    let fault = Interpreter::new(&program, &mut service)
        .with_cancel_token(token)
        .run()
        .unwrap_err();
    assert_eq!(fault.kind, ErrorKind::Cancelled);
    assert!(service.calls.is_empty());
}

#[test]
fn test_cancel_between_steps_keeps_earlier_stores() {
    // x = 7, y + 1
    let program = InstructionSequence::new(vec![
        Instruction::local("x", 0),
        Instruction::literal(RuntimeValue::Int(7), 4),
        Instruction::new(InstructionKind::Assign { result: TypeId::Int }, 2),
        Instruction::new(InstructionKind::Pop, 5),
        Instruction::local("y", 7),
        Instruction::literal(RuntimeValue::Int(1), 11),
        Instruction::binary(BinaryOp::Add, TypeId::Int, TypeId::Int, TypeId::Int, 9),
    ]);
    let token = CancelToken::new();
    let mut service = ScriptedService {
        cancel_on_store: Some(token.clone()),
        ..Default::default()
    }
    .with("x", RuntimeValue::Int(1))
    .with("y", RuntimeValue::Int(2));

    let fault = Interpreter::new(&program, &mut service)
        .with_cancel_token(token)
        .run()
        .unwrap_err();

    // reported at the instruction that would have run next
    assert_eq!(fault.kind, ErrorKind::Cancelled);
    assert_eq!(fault.offset, 5);
    assert_eq!(
        service.values.get(&Reference::Local("x".to_string())),
        Some(&RuntimeValue::Int(7))
    );
    assert!(!service
        .calls
        .contains(&Call::Fetch(Reference::Local("y".to_string()))));
}
