//! Frame snapshots
//!
//! A serialisable copy of a suspended frame (locals, receiver, statics and
//! the heap objects they reach) and a [`ValueService`] that evaluates against
//! it. Stores mutate the snapshot in place.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::eval::error::{EvalError, EvalResult};
use crate::eval::instruction::BinaryOp;
use crate::eval::service::{NativeOp, Reference, ValueService};
use crate::eval::value::{ObjectId, RuntimeValue, TypeId};

/// Object instance in the snapshot heap
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HeapObject {
    pub type_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, RuntimeValue>,
}

/// Array instance in the snapshot heap
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeapArray {
    pub element_type: TypeId,
    #[serde(default)]
    pub elements: Vec<RuntimeValue>,
}

/// Suspended frame state
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameSnapshot {
    /// Function name
    #[serde(default)]
    pub function: String,
    /// Receiver, absent in static frames
    #[serde(default)]
    pub this: Option<RuntimeValue>,
    #[serde(default)]
    pub locals: BTreeMap<String, RuntimeValue>,
    /// Static fields keyed by `Type.name`
    #[serde(default)]
    pub statics: BTreeMap<String, RuntimeValue>,
    #[serde(default)]
    pub objects: BTreeMap<ObjectId, HeapObject>,
    #[serde(default)]
    pub arrays: BTreeMap<ObjectId, HeapArray>,
}

impl FrameSnapshot {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            ..Self::default()
        }
    }

    pub fn with_local(mut self, name: impl Into<String>, value: RuntimeValue) -> Self {
        self.locals.insert(name.into(), value);
        self
    }

    pub fn with_this(mut self, value: RuntimeValue) -> Self {
        self.this = Some(value);
        self
    }

    pub fn with_static(
        mut self,
        type_name: &str,
        name: &str,
        value: RuntimeValue,
    ) -> Self {
        self.statics.insert(static_key(type_name, name), value);
        self
    }

    pub fn with_object(mut self, id: ObjectId, object: HeapObject) -> Self {
        self.objects.insert(id, object);
        self
    }

    pub fn with_array(mut self, id: ObjectId, array: HeapArray) -> Self {
        self.arrays.insert(id, array);
        self
    }

    pub fn local(&self, name: &str) -> Option<&RuntimeValue> {
        self.locals.get(name)
    }

    /// Handle for an object in the heap
    pub fn object_value(&self, id: ObjectId) -> Option<RuntimeValue> {
        self.objects.get(&id).map(|object| RuntimeValue::Object {
            id,
            type_name: object.type_name.clone(),
        })
    }

    /// Handle for an array in the heap
    pub fn array_value(&self, id: ObjectId) -> Option<RuntimeValue> {
        self.arrays.get(&id).map(|array| RuntimeValue::Array {
            id,
            element_type: array.element_type,
            length: array.elements.len() as u32,
        })
    }

    fn slot_mut(&mut self, reference: &Reference) -> EvalResult<&mut RuntimeValue> {
        match reference {
            Reference::Local(name) => self
                .locals
                .get_mut(name)
                .ok_or_else(|| EvalError::remote(format!("No local variable named '{}'", name))),
            Reference::This => self
                .this
                .as_mut()
                .ok_or_else(|| EvalError::remote("No receiver in a static frame")),
            Reference::Field { object, name } => self
                .objects
                .get_mut(object)
                .ok_or_else(|| EvalError::remote(format!("No object with id {}", object)))?
                .fields
                .get_mut(name)
                .ok_or_else(|| EvalError::remote(format!("No field named '{}'", name))),
            Reference::StaticField { type_name, name } => self
                .statics
                .get_mut(&static_key(type_name, name))
                .ok_or_else(|| {
                    EvalError::remote(format!("No static field {}.{}", type_name, name))
                }),
            Reference::ArrayElement { array, index } => {
                let elements = &mut self
                    .arrays
                    .get_mut(array)
                    .ok_or_else(|| EvalError::remote(format!("No array with id {}", array)))?
                    .elements;
                let length = elements.len() as u32;
                elements
                    .get_mut(*index as usize)
                    .ok_or(EvalError::IndexOutOfBounds {
                        index: *index as i64,
                        length,
                    })
            }
        }
    }

    fn type_name_of(&self, value: &RuntimeValue) -> String {
        match value {
            RuntimeValue::Object { type_name, .. } => type_name.clone(),
            RuntimeValue::Array { element_type, .. } => format!("{}[]", element_type),
            RuntimeValue::String(_) => "String".to_string(),
            other => other.type_id().name().to_string(),
        }
    }

    /// Text the target would produce for `value.toString()`
    fn to_text(&self, value: &RuntimeValue) -> String {
        match value {
            RuntimeValue::Object { id, type_name } => format!("{}@{:x}", type_name, id),
            RuntimeValue::Array { id, .. } => format!("{}@{:x}", self.type_name_of(value), id),
            other => other.plain_text().unwrap_or_default(),
        }
    }
}

fn static_key(type_name: &str, name: &str) -> String {
    format!("{}.{}", type_name, name)
}

/// Identity for handles, content equality for string mirrors
fn same_reference(left: &RuntimeValue, right: &RuntimeValue) -> bool {
    match (left, right) {
        (RuntimeValue::Null, RuntimeValue::Null) => true,
        (RuntimeValue::Object { id: l, .. }, RuntimeValue::Object { id: r, .. }) => l == r,
        (RuntimeValue::Array { id: l, .. }, RuntimeValue::Array { id: r, .. }) => l == r,
        (RuntimeValue::String(l), RuntimeValue::String(r)) => l == r,
        _ => false,
    }
}

fn string_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}

/// [`ValueService`] over an in-memory [`FrameSnapshot`]
#[derive(Debug, Clone, Default)]
pub struct SnapshotService {
    frame: FrameSnapshot,
}

impl SnapshotService {
    pub fn new(frame: FrameSnapshot) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &FrameSnapshot {
        &self.frame
    }

    pub fn into_frame(self) -> FrameSnapshot {
        self.frame
    }

    fn invoke_method(
        &self,
        method: &str,
        receiver: &RuntimeValue,
        args: &[RuntimeValue],
    ) -> EvalResult<RuntimeValue> {
        if receiver.is_null() {
            return Err(EvalError::NullPointer {
                context: format!("call to {}()", method),
            });
        }
        match (method, args) {
            ("toString", []) => Ok(RuntimeValue::String(self.frame.to_text(receiver))),
            ("equals", [other]) => Ok(RuntimeValue::Boolean(same_reference(receiver, other))),
            ("hashCode", []) => Ok(RuntimeValue::Int(match receiver {
                RuntimeValue::String(text) => string_hash(text),
                RuntimeValue::Object { id, .. } | RuntimeValue::Array { id, .. } => *id as i32,
                other => return Err(EvalError::coercion("object", other.type_id().name())),
            })),
            ("length", []) => match receiver {
                RuntimeValue::String(text) => {
                    Ok(RuntimeValue::Int(text.encode_utf16().count() as i32))
                }
                other => Err(self.no_such_method(method, other)),
            },
            _ => Err(self.no_such_method(method, receiver)),
        }
    }

    fn no_such_method(&self, method: &str, receiver: &RuntimeValue) -> EvalError {
        EvalError::remote(format!(
            "No such method: {}.{}()",
            self.frame.type_name_of(receiver),
            method
        ))
    }
}

impl ValueService for SnapshotService {
    fn fetch(&mut self, reference: &Reference) -> EvalResult<RuntimeValue> {
        self.frame.slot_mut(reference).map(|slot| slot.clone())
    }

    fn store(&mut self, reference: &Reference, value: RuntimeValue) -> EvalResult<()> {
        debug!("snapshot store {} = {}", reference, value);
        *self.frame.slot_mut(reference)? = value;
        Ok(())
    }

    fn invoke_native(
        &mut self,
        op: &NativeOp,
        operands: &[RuntimeValue],
    ) -> EvalResult<RuntimeValue> {
        match (op, operands) {
            (NativeOp::Binary(BinaryOp::Eq), [l, r]) => {
                Ok(RuntimeValue::Boolean(same_reference(l, r)))
            }
            (NativeOp::Binary(BinaryOp::Ne), [l, r]) => {
                Ok(RuntimeValue::Boolean(!same_reference(l, r)))
            }
            (NativeOp::ToString, [value]) => Ok(RuntimeValue::String(self.frame.to_text(value))),
            (NativeOp::Invoke { method, static_type: Some(type_name) }, _) => Err(
                EvalError::remote(format!("Cannot call static method {}.{}()", type_name, method)),
            ),
            (NativeOp::Invoke { method, static_type: None }, [receiver, args @ ..]) => {
                self.invoke_method(method, receiver, args)
            }
            _ => Err(EvalError::remote(format!(
                "Unsupported native operation {:?} on {} operands",
                op,
                operands.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SnapshotService {
        let frame = FrameSnapshot::new("Point.move")
            .with_this(RuntimeValue::Object {
                id: 1,
                type_name: "Point".to_string(),
            })
            .with_object(
                1,
                HeapObject {
                    type_name: "Point".to_string(),
                    fields: BTreeMap::from([("x".to_string(), RuntimeValue::Int(3))]),
                },
            )
            .with_array(
                2,
                HeapArray {
                    element_type: TypeId::Long,
                    elements: vec![RuntimeValue::Long(10), RuntimeValue::Long(20)],
                },
            )
            .with_static("Point", "ORIGIN_X", RuntimeValue::Int(0))
            .with_local("dx", RuntimeValue::Int(2));
        SnapshotService::new(frame)
    }

    #[test]
    fn test_fetch_and_store() {
        let mut service = sample();
        let field = Reference::Field {
            object: 1,
            name: "x".to_string(),
        };
        assert_eq!(service.fetch(&field).unwrap(), RuntimeValue::Int(3));
        service.store(&field, RuntimeValue::Int(5)).unwrap();
        assert_eq!(service.fetch(&field).unwrap(), RuntimeValue::Int(5));

        let element = Reference::ArrayElement { array: 2, index: 1 };
        assert_eq!(service.fetch(&element).unwrap(), RuntimeValue::Long(20));

        let statik = Reference::StaticField {
            type_name: "Point".to_string(),
            name: "ORIGIN_X".to_string(),
        };
        assert_eq!(service.fetch(&statik).unwrap(), RuntimeValue::Int(0));
    }

    #[test]
    fn test_missing_slots() {
        let mut service = sample();
        let err = service.fetch(&Reference::Local("nope".into())).unwrap_err();
        assert!(matches!(err, EvalError::RemoteException { .. }));

        let err = service
            .fetch(&Reference::ArrayElement { array: 2, index: 5 })
            .unwrap_err();
        assert_eq!(err, EvalError::IndexOutOfBounds { index: 5, length: 2 });
    }

    #[test]
    fn test_native_methods() {
        let mut service = sample();
        let text = RuntimeValue::String("ab".to_string());
        let invoke = |method: &str| NativeOp::Invoke {
            method: method.to_string(),
            static_type: None,
        };

        let len = service.invoke_native(&invoke("length"), &[text.clone()]).unwrap();
        assert_eq!(len, RuntimeValue::Int(2));

        let hash = service.invoke_native(&invoke("hashCode"), &[text.clone()]).unwrap();
        assert_eq!(hash, RuntimeValue::Int(97 * 31 + 98));

        let point = service.frame().object_value(1).unwrap();
        let shown = service.invoke_native(&NativeOp::ToString, &[point.clone()]).unwrap();
        assert_eq!(shown, RuntimeValue::String("Point@1".to_string()));

        let err = service.invoke_native(&invoke("frobnicate"), &[point]).unwrap_err();
        assert_eq!(err.to_string(), "Exception in target: No such method: Point.frobnicate()");

        let err = service
            .invoke_native(&invoke("toString"), &[RuntimeValue::Null])
            .unwrap_err();
        assert!(matches!(err, EvalError::NullPointer { .. }));
    }

    #[test]
    fn test_snapshot_deserialize() {
        let json = r#"{
            "function": "main",
            "locals": { "count": { "int": 4 }, "name": { "string": "abc" } }
        }"#;
        let frame: FrameSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(frame.local("count"), Some(&RuntimeValue::Int(4)));
        assert!(frame.this.is_none());
    }
}
