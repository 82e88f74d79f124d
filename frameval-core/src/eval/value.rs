//! Value types for expression evaluation
//!
//! Typed view over values living in the suspended target. Primitive values are
//! mirrored locally; objects and arrays are handles identified by the target's
//! object id.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{EvalError, EvalResult};

/// Identity of an object or array inside the target process
pub type ObjectId = u64;

/// Closed set of runtime type identities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeId {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Object,
    Array,
    Void,
    String,
}

impl TypeId {
    pub fn name(&self) -> &'static str {
        match self {
            TypeId::Boolean => "boolean",
            TypeId::Byte => "byte",
            TypeId::Char => "char",
            TypeId::Short => "short",
            TypeId::Int => "int",
            TypeId::Long => "long",
            TypeId::Float => "float",
            TypeId::Double => "double",
            TypeId::Object => "object",
            TypeId::Array => "array",
            TypeId::Void => "void",
            TypeId::String => "string",
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.is_numeric() || *self == TypeId::Boolean
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeId::Byte
                | TypeId::Char
                | TypeId::Short
                | TypeId::Int
                | TypeId::Long
                | TypeId::Float
                | TypeId::Double
        )
    }

    /// Unary numeric promotion: byte, short and char operate as int
    pub fn unary_promotion(self) -> TypeId {
        match self {
            TypeId::Byte | TypeId::Short | TypeId::Char => TypeId::Int,
            other => other,
        }
    }

    /// Binary promotion of two operand types.
    ///
    /// Numeric operands widen along `int < long < float < double`. A string on
    /// either side selects the string path, two booleans the boolean path, and
    /// anything else is compared as a reference.
    pub fn binary_promotion(left: TypeId, right: TypeId) -> TypeId {
        if left.is_numeric() && right.is_numeric() {
            let (l, r) = (left.unary_promotion(), right.unary_promotion());
            return if l == TypeId::Double || r == TypeId::Double {
                TypeId::Double
            } else if l == TypeId::Float || r == TypeId::Float {
                TypeId::Float
            } else if l == TypeId::Long || r == TypeId::Long {
                TypeId::Long
            } else {
                TypeId::Int
            };
        }
        if left == TypeId::Boolean && right == TypeId::Boolean {
            return TypeId::Boolean;
        }
        if left == TypeId::String || right == TypeId::String {
            return TypeId::String;
        }
        TypeId::Object
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value fetched from (or destined for) the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeValue {
    Boolean(bool),
    Byte(i8),
    /// UTF-16 code unit
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),

    /// Mirror of a string in the target
    String(String),

    Null,
    Void,

    Object {
        id: ObjectId,
        type_name: String,
    },
    Array {
        id: ObjectId,
        element_type: TypeId,
        length: u32,
    },
}

impl RuntimeValue {
    /// Get the type identity of this value. `null` is an object reference.
    pub fn type_id(&self) -> TypeId {
        match self {
            RuntimeValue::Boolean(_) => TypeId::Boolean,
            RuntimeValue::Byte(_) => TypeId::Byte,
            RuntimeValue::Char(_) => TypeId::Char,
            RuntimeValue::Short(_) => TypeId::Short,
            RuntimeValue::Int(_) => TypeId::Int,
            RuntimeValue::Long(_) => TypeId::Long,
            RuntimeValue::Float(_) => TypeId::Float,
            RuntimeValue::Double(_) => TypeId::Double,
            RuntimeValue::String(_) => TypeId::String,
            RuntimeValue::Null | RuntimeValue::Object { .. } => TypeId::Object,
            RuntimeValue::Array { .. } => TypeId::Array,
            RuntimeValue::Void => TypeId::Void,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.type_id().is_primitive()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RuntimeValue::Null)
    }

    fn coercion(&self, expected: TypeId) -> EvalError {
        EvalError::coercion(expected.name(), self.type_id().name())
    }

    pub fn as_boolean(&self) -> EvalResult<bool> {
        match self {
            RuntimeValue::Boolean(v) => Ok(*v),
            _ => Err(self.coercion(TypeId::Boolean)),
        }
    }

    pub fn as_int(&self) -> EvalResult<i32> {
        Ok(match self {
            RuntimeValue::Byte(v) => *v as i32,
            RuntimeValue::Char(v) => *v as i32,
            RuntimeValue::Short(v) => *v as i32,
            RuntimeValue::Int(v) => *v,
            RuntimeValue::Long(v) => *v as i32,
            // `as` saturates and maps NaN to zero, matching the target's f2i
            RuntimeValue::Float(v) => *v as i32,
            RuntimeValue::Double(v) => *v as i32,
            _ => return Err(self.coercion(TypeId::Int)),
        })
    }

    pub fn as_long(&self) -> EvalResult<i64> {
        Ok(match self {
            RuntimeValue::Byte(v) => *v as i64,
            RuntimeValue::Char(v) => *v as i64,
            RuntimeValue::Short(v) => *v as i64,
            RuntimeValue::Int(v) => *v as i64,
            RuntimeValue::Long(v) => *v,
            RuntimeValue::Float(v) => *v as i64,
            RuntimeValue::Double(v) => *v as i64,
            _ => return Err(self.coercion(TypeId::Long)),
        })
    }

    pub fn as_float(&self) -> EvalResult<f32> {
        Ok(match self {
            RuntimeValue::Byte(v) => *v as f32,
            RuntimeValue::Char(v) => *v as f32,
            RuntimeValue::Short(v) => *v as f32,
            RuntimeValue::Int(v) => *v as f32,
            RuntimeValue::Long(v) => *v as f32,
            RuntimeValue::Float(v) => *v,
            RuntimeValue::Double(v) => *v as f32,
            _ => return Err(self.coercion(TypeId::Float)),
        })
    }

    pub fn as_double(&self) -> EvalResult<f64> {
        Ok(match self {
            RuntimeValue::Byte(v) => *v as f64,
            RuntimeValue::Char(v) => *v as f64,
            RuntimeValue::Short(v) => *v as f64,
            RuntimeValue::Int(v) => *v as f64,
            RuntimeValue::Long(v) => *v as f64,
            RuntimeValue::Float(v) => *v as f64,
            RuntimeValue::Double(v) => *v,
            _ => return Err(self.coercion(TypeId::Double)),
        })
    }

    pub fn as_char(&self) -> EvalResult<u16> {
        match self {
            RuntimeValue::Char(v) => Ok(*v),
            RuntimeValue::Boolean(_) => Err(self.coercion(TypeId::Char)),
            // floating values narrow through int first
            _ => self.as_int().map(|v| v as u16),
        }
    }

    /// Convert to `target` following the target language's casting rules.
    ///
    /// Numeric values convert among each other, primitives render into
    /// strings, and reference values pass through unchanged. Crossing between
    /// boolean and numeric is a coercion fault.
    pub fn convert_to(&self, target: TypeId) -> EvalResult<RuntimeValue> {
        if self.type_id() == target {
            return Ok(self.clone());
        }
        Ok(match target {
            TypeId::Boolean => RuntimeValue::Boolean(self.as_boolean()?),
            TypeId::Byte => RuntimeValue::Byte(self.as_int()? as i8),
            TypeId::Char => RuntimeValue::Char(self.as_char()?),
            TypeId::Short => RuntimeValue::Short(self.as_int()? as i16),
            TypeId::Int => RuntimeValue::Int(self.as_int()?),
            TypeId::Long => RuntimeValue::Long(self.as_long()?),
            TypeId::Float => RuntimeValue::Float(self.as_float()?),
            TypeId::Double => RuntimeValue::Double(self.as_double()?),
            TypeId::String => match self {
                RuntimeValue::Null => RuntimeValue::Null,
                RuntimeValue::Object { .. } => self.clone(),
                other => match other.plain_text() {
                    Some(text) => RuntimeValue::String(text),
                    None => return Err(self.coercion(TypeId::String)),
                },
            },
            TypeId::Object | TypeId::Array => {
                if self.is_primitive() || matches!(self, RuntimeValue::Void) {
                    return Err(self.coercion(target));
                }
                self.clone()
            }
            TypeId::Void => return Err(self.coercion(target)),
        })
    }

    /// Text used when the value takes part in string concatenation.
    ///
    /// Returns `None` for objects and arrays, whose text has to come from the
    /// target itself.
    pub fn plain_text(&self) -> Option<String> {
        Some(match self {
            RuntimeValue::Boolean(v) => v.to_string(),
            RuntimeValue::Byte(v) => v.to_string(),
            RuntimeValue::Char(v) => char_text(*v),
            RuntimeValue::Short(v) => v.to_string(),
            RuntimeValue::Int(v) => v.to_string(),
            RuntimeValue::Long(v) => v.to_string(),
            RuntimeValue::Float(v) => float_text(*v),
            RuntimeValue::Double(v) => float_text(*v),
            RuntimeValue::String(v) => v.clone(),
            RuntimeValue::Null => "null".to_string(),
            RuntimeValue::Void => "void".to_string(),
            RuntimeValue::Object { .. } | RuntimeValue::Array { .. } => return None,
        })
    }
}

fn char_text(unit: u16) -> String {
    String::from_utf16_lossy(&[unit])
}

/// Floating point text in the target's notation: `1.0`, `NaN`, `-Infinity`,
/// and `1.0E7` / `1.0E-4` outside `[1e-3, 1e7)`
fn float_text<F: Into<f64> + fmt::Display + fmt::LowerExp + Copy>(v: F) -> String {
    let wide: f64 = v.into();
    if wide.is_nan() {
        return "NaN".to_string();
    }
    if wide.is_infinite() {
        let text = if wide > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }

    let magnitude = wide.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return if wide.fract() == 0.0 {
            format!("{:.1}", wide)
        } else {
            v.to_string()
        };
    }

    // shortest digits from `{:e}`, e.g. `1.5e10`, rewritten as `1.5E10`
    let scientific = format!("{:e}", v);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    if mantissa.contains('.') {
        format!("{}E{}", mantissa, exponent)
    } else {
        format!("{}.0E{}", mantissa, exponent)
    }
}

impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeValue::Char(v) => write!(f, "'{}'", char_text(*v)),
            RuntimeValue::String(v) => write!(f, "\"{}\"", v),
            RuntimeValue::Object { id, type_name } => write!(f, "{} (id={})", type_name, id),
            RuntimeValue::Array {
                id,
                element_type,
                length,
            } => write!(f, "{}[{}] (id={})", element_type, length, id),
            other => match other.plain_text() {
                Some(text) => f.write_str(&text),
                None => Ok(()),
            },
        }
    }
}
