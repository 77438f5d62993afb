use crate::error::VmError;
use crate::opcode::CompareOp;
use std::fmt;

/// A runtime value. Numbers are dynamically typed: arithmetic between an `Int` and
/// a `Float` widens to `Float`, but a `String` never participates in arithmetic.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    String(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

impl Value {
    fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Int(v) => Some(*v as f32),
            Value::Float(v) => Some(*v),
            Value::String(_) => None,
        }
    }

    fn numeric_binop(
        l: &Value,
        r: &Value,
        op_name: &'static str,
        int_op: impl Fn(i32, i32) -> Option<i32>,
        float_op: impl Fn(f32, f32) -> f32,
    ) -> Result<Value, VmError> {
        match (l, r) {
            (Value::Int(a), Value::Int(b)) => match int_op(*a, *b) {
                Some(v) => Ok(Value::Int(v)),
                None => Err(VmError::DivisionByZero),
            },
            (Value::String(_), _) | (_, Value::String(_)) => {
                Err(VmError::TypeError(op_name))
            }
            _ => {
                let a = l.as_f32().expect("non-string operand has a float representation");
                let b = r.as_f32().expect("non-string operand has a float representation");
                Ok(Value::Float(float_op(a, b)))
            }
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value, VmError> {
        Value::numeric_binop(self, other, "add", |a, b| Some(a.wrapping_add(b)), |a, b| a + b)
    }

    pub fn sub(&self, other: &Value) -> Result<Value, VmError> {
        Value::numeric_binop(self, other, "sub", |a, b| Some(a.wrapping_sub(b)), |a, b| a - b)
    }

    pub fn mult(&self, other: &Value) -> Result<Value, VmError> {
        Value::numeric_binop(self, other, "mult", |a, b| Some(a.wrapping_mul(b)), |a, b| a * b)
    }

    pub fn div(&self, other: &Value) -> Result<Value, VmError> {
        Value::numeric_binop(
            self,
            other,
            "div",
            |a, b| if b == 0 { None } else { Some(a / b) },
            |a, b| a / b,
        )
    }

    pub fn compare(&self, other: &Value, op: CompareOp) -> Result<bool, VmError> {
        let ordering = match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::String(_), _) | (_, Value::String(_)) => {
                return Err(VmError::TypeError("compare"))
            }
            _ => {
                let a = self.as_f32().expect("non-string operand has a float representation");
                let b = other.as_f32().expect("non-string operand has a float representation");
                match a.partial_cmp(&b) {
                    Some(ord) => ord,
                    None => return Ok(op == CompareOp::NOTEQUAL),
                }
            }
        };

        Ok(match op {
            CompareOp::ISEQUAL => ordering == std::cmp::Ordering::Equal,
            CompareOp::NOTEQUAL => ordering != std::cmp::Ordering::Equal,
            CompareOp::GT => ordering == std::cmp::Ordering::Greater,
            CompareOp::GTE => ordering != std::cmp::Ordering::Less,
            CompareOp::LT => ordering == std::cmp::Ordering::Less,
            CompareOp::LTE => ordering != std::cmp::Ordering::Greater,
        })
    }

    /// Truthiness used by `JZ`/`JNZ`: zero numbers and the empty string are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::String(bytes) => !bytes.is_empty(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn int_arithmetic_stays_int() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)).unwrap(), Value::Int(5));
    }

    #[test]
    fn mixed_int_float_widens_to_float() {
        assert_eq!(Value::Int(2).add(&Value::Float(0.5)).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn string_number_mix_is_a_type_error() {
        let err = Value::String(b"x".to_vec()).add(&Value::Int(1)).unwrap_err();
        assert_eq!(err, VmError::TypeError("add"));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(Value::Int(1).div(&Value::Int(0)).unwrap_err(), VmError::DivisionByZero);
    }

    #[test]
    fn string_comparison_is_lexicographic() {
        assert!(Value::String(b"a".to_vec())
            .compare(&Value::String(b"b".to_vec()), CompareOp::LT)
            .unwrap());
    }

    #[test]
    fn falsy_values() {
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::String(Vec::new()).is_truthy());
        assert!(Value::Float(0.1).is_truthy());
    }
}
