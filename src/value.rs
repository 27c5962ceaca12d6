//! Generic host values and their operator semantics.
//!
//! Arrays of the object kind store [`Value`]s directly, and every
//! non-native inner function in the dispatch engine converts elements to
//! `Value`, applies the host operator defined here, and converts back. This
//! is the slow but universal path; the native `f64` kernels exist to avoid it.

use std::fmt;

use crate::{NdError, Result};

/// A dynamically typed scalar as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x as f64)
    }
}

/// Binary operators understood by the dispatch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    TrueDivide,
    FloorDivide,
    Modulo,
    Power,
    And,
    Or,
    Xor,
    LeftShift,
    RightShift,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl BinaryOp {
    /// Comparisons always produce boolean results.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
                | BinaryOp::Equal
                | BinaryOp::NotEqual
        )
    }

    /// Bitwise and shift operators are defined on integers only.
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::LeftShift | BinaryOp::RightShift
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::TrueDivide => "/",
            BinaryOp::FloorDivide => "//",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "**",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
        }
    }
}

/// Unary operators understood by the dispatch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Positive,
    Negative,
    Abs,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Positive => "+",
            UnaryOp::Negative => "-",
            UnaryOp::Abs => "abs",
        }
    }
}

enum Pair {
    Ints(i64, i64),
    Floats(f64, f64),
}

impl Value {
    /// Interpret as a float the way the host's `float()` would.
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Bool(b) => b as i64 as f64,
            Value::Int(i) => i as f64,
            Value::Float(x) => x,
        }
    }

    /// Interpret as an integer, truncating floats toward zero.
    pub fn as_i64(self) -> Result<i64> {
        match self {
            Value::Bool(b) => Ok(b as i64),
            Value::Int(i) => Ok(i),
            Value::Float(x) => {
                if x.is_finite() {
                    Ok(x.trunc() as i64)
                } else {
                    Err(NdError::ValueOverflow {
                        value: x.to_string(),
                        kind: "int",
                    })
                }
            }
        }
    }

    pub fn truthy(self) -> bool {
        match self {
            Value::Bool(b) => b,
            Value::Int(i) => i != 0,
            Value::Float(x) => x != 0.0,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
        }
    }

    fn pair(lhs: Value, rhs: Value) -> Pair {
        match (lhs, rhs) {
            (Value::Float(_), _) | (_, Value::Float(_)) => Pair::Floats(lhs.as_f64(), rhs.as_f64()),
            _ => Pair::Ints(int_of(lhs), int_of(rhs)),
        }
    }

    /// Apply a unary host operator.
    pub fn unary_op(op: UnaryOp, v: Value) -> Result<Value> {
        match (op, v) {
            (UnaryOp::Positive, Value::Bool(b)) => Ok(Value::Int(b as i64)),
            (UnaryOp::Positive, other) => Ok(other),
            (UnaryOp::Negative, Value::Float(x)) => Ok(Value::Float(-x)),
            (UnaryOp::Negative, other) => {
                let i = int_of(other);
                Ok(i.checked_neg()
                    .map(Value::Int)
                    .unwrap_or(Value::Float(-(i as f64))))
            }
            (UnaryOp::Abs, Value::Float(x)) => Ok(Value::Float(x.abs())),
            (UnaryOp::Abs, other) => {
                let i = int_of(other);
                Ok(i.checked_abs()
                    .map(Value::Int)
                    .unwrap_or(Value::Float((i as f64).abs())))
            }
        }
    }

    /// Apply a binary host operator.
    pub fn binary_op(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
        if op.is_comparison() {
            return Ok(Value::Bool(compare(op, lhs, rhs)));
        }
        if op.is_bitwise() {
            return bitwise(op, lhs, rhs);
        }
        match Value::pair(lhs, rhs) {
            Pair::Floats(a, b) => Ok(Value::Float(float_arith(op, a, b))),
            Pair::Ints(a, b) => int_arith(op, a, b),
        }
    }
}

fn int_of(v: Value) -> i64 {
    match v {
        Value::Bool(b) => b as i64,
        Value::Int(i) => i,
        Value::Float(x) => x as i64,
    }
}

fn compare(op: BinaryOp, lhs: Value, rhs: Value) -> bool {
    match Value::pair(lhs, rhs) {
        Pair::Floats(a, b) => float_compare(op, a, b),
        Pair::Ints(a, b) => match op {
            BinaryOp::Less => a < b,
            BinaryOp::LessEqual => a <= b,
            BinaryOp::Greater => a > b,
            BinaryOp::GreaterEqual => a >= b,
            BinaryOp::Equal => a == b,
            _ => a != b,
        },
    }
}

/// Comparison on native floats, shared with the fast kernels.
pub(crate) fn float_compare(op: BinaryOp, a: f64, b: f64) -> bool {
    match op {
        BinaryOp::Less => a < b,
        BinaryOp::LessEqual => a <= b,
        BinaryOp::Greater => a > b,
        BinaryOp::GreaterEqual => a >= b,
        BinaryOp::Equal => a == b,
        _ => a != b,
    }
}

/// Arithmetic on native floats, shared with the fast kernels.
///
/// Floor division and modulo use floor semantics: the remainder takes the
/// sign of the divisor.
pub(crate) fn float_arith(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::TrueDivide => a / b,
        BinaryOp::FloorDivide => (a / b).floor(),
        BinaryOp::Modulo => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Power => a.powf(b),
        _ => f64::NAN,
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value> {
    let promoted = || Value::Float(float_arith(op, a as f64, b as f64));
    match op {
        BinaryOp::Add => Ok(a.checked_add(b).map(Value::Int).unwrap_or_else(promoted)),
        BinaryOp::Subtract => Ok(a.checked_sub(b).map(Value::Int).unwrap_or_else(promoted)),
        BinaryOp::Multiply => Ok(a.checked_mul(b).map(Value::Int).unwrap_or_else(promoted)),
        BinaryOp::TrueDivide => {
            if b == 0 {
                return Err(NdError::ZeroDivision);
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        BinaryOp::FloorDivide | BinaryOp::Modulo => {
            if b == 0 {
                return Err(NdError::ZeroDivision);
            }
            let (q, r) = match (a.checked_div_euclid(b), a.checked_rem_euclid(b)) {
                (Some(q), Some(r)) => (q, r),
                _ => return Ok(promoted()),
            };
            // Euclidean remainder is non-negative; shift it to follow the divisor's sign.
            let (q, r) = if b < 0 && r != 0 { (q - 1, r + b) } else { (q, r) };
            Ok(Value::Int(if op == BinaryOp::FloorDivide { q } else { r }))
        }
        BinaryOp::Power => {
            if b < 0 {
                return Ok(promoted());
            }
            let exp = u32::try_from(b).map_err(|_| NdError::ValueOverflow {
                value: b.to_string(),
                kind: "int",
            })?;
            Ok(a.checked_pow(exp).map(Value::Int).unwrap_or_else(promoted))
        }
        _ => Err(NdError::UnsupportedOperand {
            op: op.symbol(),
            operand: "int",
        }),
    }
}

fn bitwise(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    for v in [lhs, rhs] {
        if let Value::Float(_) = v {
            return Err(NdError::UnsupportedOperand {
                op: op.symbol(),
                operand: "float",
            });
        }
    }
    if let (Value::Bool(a), Value::Bool(b)) = (lhs, rhs) {
        match op {
            BinaryOp::And => return Ok(Value::Bool(a & b)),
            BinaryOp::Or => return Ok(Value::Bool(a | b)),
            BinaryOp::Xor => return Ok(Value::Bool(a ^ b)),
            _ => {}
        }
    }
    let (a, b) = (int_of(lhs), int_of(rhs));
    let out = match op {
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::LeftShift | BinaryOp::RightShift => {
            if b < 0 {
                return Err(NdError::InvalidArgument("negative shift count"));
            }
            let s = b.min(63) as u32;
            if op == BinaryOp::RightShift {
                a >> s
            } else {
                let shifted = a << s;
                if shifted >> s != a {
                    return Err(NdError::ValueOverflow {
                        value: format!("{a} << {b}"),
                        kind: "int",
                    });
                }
                shifted
            }
        }
        _ => unreachable!("non-bitwise operator"),
    };
    Ok(Value::Int(out))
}

/// A nested list/tuple-like host sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested {
    Scalar(Value),
    Seq(Vec<Nested>),
}

impl Nested {
    /// A flat sequence of scalars.
    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Nested::Seq(values.into_iter().map(|v| Nested::Scalar(v.into())).collect())
    }

    /// A sequence of rows, each a flat sequence of scalars.
    pub fn from_rows<V: Into<Value>, R: IntoIterator<Item = V>>(
        rows: impl IntoIterator<Item = R>,
    ) -> Self {
        Nested::Seq(rows.into_iter().map(Nested::from_values).collect())
    }
}

impl<V: Into<Value>> From<V> for Nested {
    fn from(v: V) -> Self {
        Nested::Scalar(v.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic_stays_int() {
        assert_eq!(
            Value::binary_op(BinaryOp::Add, Value::Int(2), Value::Int(3)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            Value::binary_op(BinaryOp::Multiply, Value::Bool(true), Value::Int(7)).unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn test_true_divide_is_float() {
        assert_eq!(
            Value::binary_op(BinaryOp::TrueDivide, Value::Int(7), Value::Int(2)).unwrap(),
            Value::Float(3.5)
        );
    }

    #[test]
    fn test_floor_semantics() {
        assert_eq!(
            Value::binary_op(BinaryOp::FloorDivide, Value::Int(-7), Value::Int(2)).unwrap(),
            Value::Int(-4)
        );
        assert_eq!(
            Value::binary_op(BinaryOp::Modulo, Value::Int(-7), Value::Int(2)).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            Value::binary_op(BinaryOp::Modulo, Value::Int(7), Value::Int(-2)).unwrap(),
            Value::Int(-1)
        );
        assert_eq!(
            Value::binary_op(BinaryOp::FloorDivide, Value::Int(7), Value::Int(-2)).unwrap(),
            Value::Int(-4)
        );
        assert_eq!(float_arith(BinaryOp::Modulo, -7.0, 2.0), 1.0);
    }

    #[test]
    fn test_int_zero_division() {
        assert!(matches!(
            Value::binary_op(BinaryOp::Modulo, Value::Int(1), Value::Int(0)),
            Err(NdError::ZeroDivision)
        ));
        // Floats follow IEEE-754.
        assert_eq!(
            Value::binary_op(BinaryOp::TrueDivide, Value::Float(1.0), Value::Int(0)).unwrap(),
            Value::Float(f64::INFINITY)
        );
    }

    #[test]
    fn test_overflow_promotes_to_float() {
        let v = Value::binary_op(BinaryOp::Multiply, Value::Int(i64::MAX), Value::Int(2)).unwrap();
        assert!(matches!(v, Value::Float(_)));
    }

    #[test]
    fn test_bitwise_rejects_floats() {
        assert!(Value::binary_op(BinaryOp::And, Value::Float(1.0), Value::Int(1)).is_err());
        assert_eq!(
            Value::binary_op(BinaryOp::Xor, Value::Int(6), Value::Int(3)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            Value::binary_op(BinaryOp::LeftShift, Value::Int(1), Value::Int(4)).unwrap(),
            Value::Int(16)
        );
    }

    #[test]
    fn test_comparisons_yield_bool() {
        assert_eq!(
            Value::binary_op(BinaryOp::Less, Value::Int(1), Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            Value::binary_op(BinaryOp::Equal, Value::Bool(true), Value::Int(1)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_unary_ops() {
        assert_eq!(Value::unary_op(UnaryOp::Negative, Value::Int(3)).unwrap(), Value::Int(-3));
        assert_eq!(Value::unary_op(UnaryOp::Abs, Value::Float(-2.5)).unwrap(), Value::Float(2.5));
        assert_eq!(Value::unary_op(UnaryOp::Positive, Value::Bool(true)).unwrap(), Value::Int(1));
    }
}
