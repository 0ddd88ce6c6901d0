//! Runtime values and constant evaluation
//!
//! One evaluation routine is shared by the optimizer (constant folding)
//! and the interpreter (execution), so a folded expression and the same
//! expression evaluated at run time cannot disagree. Evaluation errors
//! (division by zero, incompatible operand types) make the optimizer
//! leave the instruction alone and make the interpreter abort the run.

use crate::ir::{BinaryOp, UnaryOp};
use std::fmt;

/// A Pascal runtime value.
///
/// Comparisons and logical operators produce `Int(0)` / `Int(1)`; there
/// is no separate boolean type in the source language.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Str(String),
}

impl Value {
    /// Pascal-facing type name, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Str(_) => "STRING",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Real(_))
    }

    /// Numeric view with integer-to-real promotion.
    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Real(x) => Some(*x),
            Value::Str(_) => None,
        }
    }

    /// Truthiness used by `IF`/`WHILE` conditions and the logical
    /// operators: nonzero number or non-empty string.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Real(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// Source-like rendering for IR listings: reals keep their decimal
    /// point, strings keep their quotes.
    pub fn repr(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Real(x) => format!("{:?}", x),
            Value::Str(s) => format!("{:?}", s),
        }
    }
}

impl fmt::Display for Value {
    /// The `WRITE` rendering: no quotes, no separators, reals through the
    /// default float formatter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Real(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// Why a constant evaluation refused to produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    DivisionByZero,
    Overflow,
    TypeMismatch(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::DivisionByZero => f.write_str("Division by zero"),
            EvalError::Overflow => f.write_str("Integer overflow"),
            EvalError::TypeMismatch(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for EvalError {}

fn bool_value(b: bool) -> Value {
    Value::Int(if b { 1 } else { 0 })
}

/// `DIV` rounds toward negative infinity, like the source language's
/// reference semantics (-7 DIV 2 = -4).
fn floor_div(a: i64, b: i64) -> i64 {
    let quotient = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        quotient - 1
    } else {
        quotient
    }
}

fn repeat_str(s: &str, count: i64) -> Value {
    if count <= 0 {
        Value::Str(String::new())
    } else {
        Value::Str(s.repeat(count as usize))
    }
}

fn numeric_pair(left: &Value, right: &Value) -> Option<(f64, f64)> {
    Some((left.as_f64()?, right.as_f64()?))
}

fn mismatch(op: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeMismatch(format!(
        "Type mismatch for operator '{}': {} and {}",
        op,
        left.type_name(),
        right.type_name()
    ))
}

/// Apply a binary operator to two values.
///
/// Arithmetic promotes to real when either operand is real; `/` always
/// produces a real; `DIV` requires two integers. `+` concatenates two
/// strings and `*` repeats a string by an integer count. Equality works
/// across any operand types (numerics compare by value); the ordered
/// comparisons require two numerics or two strings.
pub fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_add(*b).map(Value::Int).ok_or(EvalError::Overflow)
            }
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            _ => match numeric_pair(left, right) {
                Some((a, b)) => Ok(Value::Real(a + b)),
                None => Err(mismatch("+", left, right)),
            },
        },
        BinaryOp::Sub => match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_sub(*b).map(Value::Int).ok_or(EvalError::Overflow)
            }
            _ => match numeric_pair(left, right) {
                Some((a, b)) => Ok(Value::Real(a - b)),
                None => Err(mismatch("-", left, right)),
            },
        },
        BinaryOp::Mul => match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_mul(*b).map(Value::Int).ok_or(EvalError::Overflow)
            }
            (Value::Str(s), Value::Int(n)) => Ok(repeat_str(s, *n)),
            (Value::Int(n), Value::Str(s)) => Ok(repeat_str(s, *n)),
            _ => match numeric_pair(left, right) {
                Some((a, b)) => Ok(Value::Real(a * b)),
                None => Err(mismatch("*", left, right)),
            },
        },
        BinaryOp::Div => match numeric_pair(left, right) {
            Some((_, b)) if b == 0.0 => Err(EvalError::DivisionByZero),
            Some((a, b)) => Ok(Value::Real(a / b)),
            None => Err(EvalError::TypeMismatch(format!(
                "Real division requires numeric operands, got {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },
        BinaryOp::IntDiv => match (left, right) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
            (Value::Int(a), Value::Int(-1)) if *a == i64::MIN => Err(EvalError::Overflow),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(floor_div(*a, *b))),
            _ => Err(EvalError::TypeMismatch(format!(
                "Integer division requires INTEGER operands, got {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },
        BinaryOp::Eq => Ok(bool_value(values_equal(left, right))),
        BinaryOp::Ne => Ok(bool_value(!values_equal(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ => match numeric_pair(left, right) {
                    Some((a, b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
                    None => return Err(mismatch(op.symbol(), left, right)),
                },
            };
            let holds = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(bool_value(holds))
        }
        BinaryOp::And => Ok(bool_value(left.truthy() && right.truthy())),
        BinaryOp::Or => Ok(bool_value(left.truthy() || right.truthy())),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Str(_), _) | (_, Value::Str(_)) => false,
        _ => match numeric_pair(left, right) {
            Some((a, b)) => a == b,
            None => false,
        },
    }
}

/// Apply a unary operator to a value.
pub fn eval_unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Neg => match operand {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
            Value::Real(x) => Ok(Value::Real(-x)),
            Value::Str(_) => Err(EvalError::TypeMismatch(
                "Unary minus requires a numeric operand, got STRING".to_string(),
            )),
        },
        UnaryOp::Plus => match operand {
            Value::Int(_) | Value::Real(_) => Ok(operand.clone()),
            Value::Str(_) => Err(EvalError::TypeMismatch(
                "Unary plus requires a numeric operand, got STRING".to_string(),
            )),
        },
        UnaryOp::Not => Ok(bool_value(!operand.truthy())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic_stays_int() {
        let v = eval_binary(BinaryOp::Add, &Value::Int(1), &Value::Int(2)).unwrap();
        assert_eq!(v, Value::Int(3));
        let v = eval_binary(BinaryOp::Mul, &Value::Int(2), &Value::Int(3)).unwrap();
        assert_eq!(v, Value::Int(6));
    }

    #[test]
    fn test_mixed_arithmetic_promotes() {
        let v = eval_binary(BinaryOp::Add, &Value::Int(1), &Value::Real(2.5)).unwrap();
        assert_eq!(v, Value::Real(3.5));
        let v = eval_binary(BinaryOp::Sub, &Value::Real(5.0), &Value::Int(2)).unwrap();
        assert_eq!(v, Value::Real(3.0));
    }

    #[test]
    fn test_real_division_always_real() {
        let v = eval_binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).unwrap();
        assert_eq!(v, Value::Real(3.5));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            eval_binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            eval_binary(BinaryOp::IntDiv, &Value::Int(5), &Value::Int(0)),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn test_int_div_floors_toward_negative_infinity() {
        let v = eval_binary(BinaryOp::IntDiv, &Value::Int(-7), &Value::Int(2)).unwrap();
        assert_eq!(v, Value::Int(-4));
        let v = eval_binary(BinaryOp::IntDiv, &Value::Int(7), &Value::Int(-2)).unwrap();
        assert_eq!(v, Value::Int(-4));
        let v = eval_binary(BinaryOp::IntDiv, &Value::Int(7), &Value::Int(2)).unwrap();
        assert_eq!(v, Value::Int(3));
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        assert_eq!(
            eval_binary(BinaryOp::Add, &Value::Int(i64::MAX), &Value::Int(1)),
            Err(EvalError::Overflow)
        );
        assert_eq!(
            eval_binary(BinaryOp::IntDiv, &Value::Int(i64::MIN), &Value::Int(-1)),
            Err(EvalError::Overflow)
        );
        assert_eq!(
            eval_unary(UnaryOp::Neg, &Value::Int(i64::MIN)),
            Err(EvalError::Overflow)
        );
    }

    #[test]
    fn test_int_div_rejects_reals() {
        let result = eval_binary(BinaryOp::IntDiv, &Value::Real(7.0), &Value::Int(2));
        assert!(matches!(result, Err(EvalError::TypeMismatch(_))));
    }

    #[test]
    fn test_string_concat_and_repeat() {
        let v = eval_binary(
            BinaryOp::Add,
            &Value::Str("ab".to_string()),
            &Value::Str("cd".to_string()),
        )
        .unwrap();
        assert_eq!(v, Value::Str("abcd".to_string()));

        let v = eval_binary(BinaryOp::Mul, &Value::Str("ab".to_string()), &Value::Int(3)).unwrap();
        assert_eq!(v, Value::Str("ababab".to_string()));
        let v = eval_binary(BinaryOp::Mul, &Value::Int(-1), &Value::Str("ab".to_string())).unwrap();
        assert_eq!(v, Value::Str(String::new()));
    }

    #[test]
    fn test_string_plus_number_is_error() {
        let result = eval_binary(BinaryOp::Add, &Value::Str("a".to_string()), &Value::Int(1));
        assert!(matches!(result, Err(EvalError::TypeMismatch(_))));
    }

    #[test]
    fn test_comparisons_produce_zero_one() {
        let v = eval_binary(BinaryOp::Lt, &Value::Int(1), &Value::Int(2)).unwrap();
        assert_eq!(v, Value::Int(1));
        let v = eval_binary(BinaryOp::Ge, &Value::Int(1), &Value::Int(2)).unwrap();
        assert_eq!(v, Value::Int(0));
    }

    #[test]
    fn test_equality_promotes_numerics() {
        let v = eval_binary(BinaryOp::Eq, &Value::Int(1), &Value::Real(1.0)).unwrap();
        assert_eq!(v, Value::Int(1));
        // Mismatched kinds are unequal, never an error.
        let v = eval_binary(BinaryOp::Ne, &Value::Str("1".to_string()), &Value::Int(1)).unwrap();
        assert_eq!(v, Value::Int(1));
    }

    #[test]
    fn test_ordered_comparison_needs_matching_kinds() {
        let result = eval_binary(BinaryOp::Lt, &Value::Str("a".to_string()), &Value::Int(1));
        assert!(matches!(result, Err(EvalError::TypeMismatch(_))));
        let v = eval_binary(
            BinaryOp::Lt,
            &Value::Str("abc".to_string()),
            &Value::Str("abd".to_string()),
        )
        .unwrap();
        assert_eq!(v, Value::Int(1));
    }

    #[test]
    fn test_logical_operators_coerce() {
        let v = eval_binary(BinaryOp::And, &Value::Int(2), &Value::Int(3)).unwrap();
        assert_eq!(v, Value::Int(1));
        let v = eval_binary(BinaryOp::Or, &Value::Int(0), &Value::Real(0.0)).unwrap();
        assert_eq!(v, Value::Int(0));
        let v = eval_binary(
            BinaryOp::And,
            &Value::Str("x".to_string()),
            &Value::Int(1),
        )
        .unwrap();
        assert_eq!(v, Value::Int(1));
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(eval_unary(UnaryOp::Neg, &Value::Int(5)).unwrap(), Value::Int(-5));
        assert_eq!(
            eval_unary(UnaryOp::Neg, &Value::Real(2.5)).unwrap(),
            Value::Real(-2.5)
        );
        assert_eq!(eval_unary(UnaryOp::Plus, &Value::Int(5)).unwrap(), Value::Int(5));
        assert_eq!(eval_unary(UnaryOp::Not, &Value::Int(0)).unwrap(), Value::Int(1));
        assert_eq!(eval_unary(UnaryOp::Not, &Value::Int(7)).unwrap(), Value::Int(0));
        assert!(eval_unary(UnaryOp::Neg, &Value::Str("x".to_string())).is_err());
    }

    #[test]
    fn test_write_rendering() {
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Real(3.5).to_string(), "3.5");
        assert_eq!(Value::Str("Hello".to_string()).to_string(), "Hello");
    }

    #[test]
    fn test_repr_distinguishes_real_from_int() {
        assert_eq!(Value::Int(7).repr(), "7");
        assert_eq!(Value::Real(7.0).repr(), "7.0");
        assert_eq!(Value::Str("hi".to_string()).repr(), "\"hi\"");
    }
}
