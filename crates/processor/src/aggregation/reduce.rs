//! Reduction functions for [`GroupByOperator`](super::GroupByOperator)
//!
//! A reduction folds one record into a group's accumulator. The first record
//! of a group is folded into [`Value::Empty`].

use crate::error::{ProcessorError, Result};
use flowwatch_types::{Tuple, Value};

/// Count records: `Empty -> 1`, `Int(n) -> n + 1`, anything else unchanged
pub fn counter(acc: Value, _tuple: &Tuple) -> Result<Value> {
    Ok(match acc {
        Value::Empty => Value::Int(1),
        Value::Int(n) => Value::Int(n + 1),
        other => other,
    })
}

/// Sum an integer field across the group.
///
/// The first record seeds the accumulator with `Int(0)` without adding its own
/// field; later records add theirs. A non-integer field on a later record fails
/// with `TypeMismatch`.
pub fn sum_ints<S: Into<String>>(
    field: S,
) -> impl Fn(Value, &Tuple) -> Result<Value> + Send + Sync + Clone + 'static {
    let field = field.into();
    move |acc: Value, tuple: &Tuple| -> Result<Value> {
        match acc {
            Value::Empty => Ok(Value::Int(0)),
            Value::Int(sum) => Ok(Value::Int(sum + tuple.get_int(&field)?)),
            other => Err(ProcessorError::TypeMismatch {
                field: field.clone(),
                expected: "int",
                actual: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let t = Tuple::new();
        assert_eq!(counter(Value::Empty, &t).unwrap(), Value::Int(1));
        assert_eq!(counter(Value::Int(4), &t).unwrap(), Value::Int(5));
        assert_eq!(counter(Value::Float(2.0), &t).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_sum_ints_seeds_with_zero() {
        let sum = sum_ints("ipv4.len");
        let t = Tuple::new().with("ipv4.len", 100i64);

        let acc = sum(Value::Empty, &t).unwrap();
        assert_eq!(acc, Value::Int(0));
        let acc = sum(acc, &t).unwrap();
        let acc = sum(acc, &t).unwrap();
        assert_eq!(acc, Value::Int(200));
    }

    #[test]
    fn test_sum_ints_rejects_non_int_field() {
        let sum = sum_ints("ipv4.len");
        let t = Tuple::new().with("ipv4.len", 1.5);
        let err = sum(Value::Int(3), &t).unwrap_err();
        assert!(matches!(err, ProcessorError::TypeMismatch { .. }));
    }

    #[test]
    fn test_sum_ints_rejects_non_int_accumulator() {
        let sum = sum_ints("ipv4.len");
        let t = Tuple::new().with("ipv4.len", 1i64);
        assert!(sum(Value::Float(0.0), &t).is_err());
    }
}
