use crate::value::Value;
use std::cmp::Ordering;

/// Total canonical comparator used by `scalar`/`any` key parts.
///
/// Ordering rules:
/// 1. Canonical rank (nil < boolean < number < string < varbinary < array)
/// 2. Variant-specific comparison for same-ranked values
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = left.rank().cmp(&right.rank());
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Bin(a), Value::Bin(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ord = canonical_cmp(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => cmp_integers(left, right).unwrap_or(Ordering::Equal),
    }
}

/// Numeric comparison across unsigned and signed variants.
///
/// Returns `None` when either side is not an integer.
#[must_use]
pub fn cmp_integers(left: &Value, right: &Value) -> Option<Ordering> {
    let ord = match (left, right) {
        (Value::Uint(a), Value::Uint(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Uint(a), Value::Int(b)) => i128::from(*a).cmp(&i128::from(*b)),
        (Value::Int(a), Value::Uint(b)) => i128::from(*a).cmp(&i128::from(*b)),
        _ => return None,
    };

    Some(ord)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_interleave_across_variants() {
        assert_eq!(
            cmp_integers(&Value::Int(-1), &Value::Uint(0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            cmp_integers(&Value::Uint(u64::MAX), &Value::Int(i64::MAX)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            cmp_integers(&Value::Int(5), &Value::Uint(5)),
            Some(Ordering::Equal)
        );
        assert_eq!(cmp_integers(&Value::Nil, &Value::Uint(5)), None);
    }

    #[test]
    fn canonical_rank_orders_mixed_types() {
        let mut values = vec![
            Value::Array(vec![Value::Uint(1)]),
            Value::Str("a".into()),
            Value::Uint(3),
            Value::Bool(true),
            Value::Nil,
            Value::Bin(vec![1]),
            Value::Int(-4),
        ];
        values.sort_by(canonical_cmp);

        assert_eq!(
            values,
            vec![
                Value::Nil,
                Value::Bool(true),
                Value::Int(-4),
                Value::Uint(3),
                Value::Str("a".into()),
                Value::Bin(vec![1]),
                Value::Array(vec![Value::Uint(1)]),
            ]
        );
    }
}
