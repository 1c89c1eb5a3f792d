mod compare;

pub use compare::{canonical_cmp, cmp_integers};

use derive_more::From;
use serde::{Deserialize, Serialize};

///
/// Value
///
/// Dynamically typed field value stored inside a tuple.
/// `Int` is reserved for negative numbers by convention, but any integer
/// pair compares numerically regardless of variant.
///

#[derive(Clone, Debug, Deserialize, Eq, From, PartialEq, Serialize)]
pub enum Value {
    Nil,
    Bool(bool),
    Uint(u64),
    Int(i64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
}

impl Value {
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Short type label used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Uint(_) => "unsigned",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::Bin(_) => "varbinary",
            Self::Array(_) => "array",
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical rank for cross-type ordering.
    ///
    /// Numbers share one rank so that unsigned and signed values interleave.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Nil => 0,
            Self::Bool(_) => 1,
            Self::Uint(_) | Self::Int(_) => 2,
            Self::Str(_) => 3,
            Self::Bin(_) => 4,
            Self::Array(_) => 5,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        match u64::try_from(v) {
            Ok(u) => Self::Uint(u),
            Err(_) => Self::Int(i64::from(v)),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_signed_literals_normalize_to_unsigned() {
        assert_eq!(Value::from(7_i32), Value::Uint(7));
        assert_eq!(Value::from(-7_i32), Value::Int(-7));
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(Value::Nil.kind(), "nil");
        assert_eq!(Value::from("a").kind(), "string");
        assert_eq!(Value::Array(vec![]).kind(), "array");
    }
}
