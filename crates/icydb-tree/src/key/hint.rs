//! Order-preserving 64-bit projections of the leading key part.
//!
//! For any two keys a and b under the same part, `hint(a) < hint(b)`
//! implies `a < b`; equal hints say nothing and the full comparator
//! decides.

use crate::{
    key::{Collation, FieldType, KeyDef, KeyPart, compare::part_value},
    tuple::Tuple,
    value::Value,
};

/// Hint of a null leading part, and of parts that carry no hint.
pub const HINT_NONE: u64 = 0;

const SIGN_BIT: u64 = 1 << 63;

/// Hint of a single non-null value under `part`.
#[must_use]
pub fn value_hint(value: Option<&Value>, part: &KeyPart) -> u64 {
    let Some(value) = value else {
        return HINT_NONE;
    };

    match (part.field_type, value) {
        (FieldType::Unsigned | FieldType::Integer, Value::Uint(u)) => {
            if *u > i64::MAX.cast_unsigned() {
                u64::MAX
            } else {
                u + SIGN_BIT
            }
        }
        (FieldType::Integer, Value::Int(i)) => i.cast_unsigned() ^ SIGN_BIT,
        (FieldType::String, Value::Str(s)) => string_hint(s.as_bytes(), part.collation),
        _ => HINT_NONE,
    }
}

/// Hint of a record's leading indexed part.
#[must_use]
pub fn tuple_hint(tuple: &Tuple, def: &KeyDef) -> u64 {
    def.parts()
        .first()
        .map_or(HINT_NONE, |part| value_hint(part_value(tuple, part, 0), part))
}

/// Hint of a search key's leading part.
#[must_use]
pub fn key_hint(key: &[Value], def: &KeyDef) -> u64 {
    match (key.first(), def.parts().first()) {
        (Some(value), Some(part)) => value_hint(Some(value).filter(|v| !v.is_nil()), part),
        _ => HINT_NONE,
    }
}

fn string_hint(bytes: &[u8], collation: Collation) -> u64 {
    let mut buf = [0u8; 8];
    for (slot, byte) in buf.iter_mut().zip(bytes) {
        *slot = match collation {
            Collation::Binary => *byte,
            Collation::AsciiCaseInsensitive => byte.to_ascii_lowercase(),
        };
    }

    u64::from_be_bytes(buf)
}

///
/// TESTS
///
