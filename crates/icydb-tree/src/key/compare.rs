use crate::{
    key::{Collation, KeyDef, KeyPart},
    tuple::Tuple,
    value::{Value, canonical_cmp},
};
use std::cmp::Ordering;

/// Compare two records under `def`.
#[must_use]
pub fn compare_tuples(a: &Tuple, b: &Tuple, def: &KeyDef) -> Ordering {
    compare_tuples_at(a, 0, b, 0, def)
}

/// Compare two records under `def`, reading the multikey part at the
/// given array positions. Positions are ignored for plain definitions.
///
/// Nulls sort first and equal each other. Once the uniqueness prefix is
/// exhausted without meeting a null the records are equal; otherwise
/// the remaining (primary key) parts break the tie.
#[must_use]
pub fn compare_tuples_at(a: &Tuple, pos_a: u32, b: &Tuple, pos_b: u32, def: &KeyDef) -> Ordering {
    let mut null_met = false;

    for (i, part) in def.parts().iter().enumerate() {
        if i == def.unique_part_count() && !null_met {
            return Ordering::Equal;
        }

        let left = part_value(a, part, pos_a);
        let right = part_value(b, part, pos_b);
        if left.is_none() || right.is_none() {
            null_met = true;
        }

        let ord = compare_part(part, left, right);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

/// Compare a record against a (possibly partial) search key.
#[must_use]
pub fn compare_with_key(tuple: &Tuple, key: &[Value], def: &KeyDef) -> Ordering {
    compare_with_key_at(tuple, 0, key, def)
}

/// Compare a record's entry at multikey position `pos` against a key.
///
/// Only the first `key.len()` parts take part; an empty key equals
/// every record.
#[must_use]
pub fn compare_with_key_at(tuple: &Tuple, pos: u32, key: &[Value], def: &KeyDef) -> Ordering {
    for (part, key_value) in def.parts().iter().zip(key) {
        let key_value = Some(key_value).filter(|v| !v.is_nil());
        let ord = compare_part(part, part_value(tuple, part, pos), key_value);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

/// Indexed value of `part` in `tuple`; `None` stands for null.
pub(crate) fn part_value<'a>(tuple: &'a Tuple, part: &KeyPart, pos: u32) -> Option<&'a Value> {
    let field = tuple.field(part.fieldno)?;
    let value = if part.is_multikey {
        field.as_array()?.get(pos as usize)?
    } else {
        field
    };

    Some(value).filter(|v| !v.is_nil())
}

fn compare_part(part: &KeyPart, left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(l), Some(r)) => compare_values(part, l, r),
    }
}

fn compare_values(part: &KeyPart, left: &Value, right: &Value) -> Ordering {
    match (part.collation, left, right) {
        (Collation::AsciiCaseInsensitive, Value::Str(l), Value::Str(r)) => l
            .bytes()
            .map(|b| b.to_ascii_lowercase())
            .cmp(r.bytes().map(|b| b.to_ascii_lowercase())),
        _ => canonical_cmp(left, right),
    }
}

///
/// TESTS
///
