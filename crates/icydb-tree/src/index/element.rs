//! Module: index::element
//! Responsibility: the three entry shapes a tree index can store.
//! Does not own: tree placement or duplicate policy.

use crate::{
    key::{
        HINT_NONE, KeyDef, compare_tuples, compare_tuples_at, compare_with_key,
        compare_with_key_at, key_hint, tuple_hint,
    },
    tuple::Tuple,
    value::Value,
};
use std::cmp::Ordering;

///
/// KeyData
///
/// Borrowed search key: zero or more leading key parts and, for hinted
/// entries, the hint of the first part. An empty key matches everything.
///

#[derive(Clone, Copy, Debug)]
pub struct KeyData<'a> {
    pub parts: &'a [Value],
    pub hint: u64,
}

impl<'a> KeyData<'a> {
    #[must_use]
    pub const fn new(parts: &'a [Value]) -> Self {
        Self {
            parts,
            hint: HINT_NONE,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

///
/// Element
///
/// Contract between the generic index engine and one entry shape.
///
/// `def` is always the comparator definition of the owning index, except
/// for equality-scoped iteration which compares against the declared key
/// definition.
///

pub trait Element: Clone + 'static {
    /// Shape label used in diagnostics.
    const NAME: &'static str;

    /// Entry for `tuple`; `position` selects the multikey array element
    /// and is ignored by single-entry shapes.
    fn new(tuple: Tuple, def: &KeyDef, position: u32) -> Self;

    /// Number of entries `tuple` contributes.
    fn fan_out(tuple: &Tuple, def: &KeyDef) -> u32 {
        let _ = (tuple, def);
        1
    }

    /// Search key view for `parts`.
    fn key_data<'a>(parts: &'a [Value], def: &KeyDef) -> KeyData<'a> {
        let _ = def;
        KeyData::new(parts)
    }

    fn compare(&self, other: &Self, def: &KeyDef) -> Ordering;

    fn compare_key(&self, key: &KeyData<'_>, def: &KeyDef) -> Ordering;

    fn tuple(&self) -> &Tuple;

    /// Built from the same record (and position), not merely order-equal.
    fn identical(&self, other: &Self) -> bool;
}

///
/// BasicElement
///

#[derive(Clone, Debug)]
pub struct BasicElement {
    tuple: Tuple,
}

impl Element for BasicElement {
    const NAME: &'static str = "basic";

    fn new(tuple: Tuple, _def: &KeyDef, _position: u32) -> Self {
        Self { tuple }
    }

    fn compare(&self, other: &Self, def: &KeyDef) -> Ordering {
        compare_tuples(&self.tuple, &other.tuple, def)
    }

    fn compare_key(&self, key: &KeyData<'_>, def: &KeyDef) -> Ordering {
        compare_with_key(&self.tuple, key.parts, def)
    }

    fn tuple(&self) -> &Tuple {
        &self.tuple
    }

    fn identical(&self, other: &Self) -> bool {
        self.tuple.same(&other.tuple)
    }
}

///
/// HintedElement
///
/// Record plus the hint of its leading key part. Hints are compared
/// first and the records only when the hints tie.
///

#[derive(Clone, Debug)]
pub struct HintedElement {
    tuple: Tuple,
    hint: u64,
}

impl HintedElement {
    #[must_use]
    pub const fn hint(&self) -> u64 {
        self.hint
    }
}

impl Element for HintedElement {
    const NAME: &'static str = "hinted";

    fn new(tuple: Tuple, def: &KeyDef, _position: u32) -> Self {
        let hint = tuple_hint(&tuple, def);

        Self { tuple, hint }
    }

    fn key_data<'a>(parts: &'a [Value], def: &KeyDef) -> KeyData<'a> {
        KeyData {
            parts,
            hint: key_hint(parts, def),
        }
    }

    fn compare(&self, other: &Self, def: &KeyDef) -> Ordering {
        self.hint
            .cmp(&other.hint)
            .then_with(|| compare_tuples(&self.tuple, &other.tuple, def))
    }

    fn compare_key(&self, key: &KeyData<'_>, def: &KeyDef) -> Ordering {
        if key.is_empty() {
            return Ordering::Equal;
        }

        self.hint
            .cmp(&key.hint)
            .then_with(|| compare_with_key(&self.tuple, key.parts, def))
    }

    fn tuple(&self) -> &Tuple {
        &self.tuple
    }

    fn identical(&self, other: &Self) -> bool {
        self.tuple.same(&other.tuple)
    }
}

///
/// MultikeyElement
///
/// Record plus the array position this entry stands for.
///

#[derive(Clone, Debug)]
pub struct MultikeyElement {
    tuple: Tuple,
    position: u32,
}

impl MultikeyElement {
    #[must_use]
    pub const fn position(&self) -> u32 {
        self.position
    }
}

impl Element for MultikeyElement {
    const NAME: &'static str = "multikey";

    fn new(tuple: Tuple, _def: &KeyDef, position: u32) -> Self {
        Self { tuple, position }
    }

    fn fan_out(tuple: &Tuple, def: &KeyDef) -> u32 {
        def.multikey_count(tuple)
    }

    fn compare(&self, other: &Self, def: &KeyDef) -> Ordering {
        compare_tuples_at(
            &self.tuple,
            self.position,
            &other.tuple,
            other.position,
            def,
        )
    }

    fn compare_key(&self, key: &KeyData<'_>, def: &KeyDef) -> Ordering {
        compare_with_key_at(&self.tuple, self.position, key.parts, def)
    }

    fn tuple(&self) -> &Tuple {
        &self.tuple
    }

    fn identical(&self, other: &Self) -> bool {
        self.tuple.same(&other.tuple) && self.position == other.position
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{FieldType, KeyPart};

    fn tuple(fields: Vec<Value>) -> Tuple {
        Tuple::new(fields).unwrap()
    }

    #[test]
    fn hinted_compare_short_circuits_on_hints() {
        let def = KeyDef::new(vec![KeyPart::new(0, FieldType::Integer)]).unwrap();
        let low = HintedElement::new(tuple(vec![Value::Int(-5)]), &def, 0);
        let high = HintedElement::new(tuple(vec![Value::Uint(5)]), &def, 0);

        assert!(low.hint() < high.hint());
        assert_eq!(low.compare(&high, &def), Ordering::Less);

        let key = [Value::Uint(5)];
        let probe = HintedElement::key_data(&key, &def);
        assert_eq!(high.compare_key(&probe, &def), Ordering::Equal);
        assert_eq!(low.compare_key(&probe, &def), Ordering::Less);
        assert_eq!(low.compare_key(&KeyData::new(&[]), &def), Ordering::Equal);
    }

    #[test]
    fn identity_is_per_record_and_position() {
        let def = KeyDef::new(vec![KeyPart::new(1, FieldType::Unsigned).multikey()]).unwrap();
        let t = tuple(vec![
            Value::Uint(1),
            Value::Array(vec![Value::Uint(4), Value::Uint(4)]),
        ]);
        let first = MultikeyElement::new(t.clone(), &def, 0);
        let second = MultikeyElement::new(t.clone(), &def, 1);

        assert_eq!(MultikeyElement::fan_out(&t, &def), 2);
        assert_eq!(first.compare(&second, &def), Ordering::Equal);
        assert!(!first.identical(&second));
        assert!(first.identical(&first.clone()));

        let copy = tuple(vec![Value::Uint(1)]);
        let a = BasicElement::new(copy.clone(), &def, 0);
        let b = BasicElement::new(tuple(vec![Value::Uint(1)]), &def, 0);
        assert!(!a.identical(&b));
        assert_eq!(BasicElement::fan_out(&copy, &def), 1);
    }
}
