//! Module: key
//! Responsibility: key definitions, record/key comparators and hints.
//! Does not own: element layout or tree ordering (see `index::element`).

mod compare;
mod hint;

pub use compare::{compare_tuples, compare_tuples_at, compare_with_key, compare_with_key_at};
pub use hint::{HINT_NONE, key_hint, tuple_hint, value_hint};

use crate::{error::InternalError, tuple::Tuple, value::Value};
use std::fmt;

///
/// FieldType
///
/// Declared type of an indexed field.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldType {
    Unsigned,
    Integer,
    String,
    Boolean,
    Varbinary,
    Scalar,
    Any,
}

impl FieldType {
    /// Whether a non-nil value is acceptable for this type.
    #[must_use]
    pub const fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Unsigned => matches!(value, Value::Uint(_)),
            Self::Integer => matches!(value, Value::Uint(_) | Value::Int(_)),
            Self::String => matches!(value, Value::Str(_)),
            Self::Boolean => matches!(value, Value::Bool(_)),
            Self::Varbinary => matches!(value, Value::Bin(_)),
            Self::Scalar => !matches!(value, Value::Nil | Value::Array(_)),
            Self::Any => !matches!(value, Value::Nil),
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Varbinary => "varbinary",
            Self::Scalar => "scalar",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

///
/// Collation
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Collation {
    #[default]
    Binary,
    AsciiCaseInsensitive,
}

///
/// KeyPart
///
/// One indexed field. A multikey part indexes every element of the array
/// stored at `fieldno`, so `field_type` describes the elements.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyPart {
    pub fieldno: u32,
    pub field_type: FieldType,
    pub is_nullable: bool,
    pub collation: Collation,
    pub is_multikey: bool,
}

impl KeyPart {
    #[must_use]
    pub const fn new(fieldno: u32, field_type: FieldType) -> Self {
        Self {
            fieldno,
            field_type,
            is_nullable: false,
            collation: Collation::Binary,
            is_multikey: false,
        }
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    #[must_use]
    pub const fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    #[must_use]
    pub const fn multikey(mut self) -> Self {
        self.is_multikey = true;
        self
    }
}

///
/// KeyDef
///
/// Ordered list of key parts.
///
/// `unique_part_count` is the prefix that decides uniqueness: comparisons
/// that reach it without meeting a null stop there, so an extended
/// definition of a unique nullable index still detects duplicates on its
/// declared parts while letting null keys coexist.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyDef {
    parts: Vec<KeyPart>,
    unique_part_count: usize,
}

impl KeyDef {
    pub fn new(parts: Vec<KeyPart>) -> Result<Self, InternalError> {
        if parts.is_empty() {
            return Err(InternalError::key_unsupported(
                "key definition must have at least one part",
            ));
        }
        if parts.iter().filter(|p| p.is_multikey).count() > 1 {
            return Err(InternalError::key_unsupported(
                "key definition may have at most one multikey part",
            ));
        }
        if let Some(part) = parts
            .iter()
            .find(|p| p.collation != Collation::Binary && p.field_type != FieldType::String)
        {
            return Err(InternalError::key_unsupported(format!(
                "collation is only supported for string parts (field {})",
                part.fieldno
            )));
        }

        let unique_part_count = parts.len();

        Ok(Self {
            parts,
            unique_part_count,
        })
    }

    #[must_use]
    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub const fn unique_part_count(&self) -> usize {
        self.unique_part_count
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.parts.iter().any(|p| p.is_nullable)
    }

    #[must_use]
    pub fn is_multikey(&self) -> bool {
        self.multikey_part().is_some()
    }

    #[must_use]
    pub fn multikey_part(&self) -> Option<&KeyPart> {
        self.parts.iter().find(|p| p.is_multikey)
    }

    /// Extend this definition with the primary key parts it lacks.
    ///
    /// For a unique index the declared parts remain the uniqueness prefix;
    /// otherwise every merged part takes part in uniqueness.
    #[must_use]
    pub fn merge(&self, pk: &Self, unique: bool) -> Self {
        let mut parts = self.parts.clone();
        for part in &pk.parts {
            if !self.parts.iter().any(|p| p.fieldno == part.fieldno) {
                parts.push(part.clone());
            }
        }

        let unique_part_count = if unique {
            self.parts.len()
        } else {
            parts.len()
        };

        Self {
            parts,
            unique_part_count,
        }
    }

    /// Check that every indexed field of `tuple` matches its part.
    pub fn validate_tuple(&self, tuple: &Tuple, index: &str) -> Result<(), InternalError> {
        for part in &self.parts {
            let field = tuple.field(part.fieldno).filter(|v| !v.is_nil());

            let Some(value) = field else {
                if part.is_nullable {
                    continue;
                }
                return Err(InternalError::field_type(
                    index,
                    part.fieldno,
                    part.field_type.label(),
                    "nil",
                ));
            };

            if part.is_multikey {
                let items = value.as_array().ok_or_else(|| {
                    InternalError::field_type(index, part.fieldno, "array", value.kind())
                })?;
                for item in items {
                    check_value(part, item, index)?;
                }
            } else {
                check_value(part, value, index)?;
            }
        }

        Ok(())
    }

    /// Check a search key: arity and per-part types.
    pub fn validate_key(&self, key: &[Value], index: &str) -> Result<(), InternalError> {
        if key.len() > self.parts.len() {
            return Err(InternalError::key_part_count(
                index,
                self.parts.len(),
                key.len(),
            ));
        }

        for (part, value) in self.parts.iter().zip(key) {
            check_value(part, value, index)?;
        }

        Ok(())
    }

    /// Number of index entries `tuple` contributes under this definition.
    ///
    /// Always 1 for plain definitions; for multikey definitions it is the
    /// length of the indexed array, 0 when the array is empty or absent.
    #[must_use]
    pub fn multikey_count(&self, tuple: &Tuple) -> u32 {
        let Some(part) = self.multikey_part() else {
            return 1;
        };

        tuple
            .field(part.fieldno)
            .and_then(Value::as_array)
            .map_or(0, |items| u32::try_from(items.len()).unwrap_or(u32::MAX))
    }
}

fn check_value(part: &KeyPart, value: &Value, index: &str) -> Result<(), InternalError> {
    if value.is_nil() {
        if part.is_nullable {
            return Ok(());
        }
    } else if part.field_type.accepts(value) {
        return Ok(());
    }

    Err(InternalError::field_type(
        index,
        part.fieldno,
        part.field_type.label(),
        value.kind(),
    ))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(fields: Vec<Value>) -> Tuple {
        Tuple::new(fields).unwrap()
    }

    #[test]
    fn merge_appends_missing_pk_parts_only() {
        let pk = KeyDef::new(vec![KeyPart::new(0, FieldType::Unsigned)]).unwrap();
        let sk = KeyDef::new(vec![
            KeyPart::new(1, FieldType::String),
            KeyPart::new(0, FieldType::Unsigned),
        ])
        .unwrap();
        assert_eq!(sk.merge(&pk, false).part_count(), 2);

        let sk = KeyDef::new(vec![KeyPart::new(2, FieldType::String).nullable()]).unwrap();
        let merged = sk.merge(&pk, true);
        assert_eq!(merged.part_count(), 2);
        assert_eq!(merged.unique_part_count(), 1);
        assert_eq!(sk.merge(&pk, false).unique_part_count(), 2);
    }

    #[test]
    fn definitions_reject_two_multikey_parts_and_stray_collations() {
        let err = KeyDef::new(vec![
            KeyPart::new(1, FieldType::Unsigned).multikey(),
            KeyPart::new(2, FieldType::Unsigned).multikey(),
        ])
        .unwrap_err();
        assert!(err.message.contains("multikey"));

        let err = KeyDef::new(vec![
            KeyPart::new(1, FieldType::Unsigned).with_collation(Collation::AsciiCaseInsensitive),
        ])
        .unwrap_err();
        assert!(err.is_unsupported());

        assert!(KeyDef::new(vec![]).is_err());
    }

    #[test]
    fn validate_tuple_checks_types_and_nulls() {
        let def = KeyDef::new(vec![
            KeyPart::new(0, FieldType::Unsigned),
            KeyPart::new(1, FieldType::String).nullable(),
        ])
        .unwrap();

        assert!(def.validate_tuple(&tuple(vec![Value::Uint(1)]), "sk").is_ok());
        assert!(
            def.validate_tuple(&tuple(vec![Value::Uint(1), Value::Nil]), "sk")
                .is_ok()
        );

        let err = def
            .validate_tuple(&tuple(vec![Value::Int(-1)]), "sk")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "field 0 of index 'sk' type mismatch: expected unsigned, got integer"
        );

        let err = def
            .validate_tuple(&tuple(vec![Value::Nil, Value::from("a")]), "sk")
            .unwrap_err();
        assert!(err.message.contains("got nil"));
    }

    #[test]
    fn validate_tuple_checks_multikey_elements() {
        let def = KeyDef::new(vec![KeyPart::new(1, FieldType::Unsigned).multikey()]).unwrap();

        let ok = tuple(vec![
            Value::Uint(1),
            Value::Array(vec![Value::Uint(2), Value::Uint(3)]),
        ]);
        assert!(def.validate_tuple(&ok, "mk").is_ok());
        assert_eq!(def.multikey_count(&ok), 2);

        let not_array = tuple(vec![Value::Uint(1), Value::Uint(2)]);
        assert!(def.validate_tuple(&not_array, "mk").is_err());

        let bad_item = tuple(vec![
            Value::Uint(1),
            Value::Array(vec![Value::from("x")]),
        ]);
        assert!(def.validate_tuple(&bad_item, "mk").is_err());
    }

    #[test]
    fn absent_nullable_multikey_array_contributes_nothing() {
        let def = KeyDef::new(vec![
            KeyPart::new(1, FieldType::Unsigned).multikey().nullable(),
        ])
        .unwrap();
        let t = tuple(vec![Value::Uint(1)]);

        assert!(def.validate_tuple(&t, "mk").is_ok());
        assert_eq!(def.multikey_count(&t), 0);
    }

    #[test]
    fn validate_key_rejects_long_keys_and_wrong_types() {
        let def = KeyDef::new(vec![KeyPart::new(0, FieldType::Unsigned)]).unwrap();

        let err = def
            .validate_key(&[Value::Uint(1), Value::Uint(2)], "pk")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid key part count for index 'pk' (expected 1, got 2)"
        );
        assert!(def.validate_key(&[Value::from("a")], "pk").is_err());
        assert!(def.validate_key(&[], "pk").is_ok());
    }
}
