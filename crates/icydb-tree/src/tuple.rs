//! Module: tuple
//! Responsibility: shared, immutable records stored by reference in indexes.
//! Does not own: field typing rules (see `key::KeyDef::validate_tuple`).

use crate::{
    error::InternalError,
    serialize::{deserialize, serialize},
    value::Value,
};
use std::{fmt, rc::Rc};

///
/// Tuple
///
/// Cheap-clone handle over an immutable record.
///
/// Cloning takes one strong reference and dropping releases it, so every
/// index entry, iterator position and reclaim batch that holds a `Tuple`
/// keeps the record alive for exactly as long as it needs it.
///

#[derive(Clone)]
pub struct Tuple(Rc<TupleData>);

struct TupleData {
    fields: Vec<Value>,
    data: Vec<u8>,
}

impl Tuple {
    /// Build a record from its fields, encoding the payload once.
    pub fn new(fields: Vec<Value>) -> Result<Self, InternalError> {
        let data = serialize(&fields)?;

        Ok(Self(Rc::new(TupleData { fields, data })))
    }

    /// Rebuild a record from a payload produced by [`Tuple::data`].
    pub fn decode(data: &[u8]) -> Result<Self, InternalError> {
        let fields: Vec<Value> = deserialize(data)?;

        Ok(Self(Rc::new(TupleData {
            fields,
            data: data.to_vec(),
        })))
    }

    /// Field at zero-based `fieldno`, or `None` past the end of the record.
    #[must_use]
    pub fn field(&self, fieldno: u32) -> Option<&Value> {
        self.0.fields.get(fieldno as usize)
    }

    #[must_use]
    pub fn fields(&self) -> &[Value] {
        &self.0.fields
    }

    /// Encoded payload bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.0.data
    }

    /// Identity: both handles refer to the same record.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live strong references to this record.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tuple").field(&self.0.fields).finish()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_takes_and_drop_releases_a_reference() {
        let t = Tuple::new(vec![Value::Uint(1)]).unwrap();
        assert_eq!(t.ref_count(), 1);

        let held = t.clone();
        assert_eq!(t.ref_count(), 2);
        assert!(held.same(&t));

        drop(held);
        assert_eq!(t.ref_count(), 1);
    }

    #[test]
    fn equal_fields_are_not_the_same_record() {
        let a = Tuple::new(vec![Value::Uint(1)]).unwrap();
        let b = Tuple::new(vec![Value::Uint(1)]).unwrap();

        assert!(!a.same(&b));
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn payload_decodes_back_to_fields() {
        let t = Tuple::new(vec![
            Value::Uint(7),
            Value::from("seven"),
            Value::Array(vec![Value::Int(-1), Value::Nil]),
        ])
        .unwrap();

        let decoded = Tuple::decode(t.data()).unwrap();
        assert_eq!(decoded.fields(), t.fields());
        assert_eq!(decoded.field(1), Some(&Value::from("seven")));
        assert_eq!(decoded.field(3), None);
    }

    #[test]
    fn garbage_payload_is_reported_as_corruption() {
        let err = Tuple::decode(&[0xff, 0x00, 0x13]).unwrap_err();

        assert_eq!(err.class, crate::error::ErrorClass::Corruption);
    }
}
