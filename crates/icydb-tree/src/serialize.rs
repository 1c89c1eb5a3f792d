use crate::error::InternalError;
use serde::{Serialize, de::DeserializeOwned};
use serde_cbor::{from_slice, to_vec};
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error as ThisError;

/// Upper bound on a single encoded record payload.
pub const MAX_TUPLE_BYTES: usize = 1024 * 1024;

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("deserialize error: {0}")]
    Deserialize(String),
}

impl From<SerializeError> for InternalError {
    fn from(err: SerializeError) -> Self {
        match err {
            SerializeError::Serialize(_) => Self::serialize_internal(err.to_string()),
            SerializeError::Deserialize(_) => Self::serialize_corruption(err.to_string()),
        }
    }
}

/// Serialize a value into CBOR bytes.
pub fn serialize<T>(ty: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    let bytes = to_vec(ty).map_err(|e| SerializeError::Serialize(e.to_string()))?;
    if bytes.len() > MAX_TUPLE_BYTES {
        return Err(SerializeError::Serialize(format!(
            "payload of {} bytes exceeds maximum allowed size",
            bytes.len()
        )));
    }

    Ok(bytes)
}

/// Deserialize CBOR bytes produced by [`serialize`].
///
/// Input size is bounded before decode, and any panic raised by the decoder
/// is reported as a deserialize error.
pub fn deserialize<T>(bytes: &[u8]) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    if bytes.len() > MAX_TUPLE_BYTES {
        return Err(SerializeError::Deserialize(
            "payload exceeds maximum allowed size".into(),
        ));
    }

    let result = catch_unwind(AssertUnwindSafe(|| from_slice(bytes)));

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(SerializeError::Deserialize(err.to_string())),
        Err(_) => Err(SerializeError::Deserialize(
            "panic during CBOR deserialization".into(),
        )),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_rejects_garbage() {
        let err = deserialize::<Vec<u64>>(&[0xff, 0x00, 0x13]).unwrap_err();

        assert!(matches!(err, SerializeError::Deserialize(_)));
    }

    #[test]
    fn deserialize_rejects_oversized_payload() {
        let bytes = vec![0u8; MAX_TUPLE_BYTES + 1];
        let err = deserialize::<Vec<u8>>(&bytes).unwrap_err();

        assert!(err.to_string().contains("maximum allowed size"));
    }
}
