//! CBOR encoding of handshake records.
//!
//! A record must fill its buffer exactly: bytes left over after the decoded
//! value mean the peer sent something other than what was expected.

use serde::{de::DeserializeOwned, Serialize};

use crate::TransportError;

/// Encode `value` as one CBOR item.
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out)
        .map_err(|e| TransportError::Serialization(format!("encoding record: {e}")))?;
    Ok(out)
}

/// Decode exactly one CBOR item from `data`.
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, TransportError> {
    let mut rest = data;
    let value = ciborium::from_reader(&mut rest)
        .map_err(|e| TransportError::Deserialization(format!("decoding record: {e}")))?;
    if !rest.is_empty() {
        return Err(TransportError::Deserialization(format!(
            "{} trailing bytes after record",
            rest.len()
        )));
    }
    Ok(value)
}
