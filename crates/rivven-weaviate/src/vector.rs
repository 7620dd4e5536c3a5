//! Embedding vector decoding
//!
//! Upstream stages attach embeddings to records as the `weaviate.vector`
//! metadata string in one of two encodings, detected in this order:
//!
//! 1. **Base64** of little-endian `f32` values (`AACAPwAAIMA=` is
//!    `[1.0, -2.5]`). A trailing group shorter than four bytes is dropped.
//! 2. **Comma-separated decimals** (`0.12, 0.5, 1e-3`), read as a single
//!    CSV record. A field may be double-quoted when the quote opens the
//!    field; whitespace around unquoted fields is ignored.
//!
//! Anything else is rejected with [`ConnectorError::UnsupportedVectorFormat`].
//! A bare number without a comma that happens to be valid base64 (`1234`)
//! is decoded as base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{ConnectorError, Result};

/// Decode an embedding vector from its metadata string.
///
/// Callers skip empty strings; a present vector is never empty.
pub fn decode_vector(input: &str) -> Result<Vec<f32>> {
    let trimmed = input.trim();

    if let Ok(bytes) = STANDARD.decode(trimmed) {
        return from_le_bytes(&bytes);
    }

    if trimmed.contains(',') {
        return decode_csv(trimmed);
    }

    Err(ConnectorError::UnsupportedVectorFormat(input.to_string()))
}

fn from_le_bytes(bytes: &[u8]) -> Result<Vec<f32>> {
    let vector: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    if vector.is_empty() {
        return Err(ConnectorError::VectorDecode(format!(
            "base64 vector holds {} byte(s), need at least 4 per float",
            bytes.len()
        )));
    }
    if let Some(i) = vector.iter().position(|v| !v.is_finite()) {
        return Err(ConnectorError::VectorDecode(format!(
            "base64 vector element [{}] is not a finite number",
            i
        )));
    }
    Ok(vector)
}

fn decode_csv(input: &str) -> Result<Vec<f32>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(input.as_bytes());
    let mut records = reader.records();

    let record = match records.next() {
        Some(record) => record
            .map_err(|e| ConnectorError::VectorDecode(format!("invalid CSV vector: {}", e)))?,
        None => return Err(ConnectorError::VectorDecode("empty CSV vector".to_string())),
    };
    if records.next().is_some() {
        return Err(ConnectorError::VectorDecode(
            "vector must be a single CSV record".to_string(),
        ));
    }

    // Fields are trimmed here rather than by the reader so errors quote the raw token.
    record
        .iter()
        .map(|field| {
            let value: f32 = field.trim().parse().map_err(|e| {
                ConnectorError::VectorDecode(format!("cannot parse {:?}: {}", field, e))
            })?;
            if !value.is_finite() {
                return Err(ConnectorError::VectorDecode(format!(
                    "cannot parse {:?}: not a finite number",
                    field
                )));
            }
            Ok(value)
        })
        .collect()
}
