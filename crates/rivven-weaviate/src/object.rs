//! Record to Weaviate object translation
//!
//! # Object identity
//!
//! With `generateUUID` disabled the record key is used verbatim (as UTF-8
//! text). With it enabled the ID is the version 3 (MD5) UUID of the key bytes
//! in the OID namespace, so the same key always maps to the same object.
//!
//! # Class resolution
//!
//! Inserts and updates go to the class named by the `weaviate.class`
//! metadata entry when it is non-empty, otherwise to the configured class.
//! Deletes always use the configured class.
//!
//! # Vectors
//!
//! A non-empty `weaviate.vector` metadata entry is decoded with
//! [`decode_vector`]; without it no vector is sent and Weaviate's vectorizer
//! (if any) takes over.

use serde::Serialize;
use uuid::Uuid;

use crate::config::DestinationConfig;
use crate::error::{ConnectorError, Result};
use crate::traits::{ChangeRecord, Data};
use crate::vector::decode_vector;

/// Metadata key overriding the target class
pub const METADATA_CLASS: &str = "weaviate.class";

/// Metadata key carrying an encoded embedding vector
pub const METADATA_VECTOR: &str = "weaviate.vector";

/// Object sent to Weaviate for one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetObject {
    /// Object ID
    pub id: String,
    /// Target class
    pub class: String,
    /// Object properties (empty for deletes)
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Explicit embedding, if the record carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Compute the object ID for a record key.
pub fn object_id(key: &[u8], generate_uuid: bool) -> String {
    if generate_uuid {
        Uuid::new_v3(&Uuid::NAMESPACE_OID, key).to_string()
    } else {
        String::from_utf8_lossy(key).into_owned()
    }
}

/// Builds [`TargetObject`]s from records using the destination config.
#[derive(Debug, Clone, Copy)]
pub struct ObjectBuilder<'a> {
    config: &'a DestinationConfig,
}

impl<'a> ObjectBuilder<'a> {
    /// Create a builder borrowing the destination configuration
    pub fn new(config: &'a DestinationConfig) -> Self {
        Self { config }
    }

    /// Object for an insert or update.
    pub fn build(&self, record: &ChangeRecord) -> Result<TargetObject> {
        let properties = properties(record)?;
        let vector = match record.metadata_value(METADATA_VECTOR) {
            Some(encoded) => Some(decode_vector(encoded)?),
            None => None,
        };

        Ok(TargetObject {
            id: self.id(record),
            class: self.class(record).to_string(),
            properties,
            vector,
        })
    }

    /// Minimal object identifying the target of a delete.
    pub fn delete_reference(&self, record: &ChangeRecord) -> TargetObject {
        TargetObject {
            id: self.id(record),
            class: self.config.class.clone(),
            properties: serde_json::Map::new(),
            vector: None,
        }
    }

    /// Object ID for the record key
    pub fn id(&self, record: &ChangeRecord) -> String {
        object_id(&record.key.bytes(), self.config.generate_uuid)
    }

    /// Target class for inserts and updates
    pub fn class<'r>(&self, record: &'r ChangeRecord) -> &'r str
    where
        'a: 'r,
    {
        record
            .metadata_value(METADATA_CLASS)
            .unwrap_or(self.config.class.as_str())
    }
}

/// Decode `payload.after` into a property map.
fn properties(record: &ChangeRecord) -> Result<serde_json::Map<String, serde_json::Value>> {
    let after = match &record.payload.after {
        Some(data) if !data.is_empty() => data,
        _ => return Err(ConnectorError::PayloadDecode("empty payload".to_string())),
    };

    match after {
        Data::Structured(map) => Ok(map.clone()),
        Data::Raw(raw) => serde_json::from_slice(raw).map_err(|e| {
            ConnectorError::PayloadDecode(format!(
                "failed to unmarshal payload to structured data: {}",
                e
            ))
        }),
    }
}
