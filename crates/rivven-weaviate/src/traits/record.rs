//! Change records delivered by the pipeline runtime

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of change carried by a record.
///
/// Unknown kinds are kept verbatim in [`Operation::Other`] so the sink can
/// reject them with a routing error instead of failing at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    /// A new entity was created
    Create,
    /// An existing entity changed
    Update,
    /// An entity was removed
    Delete,
    /// A row read during an initial snapshot
    Snapshot,
    /// Anything the sink does not know how to handle
    Other(String),
}

impl Operation {
    /// Wire name of the operation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Snapshot => "snapshot",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Operation {
    fn from(value: &str) -> Self {
        match value {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "snapshot" => Self::Snapshot,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Record key or payload data.
///
/// Upstream stages hand over either raw bytes (usually JSON text) or an
/// already structured JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// Raw bytes
    Raw(Vec<u8>),
    /// Structured JSON object
    Structured(serde_json::Map<String, serde_json::Value>),
}

impl Data {
    /// Byte representation. Structured data is encoded as JSON.
    pub fn bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Raw(raw) => Cow::Borrowed(raw),
            Self::Structured(map) => Cow::Owned(serde_json::to_vec(map).unwrap_or_default()),
        }
    }

    /// True for empty raw bytes. Structured data always encodes to at least `{}`.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Raw(raw) => raw.is_empty(),
            Self::Structured(_) => false,
        }
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Self::Raw(value.as_bytes().to_vec())
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Self::Raw(value.into_bytes())
    }
}

impl From<Vec<u8>> for Data {
    fn from(value: Vec<u8>) -> Self {
        Self::Raw(value)
    }
}

impl From<&[u8]> for Data {
    fn from(value: &[u8]) -> Self {
        Self::Raw(value.to_vec())
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Data {
    fn from(value: serde_json::Map<String, serde_json::Value>) -> Self {
        Self::Structured(value)
    }
}

impl From<serde_json::Value> for Data {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self::Structured(map),
            other => Self::Raw(serde_json::to_vec(&other).unwrap_or_default()),
        }
    }
}

/// Entity state before and after the change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Change {
    /// State before the change (updates and deletes, when the source has it)
    pub before: Option<Data>,
    /// State after the change (absent for deletes)
    pub after: Option<Data>,
}

/// A single change record.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Opaque source position, used for logging only
    pub position: Vec<u8>,
    /// Kind of change
    pub operation: Operation,
    /// String metadata, including sink overrides such as `weaviate.class`
    pub metadata: BTreeMap<String, String>,
    /// Identity of the logical entity (may be empty)
    pub key: Data,
    /// Before/after state
    pub payload: Change,
}

impl ChangeRecord {
    /// Create a record with the given operation and no payload
    pub fn new(operation: impl Into<Operation>, key: impl Into<Data>) -> Self {
        Self {
            position: Vec::new(),
            operation: operation.into(),
            metadata: BTreeMap::new(),
            key: key.into(),
            payload: Change::default(),
        }
    }

    /// Create a `create` record
    pub fn create(key: impl Into<Data>, after: impl Into<Data>) -> Self {
        Self::new(Operation::Create, key).with_after(after)
    }

    /// Create a `snapshot` record
    pub fn snapshot(key: impl Into<Data>, after: impl Into<Data>) -> Self {
        Self::new(Operation::Snapshot, key).with_after(after)
    }

    /// Create an `update` record
    pub fn update(key: impl Into<Data>, before: Option<Data>, after: impl Into<Data>) -> Self {
        let mut record = Self::new(Operation::Update, key).with_after(after);
        record.payload.before = before;
        record
    }

    /// Create a `delete` record
    pub fn delete(key: impl Into<Data>, before: Option<Data>) -> Self {
        let mut record = Self::new(Operation::Delete, key);
        record.payload.before = before;
        record
    }

    /// Set the after-state (builder-style)
    pub fn with_after(mut self, after: impl Into<Data>) -> Self {
        self.payload.after = Some(after.into());
        self
    }

    /// Add a metadata entry (builder-style)
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the source position (builder-style)
    pub fn with_position(mut self, position: impl Into<Vec<u8>>) -> Self {
        self.position = position.into();
        self
    }

    /// Metadata value for `key`, if present and non-empty
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}
