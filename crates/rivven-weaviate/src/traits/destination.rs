//! Destination connector trait

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::record::ChangeRecord;
use crate::error::{BatchError, Result};

/// Static description of a destination connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorInfo {
    /// Connector type identifier
    pub name: String,
    /// Semantic version
    pub version: String,
    /// One-line summary
    pub summary: String,
}

impl ConnectorInfo {
    /// Create a new connector description
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            summary: summary.into(),
        }
    }
}

/// Trait for destination connectors
///
/// The host calls `configure` once, then `open`, then `write` any number of
/// times, and finally `teardown`. Calls never overlap.
///
/// # Example
///
/// ```rust,ignore
/// use rivven_weaviate::prelude::*;
///
/// let mut destination = WeaviateDestination::new();
/// destination.configure(&raw_config)?;
/// destination.open().await?;
///
/// let written = destination.write(&records, &CancellationToken::new()).await?;
/// destination.teardown().await?;
/// ```
#[async_trait]
pub trait Destination: Send + Sync {
    /// Return the connector description
    fn info() -> ConnectorInfo
    where
        Self: Sized;

    /// Parse and validate the host's flat configuration map
    fn configure(&mut self, raw: &HashMap<String, String>) -> Result<()>;

    /// Connect to the backing store
    async fn open(&mut self) -> Result<()>;

    /// Apply records in order.
    ///
    /// Returns the number of records written. On failure the error carries
    /// the count of records written before the failing one; later records
    /// are not attempted.
    async fn write(
        &self,
        records: &[ChangeRecord],
        cancel: &CancellationToken,
    ) -> std::result::Result<usize, BatchError>;

    /// Release resources. Safe to call without a prior `open`.
    async fn teardown(&mut self) -> Result<()>;
}
