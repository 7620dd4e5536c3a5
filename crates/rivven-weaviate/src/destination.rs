//! Weaviate destination
//!
//! Routes change records to Weaviate object operations:
//!
//! | Operation            | Store call | Object                                  |
//! |----------------------|------------|-----------------------------------------|
//! | `create`, `snapshot` | insert     | properties, class override, vector      |
//! | `update`             | update     | properties, class override (no vector)  |
//! | `delete`             | delete     | id and configured class only            |
//! | anything else        | -          | routing error                           |
//!
//! Records are applied one at a time, in order. The first failure stops the
//! batch; the returned [`BatchError`] reports how many records were written
//! before it. Nothing is retried here, the host decides about redelivery
//! (see [`ConnectorError::is_retryable`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use rivven_weaviate::prelude::*;
//!
//! let mut destination = WeaviateDestination::new();
//! destination.configure(&HashMap::from([
//!     ("endpoint".to_string(), "localhost:8080".to_string()),
//!     ("scheme".to_string(), "http".to_string()),
//!     ("class".to_string(), "Products".to_string()),
//! ]))?;
//! destination.open().await?;
//! ```

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::client::{StoreClient, WeaviateClient};
use crate::config::DestinationConfig;
use crate::error::{BatchError, ConnectorError, Result};
use crate::object::ObjectBuilder;
use crate::traits::{ChangeRecord, ConnectorInfo, Destination, Operation};

/// Destination writing change records into a Weaviate class
#[derive(Debug)]
pub struct WeaviateDestination<C = WeaviateClient> {
    config: Option<DestinationConfig>,
    client: C,
    open: bool,
}

impl WeaviateDestination<WeaviateClient> {
    /// Create a destination backed by the REST client
    pub fn new() -> Self {
        Self::with_client(WeaviateClient::new())
    }
}

impl Default for WeaviateDestination<WeaviateClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: StoreClient> WeaviateDestination<C> {
    /// Create a destination backed by a custom store client
    pub fn with_client(client: C) -> Self {
        Self {
            config: None,
            client,
            open: false,
        }
    }

    /// Validated configuration, once `configure` has succeeded
    pub fn config(&self) -> Option<&DestinationConfig> {
        self.config.as_ref()
    }

    /// The underlying store client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Whether `open` has completed and `teardown` has not run since
    pub fn is_open(&self) -> bool {
        self.open
    }

    async fn route(
        &self,
        builder: &ObjectBuilder<'_>,
        index: usize,
        record: &ChangeRecord,
    ) -> Result<()> {
        match &record.operation {
            Operation::Create | Operation::Snapshot => {
                let object = builder.build(record)?;
                debug!(
                    index,
                    operation = %record.operation,
                    id = %object.id,
                    class = %object.class,
                    vector = object.vector.is_some(),
                    "Inserting record"
                );
                self.client.insert(&object).await
            }
            Operation::Update => {
                let object = builder.build(record)?;
                debug!(
                    index,
                    operation = %record.operation,
                    id = %object.id,
                    class = %object.class,
                    "Updating record"
                );
                self.client.update(&object).await
            }
            Operation::Delete => {
                let object = builder.delete_reference(record);
                debug!(
                    index,
                    operation = %record.operation,
                    id = %object.id,
                    class = %object.class,
                    "Deleting record"
                );
                self.client.delete(&object).await
            }
            Operation::Other(kind) => Err(ConnectorError::Routing(kind.clone())),
        }
    }
}

#[async_trait]
impl<C: StoreClient> Destination for WeaviateDestination<C> {
    fn info() -> ConnectorInfo {
        ConnectorInfo::new(
            "weaviate",
            env!("CARGO_PKG_VERSION"),
            "Writes change records as objects into a Weaviate class",
        )
    }

    fn configure(&mut self, raw: &HashMap<String, String>) -> Result<()> {
        let config = DestinationConfig::from_raw(raw)?;
        info!(
            endpoint = %config.endpoint,
            scheme = %config.scheme,
            class = %config.class,
            auth = %config.auth.mechanism,
            generate_uuid = config.generate_uuid,
            module_header = config.module_header.is_set(),
            "Configured Weaviate destination"
        );
        self.config = Some(config);
        Ok(())
    }

    async fn open(&mut self) -> Result<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ConnectorError::config("destination opened before configure"))?;

        if let Err(e) = self.client.open(&config.client_config()).await {
            error!(endpoint = %config.endpoint, error = %e, "Failed to open Weaviate destination");
            return Err(e);
        }
        self.open = true;

        info!(
            endpoint = %config.endpoint,
            class = %config.class,
            "Weaviate destination opened"
        );
        Ok(())
    }

    async fn write(
        &self,
        records: &[ChangeRecord],
        cancel: &CancellationToken,
    ) -> std::result::Result<usize, BatchError> {
        let Some(first) = records.first() else {
            return Ok(0);
        };
        let config = match (&self.config, self.open) {
            (Some(config), true) => config,
            _ => {
                return Err(BatchError::new(
                    0,
                    first.operation.clone(),
                    ConnectorError::NotOpen,
                ))
            }
        };

        let builder = ObjectBuilder::new(config);
        let batch_start = Instant::now();

        for (index, record) in records.iter().enumerate() {
            let routed = tokio::select! {
                biased;

                _ = cancel.cancelled() => Err(ConnectorError::Cancelled),
                result = self.route(&builder, index, record) => result,
            };

            if let Err(e) = routed {
                counter!("weaviate.records.failed").increment(1);
                counter!("weaviate.batches.failed").increment(1);
                error!(
                    index,
                    written = index,
                    operation = %record.operation,
                    position = %String::from_utf8_lossy(&record.position),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Failed to write record"
                );
                return Err(BatchError::new(index, record.operation.clone(), e));
            }
            counter!("weaviate.records.written").increment(1);
        }

        counter!("weaviate.batches.success").increment(1);
        histogram!("weaviate.batch.duration_ms").record(batch_start.elapsed().as_millis() as f64);
        debug!(
            records = records.len(),
            elapsed_ms = batch_start.elapsed().as_millis() as u64,
            "Batch written"
        );
        Ok(records.len())
    }

    async fn teardown(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.client.close().await?;
        info!("Weaviate destination closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStoreClient;

    #[test]
    fn test_info() {
        let info = WeaviateDestination::<WeaviateClient>::info();
        assert_eq!(info.name, "weaviate");
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_open_before_configure() {
        let mut destination = WeaviateDestination::with_client(MockStoreClient::new());
        let err = destination.open().await.unwrap_err();
        assert!(matches!(err, ConnectorError::Config(_)));
        assert!(!destination.is_open());
    }

    #[tokio::test]
    async fn test_configure_rejects_invalid() {
        let mut destination = WeaviateDestination::with_client(MockStoreClient::new());
        let raw = HashMap::from([("endpoint".to_string(), "localhost".to_string())]);
        assert!(destination.configure(&raw).is_err());
        assert!(destination.config().is_none());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let destination = WeaviateDestination::with_client(MockStoreClient::new());
        let written = destination
            .write(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(written, 0);
    }
}
