//! Testing utilities
//!
//! [`MockStoreClient`] stands in for Weaviate so the destination can be
//! exercised without a running instance. Clones share state, so a test can
//! keep one handle while the destination owns another.
//!
//! # Example
//!
//! ```rust,ignore
//! use rivven_weaviate::testing::*;
//!
//! let store = MockStoreClient::new().fail_on("B", 422, "invalid properties");
//! let mut destination = WeaviateDestination::with_client(store.clone());
//! destination.configure(&raw_config)?;
//! destination.open().await?;
//!
//! let err = destination.write(&records, &CancellationToken::new()).await.unwrap_err();
//! assert_eq!(err.written, 1);
//! assert_eq!(store.calls().len(), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{ClientConfig, StoreClient};
use crate::error::{ConnectorError, Result};
use crate::object::TargetObject;

/// A store call that completed successfully
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    /// `insert`
    Insert(TargetObject),
    /// `update`
    Update(TargetObject),
    /// `delete`
    Delete(TargetObject),
}

impl StoreCall {
    /// Object passed to the call
    pub fn object(&self) -> &TargetObject {
        match self {
            Self::Insert(o) | Self::Update(o) | Self::Delete(o) => o,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<StoreCall>,
    opened_with: Option<ClientConfig>,
    open_error: Option<String>,
    failures: HashMap<String, (u16, String)>,
    hangs: HashSet<String>,
    open: bool,
    close_count: usize,
}

/// In-memory [`StoreClient`] recording every successful call
#[derive(Debug, Clone, Default)]
pub struct MockStoreClient {
    state: Arc<Mutex<MockState>>,
}

impl MockStoreClient {
    /// Create a new mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open` fail with a connection error
    pub fn fail_open(self, message: impl Into<String>) -> Self {
        self.state.lock().open_error = Some(message.into());
        self
    }

    /// Make any call for object `id` fail with the given HTTP status
    pub fn fail_on(self, id: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        self.state
            .lock()
            .failures
            .insert(id.into(), (status, message.into()));
        self
    }

    /// Make any call for object `id` never complete
    pub fn hang_on(self, id: impl Into<String>) -> Self {
        self.state.lock().hangs.insert(id.into());
        self
    }

    /// Successful calls, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    /// Configuration passed to the last successful `open`
    pub fn opened_config(&self) -> Option<ClientConfig> {
        self.state.lock().opened_with.clone()
    }

    /// Whether the client is currently open
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Number of `close` calls
    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    async fn record(&self, action: &'static str, call: StoreCall) -> Result<()> {
        let id = call.object().id.clone();
        let hang = {
            let state = self.state.lock();
            if !state.open {
                return Err(ConnectorError::NotOpen);
            }
            if let Some((status, message)) = state.failures.get(&id) {
                return Err(ConnectorError::store(action, Some(*status), message.clone()));
            }
            state.hangs.contains(&id)
        };

        if hang {
            std::future::pending::<()>().await;
        }

        self.state.lock().calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl StoreClient for MockStoreClient {
    async fn open(&mut self, config: &ClientConfig) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(message) = state.open_error.clone() {
            return Err(ConnectorError::connection(message));
        }
        state.opened_with = Some(config.clone());
        state.open = true;
        Ok(())
    }

    async fn insert(&self, object: &TargetObject) -> Result<()> {
        self.record("creating", StoreCall::Insert(object.clone()))
            .await
    }

    async fn update(&self, object: &TargetObject) -> Result<()> {
        self.record("updating", StoreCall::Update(object.clone()))
            .await
    }

    async fn delete(&self, object: &TargetObject) -> Result<()> {
        self.record("deleting", StoreCall::Delete(object.clone()))
            .await
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.open = false;
        state.close_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientAuth;
    use crate::config::Scheme;
    use std::time::Duration;

    fn client_config() -> ClientConfig {
        ClientConfig {
            endpoint: "localhost:8080".to_string(),
            scheme: Scheme::Http,
            auth: ClientAuth::None,
            headers: Default::default(),
            timeout: Duration::from_secs(1),
        }
    }

    fn object(id: &str) -> TargetObject {
        TargetObject {
            id: id.to_string(),
            class: "Products".to_string(),
            properties: serde_json::Map::new(),
            vector: None,
        }
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let mut store = MockStoreClient::new();
        let handle = store.clone();
        store.open(&client_config()).await.unwrap();

        store.insert(&object("a")).await.unwrap();
        store.delete(&object("a")).await.unwrap();

        assert_eq!(
            handle.calls(),
            vec![StoreCall::Insert(object("a")), StoreCall::Delete(object("a"))]
        );
        assert!(handle.opened_config().is_some());
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mut store = MockStoreClient::new().fail_on("b", 500, "boom");
        store.open(&client_config()).await.unwrap();

        let err = store.update(&object("b")).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "error updating object: boom");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mock_requires_open() {
        let mut store = MockStoreClient::new();
        assert!(matches!(
            store.insert(&object("a")).await,
            Err(ConnectorError::NotOpen)
        ));

        store.open(&client_config()).await.unwrap();
        store.close().await.unwrap();
        assert!(!store.is_open());
        assert_eq!(store.close_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_open_failure() {
        let mut store = MockStoreClient::new().fail_open("connection refused");
        let err = store.open(&client_config()).await.unwrap_err();
        assert!(matches!(err, ConnectorError::Connection(_)));
        assert!(!store.is_open());
    }
}
