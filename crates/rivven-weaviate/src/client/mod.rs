//! Store client abstraction
//!
//! The destination talks to Weaviate only through [`StoreClient`]. The
//! production implementation is [`WeaviateClient`] (REST over `reqwest`);
//! tests use [`crate::testing::MockStoreClient`].

mod oidc;
mod weaviate;

pub use weaviate::WeaviateClient;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Scheme;
use crate::error::Result;
use crate::object::TargetObject;
use crate::types::SensitiveString;

/// Credentials presented to Weaviate
#[derive(Debug, Clone, Default)]
pub enum ClientAuth {
    /// Anonymous access
    #[default]
    None,
    /// API key sent as `Authorization: Bearer <key>`
    ApiKey(SensitiveString),
    /// WCS username/password exchanged for an OIDC access token
    Wcs {
        /// WCS username
        username: String,
        /// WCS password
        password: SensitiveString,
    },
}

impl ClientAuth {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKey(_) => "api-key",
            Self::Wcs { .. } => "wcs",
        }
    }
}

/// Resolved connection settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host (and optional port)
    pub endpoint: String,
    /// URL scheme
    pub scheme: Scheme,
    /// Credentials
    pub auth: ClientAuth,
    /// Extra headers sent with every request (module API keys)
    pub headers: BTreeMap<String, SensitiveString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    /// Base URL, e.g. `https://cluster.weaviate.network`
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.endpoint.trim_end_matches('/'))
    }
}

/// Write operations against the vector-object store.
///
/// Every mutating call requests consistency level `ALL`. Implementations do
/// not retry; a failed call is reported to the caller as-is.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Establish the session used by all later calls
    async fn open(&mut self, config: &ClientConfig) -> Result<()>;

    /// Create an object (id, class, properties and optional vector)
    async fn insert(&self, object: &TargetObject) -> Result<()>;

    /// Replace the properties of an existing object
    async fn update(&self, object: &TargetObject) -> Result<()>;

    /// Remove an object by id and class
    async fn delete(&self, object: &TargetObject) -> Result<()>;

    /// Release the session. Must succeed when never opened.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
