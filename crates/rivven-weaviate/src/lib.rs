//! rivven-weaviate - Weaviate sink connector for Rivven
//!
//! Writes change records (create, update, delete, snapshot) into a Weaviate
//! class as objects, optionally with caller-supplied embedding vectors.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Host runtime: configure → open → write* → teardown             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WeaviateDestination (write router)                             │
//! │  ├── ObjectBuilder   record → TargetObject (id, class, props)   │
//! │  │   └── decode_vector   base64 / CSV → Vec<f32>                │
//! │  └── StoreClient     insert / update / delete                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WeaviateClient (REST, consistency level ALL)                   │
//! │  └── OIDC session for WCS credentials                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Record metadata
//!
//! | Key               | Effect                                            |
//! |-------------------|---------------------------------------------------|
//! | `weaviate.class`  | Target class for inserts and updates              |
//! | `weaviate.vector` | Embedding as base64 little-endian f32 or CSV      |
//!
//! # Usage
//!
//! ```rust,ignore
//! use rivven_weaviate::prelude::*;
//!
//! let mut destination = WeaviateDestination::new();
//! destination.configure(&raw_config)?;
//! destination.open().await?;
//!
//! let records = vec![
//!     ChangeRecord::create("computer-1", r#"{"product_name": "computer", "price": 1000}"#)
//!         .with_metadata("weaviate.vector", "0.12,0.5,1e-3"),
//! ];
//! match destination.write(&records, &CancellationToken::new()).await {
//!     Ok(written) => tracing::info!(written, "batch written"),
//!     Err(e) => tracing::warn!(written = e.written, error = %e, "batch failed"),
//! }
//!
//! destination.teardown().await?;
//! ```

// Core traits and record types
pub mod traits;

// Common types (SensitiveString)
pub mod types;

// Error types
pub mod error;

pub mod client;
pub mod config;
pub mod destination;
pub mod object;
pub mod vector;

// Test doubles
pub mod testing;

pub use types::SensitiveString;

pub use traits::{Change, ChangeRecord, ConnectorInfo, Data, Destination, Operation};

pub use error::{BatchError, ConnectorError, Result};

pub use client::{ClientAuth, ClientConfig, StoreClient, WeaviateClient};
pub use config::{AuthConfig, AuthMechanism, DestinationConfig, ModuleHeader, Scheme};
pub use destination::WeaviateDestination;
pub use object::{object_id, ObjectBuilder, TargetObject, METADATA_CLASS, METADATA_VECTOR};
pub use vector::decode_vector;

// Re-export commonly used dependencies for host integrations
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        async_trait,
        BatchError,
        CancellationToken,
        Change,
        ChangeRecord,
        ConnectorError,
        ConnectorInfo,
        Data,
        Destination,
        DestinationConfig,
        Operation,
        Result,
        SensitiveString,
        StoreClient,
        TargetObject,
        WeaviateClient,
        WeaviateDestination,
    };
    pub use std::collections::HashMap;
}
