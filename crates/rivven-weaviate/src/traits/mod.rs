//! Core traits for the Weaviate destination
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Destination`] | Lifecycle driven by the host: configure, open, write, teardown |
//! | [`ConnectorInfo`] | Name, version and summary for host registration |
//! | [`ChangeRecord`] | A single change delivered by the pipeline |

pub mod destination;
pub mod record;

pub use destination::{ConnectorInfo, Destination};
pub use record::{Change, ChangeRecord, Data, Operation};
