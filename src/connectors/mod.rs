//! Pluggable external data source pullers. Each connector writes `.txt`
//! items to its own directory and persists resumable state there; the sync
//! engine feeds those directories through the indexer.

pub mod base;
pub mod gmail;
pub mod registry;

pub use base::{Connector, ConnectorStatus, SyncResult};
pub use registry::ConnectorRegistry;
