//! simdb - in-memory incremental similarity index
//!
//! Collections of fixed-dimension vectors, each document keeping a bounded
//! list of its most similar peers. Lists are maintained on every write, so
//! reading a document's neighbors never scans.
//!
//! # Quick Start
//!
//! ```ignore
//! use simdb::{DocId, SimBase, TableConfig};
//!
//! let base = SimBase::ephemeral(TableConfig::default())?;
//! base.add("articles", DocId::new(1)?, &[0.6, 0.8])?;
//! base.add("articles", DocId::new(2)?, &[0.0, 1.0])?;
//!
//! let neighbors = base.retrieve("articles", DocId::new(1)?);
//! ```
//!
//! # Persistence
//!
//! [`SimBase::open`] binds a registry to a data directory holding
//! `simdb.toml`, the `keys.idx` manifest and one `.dmp` file per collection.
//! [`MaintenanceScheduler`] compacts and saves in the background.

pub use simdb_core::{
    neighbor_order, DocId, Neighbor, ScoreFormula, SimError, SimResult, TableConfig,
    DEFAULT_LOAD_FACTOR, DEFAULT_MAX_NEIGHBORS,
};
pub use simdb_engine::{
    validate_collection_name, MaintenanceScheduler, MaintenanceStats, Manifest, SharedTable,
    SimBase, SimDbConfig, SimTable, CONFIG_FILE_NAME,
};
