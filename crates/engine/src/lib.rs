//! Similarity engine for simdb
//!
//! This crate holds everything above the core vocabulary:
//! - SimTable: one collection's packed vectors and neighbor lists
//! - SimBase: named collections, persistence and compaction
//! - Manifest: on-disk layout of a data directory
//! - SimDbConfig: `simdb.toml`
//! - MaintenanceScheduler: periodic compaction and save
//!
//! Tables are maintained incrementally: every insert scores the new vector
//! against the whole collection and offers each pair to both documents'
//! bounded neighbor lists, so reads are a plain lookup.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod background;
pub mod config;
pub mod manifest;
pub mod registry;
pub mod table;

pub use background::{MaintenanceScheduler, MaintenanceStats};
pub use config::{SimDbConfig, CONFIG_FILE_NAME, DEFAULT_CRON_INTERVAL_MS};
pub use manifest::Manifest;
pub use registry::{validate_collection_name, SharedTable, SimBase};
pub use table::codec::TABLE_FORMAT_VERSION;
pub use table::neighbors::{Admission, NeighborIndex};
pub use table::scan::{LinearScan, ScanFactory, SimilarityScan};
pub use table::store::{PackedStore, RecordView, MAX_DIMENSION};
pub use table::SimTable;
