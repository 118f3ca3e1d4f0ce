//! Core types for simdb
//!
//! This crate defines the vocabulary shared by the engine and its callers:
//! - DocId: document identifier within a collection
//! - Neighbor: one (neighbor id, score) entry of a neighbor list
//! - TableConfig / ScoreFormula: per-table configuration
//! - SimError: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{ScoreFormula, TableConfig, DEFAULT_LOAD_FACTOR, DEFAULT_MAX_NEIGHBORS};
pub use error::{SimError, SimResult};
pub use types::{neighbor_order, DocId, Neighbor};
