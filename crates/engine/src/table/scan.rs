//! Similarity Engine - candidate scoring on insert
//!
//! Defines the seam between the table and whatever produces candidate
//! neighbors for a freshly written record. LinearScan (O(total slots)) is the
//! only implementation; an indexed nearest-neighbor structure can replace it
//! without touching SimTable callers.

use simdb_core::{DocId, ScoreFormula, TableConfig};

use crate::table::score::{dot_product, finalize};
use crate::table::store::PackedStore;

/// Trait for swappable candidate scoring strategies
///
/// Implementations must score `target` against every other live document
/// they choose to consider, and must never yield `target` itself.
pub trait SimilarityScan: Send + Sync {
    /// Score `target` against other live records
    ///
    /// Returns (other document, score) pairs. Returns an empty vector if
    /// `target` is not live in `store`.
    fn scan(&self, store: &PackedStore, target: DocId) -> Vec<(DocId, f32)>;

    /// Short name for logging
    fn name(&self) -> &'static str;
}

/// Factory for creating scan strategies
///
/// Lets compaction and deserialization build a table with the same strategy
/// without the table knowing the concrete type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanFactory {
    /// Full-buffer linear pass
    #[default]
    Linear,
}

impl ScanFactory {
    /// Create a new scan instance
    pub fn create(&self, config: &TableConfig) -> Box<dyn SimilarityScan> {
        match self {
            ScanFactory::Linear => Box::new(LinearScan::new(config.score_formula)),
        }
    }
}

/// Full-buffer linear scan
///
/// Walks every record in buffer order, tombstoned ones included (they are
/// skipped, not removed), so each insert costs O(total slots). Sufficient
/// for small and medium tables.
#[derive(Debug, Clone, Copy)]
pub struct LinearScan {
    formula: ScoreFormula,
}

impl LinearScan {
    /// Create a linear scan using the given score formula
    pub fn new(formula: ScoreFormula) -> Self {
        LinearScan { formula }
    }

    /// Score formula in use
    pub fn formula(&self) -> ScoreFormula {
        self.formula
    }
}

impl SimilarityScan for LinearScan {
    fn scan(&self, store: &PackedStore, target: DocId) -> Vec<(DocId, f32)> {
        let Some(query) = store.record(target) else {
            return Vec::new();
        };

        store
            .records()
            .filter(|record| record.live && record.offset != query.offset)
            .map(|record| {
                let dot = dot_product(query.components, record.components);
                let score = finalize(
                    dot,
                    query.squared_length,
                    record.squared_length,
                    self.formula,
                );
                (record.id, score)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}
