//! Similarity table: one collection's vectors and neighbor lists
//!
//! This module provides the per-collection core:
//!
//! - **PackedStore**: flat record buffer + position index, tombstoning
//! - **SimilarityScan / LinearScan**: candidate scoring on insert
//! - **NeighborIndex**: bounded top-K lists, admission thresholds and the
//!   reverse reference index used for cascading deletes
//! - **compaction**: tombstone-free rebuild
//! - **codec**: binary persistence
//!
//! ## Thread Safety
//!
//! A SimTable has no interior locking. Mutations take `&mut self`; the
//! registry wraps each table in a `parking_lot::RwLock` so reads run
//! concurrently while insert/delete/compact/serialize are exclusive.

pub mod codec;
pub mod compaction;
pub mod neighbors;
pub mod scan;
pub mod score;
pub mod store;

use simdb_core::{DocId, Neighbor, SimError, SimResult, TableConfig};
use tracing::debug;

use neighbors::NeighborIndex;
use scan::{ScanFactory, SimilarityScan};
use store::PackedStore;

/// One collection's similarity table
pub struct SimTable {
    config: TableConfig,
    store: PackedStore,
    neighbors: NeighborIndex,
    scan: Box<dyn SimilarityScan>,
    scan_factory: ScanFactory,
}

impl std::fmt::Debug for SimTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimTable")
            .field("config", &self.config)
            .field("documents", &self.store.len())
            .field("tombstoned", &self.store.tombstoned_count())
            .field("scan", &self.scan.name())
            .finish()
    }
}

impl SimTable {
    /// Create an empty table
    ///
    /// # Errors
    /// `Configuration` if the config fails validation.
    pub fn new(config: TableConfig) -> SimResult<Self> {
        Self::with_scan_factory(config, ScanFactory::default())
    }

    /// Create an empty table with a custom scan strategy
    pub fn with_scan_factory(config: TableConfig, scan_factory: ScanFactory) -> SimResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(
            config,
            scan_factory,
            PackedStore::new(),
            NeighborIndex::new(config.max_neighbors),
        ))
    }

    pub(crate) fn from_parts(
        config: TableConfig,
        scan_factory: ScanFactory,
        store: PackedStore,
        neighbors: NeighborIndex,
    ) -> Self {
        SimTable {
            config,
            store,
            neighbors,
            scan: scan_factory.create(&config),
            scan_factory,
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert a new document or overwrite an existing one
    ///
    /// After the record is written, every other live document is scored
    /// against it and each pair is offered to both documents' neighbor lists.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the vector disagrees with the table dimension
    /// - `EmptyVector` / `InvalidComponent` for malformed vectors
    pub fn insert_or_update(&mut self, docid: DocId, components: &[f32]) -> SimResult<()> {
        let updated = self.store.contains(docid);
        self.store.upsert(docid, components)?;

        let candidates = self.scan.scan(&self.store, docid);
        let mut admitted = 0usize;
        for &(other, score) in &candidates {
            if self.neighbors.admit(docid, other, score).is_admitted() {
                admitted += 1;
            }
            self.neighbors.admit(other, docid, score);
        }

        debug!(
            target: "simdb::table",
            %docid,
            updated,
            candidates = candidates.len(),
            admitted,
            "Document written"
        );
        Ok(())
    }

    /// Insert a new document (alias of [`SimTable::insert_or_update`])
    pub fn add(&mut self, docid: DocId, components: &[f32]) -> SimResult<()> {
        self.insert_or_update(docid, components)
    }

    /// Update a document (alias of [`SimTable::insert_or_update`])
    pub fn update(&mut self, docid: DocId, components: &[f32]) -> SimResult<()> {
        self.insert_or_update(docid, components)
    }

    /// Delete a document
    ///
    /// Tombstones its record, drops its neighbor list and threshold, and
    /// strips it from every list referencing it. Unknown ids are a no-op.
    /// Returns true if the document existed.
    pub fn delete(&mut self, docid: DocId) -> bool {
        let Some(offset) = self.store.tombstone(docid) else {
            return false;
        };
        let stripped = self.neighbors.remove_document(docid);
        debug!(
            target: "simdb::table",
            %docid,
            offset,
            stripped,
            "Document tombstoned"
        );
        true
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Neighbors of `docid`, best first; empty for unknown documents
    pub fn retrieve(&self, docid: DocId) -> Vec<Neighbor> {
        self.neighbors.retrieve(docid)
    }

    /// Stored score between `docid` and one of its neighbors
    ///
    /// # Errors
    /// - `UnknownDocument` if `docid` is not in the table
    /// - `NotNeighbors` if `other` is not in `docid`'s neighbor list
    pub fn similarity(&self, docid: DocId, other: DocId) -> SimResult<f32> {
        if !self.store.contains(docid) {
            return Err(SimError::UnknownDocument {
                docid: docid.as_u32(),
            });
        }
        self.neighbors
            .score(docid, other)
            .ok_or(SimError::NotNeighbors {
                docid: docid.as_u32(),
                other: other.as_u32(),
            })
    }

    /// Check if a document is live
    pub fn contains(&self, docid: DocId) -> bool {
        self.store.contains(docid)
    }

    /// Stored components of a live document
    pub fn vector(&self, docid: DocId) -> Option<&[f32]> {
        self.store.get(docid)
    }

    /// Number of live documents
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the table holds no live documents
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Established vector dimension
    pub fn dimension(&self) -> Option<usize> {
        self.store.dimension()
    }

    /// Total slots in the packed buffer, tombstones included
    pub fn store_slots(&self) -> usize {
        self.store.slot_len()
    }

    /// Number of tombstoned records awaiting compaction
    pub fn tombstoned(&self) -> usize {
        self.store.tombstoned_count()
    }

    /// Current admission threshold of a document
    pub fn admission_threshold(&self, docid: DocId) -> Option<f32> {
        self.neighbors.threshold(docid)
    }

    /// Table configuration
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Read access to the packed store
    pub fn store(&self) -> &PackedStore {
        &self.store
    }

    /// Read access to the neighbor index
    pub fn neighbor_index(&self) -> &NeighborIndex {
        &self.neighbors
    }

    pub(crate) fn scan_factory(&self) -> ScanFactory {
        self.scan_factory
    }
}
