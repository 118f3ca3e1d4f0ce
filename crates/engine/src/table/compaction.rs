//! Compaction: rebuild a table without its tombstones
//!
//! Runs against `&self`, so the caller's read lock is enough to observe one
//! consistent snapshot of buffer + indexes. The caller swaps the result in.

use tracing::info;

use crate::table::SimTable;

impl SimTable {
    /// Produce a tombstone-free copy of this table
    ///
    /// Live records keep their relative order and get renumbered offsets.
    /// Neighbor lists, thresholds and reverse references are carried over
    /// unchanged, so `retrieve()` answers identically before and after.
    /// The new buffer is sized `live slots / load_factor`.
    pub fn compact(&self) -> SimTable {
        let stride = self.store.stride().unwrap_or(0);
        let live_slots = self.store.len() * stride;
        let capacity = (live_slots as f64 / self.config.load_factor).ceil() as usize;

        let store = self.store.compacted(capacity);
        let reclaimed = self.store.slot_len() - store.slot_len();

        info!(
            target: "simdb::table",
            documents = store.len(),
            tombstones = self.store.tombstoned_count(),
            reclaimed_slots = reclaimed,
            "Compacted table"
        );

        SimTable::from_parts(
            self.config,
            self.scan_factory(),
            store,
            self.neighbors.clone(),
        )
    }
}
