//! Packed Vector Store - every document's vector in one flat buffer
//!
//! Records are laid out back to back with a fixed stride of `dimension + 2`:
//!
//! ```text
//! [c0, c1, ..., c(d-1), marker, squared_length] [c0, ...] ...
//! ```
//!
//! `marker` holds the bit pattern of `id + 1`, so ids round-trip exactly and
//! the slot is never all-zero bits. `squared_length` is precomputed on write.
//!
//! # Invariants
//!
//! - Deleted records stay in place (tombstoned) so later offsets stay valid;
//!   only compaction reclaims them
//! - `live[r]` is the liveness of record `r` (offset `r * stride`); component
//!   values carry no liveness meaning
//! - `positions` maps every live document to its record offset and is the
//!   SOLE source of truth for which documents exist
//! - BTreeMap keeps position iteration deterministic

use std::collections::BTreeMap;

use simdb_core::{DocId, SimError, SimResult};

use crate::table::score::squared_length;

/// Largest vector dimension a table accepts
pub const MAX_DIMENSION: usize = 1 << 16;

/// Borrowed view of one record in the buffer
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    /// Slot offset of the record's first component
    pub offset: usize,
    /// Document the record belongs to
    pub id: DocId,
    /// Component values
    pub components: &'a [f32],
    /// Precomputed squared length
    pub squared_length: f32,
    /// False once the record has been tombstoned
    pub live: bool,
}

/// Flat record buffer plus its position index
#[derive(Debug, Clone, Default)]
pub struct PackedStore {
    /// Established by the first insert, fixed afterwards
    dimension: Option<usize>,

    /// Record slots, `stride` floats per record
    data: Vec<f32>,

    /// Per-record liveness, indexed by record number
    live: Vec<bool>,

    /// DocId -> offset in data (in floats, not bytes)
    positions: BTreeMap<DocId, usize>,
}

impl PackedStore {
    /// Create an empty store with no established dimension
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted parts, validating every cross-reference
    ///
    /// # Errors
    /// `CorruptPersistedState` if the buffer isn't stride-aligned, the
    /// liveness table doesn't cover every record, or a position entry points
    /// at a misaligned, tombstoned or foreign record.
    pub fn from_parts(
        dimension: Option<usize>,
        data: Vec<f32>,
        live: Vec<bool>,
        positions: BTreeMap<DocId, usize>,
    ) -> SimResult<Self> {
        let store = PackedStore {
            dimension,
            data,
            live,
            positions,
        };
        store.check_consistency()?;
        Ok(store)
    }

    fn check_consistency(&self) -> SimResult<()> {
        let Some(stride) = self.stride() else {
            if !self.data.is_empty() || !self.live.is_empty() || !self.positions.is_empty() {
                return Err(SimError::corrupt(
                    "records present but no dimension established",
                ));
            }
            return Ok(());
        };
        match self.dimension {
            Some(0) => return Err(SimError::corrupt("dimension must be positive")),
            Some(d) if d > MAX_DIMENSION => {
                return Err(SimError::corrupt(format!(
                    "dimension {} exceeds maximum {}",
                    d, MAX_DIMENSION
                )));
            }
            _ => {}
        }
        if self.data.len() % stride != 0 {
            return Err(SimError::corrupt(format!(
                "buffer of {} slots is not a multiple of record stride {}",
                self.data.len(),
                stride
            )));
        }
        if self.data.len() / stride != self.live.len() {
            return Err(SimError::corrupt(format!(
                "{} records but {} liveness flags",
                self.data.len() / stride,
                self.live.len()
            )));
        }
        for (&id, &offset) in &self.positions {
            if offset % stride != 0 || offset >= self.data.len() {
                return Err(SimError::corrupt(format!(
                    "document {} has invalid offset {}",
                    id, offset
                )));
            }
            if !self.live[offset / stride] {
                return Err(SimError::corrupt(format!(
                    "document {} points at a tombstoned record",
                    id
                )));
            }
            if self.marker_at(offset) != Some(id) {
                return Err(SimError::corrupt(format!(
                    "record at offset {} does not belong to document {}",
                    offset, id
                )));
            }
        }
        let live_records = self.live.iter().filter(|&&l| l).count();
        if live_records != self.positions.len() {
            return Err(SimError::corrupt(format!(
                "{} live records but {} position entries",
                live_records,
                self.positions.len()
            )));
        }
        Ok(())
    }

    /// Dimension of stored vectors, once established
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Slots per record (`dimension + 2`), once established
    pub fn stride(&self) -> Option<usize> {
        self.dimension.map(|d| d + 2)
    }

    /// Number of live documents
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if no live documents remain
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of records in the buffer, live and tombstoned
    pub fn record_count(&self) -> usize {
        self.live.len()
    }

    /// Number of tombstoned records awaiting compaction
    pub fn tombstoned_count(&self) -> usize {
        self.record_count() - self.len()
    }

    /// Total slots in the buffer
    pub fn slot_len(&self) -> usize {
        self.data.len()
    }

    /// Check if a document is live
    pub fn contains(&self, id: DocId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Start offset of a live document's record
    pub fn offset_of(&self, id: DocId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Components of a live document
    pub fn get(&self, id: DocId) -> Option<&[f32]> {
        let offset = self.offset_of(id)?;
        let dimension = self.dimension?;
        Some(&self.data[offset..offset + dimension])
    }

    // ========================================================================
    // Write Operations
    // ========================================================================

    /// Insert or overwrite a document's record (upsert semantics)
    ///
    /// Existing documents are rewritten in place; new ones are appended and
    /// registered in the position index. Returns the record offset.
    ///
    /// # Errors
    /// - `EmptyVector` if `components` is empty
    /// - `DimensionTooLarge` if `components` is longer than [`MAX_DIMENSION`]
    /// - `InvalidComponent` if any component is NaN or infinite
    /// - `DimensionMismatch` if the dimension differs from the established one
    pub fn upsert(&mut self, id: DocId, components: &[f32]) -> SimResult<usize> {
        if components.is_empty() {
            return Err(SimError::EmptyVector);
        }
        if components.len() > MAX_DIMENSION {
            return Err(SimError::DimensionTooLarge {
                max: MAX_DIMENSION,
                got: components.len(),
            });
        }
        if let Some((index, &value)) = components.iter().enumerate().find(|(_, v)| !v.is_finite())
        {
            return Err(SimError::InvalidComponent { index, value });
        }
        let dimension = match self.dimension {
            Some(d) if d != components.len() => {
                return Err(SimError::DimensionMismatch {
                    expected: d,
                    got: components.len(),
                });
            }
            Some(d) => d,
            None => {
                self.dimension = Some(components.len());
                components.len()
            }
        };
        let length = squared_length(components);

        if let Some(&offset) = self.positions.get(&id) {
            self.data[offset..offset + dimension].copy_from_slice(components);
            self.data[offset + dimension + 1] = length;
            Ok(offset)
        } else {
            let offset = self.data.len();
            self.data.extend_from_slice(components);
            self.data.push(f32::from_bits(id.marker()));
            self.data.push(length);
            self.live.push(true);
            self.positions.insert(id, offset);
            Ok(offset)
        }
    }

    /// Tombstone a document's record in place
    ///
    /// The slots stay in the buffer until compaction. Returns the offset of
    /// the tombstoned record, or None if the document wasn't live.
    pub fn tombstone(&mut self, id: DocId) -> Option<usize> {
        let offset = self.positions.remove(&id)?;
        let stride = self.stride()?;
        self.live[offset / stride] = false;
        Some(offset)
    }

    // ========================================================================
    // Read Operations
    // ========================================================================

    fn marker_at(&self, offset: usize) -> Option<DocId> {
        let dimension = self.dimension?;
        let slot = self.data.get(offset + dimension)?;
        DocId::from_marker(slot.to_bits())
    }

    /// Iterate every record in buffer order, live and tombstoned
    pub fn records(&self) -> impl Iterator<Item = RecordView<'_>> + '_ {
        let dimension = self.dimension.unwrap_or(0);
        let stride = dimension + 2;
        self.data
            .chunks_exact(stride)
            .zip(self.live.iter())
            .enumerate()
            .filter_map(move |(record, (chunk, &live))| {
                let id = DocId::from_marker(chunk[dimension].to_bits())?;
                Some(RecordView {
                    offset: record * stride,
                    id,
                    components: &chunk[..dimension],
                    squared_length: chunk[dimension + 1],
                    live,
                })
            })
    }

    /// Record view of a live document
    pub fn record(&self, id: DocId) -> Option<RecordView<'_>> {
        let offset = self.offset_of(id)?;
        let dimension = self.dimension?;
        Some(RecordView {
            offset,
            id,
            components: &self.data[offset..offset + dimension],
            squared_length: self.data[offset + dimension + 1],
            live: true,
        })
    }

    /// Copy of this store without tombstoned records
    ///
    /// Live records keep their relative order; offsets are renumbered. The
    /// new buffer is allocated with `capacity` slots.
    pub fn compacted(&self, capacity: usize) -> PackedStore {
        let mut data = Vec::with_capacity(capacity);
        let mut live = Vec::with_capacity(self.len());
        let mut positions = BTreeMap::new();
        let stride = self.stride().unwrap_or(0);

        for record in self.records().filter(|r| r.live) {
            positions.insert(record.id, data.len());
            data.extend_from_slice(&self.data[record.offset..record.offset + stride]);
            live.push(true);
        }

        PackedStore {
            dimension: self.dimension,
            data,
            live,
            positions,
        }
    }

    /// Raw slot buffer (for serialization)
    pub fn raw_data(&self) -> &[f32] {
        &self.data
    }

    /// Per-record liveness (for serialization)
    pub fn liveness(&self) -> &[bool] {
        &self.live
    }

    /// Position index (for serialization)
    pub fn positions(&self) -> &BTreeMap<DocId, usize> {
        &self.positions
    }
}
