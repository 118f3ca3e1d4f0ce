//! Document identifiers and neighbor entries

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Document identifier within a collection
///
/// Ids are non-negative and bounded by [`DocId::MAX`] so that the packed
/// store's `id + 1` marker never overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(u32);

impl DocId {
    /// Largest accepted id (the signed 32-bit id space clients use)
    pub const MAX: u32 = i32::MAX as u32;

    /// Create a DocId, rejecting ids outside `0..=DocId::MAX`
    pub fn new(id: u32) -> SimResult<Self> {
        if id > Self::MAX {
            return Err(SimError::InvalidDocument { docid: id });
        }
        Ok(DocId(id))
    }

    /// Get the underlying u32 value
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Marker value stored after a record's components (`id + 1`, never 0)
    pub fn marker(&self) -> u32 {
        self.0 + 1
    }

    /// Recover a DocId from a stored marker
    ///
    /// Returns `None` for a zero marker or one that decodes past [`DocId::MAX`].
    pub fn from_marker(marker: u32) -> Option<Self> {
        let id = marker.checked_sub(1)?;
        (id <= Self::MAX).then_some(DocId(id))
    }
}

impl TryFrom<u32> for DocId {
    type Error = SimError;

    fn try_from(id: u32) -> SimResult<Self> {
        DocId::new(id)
    }
}

impl TryFrom<i64> for DocId {
    type Error = SimError;

    fn try_from(id: i64) -> SimResult<Self> {
        u32::try_from(id)
            .map_err(|_| SimError::InvalidDocument {
                docid: id.clamp(0, u32::MAX as i64) as u32,
            })
            .and_then(DocId::new)
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a document's neighbor list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// The neighboring document
    pub id: DocId,
    /// Similarity score (higher = more similar)
    pub score: f32,
}

impl Neighbor {
    /// Create a new neighbor entry
    pub fn new(id: DocId, score: f32) -> Self {
        Neighbor { id, score }
    }
}

/// Neighbor list order: score descending, then id ascending
///
/// The id tie-break keeps equal-score lists (and eviction among equal
/// scores) deterministic across runs and after reload.
pub fn neighbor_order(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
}
