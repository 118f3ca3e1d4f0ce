//! Top-K neighbor lists, admission thresholds and reverse references
//!
//! Three structures that must always agree with each other:
//!
//! - `lists`: per document, at most `max_neighbors` entries kept in
//!   [`neighbor_order`] (score desc, id asc). Created lazily on first admit.
//! - `thresholds`: per document, the "water line" a new candidate must reach.
//!   Absent until the first admit (then 0.0); only ever raised, on eviction,
//!   to the evicted score.
//! - `reverse`: per target, the set of sources whose list holds the target.
//!   `src ∈ reverse[tgt]` iff `tgt ∈ lists[src]`.

use std::collections::{BTreeMap, BTreeSet};

use simdb_core::{neighbor_order, DocId, Neighbor};

/// Outcome of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// Candidate entered (or refreshed its entry in) the list
    Admitted {
        /// Entry pushed out to respect the capacity, if any
        evicted: Option<Neighbor>,
    },
    /// Self pair, never admitted
    SelfPair,
    /// Score below the source's admission threshold
    BelowThreshold,
}

impl Admission {
    /// Whether the candidate ended up in the list (it may be the evicted one)
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Per-table neighbor bookkeeping
#[derive(Debug, Clone)]
pub struct NeighborIndex {
    max_neighbors: usize,
    lists: BTreeMap<DocId, Vec<Neighbor>>,
    thresholds: BTreeMap<DocId, f32>,
    reverse: BTreeMap<DocId, BTreeSet<DocId>>,
}

impl NeighborIndex {
    /// Create an empty index with the given list capacity
    pub fn new(max_neighbors: usize) -> Self {
        NeighborIndex {
            max_neighbors,
            lists: BTreeMap::new(),
            thresholds: BTreeMap::new(),
            reverse: BTreeMap::new(),
        }
    }

    /// Rebuild from persisted lists and thresholds
    ///
    /// Lists are re-sorted, self references and duplicate targets dropped,
    /// and lists longer than `max_neighbors` are trimmed with the normal
    /// eviction rule. The reverse index is derived from the result.
    pub fn from_parts(
        max_neighbors: usize,
        lists: BTreeMap<DocId, Vec<Neighbor>>,
        thresholds: BTreeMap<DocId, f32>,
    ) -> Self {
        let mut index = NeighborIndex {
            max_neighbors,
            lists,
            thresholds,
            reverse: BTreeMap::new(),
        };
        for (src, list) in index.lists.iter_mut() {
            let mut seen = BTreeSet::new();
            list.retain(|n| n.id != *src && seen.insert(n.id));
            list.sort_by(neighbor_order);
            while list.len() > max_neighbors {
                if let Some(evicted) = list.pop() {
                    let water = index.thresholds.entry(*src).or_insert(0.0);
                    *water = water.max(evicted.score);
                }
            }
            if !list.is_empty() {
                index.thresholds.entry(*src).or_insert(0.0);
            }
        }
        index.rebuild_reverse();
        index
    }

    /// Configured list capacity
    pub fn max_neighbors(&self) -> usize {
        self.max_neighbors
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Offer `tgt` with `score` to `src`'s neighbor list
    ///
    /// 1. Self pairs are never admitted.
    /// 2. First admit for `src`: threshold starts at 0.0, entry always inserted.
    /// 3. Otherwise the entry is inserted if `score >= threshold`, or if `tgt`
    ///    is already listed (its score is refreshed).
    /// 4. Anything else is rejected silently.
    ///
    /// Rule 3's refresh is an exception to rule 4: an already-listed `tgt`
    /// whose new score falls below the threshold is rescored in place rather
    /// than rejected, so a list never keeps a stale score for an updated
    /// document.
    /// 5. On overflow the lowest entry is evicted, the threshold raised to its
    ///    score, and `src` dropped from the evicted target's reverse set.
    pub fn admit(&mut self, src: DocId, tgt: DocId, score: f32) -> Admission {
        if src == tgt {
            return Admission::SelfPair;
        }

        let already_listed = self
            .lists
            .get(&src)
            .is_some_and(|list| list.iter().any(|n| n.id == tgt));

        match self.thresholds.get(&src) {
            None => {
                self.thresholds.insert(src, 0.0);
            }
            Some(&water) if !already_listed && score < water => {
                return Admission::BelowThreshold;
            }
            Some(_) => {}
        }

        let list = self.lists.entry(src).or_default();
        list.retain(|n| n.id != tgt);
        let entry = Neighbor::new(tgt, score);
        let at = list
            .binary_search_by(|existing| neighbor_order(existing, &entry))
            .unwrap_or_else(|i| i);
        list.insert(at, entry);
        self.reverse.entry(tgt).or_default().insert(src);

        let evicted = if list.len() > self.max_neighbors {
            list.pop()
        } else {
            None
        };
        if let Some(evicted) = evicted {
            let water = self.thresholds.entry(src).or_insert(0.0);
            *water = water.max(evicted.score);
            self.unlink(src, evicted.id);
        }

        Admission::Admitted { evicted }
    }

    fn unlink(&mut self, src: DocId, tgt: DocId) {
        if let Some(sources) = self.reverse.get_mut(&tgt) {
            sources.remove(&src);
            if sources.is_empty() {
                self.reverse.remove(&tgt);
            }
        }
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove every trace of `docid`
    ///
    /// Drops its own list and threshold, strips it from every list that
    /// references it (via the reverse index), and withdraws it from the
    /// reverse sets of its own former neighbors. Returns how many other
    /// lists lost an entry.
    pub fn remove_document(&mut self, docid: DocId) -> usize {
        if let Some(list) = self.lists.remove(&docid) {
            for neighbor in list {
                self.unlink(docid, neighbor.id);
            }
        }
        self.thresholds.remove(&docid);

        let Some(sources) = self.reverse.remove(&docid) else {
            return 0;
        };
        let mut stripped = 0;
        for src in sources {
            if let Some(list) = self.lists.get_mut(&src) {
                let before = list.len();
                list.retain(|n| n.id != docid);
                stripped += before - list.len();
            }
        }
        stripped
    }

    // ========================================================================
    // Read Operations
    // ========================================================================

    /// Snapshot of `docid`'s neighbors, best first; empty if none
    pub fn retrieve(&self, docid: DocId) -> Vec<Neighbor> {
        self.lists.get(&docid).cloned().unwrap_or_default()
    }

    /// Score stored for `other` in `docid`'s list
    pub fn score(&self, docid: DocId, other: DocId) -> Option<f32> {
        self.lists
            .get(&docid)?
            .iter()
            .find(|n| n.id == other)
            .map(|n| n.score)
    }

    /// Current admission threshold for `docid`, if it has ever admitted
    pub fn threshold(&self, docid: DocId) -> Option<f32> {
        self.thresholds.get(&docid).copied()
    }

    /// Sources currently listing `docid` as a neighbor
    pub fn referenced_by(&self, docid: DocId) -> Option<&BTreeSet<DocId>> {
        self.reverse.get(&docid)
    }

    /// All neighbor lists (for serialization and compaction)
    pub fn lists(&self) -> &BTreeMap<DocId, Vec<Neighbor>> {
        &self.lists
    }

    /// All thresholds (for serialization)
    pub fn thresholds(&self) -> &BTreeMap<DocId, f32> {
        &self.thresholds
    }

    /// Recompute the reverse index from the neighbor lists
    pub fn rebuild_reverse(&mut self) {
        let mut reverse: BTreeMap<DocId, BTreeSet<DocId>> = BTreeMap::new();
        for (src, list) in &self.lists {
            for neighbor in list {
                reverse.entry(neighbor.id).or_default().insert(*src);
            }
        }
        self.reverse = reverse;
    }

    /// Check that lists and reverse sets mirror each other exactly
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.lists.iter().all(|(src, list)| {
            list.len() <= self.max_neighbors
                && list.windows(2).all(|w| neighbor_order(&w[0], &w[1]).is_le())
                && list
                    .iter()
                    .all(|n| self.reverse.get(&n.id).is_some_and(|s| s.contains(src)))
        });
        let backward_ok = self.reverse.iter().all(|(tgt, sources)| {
            sources.iter().all(|src| {
                self.lists
                    .get(src)
                    .is_some_and(|list| list.iter().any(|n| n.id == *tgt))
            })
        });
        forward_ok && backward_ok
    }
}
