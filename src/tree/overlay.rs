//! Insert overlay: pending record modifications for one leaf page.
//!
//! An [`InsertOverlay`] is an ordered set of not-yet-reconciled record
//! insertions, updates, and tombstones, keyed by record number. It is
//! skip-structured: level 0 links every entry in key order, and each
//! higher level links a geometric sample of the one below, so point
//! lookups walk O(log n) links.
//!
//! Entries live in an arena (`Vec`) and link to each other by index
//! rather than by pointer. A search returns, besides the nearest entry,
//! a [`PredecessorStack`]: for every level, the last entry whose key
//! precedes the target (or the overlay head). [`InsertOverlay::insert_at`]
//! consumes that stack to splice a new entry without a second search.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::config::{SKIP_MAX_DEPTH, SKIP_PROBABILITY};
use crate::common::Recno;

/// Arena index of an overlay entry.
pub type NodeIndex = usize;

/// A pending modification carried by an overlay entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// The record's pending value.
    Value(Vec<u8>),
    /// The record is pending removal.
    Tombstone,
}

/// One overlay entry: a record number, its pending update, and one
/// forward link per level the entry participates in.
pub struct Entry {
    recno: Recno,
    update: Update,
    next: Vec<Option<NodeIndex>>,
}

impl Entry {
    #[inline]
    pub fn recno(&self) -> Recno {
        self.recno
    }

    #[inline]
    pub fn update(&self) -> &Update {
        &self.update
    }

    /// Number of levels this entry is linked into.
    #[inline]
    pub fn height(&self) -> usize {
        self.next.len()
    }
}

/// Per-level predecessors recorded by a search.
///
/// `None` at a level means the insertion point is the overlay head;
/// `Some(idx)` means it is entry `idx`'s forward link at that level.
/// Levels the overlay does not use yet stay at the head, so a new entry
/// taller than the current structure links correctly.
#[derive(Debug, Clone, Default)]
pub struct PredecessorStack {
    levels: [Option<NodeIndex>; SKIP_MAX_DEPTH],
}

impl PredecessorStack {
    #[inline]
    pub fn level(&self, level: usize) -> Option<NodeIndex> {
        self.levels[level]
    }

    #[inline]
    fn set(&mut self, level: usize, pred: Option<NodeIndex>) {
        self.levels[level] = pred;
    }

    /// Reset every level to the overlay head.
    pub fn clear(&mut self) {
        self.levels = [None; SKIP_MAX_DEPTH];
    }
}

/// Result of an overlay search.
pub struct OverlaySearch {
    /// Nearest entry: the first entry at or past the target, or the
    /// overlay's last entry when every key precedes the target. `None`
    /// only for an empty overlay.
    pub found: Option<NodeIndex>,
    /// Insertion points for a future splice at the target position.
    pub stack: PredecessorStack,
}

/// Skip-structured ordered set of pending modifications.
///
/// Keys are unique within one overlay. Mutation takes `&mut self` and is
/// writer-side; the search path only reads.
pub struct InsertOverlay {
    /// Forward links of the imaginary head entry, one per level.
    head: [Option<NodeIndex>; SKIP_MAX_DEPTH],
    entries: Vec<Entry>,
    /// Highest level currently in use.
    depth: usize,
    rng: StdRng,
}

impl InsertOverlay {
    /// Create an empty overlay.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create an empty overlay with a deterministic level sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            head: [None; SKIP_MAX_DEPTH],
            entries: Vec::new(),
            depth: 0,
            rng,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn entry(&self, idx: NodeIndex) -> &Entry {
        &self.entries[idx]
    }

    /// Forward link at `level` from `pred`, where `None` is the head.
    #[inline]
    fn next_of(&self, pred: Option<NodeIndex>, level: usize) -> Option<NodeIndex> {
        match pred {
            None => self.head[level],
            Some(idx) => self.entries[idx].next[level],
        }
    }

    /// Skip search for `target`, top level down.
    ///
    /// At each level the predecessor advances while the next entry's key
    /// is less than the target, and is recorded in the stack. An empty
    /// overlay does no work and returns an all-head stack.
    pub fn search(&self, target: Recno) -> OverlaySearch {
        let mut stack = PredecessorStack::default();
        if self.entries.is_empty() {
            return OverlaySearch { found: None, stack };
        }

        let mut pred: Option<NodeIndex> = None;
        for level in (0..self.depth).rev() {
            while let Some(next) = self.next_of(pred, level) {
                if self.entries[next].recno < target {
                    pred = Some(next);
                } else {
                    break;
                }
            }
            stack.set(level, pred);
        }

        // First entry at or past the target, else the overlay's last.
        let found = self.next_of(pred, 0).or(pred);
        debug_assert!(found.is_some());
        OverlaySearch { found, stack }
    }

    /// Point lookup.
    pub fn get(&self, recno: Recno) -> Option<&Update> {
        let result = self.search(recno);
        let idx = result.found?;
        (self.entries[idx].recno == recno).then(|| &self.entries[idx].update)
    }

    /// Splice a new entry at the position recorded by `stack`.
    ///
    /// The stack must come from a search for `recno` on this overlay in
    /// its current state, and that search must not have found the key
    /// (keys are unique).
    pub fn insert_at(
        &mut self,
        stack: &PredecessorStack,
        recno: Recno,
        update: Update,
    ) -> NodeIndex {
        debug_assert!(recno.is_valid());
        debug_assert!(
            self.next_of(stack.level(0), 0)
                .map_or(true, |next| self.entries[next].recno != recno),
            "duplicate overlay key"
        );
        debug_assert!(
            stack
                .level(0)
                .map_or(true, |pred| self.entries[pred].recno < recno),
            "stale predecessor stack"
        );

        let height = self.gen_height();
        let idx = self.entries.len();

        let mut next = vec![None; height];
        for (level, link) in next.iter_mut().enumerate() {
            *link = self.next_of(stack.level(level), level);
        }
        self.entries.push(Entry {
            recno,
            update,
            next,
        });

        for level in 0..height {
            match stack.level(level) {
                None => self.head[level] = Some(idx),
                Some(pred) => self.entries[pred].next[level] = Some(idx),
            }
        }
        if height > self.depth {
            self.depth = height;
        }
        idx
    }

    /// Search-then-splice convenience for writer-side and test code.
    pub fn insert(&mut self, recno: Recno, update: Update) -> NodeIndex {
        let result = self.search(recno);
        self.insert_at(&result.stack, recno, update)
    }

    /// Entries in key order.
    pub fn iter(&self) -> OverlayIter<'_> {
        OverlayIter {
            overlay: self,
            cursor: self.head[0],
        }
    }

    fn gen_height(&mut self) -> usize {
        let mut height = 1;
        while height < SKIP_MAX_DEPTH && self.rng.gen_bool(SKIP_PROBABILITY) {
            height += 1;
        }
        height
    }
}

impl Default for InsertOverlay {
    fn default() -> Self {
        Self::new()
    }
}

/// Level-0 walk over an overlay.
pub struct OverlayIter<'a> {
    overlay: &'a InsertOverlay,
    cursor: Option<NodeIndex>,
}

impl<'a> Iterator for OverlayIter<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let entry = &self.overlay.entries[idx];
        self.cursor = entry.next[0];
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value(s: &str) -> Update {
        Update::Value(s.as_bytes().to_vec())
    }

    fn keys(overlay: &InsertOverlay) -> Vec<u64> {
        overlay.iter().map(|e| e.recno().0).collect()
    }

    #[test]
    fn test_empty_search() {
        let overlay = InsertOverlay::with_seed(1);
        let result = overlay.search(Recno::new(42));
        assert!(result.found.is_none());
        for level in 0..crate::common::config::SKIP_MAX_DEPTH {
            assert_eq!(result.stack.level(level), None);
        }
    }

    #[test]
    fn test_search_exact() {
        let mut overlay = InsertOverlay::with_seed(1);
        overlay.insert(Recno::new(121), value("a"));
        overlay.insert(Recno::new(125), value("b"));

        let result = overlay.search(Recno::new(121));
        let found = result.found.unwrap();
        assert_eq!(overlay.entry(found).recno(), Recno::new(121));
    }

    #[test]
    fn test_search_between_keys() {
        // keys {121, 125}; target 123 finds 125, stack points at 121
        let mut overlay = InsertOverlay::with_seed(7);
        let idx_121 = overlay.insert(Recno::new(121), value("a"));
        overlay.insert(Recno::new(125), value("b"));

        let result = overlay.search(Recno::new(123));
        let found = result.found.unwrap();
        assert_eq!(overlay.entry(found).recno(), Recno::new(125));

        assert_eq!(result.stack.level(0), Some(idx_121));
        for level in 1..overlay.entry(idx_121).height() {
            assert_eq!(result.stack.level(level), Some(idx_121));
        }
        for level in overlay.entry(idx_121).height()..crate::common::config::SKIP_MAX_DEPTH {
            assert!(
                result.stack.level(level).is_none()
                    || result.stack.level(level) == Some(idx_121)
            );
        }
    }

    #[test]
    fn test_search_past_all_keys() {
        let mut overlay = InsertOverlay::with_seed(3);
        overlay.insert(Recno::new(5), value("a"));
        overlay.insert(Recno::new(9), value("b"));

        let result = overlay.search(Recno::new(100));
        let found = result.found.unwrap();
        assert_eq!(overlay.entry(found).recno(), Recno::new(9));
    }

    #[test]
    fn test_search_before_all_keys() {
        let mut overlay = InsertOverlay::with_seed(3);
        overlay.insert(Recno::new(50), value("a"));

        let result = overlay.search(Recno::new(10));
        let found = result.found.unwrap();
        assert_eq!(overlay.entry(found).recno(), Recno::new(50));
        assert_eq!(result.stack.level(0), None);
    }

    #[test]
    fn test_insert_at_keeps_order() {
        let mut overlay = InsertOverlay::with_seed(11);
        for recno in [40u64, 10, 30, 20, 50, 5] {
            let result = overlay.search(Recno::new(recno));
            overlay.insert_at(&result.stack, Recno::new(recno), value("x"));
        }
        assert_eq!(keys(&overlay), vec![5, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_get() {
        let mut overlay = InsertOverlay::with_seed(2);
        overlay.insert(Recno::new(7), value("seven"));
        overlay.insert(Recno::new(9), Update::Tombstone);

        assert_eq!(overlay.get(Recno::new(7)), Some(&value("seven")));
        assert_eq!(overlay.get(Recno::new(9)), Some(&Update::Tombstone));
        assert_eq!(overlay.get(Recno::new(8)), None);
    }

    #[test]
    fn test_higher_levels_consistent() {
        // every level must be a subsequence of level 0, in the same order
        let mut overlay = InsertOverlay::with_seed(42);
        for recno in 1..200u64 {
            overlay.insert(Recno::new(recno * 3), value("v"));
        }
        let level0 = keys(&overlay);
        for level in 1..crate::common::config::SKIP_MAX_DEPTH {
            let mut cursor = overlay.head[level];
            let mut walked = Vec::new();
            while let Some(idx) = cursor {
                walked.push(overlay.entry(idx).recno().0);
                cursor = overlay.entries[idx].next.get(level).copied().flatten();
            }
            assert!(walked.windows(2).all(|w| w[0] < w[1]));
            let mut it = level0.iter();
            assert!(walked.iter().all(|k| it.any(|&l| l == *k)));
        }
    }

    proptest! {
        // Outcome laws: searching any target in any overlay either finds
        // the first key >= target or, failing that, the last key.
        #[test]
        fn prop_search_finds_nearest(
            keys in proptest::collection::btree_set(1u64..10_000, 1..128),
            target in 1u64..11_000,
        ) {
            let mut overlay = InsertOverlay::with_seed(99);
            for &k in &keys {
                overlay.insert(Recno::new(k), Update::Tombstone);
            }
            let result = overlay.search(Recno::new(target));
            let found = overlay.entry(result.found.unwrap()).recno().0;

            match keys.iter().copied().find(|&k| k >= target) {
                Some(ceiling) => prop_assert_eq!(found, ceiling),
                None => prop_assert_eq!(found, *keys.iter().last().unwrap()),
            }
        }

        // insert_at with a fresh stack always preserves level-0 order.
        #[test]
        fn prop_insert_preserves_order(
            keys in proptest::collection::vec(1u64..10_000, 1..128),
        ) {
            let mut overlay = InsertOverlay::with_seed(5);
            let mut expected = std::collections::BTreeSet::new();
            for k in keys {
                if expected.insert(k) {
                    let result = overlay.search(Recno::new(k));
                    overlay.insert_at(&result.stack, Recno::new(k), Update::Tombstone);
                }
            }
            let got: Vec<u64> = overlay.iter().map(|e| e.recno().0).collect();
            let want: Vec<u64> = expected.into_iter().collect();
            prop_assert_eq!(got, want);
        }
    }
}
