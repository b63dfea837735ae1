//! Decoded tree pages.
//!
//! A [`Page`] is one node of a column tree, decoded into its in-memory
//! form: an [`InternalPage`] partitioning the record-number space across
//! child pages, or a [`LeafPage`] in one of two physical encodings
//! ([`FixedLeaf`], [`VarLeaf`]). Page content is immutable once the page
//! is published to the cache; the only runtime-mutable pieces are the
//! atomic write generation and, on the writer side, the insert overlays.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::{PageId, Recno};
use crate::tree::overlay::InsertOverlay;

/// A decoded tree page plus its identity and write generation.
pub struct Page {
    id: PageId,
    /// Bumped (Release) on any structural mutation of the page; captured
    /// (Acquire) by a search that will be used for a modification.
    write_gen: AtomicU64,
    node: Node,
}

impl Page {
    /// Wrap a decoded node as a cache-ready page.
    pub fn new(id: PageId, node: Node) -> Self {
        Self {
            id,
            write_gen: AtomicU64::new(0),
            node,
        }
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.id
    }

    #[inline]
    pub fn node(&self) -> &Node {
        &self.node
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.node, Node::Leaf(_))
    }

    /// Capture the write generation.
    ///
    /// The Acquire load orders this read before any subsequent content
    /// read; mutators increment the generation with Release ordering
    /// after writing content, so a captured generation is never newer
    /// than the content read after it.
    #[inline]
    pub fn write_gen(&self) -> u64 {
        self.write_gen.load(Ordering::Acquire)
    }

    /// Record a structural mutation. Writer-side only.
    #[inline]
    pub fn bump_write_gen(&self) -> u64 {
        self.write_gen.fetch_add(1, Ordering::Release) + 1
    }

    /// Whether the page holds pending overlay entries.
    ///
    /// Such a page cannot be rebuilt from its disk image and must stay
    /// resident until reconciled.
    pub fn has_pending(&self) -> bool {
        match &self.node {
            Node::Internal(_) => false,
            Node::Leaf(LeafPage::Fixed(leaf)) => {
                !leaf.update.is_empty() || !leaf.append.is_empty()
            }
            Node::Leaf(LeafPage::Var(leaf)) => {
                !leaf.append.is_empty() || leaf.updates.iter().any(|o| !o.is_empty())
            }
        }
    }
}

/// Tagged union over the two structural page kinds.
pub enum Node {
    Internal(InternalPage),
    Leaf(LeafPage),
}

impl Node {
    /// Starting record number of the range this page covers.
    pub fn start(&self) -> Recno {
        match self {
            Node::Internal(page) => page.start(),
            Node::Leaf(LeafPage::Fixed(leaf)) => leaf.start(),
            Node::Leaf(LeafPage::Var(leaf)) => leaf.start(),
        }
    }
}

/// One child reference on an internal page.
///
/// Entry *i* covers the half-open range from `children[i].start` to
/// `children[i+1].start`, or to infinity for the last entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRef {
    pub start: Recno,
    pub child: PageId,
}

/// An internal page: an ordered array of child references.
pub struct InternalPage {
    children: Vec<ChildRef>,
}

impl InternalPage {
    /// Build an internal page from its child array.
    ///
    /// The array must be non-empty and strictly ascending by `start`.
    pub fn new(children: Vec<ChildRef>) -> Self {
        debug_assert!(!children.is_empty(), "internal page with no children");
        debug_assert!(
            children.windows(2).all(|w| w[0].start < w[1].start),
            "child array not strictly ascending"
        );
        Self { children }
    }

    #[inline]
    pub fn start(&self) -> Recno {
        self.children[0].start
    }

    #[inline]
    pub fn children(&self) -> &[ChildRef] {
        &self.children
    }

    /// Binary search for the child covering `target`: the last entry with
    /// `start <= target`.
    ///
    /// `target` must be at or past this page's own start; the first
    /// entry's start is never greater than any target that legitimately
    /// reached this page, so the candidate index cannot underflow.
    pub fn descend(&self, target: Recno) -> &ChildRef {
        let base = self.children.partition_point(|c| c.start <= target);
        debug_assert!(base > 0, "target precedes the page's first child");
        &self.children[base - 1]
    }
}

/// Tagged union over the two leaf encodings.
pub enum LeafPage {
    Fixed(FixedLeaf),
    Var(VarLeaf),
}

impl LeafPage {
    #[inline]
    pub fn start(&self) -> Recno {
        match self {
            LeafPage::Fixed(leaf) => leaf.start(),
            LeafPage::Var(leaf) => leaf.start(),
        }
    }

    /// Append overlay of either encoding.
    #[inline]
    pub fn append(&self) -> &InsertOverlay {
        match self {
            LeafPage::Fixed(leaf) => leaf.append(),
            LeafPage::Var(leaf) => leaf.append(),
        }
    }
}

/// Fixed-length leaf: uniform-size slots, directly addressable by
/// `recno - start`.
pub struct FixedLeaf {
    start: Recno,
    value_size: usize,
    slots: Vec<u8>,
    /// Pending updates to on-page records; one overlay covers the page.
    update: InsertOverlay,
    /// Pending records past `start + slot_count`.
    append: InsertOverlay,
}

impl FixedLeaf {
    /// Build a fixed-length leaf from raw slot bytes.
    ///
    /// `slots.len()` must be a multiple of `value_size`.
    pub fn new(start: Recno, value_size: usize, slots: Vec<u8>) -> Self {
        debug_assert!(start.is_valid(), "leaf start must be a real recno");
        debug_assert!(value_size > 0, "zero-size slots");
        debug_assert_eq!(slots.len() % value_size, 0, "ragged slot array");
        Self {
            start,
            value_size,
            slots,
            update: InsertOverlay::new(),
            append: InsertOverlay::new(),
        }
    }

    #[inline]
    pub fn start(&self) -> Recno {
        self.start
    }

    #[inline]
    pub fn value_size(&self) -> usize {
        self.value_size
    }

    #[inline]
    pub fn slot_count(&self) -> u64 {
        (self.slots.len() / self.value_size) as u64
    }

    /// One past the last on-page record number.
    #[inline]
    pub fn limit(&self) -> Recno {
        self.start.advance(self.slot_count())
    }

    /// Raw value bytes of one slot.
    pub fn value(&self, slot: usize) -> &[u8] {
        let at = slot * self.value_size;
        &self.slots[at..at + self.value_size]
    }

    #[inline]
    pub fn update(&self) -> &InsertOverlay {
        &self.update
    }

    #[inline]
    pub fn append(&self) -> &InsertOverlay {
        &self.append
    }

    /// Writer-side access, valid only before the page is published.
    #[inline]
    pub fn update_mut(&mut self) -> &mut InsertOverlay {
        &mut self.update
    }

    #[inline]
    pub fn append_mut(&mut self) -> &mut InsertOverlay {
        &mut self.append
    }
}

/// One run of a variable-length leaf: `count` consecutive record numbers
/// sharing a value.
pub struct Cell {
    start: Recno,
    count: u64,
    value: Vec<u8>,
}

impl Cell {
    #[inline]
    pub fn start(&self) -> Recno {
        self.start
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Last record number in this run.
    #[inline]
    pub fn last(&self) -> Recno {
        Recno(self.start.0 + self.count - 1)
    }
}

/// Variable-length / run-length leaf: locating a record number requires
/// an in-page search, not arithmetic.
pub struct VarLeaf {
    start: Recno,
    cells: Vec<Cell>,
    /// Pending updates per cell; an empty overlay stands for "absent".
    updates: Vec<InsertOverlay>,
    /// Pending records past the page's last record number.
    append: InsertOverlay,
}

impl VarLeaf {
    /// Build a variable-length leaf from `(count, value)` runs.
    ///
    /// Runs cover a contiguous record-number range starting at `start`;
    /// every count must be non-zero.
    pub fn new(start: Recno, runs: Vec<(u64, Vec<u8>)>) -> Self {
        debug_assert!(start.is_valid(), "leaf start must be a real recno");
        let mut cells = Vec::with_capacity(runs.len());
        let mut next = start;
        for (count, value) in runs {
            debug_assert!(count > 0, "empty run");
            cells.push(Cell {
                start: next,
                count,
                value,
            });
            next = next.advance(count);
        }
        let updates = cells.iter().map(|_| InsertOverlay::new()).collect();
        Self {
            start,
            cells,
            updates,
            append: InsertOverlay::new(),
        }
    }

    #[inline]
    pub fn start(&self) -> Recno {
        self.start
    }

    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn cell(&self, slot: usize) -> &Cell {
        &self.cells[slot]
    }

    /// Last on-page record number, or `start - 1` for an empty page.
    pub fn last_recno(&self) -> Recno {
        match self.cells.last() {
            Some(cell) => cell.last(),
            None => Recno(self.start.0 - 1),
        }
    }

    /// In-page search for the run covering `target`.
    ///
    /// Returns the cell index, or None when `target` is past the page's
    /// last record number (the append case).
    pub fn cell_covering(&self, target: Recno) -> Option<usize> {
        debug_assert!(target >= self.start, "target precedes page start");
        let base = self.cells.partition_point(|c| c.start <= target);
        if base == 0 {
            return None;
        }
        let cell = &self.cells[base - 1];
        (target.0 < cell.start.0 + cell.count).then_some(base - 1)
    }

    #[inline]
    pub fn update(&self, slot: usize) -> &InsertOverlay {
        &self.updates[slot]
    }

    #[inline]
    pub fn append(&self) -> &InsertOverlay {
        &self.append
    }

    /// Writer-side access, valid only before the page is published.
    #[inline]
    pub fn update_mut(&mut self, slot: usize) -> &mut InsertOverlay {
        &mut self.updates[slot]
    }

    #[inline]
    pub fn append_mut(&mut self) -> &mut InsertOverlay {
        &mut self.append
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn internal(starts: &[u64]) -> InternalPage {
        InternalPage::new(
            starts
                .iter()
                .enumerate()
                .map(|(i, &s)| ChildRef {
                    start: Recno::new(s),
                    child: PageId::new(i as u32),
                })
                .collect(),
        )
    }

    #[test]
    fn test_descend_between_entries() {
        // children starting at {1, 100, 250}; target 150 must pick 100
        let page = internal(&[1, 100, 250]);
        assert_eq!(page.descend(Recno::new(150)).start, Recno::new(100));
    }

    #[test]
    fn test_descend_exact_match() {
        let page = internal(&[1, 100, 250]);
        assert_eq!(page.descend(Recno::new(100)).start, Recno::new(100));
        assert_eq!(page.descend(Recno::new(1)).start, Recno::new(1));
        assert_eq!(page.descend(Recno::new(250)).start, Recno::new(250));
    }

    #[test]
    fn test_descend_past_last_entry() {
        let page = internal(&[1, 100, 250]);
        assert_eq!(page.descend(Recno::new(100_000)).start, Recno::new(250));
    }

    #[test]
    fn test_descend_single_child() {
        let page = internal(&[1]);
        assert_eq!(page.descend(Recno::new(1)).start, Recno::new(1));
        assert_eq!(page.descend(Recno::new(u64::MAX)).start, Recno::new(1));
    }

    #[test]
    fn test_fixed_leaf_addressing() {
        let leaf = FixedLeaf::new(Recno::new(100), 4, vec![0u8; 20 * 4]);
        assert_eq!(leaf.slot_count(), 20);
        assert_eq!(leaf.limit(), Recno::new(120));
        assert_eq!(Recno::new(119).offset_from(leaf.start()), 19);
    }

    #[test]
    fn test_fixed_leaf_values() {
        let mut slots = Vec::new();
        for i in 0u8..8 {
            slots.extend_from_slice(&[i, i, i]);
        }
        let leaf = FixedLeaf::new(Recno::new(1), 3, slots);
        assert_eq!(leaf.value(0), &[0, 0, 0]);
        assert_eq!(leaf.value(7), &[7, 7, 7]);
    }

    #[test]
    fn test_var_leaf_run_boundaries() {
        // runs: [10..=14], [15..=15], [16..=25]
        let leaf = VarLeaf::new(
            Recno::new(10),
            vec![(5, b"a".to_vec()), (1, b"b".to_vec()), (10, b"c".to_vec())],
        );
        assert_eq!(leaf.cell_covering(Recno::new(10)), Some(0));
        assert_eq!(leaf.cell_covering(Recno::new(14)), Some(0));
        assert_eq!(leaf.cell_covering(Recno::new(15)), Some(1));
        assert_eq!(leaf.cell_covering(Recno::new(16)), Some(2));
        assert_eq!(leaf.cell_covering(Recno::new(25)), Some(2));
        assert_eq!(leaf.cell_covering(Recno::new(26)), None);
        assert_eq!(leaf.last_recno(), Recno::new(25));
    }

    #[test]
    fn test_var_leaf_empty() {
        let leaf = VarLeaf::new(Recno::new(1), vec![]);
        assert_eq!(leaf.last_recno(), Recno::INVALID);
        assert_eq!(leaf.cell_covering(Recno::new(1)), None);
    }

    #[test]
    fn test_write_gen_capture() {
        let page = Page::new(
            PageId::new(0),
            Node::Leaf(LeafPage::Fixed(FixedLeaf::new(Recno::new(1), 1, vec![0; 4]))),
        );
        assert_eq!(page.write_gen(), 0);
        assert_eq!(page.bump_write_gen(), 1);
        assert_eq!(page.write_gen(), 1);
    }

    #[test]
    fn test_has_pending() {
        use crate::tree::overlay::Update;

        let mut leaf = FixedLeaf::new(Recno::new(1), 1, vec![0; 4]);
        let page = Page::new(PageId::new(0), Node::Leaf(LeafPage::Fixed(
            FixedLeaf::new(Recno::new(1), 1, vec![0; 4]),
        )));
        assert!(!page.has_pending());

        leaf.append_mut().insert(Recno::new(5), Update::Value(b"x".to_vec()));
        let page = Page::new(PageId::new(1), Node::Leaf(LeafPage::Fixed(leaf)));
        assert!(page.has_pending());
    }

    proptest! {
        // Any strictly ascending child array and any target at or past the
        // first start: descent picks the unique covering child.
        #[test]
        fn prop_descend_picks_covering_child(
            starts in proptest::collection::btree_set(1u64..1_000_000, 1..64),
            offset in 0u64..2_000_000,
        ) {
            let starts: Vec<u64> = starts.iter().copied().collect();
            let page = internal(&starts);
            let target = Recno::new(starts[0] + offset);

            let picked = page.descend(target);
            prop_assert!(picked.start <= target);
            let expected = starts
                .iter()
                .copied()
                .filter(|&s| s <= target.0)
                .max()
                .unwrap();
            prop_assert_eq!(picked.start, Recno::new(expected));
        }
    }
}
