//! Record-number search over a column tree.
//!
//! One operation: [`search`]. It descends from the root with binary
//! search at every internal level, pinning each child before releasing
//! its parent, dispatches on the leaf's physical encoding to find the
//! covering slot (or the append position past the last record), then
//! refines that position against the leaf's insert overlay. The result
//! is a positioned [`SearchCursor`] owning the pinned leaf, with a
//! tri-state [`SearchOutcome`] telling the caller where the resolved
//! position sits relative to the requested record.

use std::cmp::Ordering;

use crate::cache::{PageCache, PinnedPage};
use crate::common::{PageId, Recno, Result};
use crate::tree::overlay::{InsertOverlay, NodeIndex, PredecessorStack};
use crate::tree::page::{LeafPage, Node};

/// A column tree: the root page handle.
///
/// Pages persist in the cache and store across searches; the tree value
/// itself is just the entry point.
pub struct Tree {
    pub root: PageId,
}

impl Tree {
    pub fn new(root: PageId) -> Self {
        Self { root }
    }
}

/// Collaborator handles threaded through a search.
pub struct SearchContext<'a> {
    pub cache: &'a PageCache,
    pub tree: &'a Tree,
}

/// Position of the nearest found record relative to the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The resolved position precedes the requested record (append case,
    /// or an overlay whose last key falls short of the target).
    Before,
    /// Exact match.
    Equal,
    /// The resolved position is past the requested record: the record
    /// does not exist verbatim, but a later one does.
    After,
}

/// Which overlay the search consulted on the resolved leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayChoice {
    /// The page-level update overlay of a fixed-length leaf.
    PageUpdate,
    /// The update overlay of one variable-length cell.
    CellUpdate(usize),
    /// The leaf's append overlay.
    Append,
}

/// A positioned search result.
///
/// Produced by one [`search`] invocation; the caller either consumes it
/// (releasing the leaf pin by dropping the cursor) or the error path
/// inside `search` releases the held page before returning. On failure
/// the cursor carries no pin and no positional state.
pub struct SearchCursor<'a> {
    /// The pinned leaf, owned by the cursor on success.
    page: Option<PinnedPage<'a>>,
    /// The record number the search was asked for.
    target: Recno,
    /// Resolved record number: the target, the append anchor, or the
    /// matched overlay key.
    recno: Recno,
    /// Matched on-page slot, when the target maps to one.
    slot: Option<usize>,
    /// Overlay consulted on the leaf.
    overlay: Option<OverlayChoice>,
    /// Matched overlay entry, when the overlay was non-empty.
    found: Option<NodeIndex>,
    /// Per-level insertion points from the overlay search; meaningful
    /// only when an overlay search ran.
    stack: PredecessorStack,
    /// Tri-state comparison of the resolved position to the target.
    outcome: Option<SearchOutcome>,
    /// Leaf write generation captured before content reads, when the
    /// search was invoked for a modification.
    write_gen: Option<u64>,
}

impl<'a> SearchCursor<'a> {
    pub fn new() -> Self {
        Self {
            page: None,
            target: Recno::INVALID,
            recno: Recno::INVALID,
            slot: None,
            overlay: None,
            found: None,
            stack: PredecessorStack::default(),
            outcome: None,
            write_gen: None,
        }
    }

    /// Drop any prior pin and positional state.
    pub fn reset(&mut self) {
        self.page = None;
        self.target = Recno::INVALID;
        self.recno = Recno::INVALID;
        self.slot = None;
        self.overlay = None;
        self.found = None;
        self.stack.clear();
        self.outcome = None;
        self.write_gen = None;
    }

    #[inline]
    pub fn page(&self) -> Option<&PinnedPage<'a>> {
        self.page.as_ref()
    }

    /// Transfer the leaf pin out of the cursor.
    pub fn take_page(&mut self) -> Option<PinnedPage<'a>> {
        self.page.take()
    }

    #[inline]
    pub fn target(&self) -> Recno {
        self.target
    }

    #[inline]
    pub fn recno(&self) -> Recno {
        self.recno
    }

    #[inline]
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    #[inline]
    pub fn overlay(&self) -> Option<OverlayChoice> {
        self.overlay
    }

    #[inline]
    pub fn found(&self) -> Option<NodeIndex> {
        self.found
    }

    #[inline]
    pub fn stack(&self) -> &PredecessorStack {
        &self.stack
    }

    #[inline]
    pub fn outcome(&self) -> Option<SearchOutcome> {
        self.outcome
    }

    #[inline]
    pub fn write_gen(&self) -> Option<u64> {
        self.write_gen
    }
}

impl Default for SearchCursor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// On-page position selected by leaf dispatch, before overlay merge.
struct LeafPosition {
    recno: Recno,
    outcome: SearchOutcome,
    slot: Option<usize>,
    choice: OverlayChoice,
}

/// Search the tree for `target`, leaving `cursor` positioned on the
/// covering leaf.
///
/// When `modify` is set, the leaf's write generation is captured into
/// the cursor before any page content is read; a mutating caller
/// detects a concurrent reconciliation by re-checking the generation,
/// which is outside this function's contract.
///
/// # Errors
/// Propagates pin failures from the cache. The one page held at the
/// moment of failure is released; the cursor is left cleared.
pub fn search<'a>(
    ctx: &SearchContext<'a>,
    cursor: &mut SearchCursor<'a>,
    target: Recno,
    modify: bool,
) -> Result<()> {
    cursor.reset();
    cursor.target = target;
    cursor.recno = target;

    // Descend the internal levels. Exactly one pin is held at any
    // instant: the child is pinned before the parent guard drops, so a
    // pin failure unwinds releasing the held page exactly once.
    let mut page = ctx.cache.pin(ctx.tree.root)?;
    loop {
        let child = match page.node() {
            Node::Internal(internal) => *internal.descend(target),
            Node::Leaf(_) => break,
        };
        page = ctx.cache.pin(child.child)?;
        debug_assert!(
            page.node().start() == child.start,
            "child page start disagrees with its reference"
        );
    }

    // Capture the write generation before any content read below; the
    // Acquire load orders the two.
    if modify {
        cursor.write_gen = Some(page.write_gen());
    }

    let Node::Leaf(leaf) = page.node() else {
        unreachable!("descent ended on an internal page");
    };

    let (position, overlay) = leaf_dispatch(leaf, target);
    cursor.recno = position.recno;
    cursor.outcome = Some(position.outcome);
    cursor.slot = position.slot;
    cursor.overlay = Some(position.choice);

    // Refine against pending modifications. An empty overlay leaves the
    // leaf-level result standing; a match overrides the resolved recno
    // with the found entry's key.
    if !overlay.is_empty() {
        let result = overlay.search(target);
        cursor.stack = result.stack;
        if let Some(found) = result.found {
            let found_recno = overlay.entry(found).recno();
            cursor.found = Some(found);
            cursor.recno = found_recno;
            cursor.outcome = Some(match found_recno.cmp(&target) {
                Ordering::Equal => SearchOutcome::Equal,
                Ordering::Greater => SearchOutcome::After,
                Ordering::Less => SearchOutcome::Before,
            });
        }
    }

    cursor.page = Some(page);
    Ok(())
}

/// Locate `target` on a leaf and select the overlay to consult next.
fn leaf_dispatch<'p>(leaf: &'p LeafPage, target: Recno) -> (LeafPosition, &'p InsertOverlay) {
    match leaf {
        LeafPage::Fixed(fixed) => {
            if target >= fixed.limit() {
                // past the page: anchor one past the last slot
                (
                    LeafPosition {
                        recno: fixed.limit(),
                        outcome: SearchOutcome::Before,
                        slot: None,
                        choice: OverlayChoice::Append,
                    },
                    fixed.append(),
                )
            } else {
                (
                    LeafPosition {
                        recno: target,
                        outcome: SearchOutcome::Equal,
                        slot: Some(target.offset_from(fixed.start()) as usize),
                        choice: OverlayChoice::PageUpdate,
                    },
                    fixed.update(),
                )
            }
        }
        LeafPage::Var(var) => match var.cell_covering(target) {
            None => {
                // past the page: anchor at the last existing record,
                // which is not arithmetic on this encoding
                (
                    LeafPosition {
                        recno: var.last_recno(),
                        outcome: SearchOutcome::Before,
                        slot: None,
                        choice: OverlayChoice::Append,
                    },
                    var.append(),
                )
            }
            Some(slot) => (
                LeafPosition {
                    recno: target,
                    outcome: SearchOutcome::Equal,
                    slot: Some(slot),
                    choice: OverlayChoice::CellUpdate(slot),
                },
                var.update(slot),
            ),
        },
    }
}
