//! colstore - the record-number search path of a column-store B-tree
//! engine.
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          colstore                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Search Path (tree/search)                │   │
//! │  │   descent → leaf dispatch → insert-overlay merge      │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              ↓                               │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │            Tree Pages (tree/page, tree/overlay)       │   │
//! │  │   internal child arrays │ fixed / var leaves │        │   │
//! │  │   skip-structured insert overlays                     │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              ↓                               │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Page Cache (cache/)                      │   │
//! │  │   pin/release + frame pool + FIFO eviction            │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              ↓                               │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Page Store (store/)                      │   │
//! │  │   DiskManager + checksummed page images + codec       │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Recno, Error, config)
//! - [`cache`] - Page cache: pinning, eviction, statistics
//! - [`store`] - Backing store: file I/O and the on-disk page format
//! - [`tree`] - Tree pages, insert overlays, and the search operation
//!
//! # Quick Start
//! ```no_run
//! use colstore::{
//!     search, DiskManager, FixedLeaf, LeafPage, Node, PageCache, Recno,
//!     SearchContext, SearchCursor, Tree,
//! };
//!
//! let disk = DiskManager::create("column.db").unwrap();
//! let cache = PageCache::new(64, disk);
//!
//! let root = cache
//!     .install(Node::Leaf(LeafPage::Fixed(FixedLeaf::new(
//!         Recno::new(1),
//!         8,
//!         vec![0u8; 8 * 100],
//!     ))))
//!     .unwrap();
//! let tree = Tree::new(root);
//!
//! let ctx = SearchContext { cache: &cache, tree: &tree };
//! let mut cursor = SearchCursor::new();
//! search(&ctx, &mut cursor, Recno::new(42), false).unwrap();
//! ```

pub mod cache;
pub mod common;
pub mod store;
pub mod tree;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, Recno, Result};

pub use cache::{CacheStats, Frame, PageCache, PinnedPage, StatsSnapshot};
pub use store::{DiskManager, PageHeader, PageImage, PageType};
pub use tree::{
    search, ChildRef, FixedLeaf, InsertOverlay, InternalPage, LeafPage, Node, OverlayChoice, Page,
    PredecessorStack, SearchContext, SearchCursor, SearchOutcome, Tree, Update, VarLeaf,
};
