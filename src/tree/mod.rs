//! Column-store tree pages and the record-number search path.
//!
//! # Components
//! - [`page`] - Decoded page types (internal nodes, the two leaf encodings)
//! - [`overlay`] - Skip-structured insert overlays for pending modifications
//! - [`search`] - Pinned-page descent, leaf dispatch, and overlay merge

pub mod overlay;
pub mod page;
pub mod search;

pub use overlay::{InsertOverlay, PredecessorStack, Update};
pub use page::{Cell, ChildRef, FixedLeaf, InternalPage, LeafPage, Node, Page, VarLeaf};
pub use search::{search, OverlayChoice, SearchContext, SearchCursor, SearchOutcome, Tree};
