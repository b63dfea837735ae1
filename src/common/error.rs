//! Error types for colstore.

use thiserror::Error;

use crate::common::PageId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in colstore.
///
/// The search path can only fail while pinning a page; every variant here
/// is something the pin path may surface. Structural corruption detected
/// in memory (an unsorted child array, an overlay search landing out of
/// bounds) is a debug assertion, not an `Error`: it cannot be reasoned
/// about locally and is not recoverable.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the backing page store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist in the store.
    #[error("page {0} not found")]
    PageNotFound(PageId),

    /// Page cache has no free frames and every resident page is pinned
    /// or holds pending overlay entries.
    #[error("no evictable frames in page cache")]
    NoFreeFrames,

    /// A page image failed checksum verification or could not be decoded.
    #[error("page {page} corrupted: {reason}")]
    Corrupted {
        page: PageId,
        reason: &'static str,
    },

    /// A page body does not fit in a single on-disk page slot.
    #[error("encoded page body of {need} bytes exceeds page capacity")]
    PageOverflow { need: usize },
}
