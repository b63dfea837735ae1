//! Frame - a slot in the page cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::tree::page::Page;

/// A frame in the page cache.
///
/// A frame publishes at most one decoded page. The page itself is shared
/// as an `Arc`: pinning clones the Arc under the cache's bookkeeping
/// locks, after which content reads hold no lock at all. The pin count
/// keeps the frame out of eviction while any pin is live.
pub struct Frame {
    /// The resident page, if any.
    page: Mutex<Option<Arc<Page>>>,

    /// Number of active pins on this frame.
    pin_count: AtomicU32,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page: Mutex::new(None),
            pin_count: AtomicU32::new(0),
        }
    }

    /// Clone out the resident page, if any.
    #[inline]
    pub fn snapshot(&self) -> Option<Arc<Page>> {
        self.page.lock().clone()
    }

    /// Publish a page into this frame.
    #[inline]
    pub fn publish(&self, page: Arc<Page>) {
        *self.page.lock() = Some(page);
    }

    /// Drop the resident page. The frame must be unpinned.
    #[inline]
    pub fn clear(&self) {
        debug_assert!(!self.is_pinned(), "clearing a pinned frame");
        *self.page.lock() = None;
    }

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if the pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    /// Get the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    /// Check if the frame is currently pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Check if the frame is empty (no page resident).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page.lock().is_none()
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
