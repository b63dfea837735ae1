//! RAII pin on a cached page.

use std::ops::Deref;
use std::sync::Arc;

use crate::common::{FrameId, PageId};
use crate::tree::page::Page;

use super::page_cache::PageCache;

/// A pinned page.
///
/// Holding a `PinnedPage` guarantees the page stays resident; dropping
/// it releases the pin. Content access derefs straight into the shared
/// page with no lock held.
///
/// Exactly one pin is held at a time during descent; on success the
/// search cursor takes ownership of the leaf's pin and the caller
/// releases it by dropping the cursor (or the guard taken out of it).
pub struct PinnedPage<'a> {
    cache: &'a PageCache,
    frame_id: FrameId,
    page: Arc<Page>,
}

impl<'a> PinnedPage<'a> {
    /// Called by `PageCache` with the pin count already raised.
    pub(crate) fn new(cache: &'a PageCache, frame_id: FrameId, page: Arc<Page>) -> Self {
        Self {
            cache,
            frame_id,
            page,
        }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page.id()
    }

    /// Get the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PinnedPage<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.page
    }
}

impl Drop for PinnedPage<'_> {
    fn drop(&mut self) {
        self.cache.unpin_internal(self.frame_id);
    }
}
