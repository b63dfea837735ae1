//! Page Cache - the pin/release layer over the backing store.
//!
//! The [`PageCache`] provides:
//! - Reference-counted page pinning
//! - Page-in from the store on a miss (checksum-verified and decoded)
//! - FIFO eviction of unpinned frames
//!
//! It never writes a resident page back: the search path is read-only,
//! and reconciling a mutated page belongs to a different layer. Pages
//! holding pending overlay entries are skipped by eviction since their
//! disk image cannot reproduce them.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::{Mutex, RwLock};

use crate::cache::replacer::FifoReplacer;
use crate::cache::{CacheStats, Frame, PinnedPage};
use crate::common::{Error, FrameId, PageId, Result};
use crate::store::{codec, DiskManager};
use crate::tree::page::{Node, Page};

/// Manages a fixed pool of frames caching decoded tree pages.
///
/// # Thread Safety
/// - `page_table`: `RwLock` - many readers, few writers
/// - `free_list`, `replacer`, `disk`: `Mutex` - modified on every use
/// - `frames`: no outer lock - fixed size, internal synchronization
/// - `stats`: atomic counters
///
/// Lock order is page table before replacer; no path takes them in the
/// other direction.
pub struct PageCache {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps page IDs to frame IDs.
    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Stack of free frame IDs.
    free_list: Mutex<Vec<FrameId>>,

    /// Eviction policy for selecting victim frames.
    replacer: Mutex<FifoReplacer>,

    /// Handles all store I/O.
    disk: Mutex<DiskManager>,

    /// Performance statistics.
    stats: CacheStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

impl PageCache {
    /// Create a new page cache over a backing store.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        Self {
            frames: (0..pool_size).map(|_| Frame::new()).collect(),
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new((0..pool_size).map(FrameId::new).collect()),
            replacer: Mutex::new(FifoReplacer::new()),
            disk: Mutex::new(disk),
            stats: CacheStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: pin
    // ========================================================================

    /// Pin a page, paging it in from the store on a miss.
    ///
    /// The pin is released when the returned guard drops.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist in the store
    /// - `Error::NoFreeFrames` if no frame can be reclaimed
    /// - `Error::Corrupted` if the stored image fails verification
    /// - `Error::Io` on store read failure
    pub fn pin(&self, page_id: PageId) -> Result<PinnedPage<'_>> {
        {
            let table = self.page_table.read();
            if let Some(&frame_id) = table.get(&page_id) {
                let pinned = self.pin_resident(frame_id);
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(pinned);
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        self.page_in(page_id)
    }

    // ========================================================================
    // Public API: seed pages
    // ========================================================================

    /// Allocate a store slot for `node`, persist its image, and publish
    /// the decoded page in the cache (unpinned).
    ///
    /// Overlays carried by `node` stay with the resident page; they are
    /// not part of the persisted image.
    pub fn install(&self, node: Node) -> Result<PageId> {
        let image = codec::encode_page(&node)?;

        let page_id = {
            let mut disk = self.disk.lock();
            let page_id = disk.allocate_page()?;
            disk.write_page(page_id, &image)?;
            page_id
        };
        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);

        let frame_id = self.reserve_frame()?;
        let frame = &self.frames[frame_id.0];
        frame.publish(Arc::new(Page::new(page_id, node)));

        {
            let mut table = self.page_table.write();
            table.insert(page_id, frame_id);
        }
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, true);
        }

        Ok(page_id)
    }

    // ========================================================================
    // Public API: stats and info
    // ========================================================================

    /// Get cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Get the number of resident pages.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Get the number of frames with at least one live pin.
    pub fn pinned_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_pinned()).count()
    }

    // ========================================================================
    // Internal: called by PinnedPage on drop
    // ========================================================================

    pub(crate) fn unpin_internal(&self, frame_id: FrameId) {
        let frame = &self.frames[frame_id.0];
        if frame.unpin() == 0 {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: hit and miss paths
    // ========================================================================

    /// Pin a frame known to be mapped. Caller holds the page table lock
    /// (read or write), which excludes eviction of this frame.
    fn pin_resident(&self, frame_id: FrameId) -> PinnedPage<'_> {
        let frame = &self.frames[frame_id.0];
        let page = frame
            .snapshot()
            .expect("frame mapped in page table holds no page");
        frame.pin();

        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);
        drop(replacer);

        PinnedPage::new(self, frame_id, page)
    }

    /// Miss path: reserve a frame, read and decode the image, publish.
    fn page_in(&self, page_id: PageId) -> Result<PinnedPage<'_>> {
        let frame_id = self.reserve_frame()?;

        let decoded = (|| {
            let image = {
                let mut disk = self.disk.lock();
                disk.read_page(page_id)?
            };
            codec::decode_page(page_id, &image)
        })();
        let page = match decoded {
            Ok(page) => Arc::new(page),
            Err(err) => {
                // the reserved frame must not leak on a failed read
                self.free_list.lock().push(frame_id);
                return Err(err);
            }
        };
        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        let mut table = self.page_table.write();
        if let Some(&existing) = table.get(&page_id) {
            // another thread paged it in first; use its frame
            self.free_list.lock().push(frame_id);
            let pinned = self.pin_resident(existing);
            return Ok(pinned);
        }

        let frame = &self.frames[frame_id.0];
        frame.publish(Arc::clone(&page));
        frame.pin();
        table.insert(page_id, frame_id);
        drop(table);

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        Ok(PinnedPage::new(self, frame_id, page))
    }

    // ========================================================================
    // Internal: frame reservation and eviction
    // ========================================================================

    /// Get a free frame, evicting if necessary.
    fn reserve_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }
        self.evict_frame()
    }

    /// Evict an unpinned, pending-free page and return its frame.
    fn evict_frame(&self) -> Result<FrameId> {
        // Each pass either reclaims a frame or retires one candidate, so
        // the loop is bounded by the pool size.
        for _ in 0..=self.pool_size {
            let Some(frame_id) = self.select_victim() else {
                return Err(Error::NoFreeFrames);
            };
            let frame = &self.frames[frame_id.0];

            let mut table = self.page_table.write();
            if frame.is_pinned() {
                // pinned between selection and unmap; put it back
                drop(table);
                let mut replacer = self.replacer.lock();
                replacer.record_access(frame_id);
                continue;
            }
            if let Some(page) = frame.snapshot() {
                table.remove(&page.id());
            }
            frame.clear();
            drop(table);

            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            return Ok(frame_id);
        }
        Err(Error::NoFreeFrames)
    }

    /// Ask the replacer for a victim, skipping frames whose page holds
    /// pending overlay entries. Skipped frames re-enter the replacer.
    fn select_victim(&self) -> Option<FrameId> {
        let mut replacer = self.replacer.lock();
        let mut skipped = Vec::new();

        let victim = loop {
            let Some(frame_id) = replacer.evict() else {
                break None;
            };
            let pending = self.frames[frame_id.0]
                .snapshot()
                .is_some_and(|page| page.has_pending());
            if pending {
                skipped.push(frame_id);
                continue;
            }
            break Some(frame_id);
        };

        for frame_id in skipped {
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, true);
        }
        victim
    }
}
