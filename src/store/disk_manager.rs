//! Disk Manager - low-level file I/O for page images.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing page images
//! - Allocating new page slots
//! - Managing the store file

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};

/// A raw on-disk page image.
pub type PageImage = [u8; PAGE_SIZE];

/// Manages disk I/O for a single store file.
///
/// # File Layout
/// Pages are laid out sequentially; page N lives at file offset
/// `N * PAGE_SIZE`:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │
/// └─────────┴─────────┴─────────┴─────────┘
/// ```
///
/// # Thread Safety
/// `DiskManager` is single-threaded; the page cache serializes access
/// behind a mutex.
pub struct DiskManager {
    file: File,
    /// Number of page slots in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new store file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
        })
    }

    /// Open an existing store file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let metadata = file.metadata()?;
        let page_count = (metadata.len() / PAGE_SIZE as u64) as u32;

        Ok(Self { file, page_count })
    }

    /// Open an existing store file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Read a page image from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the slot hasn't been allocated.
    pub fn read_page(&mut self, page_id: PageId) -> Result<PageImage> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id));
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;

        let mut image = [0u8; PAGE_SIZE];
        self.file.read_exact(&mut image)?;

        Ok(image)
    }

    /// Write a page image to an allocated slot, followed by `fsync`.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the slot hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, image: &PageImage) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id));
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(image)?;
        self.file.sync_all()?;

        Ok(())
    }

    /// Allocate a new, zeroed page slot and return its id.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = PageId::new(self.page_count);

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;
        self.file.sync_all()?;

        self.page_count += 1;
        Ok(page_id)
    }

    /// Number of page slots in the store.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Total size of the store file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }
}
