//! Page header and type definitions.
//!
//! Every page image starts with a [`PageHeader`]:
//! - [`PageType`] discriminator
//! - CRC32 checksum for integrity
//! - The page's starting record number

use crate::common::Recno;

/// Physical kind of a stored page.
///
/// `#[repr(u8)]` guarantees a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or corrupted page.
    #[default]
    Invalid = 0,
    /// Internal node: ordered child references.
    Internal = 1,
    /// Leaf with uniform-size slots.
    FixedLeaf = 2,
    /// Leaf with run-length cells.
    VarLeaf = 3,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::Internal,
            2 => PageType::FixedLeaf,
            3 => PageType::VarLeaf,
            _ => PageType::Invalid,
        }
    }
}

/// Metadata stored at the beginning of every page image.
///
/// # Layout (13 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (PageType as u8)
/// 1       4     checksum (CRC32, little-endian)
/// 5       8     start_recno (little-endian)
/// ```
///
/// The checksum covers the entire image with the checksum field itself
/// zeroed, so verification needs no special carve-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub checksum: u32,
    /// First record number of the range the page covers.
    pub start_recno: Recno,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 13;

    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;
    pub const OFFSET_START_RECNO: usize = 5;

    /// Create a new header with a zero checksum.
    pub fn new(page_type: PageType, start_recno: Recno) -> Self {
        Self {
            page_type,
            checksum: 0,
            start_recno,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let page_type = PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]);
        let checksum = u32::from_le_bytes(
            data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
                .try_into()
                .unwrap(),
        );
        let start_recno = Recno(u64::from_le_bytes(
            data[Self::OFFSET_START_RECNO..Self::OFFSET_START_RECNO + 8]
                .try_into()
                .unwrap(),
        ));

        Self {
            page_type,
            checksum,
            start_recno,
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_START_RECNO..Self::OFFSET_START_RECNO + 8]
            .copy_from_slice(&self.start_recno.0.to_le_bytes());
    }

    /// Compute the CRC32 checksum of a page image.
    ///
    /// The checksum field (bytes 1..5) is fed as zeros so the checksum
    /// does not include itself.
    pub fn compute_checksum(image: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&image[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&image[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, image: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(image)
    }

    /// Store the computed checksum of `image` into its header bytes.
    pub fn stamp_checksum(image: &mut [u8]) {
        let checksum = Self::compute_checksum(image);
        image[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }
}
