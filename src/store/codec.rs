//! Encode/decode between page images and decoded tree pages.
//!
//! Body layouts, little-endian, starting right after the page header:
//! ```text
//! Internal:  count u32 | count * { start u64, child u32 }
//! FixedLeaf: slot_count u32 | value_size u32 | slot_count * value_size bytes
//! VarLeaf:   cell_count u32 | cell_count * { count u64, len u32, len bytes }
//! ```
//! Insert overlays and write generations are in-memory state and are
//! never part of a page image.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Recno, Result};
use crate::store::page_header::{PageHeader, PageType};
use crate::store::PageImage;
use crate::tree::page::{ChildRef, FixedLeaf, InternalPage, LeafPage, Node, Page, VarLeaf};

/// Encode a decoded node into a checksummed page image.
///
/// # Errors
/// Returns `Error::PageOverflow` if the body does not fit in one page.
pub fn encode_page(node: &Node) -> Result<PageImage> {
    let mut image = [0u8; PAGE_SIZE];

    let page_type = match node {
        Node::Internal(_) => PageType::Internal,
        Node::Leaf(LeafPage::Fixed(_)) => PageType::FixedLeaf,
        Node::Leaf(LeafPage::Var(_)) => PageType::VarLeaf,
    };
    PageHeader::new(page_type, node.start()).write_to(&mut image);

    let mut writer = Writer {
        image: &mut image,
        pos: PageHeader::SIZE,
    };
    match node {
        Node::Internal(page) => {
            writer.put_u32(page.children().len() as u32)?;
            for child in page.children() {
                writer.put_u64(child.start.0)?;
                writer.put_u32(child.child.0)?;
            }
        }
        Node::Leaf(LeafPage::Fixed(leaf)) => {
            writer.put_u32(leaf.slot_count() as u32)?;
            writer.put_u32(leaf.value_size() as u32)?;
            for slot in 0..leaf.slot_count() as usize {
                writer.put_bytes(leaf.value(slot))?;
            }
        }
        Node::Leaf(LeafPage::Var(leaf)) => {
            writer.put_u32(leaf.cells().len() as u32)?;
            for cell in leaf.cells() {
                writer.put_u64(cell.count())?;
                writer.put_u32(cell.value().len() as u32)?;
                writer.put_bytes(cell.value())?;
            }
        }
    }

    PageHeader::stamp_checksum(&mut image);
    Ok(image)
}

/// Decode a page image, verifying its checksum first.
///
/// # Errors
/// Returns `Error::Corrupted` on checksum mismatch, an unknown page
/// type, a truncated body, or a structurally invalid child array.
pub fn decode_page(page_id: PageId, image: &PageImage) -> Result<Page> {
    let header = PageHeader::from_bytes(image);
    if !header.verify_checksum(image) {
        return Err(corrupt(page_id, "checksum mismatch"));
    }

    let mut reader = Reader {
        image,
        pos: PageHeader::SIZE,
        page_id,
    };
    let node = match header.page_type {
        PageType::Invalid => return Err(corrupt(page_id, "invalid page type")),
        PageType::Internal => decode_internal(&mut reader, header.start_recno)?,
        PageType::FixedLeaf => decode_fixed_leaf(&mut reader, header.start_recno)?,
        PageType::VarLeaf => decode_var_leaf(&mut reader, header.start_recno)?,
    };

    Ok(Page::new(page_id, node))
}

fn decode_internal(reader: &mut Reader<'_>, start: Recno) -> Result<Node> {
    let count = reader.get_u32()? as usize;
    if count == 0 {
        return Err(corrupt(reader.page_id, "internal page with no children"));
    }

    let mut children = Vec::with_capacity(count);
    for _ in 0..count {
        let child_start = Recno(reader.get_u64()?);
        let child = PageId::new(reader.get_u32()?);
        children.push(ChildRef {
            start: child_start,
            child,
        });
    }

    if children[0].start != start {
        return Err(corrupt(reader.page_id, "first child does not match page start"));
    }
    if !children.windows(2).all(|w| w[0].start < w[1].start) {
        return Err(corrupt(reader.page_id, "child array not ascending"));
    }

    Ok(Node::Internal(InternalPage::new(children)))
}

fn decode_fixed_leaf(reader: &mut Reader<'_>, start: Recno) -> Result<Node> {
    let slot_count = reader.get_u32()? as usize;
    let value_size = reader.get_u32()? as usize;
    if value_size == 0 {
        return Err(corrupt(reader.page_id, "zero-size slots"));
    }

    let slots = reader.get_bytes(slot_count * value_size)?.to_vec();
    Ok(Node::Leaf(LeafPage::Fixed(FixedLeaf::new(
        start, value_size, slots,
    ))))
}

fn decode_var_leaf(reader: &mut Reader<'_>, start: Recno) -> Result<Node> {
    let cell_count = reader.get_u32()? as usize;

    let mut runs = Vec::with_capacity(cell_count);
    for _ in 0..cell_count {
        let count = reader.get_u64()?;
        if count == 0 {
            return Err(corrupt(reader.page_id, "empty run"));
        }
        let len = reader.get_u32()? as usize;
        let value = reader.get_bytes(len)?.to_vec();
        runs.push((count, value));
    }

    Ok(Node::Leaf(LeafPage::Var(VarLeaf::new(start, runs))))
}

fn corrupt(page: PageId, reason: &'static str) -> Error {
    Error::Corrupted { page, reason }
}

/// Bounds-checked sequential writer over a page image.
struct Writer<'a> {
    image: &'a mut PageImage,
    pos: usize,
}

impl Writer<'_> {
    fn put_bytes(&mut self, data: &[u8]) -> Result<()> {
        let end = self.pos + data.len();
        if end > PAGE_SIZE {
            return Err(Error::PageOverflow { need: end });
        }
        self.image[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    fn put_u64(&mut self, value: u64) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }
}

/// Bounds-checked sequential reader over a page image.
struct Reader<'a> {
    image: &'a PageImage,
    pos: usize,
    page_id: PageId,
}

impl<'a> Reader<'a> {
    fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= PAGE_SIZE)
            .ok_or_else(|| corrupt(self.page_id, "truncated page body"))?;
        let bytes = &self.image[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.get_bytes(4)?.try_into().unwrap()))
    }

    fn get_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.get_bytes(8)?.try_into().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(node: Node) -> Page {
        let image = encode_page(&node).unwrap();
        decode_page(PageId::new(3), &image).unwrap()
    }

    #[test]
    fn test_internal_roundtrip() {
        let node = Node::Internal(InternalPage::new(vec![
            ChildRef {
                start: Recno::new(1),
                child: PageId::new(10),
            },
            ChildRef {
                start: Recno::new(100),
                child: PageId::new(11),
            },
            ChildRef {
                start: Recno::new(250),
                child: PageId::new(12),
            },
        ]));

        let page = roundtrip(node);
        assert_eq!(page.id(), PageId::new(3));
        match page.node() {
            Node::Internal(internal) => {
                assert_eq!(internal.children().len(), 3);
                assert_eq!(internal.children()[1].start, Recno::new(100));
                assert_eq!(internal.children()[1].child, PageId::new(11));
            }
            _ => panic!("expected internal page"),
        }
    }

    #[test]
    fn test_fixed_leaf_roundtrip() {
        let node = Node::Leaf(LeafPage::Fixed(FixedLeaf::new(
            Recno::new(100),
            2,
            vec![1, 1, 2, 2, 3, 3],
        )));

        let page = roundtrip(node);
        match page.node() {
            Node::Leaf(LeafPage::Fixed(leaf)) => {
                assert_eq!(leaf.start(), Recno::new(100));
                assert_eq!(leaf.slot_count(), 3);
                assert_eq!(leaf.value(2), &[3, 3]);
            }
            _ => panic!("expected fixed leaf"),
        }
    }

    #[test]
    fn test_var_leaf_roundtrip() {
        let node = Node::Leaf(LeafPage::Var(VarLeaf::new(
            Recno::new(10),
            vec![(5, b"aa".to_vec()), (1, vec![]), (10, b"ccc".to_vec())],
        )));

        let page = roundtrip(node);
        match page.node() {
            Node::Leaf(LeafPage::Var(leaf)) => {
                assert_eq!(leaf.cells().len(), 3);
                assert_eq!(leaf.cell(0).start(), Recno::new(10));
                assert_eq!(leaf.cell(1).start(), Recno::new(15));
                assert_eq!(leaf.cell(2).count(), 10);
                assert_eq!(leaf.cell(2).value(), b"ccc");
                assert_eq!(leaf.last_recno(), Recno::new(25));
            }
            _ => panic!("expected var leaf"),
        }
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let node = Node::Leaf(LeafPage::Fixed(FixedLeaf::new(
            Recno::new(1),
            1,
            vec![7; 16],
        )));
        let mut image = encode_page(&node).unwrap();
        image[PageHeader::SIZE + 4] ^= 0xFF;

        assert!(matches!(
            decode_page(PageId::new(0), &image),
            Err(Error::Corrupted {
                reason: "checksum mismatch",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_type_rejected() {
        let mut image = [0u8; PAGE_SIZE];
        PageHeader::stamp_checksum(&mut image);

        assert!(matches!(
            decode_page(PageId::new(0), &image),
            Err(Error::Corrupted {
                reason: "invalid page type",
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_body_rejected() {
        // fixed leaf claiming more slots than the image holds
        let mut image = [0u8; PAGE_SIZE];
        PageHeader::new(PageType::FixedLeaf, Recno::new(1)).write_to(&mut image);
        image[PageHeader::SIZE..PageHeader::SIZE + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        image[PageHeader::SIZE + 4..PageHeader::SIZE + 8].copy_from_slice(&8u32.to_le_bytes());
        PageHeader::stamp_checksum(&mut image);

        assert!(matches!(
            decode_page(PageId::new(0), &image),
            Err(Error::Corrupted {
                reason: "truncated page body",
                ..
            })
        ));
    }

    #[test]
    fn test_oversize_body_rejected() {
        let node = Node::Leaf(LeafPage::Fixed(FixedLeaf::new(
            Recno::new(1),
            64,
            vec![0; 64 * 128],
        )));
        assert!(matches!(
            encode_page(&node),
            Err(Error::PageOverflow { .. })
        ));
    }
}
