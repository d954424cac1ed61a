//! Layout decoder: bounds-checked views over a raw image span.
//!
//! [`ImageView::parse`] reads the superblock out of block 1 and validates
//! that the regions it announces actually fit inside the mapped span. After
//! construction, every accessor checks its block index before touching
//! memory, so a malformed image produces an [`ImageError::MalformedImage`]
//! instead of a wild read. Block addresses a caller has already validated
//! against `size` can be accessed without failing.

use crate::bitmap::Bitmap;
use crate::error::{ImageError, Result};
use crate::types::{
    DInode, DirEntry, SuperBlock, BPB, BSIZE, DIRENT_SIZE, DINODE_SIZE, DPB, IPB, NINDIRECT,
};

/// Decoded view over an image byte span.
/// The view never copies or mutates the span; it hands out records decoded
/// on demand.
#[derive(Debug)]
pub struct ImageView<'a> {
    bytes: &'a [u8],
    sb: SuperBlock,
    /// Blocks occupied by the inode table
    inode_blocks: u64,
    /// Blocks occupied by the free bitmap
    bitmap_blocks: u64,
}

impl<'a> ImageView<'a> {
    /// Decode the superblock and validate the region layout.
    ///
    /// The span must hold at least `size` blocks and the metadata regions
    /// must fall inside the first `size` blocks; with that established, any
    /// block index below `size` is in range for the lifetime of the view.
    pub fn parse(bytes: &'a [u8]) -> Result<ImageView<'a>> {
        if (bytes.len() as u64) < 2 * BSIZE {
            return Err(ImageError::MalformedImage(
                "image too small to hold a superblock",
            ));
        }
        let sb: SuperBlock = bincode::deserialize_from(&bytes[BSIZE as usize..])?;
        let inode_blocks = (sb.ninodes as u64 + *IPB - 1) / *IPB;
        let bitmap_blocks = (sb.size as u64 + BPB - 1) / BPB;
        let view = ImageView {
            bytes,
            sb,
            inode_blocks,
            bitmap_blocks,
        };
        if !view.sb_valid() {
            return Err(ImageError::MalformedImage(
                "superblock regions do not fit the image",
            ));
        }
        Ok(view)
    }

    // The regions have to appear in order and fall within the first `size`
    // blocks, and the mapped span has to actually hold `size` blocks.
    fn sb_valid(&self) -> bool {
        let size = self.sb.size as u64;
        size > 0
            && self.first_data_block() <= size
            && self.sb.nblocks as u64 <= size
            && size * BSIZE <= self.bytes.len() as u64
    }

    /// The decoded superblock
    pub fn superblock(&self) -> &SuperBlock {
        &self.sb
    }

    /// Index of the first block past the bitmap region, the first block that
    /// can legitimately hold file data
    pub fn first_data_block(&self) -> u64 {
        2 + self.inode_blocks + self.bitmap_blocks
    }

    // Bounds-checked single-block slice.
    fn block(&self, b: u64) -> Result<&'a [u8]> {
        let start = b * BSIZE;
        let end = start + BSIZE;
        if end > self.bytes.len() as u64 {
            return Err(ImageError::MalformedImage(
                "block index past the end of the image",
            ));
        }
        Ok(&self.bytes[start as usize..end as usize])
    }

    /// Read inode `i` from the inode table.
    /// Errors when `i` is not below `ninodes`.
    pub fn inode(&self, i: u32) -> Result<DInode> {
        if i >= self.sb.ninodes {
            return Err(ImageError::MalformedImage("inode index out of range"));
        }
        let block = self.block(2 + i as u64 / *IPB)?;
        let offset = (i as u64 % *IPB) * *DINODE_SIZE;
        Ok(bincode::deserialize_from(&block[offset as usize..])?)
    }

    /// Interpret block `a` as an indirect block: [`NINDIRECT`] addresses
    pub fn indirect(&self, a: u32) -> Result<Vec<u32>> {
        let block = self.block(a as u64)?;
        let mut addrs = Vec::with_capacity(NINDIRECT as usize);
        for slot in 0..NINDIRECT as usize {
            let offset = slot * std::mem::size_of::<u32>();
            addrs.push(bincode::deserialize_from(&block[offset..])?);
        }
        Ok(addrs)
    }

    /// Interpret block `a` as a directory block: [`struct@DPB`] entries,
    /// vacant ones included
    pub fn dirents(&self, a: u32) -> Result<Vec<DirEntry>> {
        let block = self.block(a as u64)?;
        let mut entries = Vec::with_capacity(*DPB as usize);
        for slot in 0..*DPB {
            let offset = (slot * *DIRENT_SIZE) as usize;
            entries.push(bincode::deserialize_from(&block[offset..])?);
        }
        Ok(entries)
    }

    /// View over the free-bitmap region.
    /// In range by construction, since the region check ran at parse time.
    pub fn bitmap(&self) -> Bitmap<'a> {
        let start = ((2 + self.inode_blocks) * BSIZE) as usize;
        let end = start + (self.bitmap_blocks * BSIZE) as usize;
        Bitmap::new(&self.bytes[start..end])
    }
}
