//Shared utilities for crafting filesystem images in tests.
//
//Images are built in memory with the same serializer the engine decodes
//with, so the encoding is consistent by construction. Tests that need a
//real file (the binary tests) write the bytes under a per-test directory,
//because tests run in parallel and must not share image files.
#![allow(dead_code)]

use anyhow::Context;
use std::fs;
use std::path::PathBuf;
use xv6fs_api::types::{DInode, DirEntry, SuperBlock, BPB, BSIZE, DINODE_SIZE, DIRENT_SIZE, DPB, IPB, NDIRECT};

/// Total blocks of the test image
pub const SIZE: u32 = 64;
/// Data blocks tracked by the bitmap checks
pub const NBLOCKS: u32 = 40;
/// Inodes in the table (enough to place lost+found at its conventional 29)
pub const NINODES: u32 = 32;
/// First data block: 4 inode blocks and 1 bitmap block after blocks 0 and 1
pub const DB1: u32 = 7;

/// An image under construction.
pub struct ImageBuilder {
    bytes: Vec<u8>,
}

impl ImageBuilder {
    /// Empty image: superblock written, metadata blocks marked allocated,
    /// all inodes free.
    pub fn new() -> ImageBuilder {
        let mut builder = ImageBuilder {
            bytes: vec![0u8; (SIZE as u64 * BSIZE) as usize],
        };
        let sb = SuperBlock {
            size: SIZE,
            nblocks: NBLOCKS,
            ninodes: NINODES,
        };
        builder.put(BSIZE, &sb);
        for b in 0..DB1 {
            builder.mark(b);
        }
        builder
    }

    fn put<S: serde::Serialize>(&mut self, offset: u64, value: &S) {
        let enc = bincode::serialize(value).unwrap();
        self.bytes[offset as usize..offset as usize + enc.len()].copy_from_slice(&enc);
    }

    /// Write inode `i` into the table
    pub fn inode(&mut self, i: u32, ino: DInode) -> &mut Self {
        assert!(i < NINODES);
        let offset = (2 + i as u64 / *IPB) * BSIZE + (i as u64 % *IPB) * *DINODE_SIZE;
        self.put(offset, &ino);
        self
    }

    /// Fill block `addr` with the given dirents from slot 0; the rest of the
    /// block is cleared, so repeated calls replace the whole block
    pub fn dir_block(&mut self, addr: u32, entries: &[(u16, &str)]) -> &mut Self {
        assert!(entries.len() <= *DPB as usize);
        let base = addr as u64 * BSIZE;
        for b in &mut self.bytes[base as usize..(base + BSIZE) as usize] {
            *b = 0;
        }
        for (slot, (inum, name)) in entries.iter().enumerate() {
            let de = DirEntry::new(*inum, name).unwrap();
            self.put(base + slot as u64 * *DIRENT_SIZE, &de);
        }
        self
    }

    /// Fill every entry of block `addr` with the same inode number, leaving
    /// no vacancy
    pub fn full_dir_block(&mut self, addr: u32, inum: u16) -> &mut Self {
        let base = addr as u64 * BSIZE;
        for slot in 0..*DPB {
            let de = DirEntry::new(inum, "taken").unwrap();
            self.put(base + slot * *DIRENT_SIZE, &de);
        }
        self
    }

    /// Write block addresses into indirect block `addr` from slot 0
    pub fn indirect_block(&mut self, addr: u32, addrs: &[u32]) -> &mut Self {
        let base = addr as u64 * BSIZE;
        for (slot, a) in addrs.iter().enumerate() {
            self.put(base + slot as u64 * 4, a);
        }
        self
    }

    /// Set the allocation bit of block `b`
    pub fn mark(&mut self, b: u32) -> &mut Self {
        let (offset, bit) = self.bitmap_pos(b);
        self.bytes[offset] |= 1 << bit;
        self
    }

    /// Clear the allocation bit of block `b`
    pub fn clear(&mut self, b: u32) -> &mut Self {
        let (offset, bit) = self.bitmap_pos(b);
        self.bytes[offset] &= !(1 << bit);
        self
    }

    fn bitmap_pos(&self, b: u32) -> (usize, u32) {
        assert!((b as u64) < BPB, "test images use a single bitmap block");
        let bitmap_start = (2 + NINODES as u64 / *IPB) * BSIZE;
        ((bitmap_start + b as u64 / 8) as usize, b % 8)
    }

    /// The image bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the builder, keeping the bytes (repair tests mutate them)
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Write the image under `<crate root>/<dir>/img` for tests that drive
    /// the real binary
    pub fn write(&self, dir: &str) -> anyhow::Result<PathBuf> {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push(dir);
        fs::create_dir_all(&path).with_context(|| format!("creating {}", path.display()))?;
        path.push("img");
        fs::write(&path, &self.bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

/// Remove an image file written by [`ImageBuilder::write`] and its directory
pub fn unprep(path: &PathBuf) {
    fs::remove_file(path).unwrap();
    fs::remove_dir(path.parent().unwrap()).unwrap();
}

/// A directory inode over the given data blocks
pub fn dir_inode(blocks: &[u32]) -> DInode {
    inode_with(1, 1, blocks)
}

/// A regular-file inode with the given link count and data blocks
pub fn file_inode(nlink: u16, blocks: &[u32]) -> DInode {
    inode_with(2, nlink, blocks)
}

/// A device inode with the given device numbers and no data blocks
pub fn dev_inode(major: u16, minor: u16) -> DInode {
    let mut ino = inode_with(3, 1, &[]);
    ino.major = major;
    ino.minor = minor;
    ino
}

fn inode_with(typ: u16, nlink: u16, blocks: &[u32]) -> DInode {
    assert!(blocks.len() <= NDIRECT);
    let mut addrs = [0u32; NDIRECT + 1];
    addrs[..blocks.len()].copy_from_slice(blocks);
    DInode {
        typ,
        major: 0,
        minor: 0,
        nlink,
        size: blocks.len() as u32 * BSIZE as u32,
        addrs,
    }
}

/// Baseline consistent image: a root directory (inode 1, block 7) holding
/// one regular file (inode 2, block 8).
pub fn clean_image() -> ImageBuilder {
    let mut builder = ImageBuilder::new();
    builder
        .inode(1, dir_inode(&[7]))
        .inode(2, file_inode(1, &[8]))
        .dir_block(7, &[(1, "."), (1, ".."), (2, "readme")])
        .mark(7)
        .mark(8);
    builder
}

/// Add a lost+found directory at its conventional inode (29, block 9),
/// referenced from the root
pub fn add_lost_found(builder: &mut ImageBuilder) {
    builder
        .dir_block(7, &[(1, "."), (1, ".."), (2, "readme"), (29, "lost+found")])
        .inode(29, dir_inode(&[9]))
        .dir_block(9, &[(29, "."), (1, "..")])
        .mark(9);
}
