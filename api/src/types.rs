//! On-disk record types of the filesystem image.
//!
//! All three records derive `Serialize` and `Deserialize`; the crate-root
//! `bincode` functions encode integers fixed-width little-endian and arrays
//! without a length prefix, so the derived layouts match the on-disk structs
//! byte for byte (12 bytes of superblock, 64 bytes per inode, 16 bytes per
//! directory entry). Record sizes are not hard-coded anywhere: they are
//! computed once at runtime by serializing a default value, and the packing
//! constants [`struct@IPB`] and [`struct@DPB`] derive from them.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Size of a disk block, in bytes
pub const BSIZE: u64 = 512;

/// Number of direct block addresses held by an inode
pub const NDIRECT: usize = 12;

/// Number of block addresses held by a single indirect block
pub const NINDIRECT: u64 = BSIZE / std::mem::size_of::<u32>() as u64;

/// Bitmap bits per block
pub const BPB: u64 = BSIZE * 8;

/// Inode number of the root directory.
/// Inode 0 is reserved and never allocated.
pub const ROOT_INUM: u32 = 1;

/// Width of the name field of a directory entry, in bytes
pub const DIRNAME_SIZE: usize = 14;

/// Filesystem metadata, stored in block 1 of the image.
/// `size` counts every block of the image, metadata included; `nblocks`
/// counts only the data blocks tracked by the free bitmap.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    /// Total size of the image, in blocks
    pub size: u32,
    /// Number of data blocks
    pub nblocks: u32,
    /// Number of inodes in the inode table
    pub ninodes: u32,
}

/// Decoded value of an inode's type field
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum FType {
    /// Unallocated inode
    TFree,
    /// Directory
    TDir,
    /// Regular file
    TFile,
    /// Device file
    TDev,
}

/// Struct describing the data held by an inode on the disk.
/// Inodes are packed [`struct@IPB`] per block starting at block 2; the inode
/// number is implicit from the position in the table.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DInode {
    /// Raw file type; see [`DInode::ftype`]. Zero means unallocated, and the
    /// rest of the record is then meaningless.
    pub typ: u16,
    /// Major device number (device files only)
    pub major: u16,
    /// Minor device number (device files only)
    pub minor: u16,
    /// Number of directory entries linking to this inode
    pub nlink: u16,
    /// Size of the file contents, in bytes
    pub size: u32,
    /// [`NDIRECT`] direct data block addresses, then one address of an
    /// indirect block holding [`NINDIRECT`] more. Address 0 means the slot
    /// is unused.
    pub addrs: [u32; NDIRECT + 1],
}

impl DInode {
    /// Decode the type field. `None` for values no valid image uses.
    pub fn ftype(&self) -> Option<FType> {
        match self.typ {
            0 => Some(FType::TFree),
            1 => Some(FType::TDir),
            2 => Some(FType::TFile),
            3 => Some(FType::TDev),
            _ => None,
        }
    }

    /// An inode is in use as soon as its type field is non-zero, even when
    /// the type is not a known one
    pub fn in_use(&self) -> bool {
        self.typ != 0
    }

    /// The twelve direct block addresses
    pub fn direct(&self) -> &[u32] {
        &self.addrs[..NDIRECT]
    }

    /// Address stored in the indirect slot (0 when there is no indirect
    /// block)
    pub fn indirect(&self) -> u32 {
        self.addrs[NDIRECT]
    }
}

/// Directory entry: a fixed-width name/inode-number pair.
/// A directory is a file whose data blocks hold a sequence of these.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// Number of the inode this entry points to. 0 marks a vacant entry.
    pub inum: u16,
    /// NUL-padded name. A name of exactly [`DIRNAME_SIZE`] bytes has no
    /// terminator; shorter names end at the first NUL.
    pub name: [u8; DIRNAME_SIZE],
}

impl DirEntry {
    /// Build an entry with a NUL-padded name.
    /// Returns `None` when the name does not fit in the name field.
    pub fn new(inum: u16, name: &str) -> Option<DirEntry> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > DIRNAME_SIZE {
            return None;
        }
        let mut de = DirEntry {
            inum,
            name: [0; DIRNAME_SIZE],
        };
        de.name[..bytes.len()].copy_from_slice(bytes);
        Some(de)
    }

    /// The name bytes up to the first NUL, C-string style
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(DIRNAME_SIZE);
        &self.name[..end]
    }

    /// Is this slot vacant?
    pub fn is_vacant(&self) -> bool {
        self.inum == 0
    }

    /// Is this the `.` entry?
    pub fn is_dot(&self) -> bool {
        self.name_bytes() == b"."
    }

    /// Is this the `..` entry?
    pub fn is_dot_dot(&self) -> bool {
        self.name_bytes() == b".."
    }
}

lazy_static! {
    /// Serialized size of the superblock, in bytes.
    /// Only knowable at runtime, hence the `lazy_static` wrapper.
    pub static ref SUPERBLOCK_SIZE: u64 =
        bincode::serialize(&SuperBlock::default()).unwrap().len() as u64;

    /// Serialized size of a disk inode, in bytes
    pub static ref DINODE_SIZE: u64 =
        bincode::serialize(&DInode::default()).unwrap().len() as u64;

    /// Serialized size of a directory entry, in bytes
    pub static ref DIRENT_SIZE: u64 =
        bincode::serialize(&DirEntry::default()).unwrap().len() as u64;

    /// Inodes packed per block
    pub static ref IPB: u64 = BSIZE / *DINODE_SIZE;

    /// Directory entries packed per block
    pub static ref DPB: u64 = BSIZE / *DIRENT_SIZE;
}
