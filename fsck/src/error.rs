//! Per-layer error enums of the checker.
//!
//! The checks and the repair pass each get their own enum, and the driver
//! folds everything into [`FsckError`], whose `Display` is exactly the line
//! the binary prints on standard error. The messages of [`CheckError`] are a
//! fixed byte-for-byte contract, one line per consistency check.

use thiserror::Error;
use xv6fs_api::error::ImageError;

/// Structural failure of one of the consistency checks.
///
/// The variants appear in detection order. Each `Display` string is the
/// canonical error line for that check and must never change.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckError {
    /// An allocated inode carries an unknown type code
    #[error("ERROR: bad inode.")]
    BadInode,
    /// A direct address points outside the image
    #[error("ERROR: bad direct address in inode.")]
    BadDirect,
    /// The indirect slot, or an address inside the indirect block, points
    /// outside the image
    #[error("ERROR: bad indirect address in inode.")]
    BadIndirect,
    /// Inode 1 is missing, is not a directory, or is not its own parent
    #[error("ERROR: root directory does not exist.")]
    NoRoot,
    /// A directory lacks `.` pointing to itself, or lacks `..`
    #[error("ERROR: directory not properly formatted.")]
    BadDir,
    /// A block referenced by an in-use inode is free in the bitmap
    #[error("ERROR: address used by inode but marked free in bitmap.")]
    AddrUsedNotMarked,
    /// The bitmap marks a data block allocated that no inode references
    #[error("ERROR: bitmap marks block in use but it is not in use.")]
    MarkedNotUsed,
    /// Two direct slots share a block address
    #[error("ERROR: direct address used more than once.")]
    DirectDup,
    /// Two indirect-block slots share a block address
    #[error("ERROR: indirect address used more than once.")]
    IndirectDup,
    /// An in-use inode is referenced by no directory entry
    #[error("ERROR: inode marked use but not found in a directory.")]
    InodeUsedNotInDir,
    /// A directory entry names an unallocated inode
    #[error("ERROR: inode referred to in directory but marked free.")]
    InodeInDirNotUsed,
    /// A regular file's link count disagrees with its directory references
    #[error("ERROR: bad reference count for file.")]
    BadRefCount,
    /// A directory is referenced by more than one directory entry
    #[error("ERROR: directory appears more than once in file system.")]
    DirMulti,
    /// A directory's `..` does not name the directory that holds its entry
    #[error("ERROR: parent directory mismatch.")]
    ParentMismatch,
    /// Following `..` links from some directory never reaches the root
    #[error("ERROR: inaccessible directory exists.")]
    DirLoop,
}

/// Failure of the repair pass.
#[derive(Error, Debug)]
pub enum RepairError {
    /// The configured lost+found inode is absent or not a directory
    #[error("lost+found directory not found.")]
    NoLostFound,
    /// Every entry of lost+found is taken
    #[error("lost+found directory is full.")]
    LostFoundFull,
    /// The image could not be decoded far enough to repair anything
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Top-level error the driver maps to exit code 1.
#[derive(Error, Debug)]
pub enum FsckError {
    /// The argument list had the wrong shape
    #[error("Usage: xv6_fsck <file_system_image>.")]
    Usage,
    /// The image could not be acquired or decoded
    #[error(transparent)]
    Image(#[from] ImageError),
    /// A consistency check failed
    #[error(transparent)]
    Check(#[from] CheckError),
    /// The repair pass failed
    #[error(transparent)]
    Repair(#[from] RepairError),
}
