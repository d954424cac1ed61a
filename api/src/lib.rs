//! Image access and on-disk model for the xv6 teaching filesystem.
//!
//! This crate knows how to acquire a filesystem image from a file and how to
//! decode the fixed regions inside it, nothing more. The layout is
//!     \[boot block | super block | inode blocks | free bit map | data blocks\]
//! with 512-byte blocks; block 0 is unused and the superblock sits in block 1.
//!
//! The consistency checks themselves live in the `xv6_fsck` crate. Everything
//! here is read-oriented: the only writes a consumer ever performs go through
//! the mutable byte span of a read-write [`image::Image`].

#![deny(missing_docs)]

pub mod bitmap;
pub mod error;
pub mod image;
pub mod layout;
pub mod types;
