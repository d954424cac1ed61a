//! Offline consistency checker, and minimal repairer, for xv6 filesystem
//! images.
//!
//! The engine runs a fixed sequence of passes over a decoded image view:
//! first a per-inode pass (type codes, address ranges, directory formatting,
//! bitmap membership), then the cross-inode passes that need indices built
//! over the whole image (the used-block set, the duplicate-address sets, the
//! directory reference counts, the parent-link graph). Verification stops at
//! the first failed check and reports its canonical message; a clean image
//! produces no output at all.
//!
//! Repair is deliberately small: it re-attaches orphan inodes by threading
//! them into vacant entries of the `lost+found` directory, and changes
//! nothing else.

#![deny(missing_docs)]

pub mod check;
pub mod driver;
pub mod error;
pub mod repair;
pub mod walk;
