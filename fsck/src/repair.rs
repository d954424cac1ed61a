//! Orphan re-attachment into the `lost+found` directory.
//!
//! This is the only pass that writes to the image. It computes the same
//! directory reference counts the verifier uses, and every in-use,
//! non-reserved inode that no directory names gets threaded into the first
//! vacant entry of `lost+found`. Nothing else changes: link counts stay as
//! they are, no blocks are allocated, the bitmap is untouched, and the image
//! is not re-verified afterwards.

use log::debug;
use xv6fs_api::error::ImageError;
use xv6fs_api::layout::ImageView;
use xv6fs_api::types::{DirEntry, FType, BSIZE, DIRENT_SIZE, DPB};

use crate::check;
use crate::error::RepairError;

/// Inode number of the `lost+found` directory.
/// This is a convention of the image generator the tool is used with, not
/// part of the on-disk format; images produced differently need this
/// constant adjusted.
pub const LOST_FOUND_INUM: u32 = 29;

/// Re-attach every orphan inode of the image into `lost+found`.
///
/// `bytes` is the writable span of a shared mapping; entries are written in
/// place, so each orphan lands in the first entry still vacant after the
/// previous one.
pub fn reattach_orphans(bytes: &mut [u8]) -> Result<(), RepairError> {
    // Scan with an immutable view first, collecting the work list.
    let (orphans, lf_blocks) = {
        let view = ImageView::parse(&bytes[..])?;
        let ninodes = view.superblock().ninodes;
        if LOST_FOUND_INUM >= ninodes {
            return Err(RepairError::NoLostFound);
        }
        let lf = view.inode(LOST_FOUND_INUM)?;
        if lf.ftype() != Some(FType::TDir) {
            return Err(RepairError::NoLostFound);
        }

        let refs = check::reference_counts(&view)?;
        let mut orphans = Vec::new();
        for i in 2..ninodes {
            if view.inode(i)?.in_use() && refs[i as usize] == 0 {
                orphans.push(i);
            }
        }
        (orphans, lf.direct().to_vec())
    };

    debug!("re-attaching {} orphan inode(s)", orphans.len());
    for inum in orphans {
        attach(bytes, &lf_blocks, inum)?;
    }
    Ok(())
}

// Claim the first vacant entry among the direct blocks of lost+found for
// `inum`. Only the entry's inode number is written; the stale name bytes of
// the vacant slot carry no meaning.
fn attach(bytes: &mut [u8], lf_blocks: &[u32], inum: u32) -> Result<(), RepairError> {
    for &addr in lf_blocks {
        if addr == 0 {
            continue;
        }
        let base = addr as u64 * BSIZE;
        if base + BSIZE > bytes.len() as u64 {
            return Err(ImageError::MalformedImage(
                "lost+found block past the end of the image",
            )
            .into());
        }
        for slot in 0..*DPB {
            let offset = (base + slot * *DIRENT_SIZE) as usize;
            let end = offset + *DIRENT_SIZE as usize;
            let mut de: DirEntry =
                bincode::deserialize_from(&bytes[offset..end]).map_err(ImageError::from)?;
            if !de.is_vacant() {
                continue;
            }
            de.inum = inum as u16;
            bincode::serialize_into(&mut bytes[offset..end], &de).map_err(ImageError::from)?;
            debug!("re-attached inode {} at block {} entry {}", inum, addr, slot);
            return Ok(());
        }
    }
    Err(RepairError::LostFoundFull)
}
