//! Walkers producing the block addresses and directory entries an inode
//! references.
//!
//! There is only single-level indirection, so none of these recurse. The
//! address walkers report zero addresses verbatim; predicates that only care
//! about present blocks skip the zeros themselves. The entry walker skips
//! vacant entries, since an entry with inode number 0 carries no
//! information.

use xv6fs_api::error::Result;
use xv6fs_api::layout::ImageView;
use xv6fs_api::types::{DInode, DirEntry};

/// The twelve direct addresses of an inode, in slot order, zeros included
pub fn direct_addrs(ino: &DInode) -> &[u32] {
    ino.direct()
}

/// The addresses listed inside an inode's indirect block, or `None` when the
/// indirect slot is empty
pub fn indirect_addrs(view: &ImageView, ino: &DInode) -> Result<Option<Vec<u32>>> {
    if ino.indirect() == 0 {
        return Ok(None);
    }
    view.indirect(ino.indirect()).map(Some)
}

/// The data block addresses of an inode: the direct slots in order, then the
/// blocks listed in its indirect block. The indirect block itself holds
/// addresses, not file data, and is not included.
pub fn data_addrs(view: &ImageView, ino: &DInode) -> Result<Vec<u32>> {
    let mut addrs = ino.direct().to_vec();
    if let Some(indirect) = indirect_addrs(view, ino)? {
        addrs.extend(indirect);
    }
    Ok(addrs)
}

/// Every block address the inode ties down: the direct slots, the indirect
/// block itself, then the indirect block's contents. This is the walk the
/// allocation accounting (bitmap membership, used-block set) runs on.
pub fn all_addrs(view: &ImageView, ino: &DInode) -> Result<Vec<u32>> {
    let mut addrs = ino.direct().to_vec();
    if ino.indirect() != 0 {
        addrs.push(ino.indirect());
        addrs.extend(view.indirect(ino.indirect())?);
    }
    Ok(addrs)
}

/// The valid (non-vacant) entries of a directory inode, across all of its
/// data blocks in block order. `.` and `..` are surfaced like any other
/// entry.
pub fn dir_entries(view: &ImageView, ino: &DInode) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for addr in data_addrs(view, ino)? {
        if addr == 0 {
            continue;
        }
        for de in view.dirents(addr)? {
            if de.is_vacant() {
                continue;
            }
            entries.push(de);
        }
    }
    Ok(entries)
}
