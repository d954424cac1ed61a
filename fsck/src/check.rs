//! The invariant suite: ordered verification passes over a decoded image.
//!
//! [`verify`] runs the passes in a fixed order and surfaces the first
//! failure, so a given image always reports the same error line. The
//! per-inode pass works one inode at a time; the later passes first build an
//! index over the whole image (the used-block set, the duplicate-address
//! sets, the directory reference counts, the parent-link graph) and then
//! judge it. All scratch state is owned by this module's functions and
//! released when the pass returns.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;
use xv6fs_api::error::ImageError;
use xv6fs_api::layout::ImageView;
use xv6fs_api::types::{DInode, FType, ROOT_INUM};

pub use crate::error::CheckError;
use crate::error::FsckError;
use crate::walk;

/// Run every consistency check against the image, in order.
/// Returns at the first failure; a clean image returns `Ok(())`.
pub fn verify(view: &ImageView) -> Result<(), FsckError> {
    let sb = view.superblock();
    debug!(
        "verifying image: size={} nblocks={} ninodes={} first data block={}",
        sb.size,
        sb.nblocks,
        sb.ninodes,
        view.first_data_block()
    );

    per_inode_pass(view)?;
    let used = used_blocks(view)?;
    bitmap_marks_only_used(view, &used)?;
    no_duplicate_directs(view)?;
    no_duplicate_indirects(view)?;
    let refs = reference_counts(view)?;
    reference_checks(view, &refs)?;
    let graph = DirGraph::build(view)?;
    parents_consistent(&graph)?;
    no_directory_loops(&graph)?;
    debug!("image is consistent");
    Ok(())
}

// One traversal of the inode table. For each in-use inode, in order: the
// type code, the direct address range, the indirect address range, the
// directory formatting (the root's own variant for inode 1), and bitmap
// membership of every referenced block.
fn per_inode_pass(view: &ImageView) -> Result<(), FsckError> {
    let sb = *view.superblock();
    if sb.ninodes <= ROOT_INUM {
        // the table cannot even hold a root inode
        return Err(CheckError::NoRoot.into());
    }
    let bitmap = view.bitmap();

    for i in 0..sb.ninodes {
        let ino = view.inode(i)?;
        if !ino.in_use() {
            if i == ROOT_INUM {
                return Err(CheckError::NoRoot.into());
            }
            continue;
        }

        // valid type code
        let ftype = match ino.ftype() {
            Some(ft) => ft,
            None => return Err(CheckError::BadInode.into()),
        };

        // direct addresses in range; addresses are unsigned, so only the
        // upper bound can fail
        for &a in walk::direct_addrs(&ino) {
            if a != 0 && a >= sb.size {
                return Err(CheckError::BadDirect.into());
            }
        }

        // the indirect slot, then every address inside the indirect block
        if ino.indirect() != 0 {
            if ino.indirect() >= sb.size {
                return Err(CheckError::BadIndirect.into());
            }
            for a in view.indirect(ino.indirect())? {
                if a != 0 && a >= sb.size {
                    return Err(CheckError::BadIndirect.into());
                }
            }
        }

        if i == ROOT_INUM {
            root_well_formed(view, &ino)?;
        } else if ftype == FType::TDir {
            dir_well_formed(view, i, &ino)?;
        }

        // every referenced block is marked allocated
        for a in walk::all_addrs(view, &ino)? {
            if a != 0 && !bitmap.is_allocated(a)? {
                return Err(CheckError::AddrUsedNotMarked.into());
            }
        }
    }
    Ok(())
}

// The root is a directory whose "." and ".." entries both name inode 1.
fn root_well_formed(view: &ImageView, ino: &DInode) -> Result<(), FsckError> {
    if ino.ftype() != Some(FType::TDir) {
        return Err(CheckError::NoRoot.into());
    }
    let entries = walk::dir_entries(view, ino)?;
    let dot = entries.iter().find(|de| de.is_dot());
    let dot_dot = entries.iter().find(|de| de.is_dot_dot());
    match (dot, dot_dot) {
        (Some(d), Some(dd)) if d.inum as u32 == ROOT_INUM && dd.inum as u32 == ROOT_INUM => Ok(()),
        _ => Err(CheckError::NoRoot.into()),
    }
}

// Any other directory: "." names the directory itself and ".." is present.
fn dir_well_formed(view: &ImageView, inum: u32, ino: &DInode) -> Result<(), FsckError> {
    let entries = walk::dir_entries(view, ino)?;
    let dot = entries.iter().find(|de| de.is_dot());
    let dot_dot = entries.iter().find(|de| de.is_dot_dot());
    match (dot, dot_dot) {
        (Some(d), Some(_)) if d.inum as u32 == inum => Ok(()),
        _ => Err(CheckError::BadDir.into()),
    }
}

// The set of blocks referenced by any in-use inode, indirect blocks
// included. Scratch for the bitmap cross-check.
fn used_blocks(view: &ImageView) -> Result<HashSet<u32>, FsckError> {
    let mut used = HashSet::new();
    for i in 0..view.superblock().ninodes {
        let ino = view.inode(i)?;
        if !ino.in_use() {
            continue;
        }
        for a in walk::all_addrs(view, &ino)? {
            if a != 0 {
                used.insert(a);
            }
        }
    }
    Ok(used)
}

// Every data block the bitmap marks allocated must actually be referenced.
fn bitmap_marks_only_used(view: &ImageView, used: &HashSet<u32>) -> Result<(), FsckError> {
    let bitmap = view.bitmap();
    let first = view.first_data_block();
    for b in first..view.superblock().nblocks as u64 {
        if bitmap.is_allocated(b as u32)? && !used.contains(&(b as u32)) {
            return Err(CheckError::MarkedNotUsed.into());
        }
    }
    Ok(())
}

// No block address appears in two direct slots, across all in-use inodes.
fn no_duplicate_directs(view: &ImageView) -> Result<(), FsckError> {
    let mut seen = HashSet::new();
    for i in 0..view.superblock().ninodes {
        let ino = view.inode(i)?;
        if !ino.in_use() {
            continue;
        }
        for &a in walk::direct_addrs(&ino) {
            if a != 0 && !seen.insert(a) {
                return Err(CheckError::DirectDup.into());
            }
        }
    }
    Ok(())
}

// No block address appears twice inside indirect blocks, across all in-use
// inodes. The indirect slots themselves are not part of this set.
fn no_duplicate_indirects(view: &ImageView) -> Result<(), FsckError> {
    let mut seen = HashSet::new();
    for i in 0..view.superblock().ninodes {
        let ino = view.inode(i)?;
        if !ino.in_use() {
            continue;
        }
        if let Some(addrs) = walk::indirect_addrs(view, &ino)? {
            for a in addrs {
                if a != 0 && !seen.insert(a) {
                    return Err(CheckError::IndirectDup.into());
                }
            }
        }
    }
    Ok(())
}

/// Count, for every inode, the directory entries naming it. Entries named
/// `.` or `..` do not count as references.
///
/// Shared by the reference checks and by the repair pass, which re-attaches
/// exactly the inodes this count misses.
pub fn reference_counts(view: &ImageView) -> Result<Vec<u32>, ImageError> {
    let mut refs = vec![0u32; view.superblock().ninodes as usize];
    for i in 0..view.superblock().ninodes {
        let ino = view.inode(i)?;
        if ino.ftype() != Some(FType::TDir) {
            continue;
        }
        for de in walk::dir_entries(view, &ino)? {
            if de.is_dot() || de.is_dot_dot() {
                continue;
            }
            let named = de.inum as usize;
            if named >= refs.len() {
                return Err(ImageError::MalformedImage(
                    "directory entry names an inode past the table",
                ));
            }
            refs[named] += 1;
        }
    }
    Ok(refs)
}

// The four reference-count checks, one sweep over the non-reserved inodes:
// in-use implies referenced, referenced implies in-use, file link counts
// match, directories are referenced at most once.
fn reference_checks(view: &ImageView, refs: &[u32]) -> Result<(), FsckError> {
    for i in 2..view.superblock().ninodes {
        let ino = view.inode(i)?;
        let count = refs[i as usize];
        if ino.in_use() && count == 0 {
            return Err(CheckError::InodeUsedNotInDir.into());
        }
        if count > 0 && !ino.in_use() {
            return Err(CheckError::InodeInDirNotUsed.into());
        }
        if ino.ftype() == Some(FType::TFile) && u32::from(ino.nlink) != count {
            return Err(CheckError::BadRefCount.into());
        }
        if ino.ftype() == Some(FType::TDir) && count > 1 {
            return Err(CheckError::DirMulti.into());
        }
    }
    Ok(())
}

// The parent-link graph of the directory tree. Each directory has exactly
// one ".." edge; the per-inode pass has already guaranteed the entry exists.
struct DirGraph {
    /// Directory inum to the inum its `..` entry names, in inode order
    parents: BTreeMap<u32, u32>,
    /// Directory inum to the inums of its non-`.`/`..` entries
    children: HashMap<u32, Vec<u32>>,
}

impl DirGraph {
    fn build(view: &ImageView) -> Result<DirGraph, FsckError> {
        let mut parents = BTreeMap::new();
        let mut children = HashMap::new();
        for i in 0..view.superblock().ninodes {
            let ino = view.inode(i)?;
            if ino.ftype() != Some(FType::TDir) {
                continue;
            }
            let mut kids = Vec::new();
            for de in walk::dir_entries(view, &ino)? {
                if de.is_dot() {
                    continue;
                }
                if de.is_dot_dot() {
                    parents.entry(i).or_insert(u32::from(de.inum));
                } else {
                    kids.push(u32::from(de.inum));
                }
            }
            children.insert(i, kids);
        }
        Ok(DirGraph { parents, children })
    }
}

// Every directory's ".." must name a directory that holds an entry for it.
// The root is excluded: its self-loop was pinned down with the root check,
// and no directory holds an entry for the root.
fn parents_consistent(graph: &DirGraph) -> Result<(), FsckError> {
    for (&dir, &parent) in &graph.parents {
        if dir == ROOT_INUM {
            continue;
        }
        let ok = graph
            .children
            .get(&parent)
            .map_or(false, |kids| kids.contains(&dir));
        if !ok {
            return Err(CheckError::ParentMismatch.into());
        }
    }
    Ok(())
}

// Starting from every directory, following ".." must reach the root without
// revisiting an inode. One visited set per start, released after its walk.
fn no_directory_loops(graph: &DirGraph) -> Result<(), FsckError> {
    for &start in graph.parents.keys() {
        let mut visited = HashSet::new();
        let mut cur = start;
        while cur != ROOT_INUM {
            if !visited.insert(cur) {
                return Err(CheckError::DirLoop.into());
            }
            match graph.parents.get(&cur) {
                Some(&parent) => cur = parent,
                // the chain left the directory graph, so the root is
                // unreachable from here
                None => return Err(CheckError::DirLoop.into()),
            }
        }
    }
    Ok(())
}
