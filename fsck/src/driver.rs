//! Argument decoding and pass sequencing for the command-line tool.
//!
//! The interface is two invocations: `xv6_fsck <image>` to verify and
//! `xv6_fsck -r <image>` to repair. Anything else is a usage error. The
//! usage line is a fixed byte string, so the arguments are decoded by hand
//! rather than through a generated parser.

use std::path::PathBuf;

use xv6fs_api::image::Image;
use xv6fs_api::layout::ImageView;

use crate::check;
use crate::error::FsckError;
use crate::repair;

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
pub enum Mode {
    /// Check the image and report the first inconsistency
    Verify(PathBuf),
    /// Re-attach orphan inodes into `lost+found`
    Repair(PathBuf),
}

/// Decode the argument list, program name included.
///
/// A single argument is always taken as the image path, even when it spells
/// `-r`; with two arguments the first must be `-r`.
pub fn parse_args<I>(args: I) -> Result<Mode, FsckError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let first = args.next().ok_or(FsckError::Usage)?;
    let second = args.next();
    if args.next().is_some() {
        return Err(FsckError::Usage);
    }
    match second {
        Some(image) if first == "-r" => Ok(Mode::Repair(PathBuf::from(image))),
        Some(_) => Err(FsckError::Usage),
        None => Ok(Mode::Verify(PathBuf::from(first))),
    }
}

/// Acquire the image and run the requested mode against it.
/// The mapping and all pass-local indices are released on every return path.
pub fn run(mode: Mode) -> Result<(), FsckError> {
    match mode {
        Mode::Verify(path) => {
            let image = Image::open(&path)?;
            let view = ImageView::parse(image.bytes())?;
            check::verify(&view)
        }
        Mode::Repair(path) => {
            let mut image = Image::open_rw(&path)?;
            repair::reattach_orphans(image.bytes_mut()?)?;
            Ok(())
        }
    }
}
