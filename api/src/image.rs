//! Scoped memory mapping of a filesystem image file.
//!
//! The image is acquired exactly once per run and released when the [`Image`]
//! value goes out of scope, on every exit path. Verification maps the file
//! read-only and private; repair maps it shared so dirent writes reach the
//! underlying file. Nothing here locks the file: the caller is assumed to
//! have exclusive access to the image for the duration of the run.

use memmap::{Mmap, MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::{ImageError, Result};

#[derive(Debug)]
enum Mapping {
    ReadOnly(Mmap),
    Shared(MmapMut),
}

/// A filesystem image mapped from a file.
#[derive(Debug)]
pub struct Image {
    /// Path the image was opened from
    path: PathBuf,
    /// Memory-mapped contents of the file. This is what every view into the
    /// image ultimately reads from.
    map: Mapping,
}

impl Image {
    /// Map the image at `path` read-only, for verification.
    /// An open or stat failure is reported as [`ImageError::NotFound`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Image> {
        let file = open_file(&path, false)?;
        let map = unsafe { MmapOptions::new().map(&file)? };
        Ok(Image {
            path: path.as_ref().to_path_buf(),
            map: Mapping::ReadOnly(map),
        })
    }

    /// Map the image at `path` shared read-write, for repair.
    /// Writes through [`Image::bytes_mut`] land in the file when the mapping
    /// is flushed or dropped.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Image> {
        let file = open_file(&path, true)?;
        let map = unsafe { MmapOptions::new().map_mut(&file)? };
        Ok(Image {
            path: path.as_ref().to_path_buf(),
            map: Mapping::Shared(map),
        })
    }

    /// The raw bytes of the image
    pub fn bytes(&self) -> &[u8] {
        match &self.map {
            Mapping::ReadOnly(m) => m,
            Mapping::Shared(m) => m,
        }
    }

    /// The raw bytes of the image, writable.
    /// Errors on an image that was mapped read-only.
    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        match &mut self.map {
            Mapping::ReadOnly(_) => Err(ImageError::MalformedImage(
                "image is mapped read-only",
            )),
            Mapping::Shared(m) => Ok(&mut m[..]),
        }
    }

    /// Length of the mapped span, in bytes
    pub fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    /// An image with no bytes at all (cannot hold a superblock)
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// Path of the file backing this image
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Image {
    /// Make sure repair writes are persisted before the mapping is released.
    /// Read-only mappings have nothing to flush.
    fn drop(&mut self) {
        if let Mapping::Shared(m) = &self.map {
            if self.path.exists() {
                m.flush().ok();
            }
        }
    }
}

// Open for mapping. Both the open and the stat of the reference tool
// collapse into the same NotFound error here.
fn open_file<P: AsRef<Path>>(path: P, writable: bool) -> Result<std::fs::File> {
    let file = OpenOptions::new()
        .read(true)
        .write(writable)
        .open(path)
        .map_err(|_| ImageError::NotFound)?;
    file.metadata().map_err(|_| ImageError::NotFound)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::Image;
    use crate::error::ImageError;
    use std::fs::{create_dir_all, remove_dir, remove_file, write};
    use std::path::PathBuf;

    //Each test gets its own directory under the crate root, because tests
    //run in parallel and must not share image files.
    fn image_prep_path(name: &str, contents: &[u8]) -> PathBuf {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("img-tests-".to_string() + name);
        create_dir_all(&path).unwrap();
        path.push("img");
        write(&path, contents).unwrap();
        path
    }

    fn image_unprep_path(path: &PathBuf) {
        remove_file(path).unwrap();
        remove_dir(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn open_missing_image() {
        let err = Image::open("no-such-image-anywhere").unwrap_err();
        assert_eq!(err.to_string(), "image not found.");
    }

    #[test]
    fn read_only_mapping() {
        let path = image_prep_path("ro", &[7u8; 1024]);
        let mut img = Image::open(&path).unwrap();
        assert_eq!(img.len(), 1024);
        assert!(img.bytes().iter().all(|&b| b == 7));
        match img.bytes_mut() {
            Err(ImageError::MalformedImage(_)) => (),
            other => panic!("expected a read-only refusal, got {:?}", other),
        }
        drop(img);
        image_unprep_path(&path);
    }

    #[test]
    fn shared_mapping_persists_writes() {
        let path = image_prep_path("rw", &[0u8; 1024]);
        {
            let mut img = Image::open_rw(&path).unwrap();
            img.bytes_mut().unwrap()[512] = 0xAB;
        }
        let img = Image::open(&path).unwrap();
        assert_eq!(img.bytes()[512], 0xAB);
        drop(img);
        image_unprep_path(&path);
    }
}
