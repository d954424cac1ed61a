//! Errors of the image-access layer.
//!
//! Two kinds of failure can happen below the checker: the image file cannot
//! be acquired at all, or the bytes we mapped do not describe a filesystem
//! whose regions fit inside the span. Both are fatal to the caller; the
//! distinction only matters for the message printed on the way out.

use std::io;
use thiserror::Error;

/// Error type used by the image mapping and layout decoding layer.
#[derive(Error, Debug)]
pub enum ImageError {
    /// The image file could not be opened or stat'ed.
    /// The message is the exact line the tool prints for this case.
    #[error("image not found.")]
    NotFound,
    /// I/O failure while mapping or flushing the image
    #[error("could not map the image: {0}")]
    ImageIo(#[from] io::Error),
    /// An on-disk record could not be (de)serialized
    #[error("could not decode an on-disk record: {0}")]
    Serialize(#[from] bincode::Error),
    /// The image is structurally unusable: a region or block index falls
    /// outside the mapped span, so no invariant can even be evaluated
    #[error("malformed image: {0}")]
    MalformedImage(&'static str),
}

/// Generic alias for a `Result` with the error type `ImageError`.
pub type Result<T> = std::result::Result<T, ImageError>;
