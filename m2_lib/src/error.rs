use thiserror::Error;

use crate::blp::{ColorEncoding, PixelFormat};

/// Errors that make the current file unreadable.
///
/// These abort the in progress parse and no partial result is returned.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("expected magic {expected:?} but found {found:?}")]
    InvalidMagic { expected: String, found: String },

    #[error("reading {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("track at offset {offset} has {found} sub-sequences but expected {expected}")]
    SubSequenceCount {
        offset: u64,
        expected: usize,
        found: usize,
    },

    #[error("track at offset {offset} has {timestamps} timestamp lists but {values} value lists")]
    MismatchedKeyframes {
        offset: u64,
        timestamps: usize,
        values: usize,
    },

    #[error("unknown interpolation mode {0}")]
    InterpolationMode(u16),

    #[error("error reading data")]
    Binrw(#[from] binrw::Error),
}

impl FormatError {
    pub(crate) fn magic(expected: &[u8], found: &[u8]) -> Self {
        Self::InvalidMagic {
            expected: String::from_utf8_lossy(expected).to_string(),
            found: String::from_utf8_lossy(found).to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReadFileError {
    #[error("error reading file")]
    Io(#[from] std::io::Error),

    #[error("error parsing file")]
    Format(#[from] FormatError),
}

/// A recognized texture layout that has no decoder.
///
/// The texture can't be used, but the rest of the asset is still valid.
#[derive(Debug, Error)]
#[error("unsupported texture with color encoding {color_encoding:?} and format {format:?}")]
pub struct UnsupportedTextureError {
    pub color_encoding: ColorEncoding,
    pub format: PixelFormat,
}
