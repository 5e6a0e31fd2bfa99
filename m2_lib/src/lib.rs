//! A library for reading M2 models, skin topology, and BLP textures.
//!
//! # Getting Started
//! Each format has its own module based on the name of the type representing the root of the file.
//!
//! ```rust no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let m2 = m2_lib::m2::M2::from_file("creature/wolf/wolf.m2")?;
//! println!("{} {:?}", m2.name, m2.layout);
//!
//! let blp = m2_lib::blp::Blp::from_file("creature/wolf/wolf.blp")?;
//! let image = blp.decode()?;
//! println!("{:?} {}", image.image_format, image.mipmaps.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! Fixed size records like headers, sequences, and vertices are binrw types.
//! Tables are located with `(count, offset)` pairs and read through a [cursor::ByteCursor]
//! that also handles offsets relative to the wrapped data of `MD21` files.
//!
//! Differences between game versions are resolved once into a [version::Layout]
//! that is passed to every read that depends on the version.
//!
//! Animation keyframes for most sequences in newer versions are stored in separate `.anim` files.
//! These are represented as [track::SubSequence::Deferred] and decoded later with [track::Track::hydrate].
use std::path::Path;

use binrw::binrw;

use crate::error::ReadFileError;

pub mod blp;
pub mod cursor;
pub mod error;
pub mod m2;
pub mod skin;
pub mod track;
pub mod version;

/// A `(count, offset)` pair locating a table of items.
#[binrw]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct M2Array {
    pub count: u32,
    pub offset: u32,
}

impl M2Array {
    pub fn new(count: u32, offset: u32) -> Self {
        Self { count, offset }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

macro_rules! file_read_impl {
    ($($type_name:path),*) => {
        $(
            impl $type_name {
                /// Read from `path` using a fully buffered reader for performance.
                pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReadFileError> {
                    let bytes = std::fs::read(path)?;
                    Self::from_bytes(bytes).map_err(Into::into)
                }
            }
        )*
    };
}

file_read_impl!(m2::M2, blp::Blp);
