//! Textures in `.blp` files starting with `BLP2`.
//!
//! # Overview
//! A [Blp] stores up to 16 mipmaps located by absolute offsets in the header.
//! Mipmaps are read as raw bytes when parsing.
//! [Blp::decode] converts the raw bytes to a format supported by [image_dds]
//! or returns an [UnsupportedTextureError] for formats without a decoder.
use binrw::{BinRead, BinWrite};
use image_dds::ImageFormat;
use log::trace;

use crate::{cursor::ByteCursor, error::FormatError, error::UnsupportedTextureError};

pub const BLP_MAGIC: &[u8; 4] = b"BLP2";

pub const MIPMAP_SLOT_COUNT: usize = 16;

pub const PALETTE_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct Blp {
    pub header: BlpHeader,
    /// The mipmaps from largest to smallest.
    pub mipmaps: Vec<Mipmap>,
}

/// The fields following the magic.
#[derive(Debug, BinRead, BinWrite, Clone, PartialEq)]
pub struct BlpHeader {
    pub version: u32,
    #[br(map = u8::into)]
    #[bw(map = |&x| u8::from(x))]
    pub color_encoding: ColorEncoding,
    pub alpha_depth: u8,
    #[br(map = u8::into)]
    #[bw(map = |&x| u8::from(x))]
    pub format: PixelFormat,
    pub has_mipmaps: u8,
    pub width: u32,
    pub height: u32,
    pub mipmap_offsets: [u32; MIPMAP_SLOT_COUNT],
    pub mipmap_sizes: [u32; MIPMAP_SLOT_COUNT],

    /// BGRA colors for [ColorEncoding::Palette].
    #[br(if(color_encoding == ColorEncoding::Palette))]
    pub palette: Option<[[u8; 4]; PALETTE_SIZE]>,
}

/// Values other than the known encodings like `0` for JPEG are kept as [ColorEncoding::Unknown].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorEncoding {
    Palette,
    Dxt,
    Argb8888,
    Argb8888Dup,
    Unknown(u8),
}

impl From<u8> for ColorEncoding {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Palette,
            2 => Self::Dxt,
            3 => Self::Argb8888,
            4 => Self::Argb8888Dup,
            v => Self::Unknown(v),
        }
    }
}

impl From<ColorEncoding> for u8 {
    fn from(value: ColorEncoding) -> Self {
        match value {
            ColorEncoding::Palette => 1,
            ColorEncoding::Dxt => 2,
            ColorEncoding::Argb8888 => 3,
            ColorEncoding::Argb8888Dup => 4,
            ColorEncoding::Unknown(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Dxt1,
    Dxt3,
    Argb8888,
    Argb1555,
    Argb4444,
    Rgb565,
    A8,
    Dxt5,
    Unspecified,
    Argb2565,
    Bc5,
    Unknown(u8),
}

impl From<u8> for PixelFormat {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Dxt1,
            1 => Self::Dxt3,
            2 => Self::Argb8888,
            3 => Self::Argb1555,
            4 => Self::Argb4444,
            5 => Self::Rgb565,
            6 => Self::A8,
            7 => Self::Dxt5,
            8 => Self::Unspecified,
            9 => Self::Argb2565,
            11 => Self::Bc5,
            v => Self::Unknown(v),
        }
    }
}

impl From<PixelFormat> for u8 {
    fn from(value: PixelFormat) -> Self {
        match value {
            PixelFormat::Dxt1 => 0,
            PixelFormat::Dxt3 => 1,
            PixelFormat::Argb8888 => 2,
            PixelFormat::Argb1555 => 3,
            PixelFormat::Argb4444 => 4,
            PixelFormat::Rgb565 => 5,
            PixelFormat::A8 => 6,
            PixelFormat::Dxt5 => 7,
            PixelFormat::Unspecified => 8,
            PixelFormat::Argb2565 => 9,
            PixelFormat::Bc5 => 11,
            PixelFormat::Unknown(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mipmap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Mipmaps in a format supported by [image_dds].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub image_format: ImageFormat,
    pub mipmaps: Vec<Mipmap>,
}

impl Blp {
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self, FormatError> {
        let mut cursor = ByteCursor::new(bytes.as_ref());

        let magic = cursor.read_magic()?;
        if &magic != BLP_MAGIC {
            return Err(FormatError::magic(BLP_MAGIC, &magic));
        }

        let header: BlpHeader = cursor.read_type()?;

        // Dimensions aren't clamped, so non square textures end the chain early.
        let mut mipmaps = Vec::new();
        let (mut width, mut height) = (header.width, header.height);
        for (offset, size) in header.mipmap_offsets.iter().zip(header.mipmap_sizes) {
            if *offset == 0 || width == 0 || height == 0 {
                break;
            }

            trace!("mipmap {}x{}: {offset} {size}", width, height);
            cursor.seek(*offset as u64)?;
            let data = cursor.read_fixed_string(size as usize)?.to_vec();
            mipmaps.push(Mipmap {
                width,
                height,
                data,
            });

            width /= 2;
            height /= 2;
        }

        Ok(Self { header, mipmaps })
    }

    /// The [image_dds] format for the decoded data.
    pub fn image_format(&self) -> Result<ImageFormat, UnsupportedTextureError> {
        match (self.header.color_encoding, self.header.format) {
            (ColorEncoding::Unknown(_), _) => Err(UnsupportedTextureError {
                color_encoding: self.header.color_encoding,
                format: self.header.format,
            }),
            (_, PixelFormat::Dxt1) => Ok(ImageFormat::BC1RgbaUnorm),
            (_, PixelFormat::Dxt3) => Ok(ImageFormat::BC2RgbaUnorm),
            (_, PixelFormat::Dxt5) => Ok(ImageFormat::BC3RgbaUnorm),
            (_, PixelFormat::Bc5) => Ok(ImageFormat::BC5RgUnorm),
            (ColorEncoding::Palette, PixelFormat::Unspecified) => Ok(ImageFormat::Rgba8Unorm),
            (color_encoding, format) => Err(UnsupportedTextureError {
                color_encoding,
                format,
            }),
        }
    }

    /// Decode all mipmaps.
    ///
    /// Compressed data is not decompressed.
    /// Palette indices are expanded to RGBA colors.
    pub fn decode(&self) -> Result<DecodedImage, UnsupportedTextureError> {
        let image_format = self.image_format()?;

        let mipmaps = match (&self.header.palette, image_format) {
            (Some(palette), ImageFormat::Rgba8Unorm) => self
                .mipmaps
                .iter()
                .map(|m| Mipmap {
                    width: m.width,
                    height: m.height,
                    data: expand_palette(&m.data, palette),
                })
                .collect(),
            _ => self.mipmaps.clone(),
        };

        Ok(DecodedImage {
            width: self.header.width,
            height: self.header.height,
            image_format,
            mipmaps,
        })
    }
}

/// Convert palette indices to RGBA using a BGRA palette.
pub fn expand_palette(indices: &[u8], palette: &[[u8; 4]; PALETTE_SIZE]) -> Vec<u8> {
    indices
        .iter()
        .flat_map(|i| {
            let [b, g, r, a] = palette[*i as usize];
            [r, g, b, a]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    const HEADER_SIZE: u32 = 4 + 144;

    fn header(color_encoding: ColorEncoding, format: PixelFormat) -> BlpHeader {
        BlpHeader {
            version: 1,
            color_encoding,
            alpha_depth: 8,
            format,
            has_mipmaps: 1,
            width: 4,
            height: 4,
            mipmap_offsets: [0; MIPMAP_SLOT_COUNT],
            mipmap_sizes: [0; MIPMAP_SLOT_COUNT],
            palette: None,
        }
    }

    fn blp_bytes(header: &BlpHeader, data: &[u8]) -> Vec<u8> {
        let mut writer = Cursor::new(Vec::new());
        BLP_MAGIC.write_le(&mut writer).unwrap();
        header.write_le(&mut writer).unwrap();
        let mut bytes = writer.into_inner();
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn header_size() {
        let bytes = blp_bytes(&header(ColorEncoding::Dxt, PixelFormat::Dxt1), &[]);
        assert_eq!(HEADER_SIZE as usize, bytes.len());
    }

    #[test]
    fn read_mipmaps_stop_at_zero_offset() {
        let mut header = header(ColorEncoding::Dxt, PixelFormat::Dxt1);
        header.mipmap_offsets[0] = HEADER_SIZE;
        header.mipmap_sizes[0] = 8;
        header.mipmap_offsets[2] = HEADER_SIZE + 8;
        header.mipmap_sizes[2] = 8;

        let blp = Blp::from_bytes(blp_bytes(&header, &[1u8; 16])).unwrap();
        assert_eq!(
            vec![Mipmap {
                width: 4,
                height: 4,
                data: vec![1; 8]
            }],
            blp.mipmaps
        );
    }

    #[test]
    fn read_mipmaps_stop_at_zero_dimension() {
        let mut header = header(ColorEncoding::Dxt, PixelFormat::Dxt5);
        header.width = 4;
        header.height = 1;
        for i in 0..4 {
            header.mipmap_offsets[i] = HEADER_SIZE;
            header.mipmap_sizes[i] = 16;
        }

        let blp = Blp::from_bytes(blp_bytes(&header, &[0u8; 16])).unwrap();
        assert_eq!(1, blp.mipmaps.len());
        assert_eq!((4, 1), (blp.mipmaps[0].width, blp.mipmaps[0].height));
    }

    #[test]
    fn read_mipmap_out_of_bounds() {
        let mut header = header(ColorEncoding::Dxt, PixelFormat::Dxt1);
        header.mipmap_offsets[0] = HEADER_SIZE;
        header.mipmap_sizes[0] = 64;

        let result = Blp::from_bytes(blp_bytes(&header, &[0u8; 8]));
        assert!(matches!(result, Err(FormatError::OutOfBounds { .. })));
    }

    #[test]
    fn read_invalid_magic() {
        let mut bytes = blp_bytes(&header(ColorEncoding::Dxt, PixelFormat::Dxt1), &[]);
        bytes[3] = b'1';
        let result = Blp::from_bytes(bytes);
        assert!(matches!(result, Err(FormatError::InvalidMagic { .. })));
    }

    #[test]
    fn decode_palette() {
        let mut palette = [[0u8; 4]; PALETTE_SIZE];
        palette[0] = [10, 20, 30, 40];
        palette[1] = [1, 2, 3, 4];

        let mut header = header(ColorEncoding::Palette, PixelFormat::Unspecified);
        header.width = 2;
        header.height = 1;
        header.palette = Some(palette);
        header.mipmap_offsets[0] = HEADER_SIZE + 1024;
        header.mipmap_sizes[0] = 2;

        let blp = Blp::from_bytes(blp_bytes(&header, &[0, 1])).unwrap();
        assert_eq!(Some(palette), blp.header.palette);

        let image = blp.decode().unwrap();
        assert_eq!(ImageFormat::Rgba8Unorm, image.image_format);
        assert_eq!(vec![30, 20, 10, 40, 3, 2, 1, 4], image.mipmaps[0].data);
    }

    #[test]
    fn decode_compressed_passthrough() {
        let mut header = header(ColorEncoding::Dxt, PixelFormat::Bc5);
        header.mipmap_offsets[0] = HEADER_SIZE;
        header.mipmap_sizes[0] = 16;

        let data: Vec<u8> = (0..16).collect();
        let blp = Blp::from_bytes(blp_bytes(&header, &data)).unwrap();
        let image = blp.decode().unwrap();
        assert_eq!(ImageFormat::BC5RgUnorm, image.image_format);
        assert_eq!(data, image.mipmaps[0].data);
    }

    #[test]
    fn read_unknown_encoding_and_format() {
        let mut bytes = blp_bytes(&header(ColorEncoding::Dxt, PixelFormat::Dxt1), &[]);
        // JPEG
        bytes[8] = 0;
        bytes[10] = 10;

        let blp = Blp::from_bytes(bytes).unwrap();
        assert_eq!(ColorEncoding::Unknown(0), blp.header.color_encoding);
        assert_eq!(PixelFormat::Unknown(10), blp.header.format);

        let error = blp.decode().unwrap_err();
        assert_eq!(ColorEncoding::Unknown(0), error.color_encoding);
        assert_eq!(PixelFormat::Unknown(10), error.format);
    }

    #[test]
    fn unknown_encoding_unsupported() {
        // The format byte is 0 for JPEG but doesn't mean DXT1.
        let mut header = header(ColorEncoding::Unknown(0), PixelFormat::Dxt1);
        header.mipmap_offsets[0] = HEADER_SIZE;
        header.mipmap_sizes[0] = 8;

        let blp = Blp::from_bytes(blp_bytes(&header, &[0u8; 8])).unwrap();
        assert!(blp.image_format().is_err());
    }

    #[test]
    fn write_unknown_encoding_and_format() {
        let mut header = header(ColorEncoding::Unknown(0), PixelFormat::Unknown(10));
        header.alpha_depth = 0;
        let bytes = blp_bytes(&header, &[]);
        assert_eq!([0, 0, 10], [bytes[8], bytes[9], bytes[10]]);
    }

    #[test]
    fn read_truncated_header() {
        let bytes = blp_bytes(&header(ColorEncoding::Dxt, PixelFormat::Dxt1), &[]);
        let result = Blp::from_bytes(&bytes[..20]);
        assert!(matches!(
            result,
            Err(FormatError::OutOfBounds { offset: 4, .. })
        ));
    }

    #[test]
    fn decode_unsupported() {
        let blp = Blp::from_bytes(blp_bytes(
            &header(ColorEncoding::Argb8888, PixelFormat::Argb8888),
            &[],
        ))
        .unwrap();
        let error = blp.decode().unwrap_err();
        assert_eq!(ColorEncoding::Argb8888, error.color_encoding);
        assert_eq!(PixelFormat::Argb8888, error.format);
    }
}
