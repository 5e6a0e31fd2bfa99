use image_dds::{ImageFormat, Surface, ddsfile::Dds};
use m2_lib::{blp::Blp, error::UnsupportedTextureError};

/// A decoded [Blp] texture with all mipmaps in a single buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTexture {
    /// The resource name if the texture was loaded from a file.
    pub name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub image_format: ImageFormat,
    pub mipmap_count: u32,
    /// The data for all mipmaps from largest to smallest.
    pub image_data: Vec<u8>,
}

impl ImageTexture {
    pub fn from_blp(blp: &Blp, name: Option<String>) -> Result<Self, UnsupportedTextureError> {
        let image = blp.decode()?;
        Ok(Self {
            name,
            width: image.width,
            height: image.height,
            image_format: image.image_format,
            mipmap_count: image.mipmaps.len() as u32,
            image_data: image.mipmaps.into_iter().flat_map(|m| m.data).collect(),
        })
    }

    pub fn to_surface(&self) -> Surface<&[u8]> {
        Surface {
            width: self.width,
            height: self.height,
            depth: 1,
            layers: 1,
            mipmaps: self.mipmap_count,
            image_format: self.image_format,
            data: &self.image_data,
        }
    }

    /// Create a Direct Draw Surface (DDS) with all mipmaps.
    pub fn to_dds(&self) -> Result<Dds, image_dds::CreateDdsError> {
        self.to_surface().to_dds()
    }
}
