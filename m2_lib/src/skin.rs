//! Mesh topology in `.skin` files or embedded in older `.m2` files.
//!
//! # Overview
//! A [Skin] selects vertices from the model's vertex buffer with
//! [vertex_remap](struct.Skin.html#structfield.vertex_remap)
//! and splits the triangle list into [Submesh] ranges drawn by [Batch] entries.
//!
//! Batches reference materials, textures, and texture animations through "combo" indices
//! into the lookup tables of the [M2](crate::m2::M2).
//! These indices are not resolved here.
//!
//! # File Paths
//! | Versions | Location |
//! | --- | --- |
//! | `< 264` | embedded in the `.m2` file without a magic |
//! | `>= 264` | `{model}00.skin` to `{model}03.skin` starting with `SKIN` |
use binrw::binrw;

use crate::{cursor::ByteCursor, error::FormatError, version::Layout};

pub const SKIN_MAGIC: &[u8; 4] = b"SKIN";

#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    /// Indices into the model's vertices for each skin vertex.
    pub vertex_remap: Vec<u16>,
    /// Triangle list indices into [vertex_remap](#structfield.vertex_remap).
    pub indices: Vec<u16>,
    /// Bone lookup indices for each skin vertex.
    pub bone_indices: Vec<[u8; 4]>,
    pub submeshes: Vec<Submesh>,
    pub batches: Vec<Batch>,
    pub bone_count_max: u32,
}

#[binrw]
#[derive(Debug, Clone, PartialEq)]
#[br(import(layout: Layout))]
pub struct Submesh {
    pub section_id: u16,
    pub level: u16,
    pub vertex_start: u16,
    pub vertex_count: u16,
    pub index_start: u16,
    pub index_count: u16,
    pub bone_count: u16,
    pub bone_combo_index: u16,
    /// The maximum number of bones influencing a vertex.
    pub bone_influences: u16,
    pub center_bone_index: u16,
    pub center_position: [f32; 3],

    #[br(if(layout.has_submesh_sort_center()))]
    pub sort_center_position: Option<[f32; 3]>,

    #[br(if(layout.has_submesh_sort_center()))]
    pub sort_radius: Option<f32>,
}

/// Draw state for a [Submesh].
#[binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub flags: u8,
    pub priority_plane: i8,
    pub shader_id: u16,
    pub submesh_index: u16,
    pub geoset_index: u16,
    /// Index into the color animations or `-1`.
    pub color_index: i16,
    pub material_index: u16,
    pub material_layer: u16,
    pub texture_count: u16,
    /// Index into the texture lookup table.
    pub texture_combo_index: u16,
    pub texture_coord_combo_index: u16,
    /// Index into the transparency lookup table.
    pub texture_weight_combo_index: u16,
    /// Index into the texture transform lookup table.
    pub texture_transform_combo_index: u16,
}

impl Skin {
    /// Read an external skin file.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T, layout: Layout) -> Result<Self, FormatError> {
        let mut cursor = ByteCursor::new(bytes.as_ref());
        Self::read(&mut cursor, layout)
    }

    /// Read a skin profile at the current position.
    ///
    /// Offsets are relative to the chunk origin of `cursor`.
    pub fn read(cursor: &mut ByteCursor, layout: Layout) -> Result<Self, FormatError> {
        if layout.has_external_skins() {
            let magic = cursor.read_magic()?;
            if &magic != SKIN_MAGIC {
                return Err(FormatError::magic(SKIN_MAGIC, &magic));
            }
        }

        let vertex_remap = cursor.read_array()?;
        let indices = cursor.read_array()?;
        let bone_indices = cursor.read_array()?;
        let submeshes = cursor.read_array()?;
        let batches = cursor.read_array()?;
        let bone_count_max = cursor.read_u32()?;

        Ok(Self {
            vertex_remap: cursor.read_vec(vertex_remap)?,
            indices: cursor.read_vec(indices)?,
            bone_indices: cursor.read_vec(bone_indices)?,
            submeshes: cursor.read_vec_args(submeshes, (layout,))?,
            batches: cursor.read_vec(batches)?,
            bone_count_max,
        })
    }
}
