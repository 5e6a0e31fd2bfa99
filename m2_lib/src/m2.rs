//! Models in `.m2` files starting with `MD20` or the chunked `MD21`.
//!
//! # Overview
//! An [M2] contains the vertices, materials, textures, and animations for a model.
//! Triangle lists are stored separately in a [Skin].
//!
//! Newer files wrap the `MD20` data in an `MD21` chunk followed by side chunks.
//! All offsets in the wrapped data are relative to the start of the `MD20` magic.
//! Only the `TXID` texture file ids and `SFID` skin file ids are decoded.
//! Other chunks are kept as byte ranges in the [ChunkTable].
//! Scanning starts after the wrapped `MD20` data,
//! so the table never contains the `MD21` chunk itself.
//!
//! # File Paths
//! | Versions | File Patterns |
//! | --- | --- |
//! | `< 264` | `*.m2` with embedded skin profiles |
//! | `>= 264` | `*.m2`, `*00.skin`, `*{id}-{variation}.anim` |
use std::ops::Range;

use binrw::binrw;
use glam::Vec3;
use indexmap::IndexMap;
use log::{trace, warn};

use crate::{
    cursor::ByteCursor,
    error::FormatError,
    skin::Skin,
    track::{Track, ValueKind},
    version::Layout,
    M2Array,
};

pub const MD20_MAGIC: &[u8; 4] = b"MD20";
pub const MD21_MAGIC: &[u8; 4] = b"MD21";

pub const TXID_TAG: &[u8; 4] = b"TXID";
pub const SFID_TAG: &[u8; 4] = b"SFID";

/// The header includes [Header::texture_combiner_combos].
pub const GLOBAL_FLAG_TEXTURE_COMBINER_COMBOS: u32 = 0x8;

/// The keyframes for the sequence are stored in the model instead of an `.anim` file.
pub const SEQUENCE_FLAG_EMBEDDED: u32 = 0x20;

#[derive(Debug, Clone, PartialEq)]
pub struct M2 {
    pub layout: Layout,
    /// The absolute position of the `MD20` magic that offsets are relative to.
    pub chunk_origin: u64,
    pub header: Header,
    pub chunks: ChunkTable,

    pub name: String,
    pub global_sequences: Vec<GlobalSequence>,
    pub sequences: Vec<Sequence>,
    pub sequence_lookup: Vec<i16>,
    pub bones: Vec<Bone>,
    pub key_bone_lookup: Vec<i16>,
    pub vertices: Vec<Vertex>,
    pub colors: Vec<Color>,
    pub textures: Vec<Texture>,
    pub texture_weights: Vec<TextureWeight>,
    pub texture_transforms: Vec<TextureTransform>,
    pub replaceable_texture_lookup: Vec<i16>,
    pub materials: Vec<Material>,
    pub bone_lookup: Vec<u16>,
    pub texture_lookup: Vec<u16>,
    pub texture_unit_lookup: Vec<u16>,
    pub transparency_lookup: Vec<u16>,
    pub texture_transform_lookup: Vec<u16>,

    /// Skin profiles for versions without external skin files.
    pub skin_profiles: Vec<Skin>,
}

/// The fields following the `MD20` magic.
#[binrw]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Header {
    pub version: u32,
    pub name: M2Array,
    pub global_flags: u32,
    pub global_sequences: M2Array,
    pub sequences: M2Array,
    pub sequence_lookup: M2Array,

    #[br(if(Layout::from_version(version).has_legacy_fields()))]
    pub playable_animation_lookup: Option<M2Array>,

    pub bones: M2Array,
    pub key_bone_lookup: M2Array,
    pub vertices: M2Array,

    #[br(if(Layout::from_version(version).has_legacy_fields()))]
    pub skin_profiles: Option<M2Array>,

    #[br(if(!Layout::from_version(version).has_legacy_fields()))]
    pub skin_profile_count: Option<u32>,

    pub colors: M2Array,
    pub textures: M2Array,
    pub texture_weights: M2Array,

    #[br(if(Layout::from_version(version).has_legacy_fields()))]
    pub texture_flipbooks: Option<M2Array>,

    pub texture_transforms: M2Array,
    pub replaceable_texture_lookup: M2Array,
    pub materials: M2Array,
    pub bone_lookup: M2Array,
    pub texture_lookup: M2Array,
    pub texture_unit_lookup: M2Array,
    pub transparency_lookup: M2Array,
    pub texture_transform_lookup: M2Array,

    pub bounding_box: BoundingBox,
    pub bounding_sphere_radius: f32,
    pub collision_box: BoundingBox,
    pub collision_sphere_radius: f32,
    pub collision_indices: M2Array,
    pub collision_positions: M2Array,
    pub collision_normals: M2Array,
    pub attachments: M2Array,
    pub attachment_lookup: M2Array,
    pub events: M2Array,
    pub lights: M2Array,
    pub cameras: M2Array,
    pub camera_lookup: M2Array,
    pub ribbon_emitters: M2Array,
    pub particle_emitters: M2Array,

    #[br(if(global_flags & GLOBAL_FLAG_TEXTURE_COMBINER_COMBOS != 0))]
    pub texture_combiner_combos: Option<M2Array>,
}

impl Header {
    pub fn layout(&self) -> Layout {
        Layout::from_version(self.version)
    }
}

#[binrw]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// Byte ranges for the chunks following the `MD21` data in insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChunkTable {
    /// The payload range `[start, end)` for each tag.
    pub chunks: IndexMap<[u8; 4], Range<u64>>,
    /// File ids from the `TXID` chunk.
    pub texture_file_ids: Option<Vec<u32>>,
    /// File ids from the `SFID` chunk.
    pub skin_file_ids: Option<Vec<u32>>,
}

/// An animation played by name like "Stand" or "Walk".
#[binrw]
#[derive(Debug, Clone, PartialEq)]
#[br(import(layout: Layout))]
pub struct Sequence {
    /// The animation id used for looking up the name.
    pub id: u16,
    pub variation_index: u16,
    #[br(args(layout))]
    pub timing: SequenceTiming,
    pub move_speed: f32,
    pub flags: u32,
    pub frequency: i16,
    pub padding: u16,
    pub replay_min: u32,
    pub replay_max: u32,
    #[br(args(layout))]
    pub blend_time: BlendTime,
    pub bounds: BoundingBox,
    pub bounds_radius: f32,
    /// The index of the next variation for this id or `-1`.
    pub next_variation: i16,
    pub next_alias: u16,
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[br(import(layout: Layout))]
pub enum SequenceTiming {
    /// Start and end times in milliseconds in a shared timeline.
    #[br(pre_assert(layout.has_legacy_fields()))]
    Range { start: u32, end: u32 },
    /// Duration in milliseconds.
    #[br(pre_assert(!layout.has_legacy_fields()))]
    Duration(u32),
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[br(import(layout: Layout))]
pub enum BlendTime {
    #[br(pre_assert(!layout.has_split_blend_time()))]
    Combined(u32),
    #[br(pre_assert(layout.has_split_blend_time()))]
    Split { blend_in: u16, blend_out: u16 },
}

impl Sequence {
    /// The duration in milliseconds.
    pub fn duration(&self) -> u32 {
        match self.timing {
            SequenceTiming::Range { start, end } => end.saturating_sub(start),
            SequenceTiming::Duration(duration) => duration,
        }
    }

    /// `true` if the keyframes are in the model instead of an external `.anim` file.
    pub fn is_embedded(&self) -> bool {
        self.flags & SEQUENCE_FLAG_EMBEDDED != 0
    }
}

/// A looping animation independent of the named sequences.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalSequence {
    /// The duration in milliseconds.
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub key_bone_id: i32,
    pub flags: u32,
    /// The index of the parent bone or `-1`.
    pub parent: i16,
    pub submesh_id: u16,
    pub bone_name_hash: Option<u32>,
    pub translation: Option<Track>,
    pub rotation: Option<Track>,
    pub scale: Option<Track>,
    pub pivot: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    pub color: Option<Track>,
    pub alpha: Option<Track>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureWeight {
    pub weight: Option<Track>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureTransform {
    pub translation: Option<Track>,
    pub rotation: Option<Track>,
    pub scale: Option<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// `0` for textures loaded from [filename](#structfield.filename) or a `TXID` file id.
    /// Other values are replaced at runtime.
    pub texture_type: u32,
    pub flags: u32,
    pub filename: String,
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    pub flags: u16,
    pub blend_mode: u16,
}

#[binrw]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub bone_weights: [u8; 4],
    pub bone_indices: [u8; 4],
    pub normal: [f32; 3],
    pub uvs: [[f32; 2]; 2],
}

impl M2 {
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self, FormatError> {
        let mut cursor = ByteCursor::new(bytes.as_ref());

        let mut magic = cursor.read_magic()?;
        let mut wrapped_size = None;
        if &magic == MD21_MAGIC {
            let size = cursor.read_u32()?;
            cursor.set_chunk_origin(cursor.position());
            wrapped_size = Some(size);
            magic = cursor.read_magic()?;
        }
        if &magic != MD20_MAGIC {
            return Err(FormatError::magic(MD20_MAGIC, &magic));
        }

        let header: Header = cursor.read_type()?;
        let layout = header.layout();
        trace!("{layout:?} version {}", header.version);

        let chunks = match wrapped_size {
            Some(size) => ChunkTable::read(cursor.bytes(), cursor.chunk_origin() + size as u64)?,
            None => ChunkTable::default(),
        };

        let sequences: Vec<Sequence> = cursor.read_vec_args(header.sequences, (layout,))?;
        let embedded: Vec<_> = sequences.iter().map(Sequence::is_embedded).collect();

        let skin_profiles = match header.skin_profiles {
            Some(array) if !layout.has_external_skins() => {
                cursor.read_vec_with(array, |c| Skin::read(c, layout))?
            }
            _ => Vec::new(),
        };

        Ok(Self {
            name: cursor.read_string(header.name)?,
            global_sequences: cursor.read_vec(header.global_sequences)?,
            sequence_lookup: cursor.read_vec(header.sequence_lookup)?,
            bones: cursor.read_vec_with(header.bones, |c| Bone::read(c, layout, &embedded))?,
            key_bone_lookup: cursor.read_vec(header.key_bone_lookup)?,
            vertices: cursor.read_vec(header.vertices)?,
            colors: cursor.read_vec_with(header.colors, |c| Color::read(c, layout, &embedded))?,
            textures: cursor.read_vec_with(header.textures, Texture::read)?,
            texture_weights: cursor.read_vec_with(header.texture_weights, |c| {
                TextureWeight::read(c, layout, &embedded)
            })?,
            texture_transforms: cursor.read_vec_with(header.texture_transforms, |c| {
                TextureTransform::read(c, layout, &embedded)
            })?,
            replaceable_texture_lookup: cursor.read_vec(header.replaceable_texture_lookup)?,
            materials: cursor.read_vec(header.materials)?,
            bone_lookup: cursor.read_vec(header.bone_lookup)?,
            texture_lookup: cursor.read_vec(header.texture_lookup)?,
            texture_unit_lookup: cursor.read_vec(header.texture_unit_lookup)?,
            transparency_lookup: cursor.read_vec(header.transparency_lookup)?,
            texture_transform_lookup: cursor.read_vec(header.texture_transform_lookup)?,
            skin_profiles,
            sequences,
            layout,
            chunk_origin: cursor.chunk_origin(),
            header,
            chunks,
        })
    }

    /// The number of skin profiles in the model or in external skin files.
    pub fn skin_profile_count(&self) -> usize {
        self.header
            .skin_profile_count
            .map(|c| c as usize)
            .unwrap_or(self.skin_profiles.len())
    }

    /// `true` for each sequence with keyframes in the model.
    pub fn embedded_sequences(&self) -> Vec<bool> {
        self.sequences.iter().map(Sequence::is_embedded).collect()
    }
}

impl ChunkTable {
    /// Scan tag and size pairs from the absolute position `start` to the end of `bytes`.
    ///
    /// A chunk that extends past the end of the buffer stops the scan with a warning.
    pub fn read(bytes: &[u8], start: u64) -> Result<Self, FormatError> {
        let mut cursor = ByteCursor::new(bytes);
        let mut chunks = IndexMap::new();

        let mut position = start;
        while position < cursor.len() {
            if cursor.len() - position < 8 {
                warn!(
                    "Ignoring {} trailing bytes at offset {position}",
                    cursor.len() - position
                );
                break;
            }

            cursor.seek(position)?;
            let tag = cursor.read_magic()?;
            let size = cursor.read_u32()? as u64;

            let range = cursor.position()..cursor.position() + size;
            if range.end > cursor.len() {
                warn!(
                    "Chunk {:?} at offset {position} with size {size} exceeds buffer size {}",
                    String::from_utf8_lossy(&tag),
                    cursor.len()
                );
                break;
            }

            trace!("{}: {range:?}", String::from_utf8_lossy(&tag));
            position = range.end;
            chunks.insert(tag, range);
        }

        let texture_file_ids = read_file_ids(&mut cursor, chunks.get(TXID_TAG))?;
        let skin_file_ids = read_file_ids(&mut cursor, chunks.get(SFID_TAG))?;

        Ok(Self {
            chunks,
            texture_file_ids,
            skin_file_ids,
        })
    }
}

fn read_file_ids(
    cursor: &mut ByteCursor,
    range: Option<&Range<u64>>,
) -> Result<Option<Vec<u32>>, FormatError> {
    range
        .map(|range| {
            let count = (range.end - range.start) / 4;
            cursor.read_vec(M2Array::new(count as u32, range.start as u32))
        })
        .transpose()
}

impl Bone {
    fn read(cursor: &mut ByteCursor, layout: Layout, embedded: &[bool]) -> Result<Self, FormatError> {
        let key_bone_id = cursor.read_i32()?;
        let flags = cursor.read_u32()?;
        let parent = cursor.read_i16()?;
        let submesh_id = cursor.read_u16()?;
        let bone_name_hash = if layout.has_bone_name_hash() {
            Some(cursor.read_u32()?)
        } else {
            None
        };

        let rotation_kind = if layout.has_compressed_bone_rotations() {
            ValueKind::CompressedQuat
        } else {
            ValueKind::Quat
        };

        Ok(Self {
            key_bone_id,
            flags,
            parent,
            submesh_id,
            bone_name_hash,
            translation: Track::read(cursor, layout, ValueKind::Vec3, embedded)?,
            rotation: Track::read(cursor, layout, rotation_kind, embedded)?,
            scale: Track::read(cursor, layout, ValueKind::Vec3, embedded)?,
            pivot: Vec3::from_array(cursor.read_type()?),
        })
    }
}

impl Color {
    fn read(cursor: &mut ByteCursor, layout: Layout, embedded: &[bool]) -> Result<Self, FormatError> {
        Ok(Self {
            color: Track::read(cursor, layout, ValueKind::Vec3, embedded)?,
            alpha: Track::read(cursor, layout, ValueKind::Fixed16, embedded)?,
        })
    }
}

impl TextureWeight {
    fn read(cursor: &mut ByteCursor, layout: Layout, embedded: &[bool]) -> Result<Self, FormatError> {
        Ok(Self {
            weight: Track::read(cursor, layout, ValueKind::Fixed16, embedded)?,
        })
    }
}

impl TextureTransform {
    fn read(cursor: &mut ByteCursor, layout: Layout, embedded: &[bool]) -> Result<Self, FormatError> {
        Ok(Self {
            translation: Track::read(cursor, layout, ValueKind::Vec3, embedded)?,
            rotation: Track::read(cursor, layout, ValueKind::Quat, embedded)?,
            scale: Track::read(cursor, layout, ValueKind::Vec3, embedded)?,
        })
    }
}

impl Texture {
    fn read(cursor: &mut ByteCursor) -> Result<Self, FormatError> {
        let texture_type = cursor.read_u32()?;
        let flags = cursor.read_u32()?;
        let filename = cursor.read_array()?;
        Ok(Self {
            texture_type,
            flags,
            filename: cursor.read_string(filename)?,
        })
    }
}
