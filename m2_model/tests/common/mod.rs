use std::io::Cursor;

use binrw::{BinWrite, binrw};
use m2_lib::{
    M2Array,
    blp::{BLP_MAGIC, BlpHeader, ColorEncoding, PixelFormat},
    m2::{
        BlendTime, BoundingBox, GlobalSequence, Header, MD20_MAGIC, MD21_MAGIC,
        SEQUENCE_FLAG_EMBEDDED, Sequence, SequenceTiming, Vertex,
    },
    skin::{SKIN_MAGIC, Submesh},
    track::TrackHeader,
};
use m2_model::MemoryFetcher;

pub const MODEL_NAME: &str = "creature/wolf/wolf.m2";
pub const SKIN_NAME: &str = "creature/wolf/wolf00.skin";
pub const TEXTURE_NAME: &str = "creature/wolf/wolf.blp";
pub const WALK_NAME: &str = "creature/wolf/wolf0004-00.anim";
pub const WALK_VARIATION_NAME: &str = "creature/wolf/wolf0004-01.anim";

pub const STAND: u16 = 0;
pub const WALK: u16 = 4;
pub const RUN: u16 = 5;

#[binrw]
pub struct RawBone {
    pub key_bone_id: i32,
    pub flags: u32,
    pub parent: i16,
    pub submesh_id: u16,
    pub bone_name_hash: u32,
    pub translation: TrackHeader,
    pub rotation: TrackHeader,
    pub scale: TrackHeader,
    pub pivot: [f32; 3],
}

#[binrw]
pub struct RawTexture {
    pub texture_type: u32,
    pub flags: u32,
    pub filename: M2Array,
}

/// Appends tables after an MD20 header and returns their locations.
pub struct ModelBuilder {
    pub header: Header,
    data: Vec<u8>,
    data_offset: u32,
}

impl ModelBuilder {
    /// A builder for version `264` models with external skins.
    pub fn new() -> Self {
        let header = Header {
            version: 264,
            skin_profile_count: Some(1),
            ..Default::default()
        };
        let data_offset = 4 + to_bytes(&header).len() as u32;

        Self {
            header,
            data: Vec::new(),
            data_offset,
        }
    }

    pub fn push<T>(&mut self, items: &[T]) -> M2Array
    where
        for<'a> T: BinWrite<Args<'a> = ()>,
    {
        let offset = self.data_offset + self.data.len() as u32;
        for item in items {
            self.data.extend_from_slice(&to_bytes(item));
        }
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        M2Array::new(items.len() as u32, offset)
    }

    /// A track with one timestamp and value array for each sub-sequence.
    pub fn track(
        &mut self,
        interpolation: u16,
        global_sequence: i16,
        sub_sequences: &[(M2Array, M2Array)],
    ) -> TrackHeader {
        let timestamps: Vec<_> = sub_sequences.iter().map(|s| s.0).collect();
        let values: Vec<_> = sub_sequences.iter().map(|s| s.1).collect();
        TrackHeader {
            interpolation,
            global_sequence,
            timestamps: self.push(&timestamps),
            values: self.push(&values),
        }
    }

    pub fn md20(&self) -> Vec<u8> {
        let mut bytes = MD20_MAGIC.to_vec();
        bytes.extend_from_slice(&to_bytes(&self.header));
        bytes.extend_from_slice(&self.data);
        bytes
    }

    pub fn md21(&self, chunks: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let md20 = self.md20();
        let mut bytes = MD21_MAGIC.to_vec();
        bytes.extend_from_slice(&(md20.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&md20);
        for (tag, payload) in chunks {
            bytes.extend_from_slice(*tag);
            bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            bytes.extend_from_slice(payload);
        }
        bytes
    }
}

pub fn to_bytes<T>(value: &T) -> Vec<u8>
where
    for<'a> T: BinWrite<Args<'a> = ()>,
{
    let mut writer = Cursor::new(Vec::new());
    value.write_le(&mut writer).unwrap();
    writer.into_inner()
}

pub fn sequence(id: u16, variation_index: u16, flags: u32, duration: u32) -> Sequence {
    Sequence {
        id,
        variation_index,
        timing: SequenceTiming::Duration(duration),
        move_speed: 0.0,
        flags,
        frequency: 0x7fff,
        padding: 0,
        replay_min: 0,
        replay_max: 0,
        blend_time: BlendTime::Combined(150),
        bounds: BoundingBox::default(),
        bounds_radius: 1.0,
        next_variation: -1,
        next_alias: 0,
    }
}

fn vertex(position: [f32; 3]) -> Vertex {
    Vertex {
        position,
        bone_weights: [255, 0, 0, 0],
        bone_indices: [0; 4],
        normal: [0.0, 0.0, 1.0],
        uvs: [[0.0; 2]; 2],
    }
}

/// Keyframes in external animation files start after the 8 byte header.
const ANIM_TIMESTAMPS: M2Array = M2Array {
    count: 2,
    offset: 0,
};
const ANIM_VALUES: M2Array = M2Array {
    count: 2,
    offset: 8,
};

/// A model with sequences Stand, Walk, Walk variation 1, and Run.
///
/// Bone 0 translates along x in Stand, along y in Walk, and along z in Run.
/// Walk keyframes are stored in external files.
/// Bone 1 rotates with global sequence 0.
pub fn wolf_builder() -> ModelBuilder {
    let mut b = ModelBuilder::new();
    b.header.name = b.push(b"Wolf\0");
    b.header.global_sequences = b.push(&[GlobalSequence { duration: 2000 }]);
    b.header.sequences = b.push(&[
        sequence(STAND, 0, SEQUENCE_FLAG_EMBEDDED, 1000),
        sequence(WALK, 0, 0, 500),
        sequence(WALK, 1, 0, 500),
        sequence(RUN, 0, SEQUENCE_FLAG_EMBEDDED, 1000),
    ]);

    let stand_times = b.push(&[0u32, 1000]);
    let stand_values = b.push(&[[0.0f32; 3], [1.0, 0.0, 0.0]]);
    let run_times = b.push(&[0u32, 1000]);
    let run_values = b.push(&[[0.0f32; 3], [0.0, 0.0, 1.0]]);
    let translation = b.track(
        1,
        -1,
        &[
            (stand_times, stand_values),
            (ANIM_TIMESTAMPS, ANIM_VALUES),
            (ANIM_TIMESTAMPS, ANIM_VALUES),
            (run_times, run_values),
        ],
    );

    // Identity rotations.
    let global_times = b.push(&[0u32, 1000, 2000]);
    let global_values = b.push(&[[32767i16, 32767, 32767, -1]; 3]);
    let rotation = b.track(1, 0, &[(global_times, global_values)]);

    let empty = b.track(0, -1, &[]);
    b.header.bones = b.push(&[
        RawBone {
            key_bone_id: -1,
            flags: 0,
            parent: -1,
            submesh_id: 0,
            bone_name_hash: 0,
            translation,
            rotation: empty,
            scale: empty,
            pivot: [0.0; 3],
        },
        RawBone {
            key_bone_id: -1,
            flags: 0,
            parent: 0,
            submesh_id: 0,
            bone_name_hash: 0,
            translation: empty,
            rotation,
            scale: empty,
            pivot: [0.0, 0.0, 1.0],
        },
    ]);

    b.header.vertices = b.push(&[
        vertex([0.0, 0.0, 0.0]),
        vertex([1.0, 0.0, 0.0]),
        vertex([0.0, 1.0, 0.0]),
    ]);

    let filename = b.push(b"Creature\\Wolf\\Wolf.blp\0");
    b.header.textures = b.push(&[
        RawTexture {
            texture_type: 0,
            flags: 0,
            filename,
        },
        RawTexture {
            texture_type: 11,
            flags: 0,
            filename: M2Array::default(),
        },
    ]);
    b
}

pub fn wolf_model() -> Vec<u8> {
    wolf_builder().md20()
}

/// An external animation file moving bone 0 to `end` over 500 ms.
pub fn walk_animation(end: [f32; 3]) -> Vec<u8> {
    let mut bytes = b"AFID\0\0\0\0".to_vec();
    bytes.extend_from_slice(&to_bytes(&[0u32, 500]));
    bytes.extend_from_slice(&to_bytes(&[[0.0f32; 3], end]));
    bytes
}

/// A skin with a single triangle using the vertices in reverse order.
pub fn wolf_skin() -> Vec<u8> {
    let vertex_remap = [2u16, 1, 0];
    let indices = [0u16, 1, 2];
    let bone_indices = [[0u8; 4]; 3];
    let submesh = Submesh {
        section_id: 0,
        level: 0,
        vertex_start: 0,
        vertex_count: 3,
        index_start: 0,
        index_count: 3,
        bone_count: 1,
        bone_combo_index: 0,
        bone_influences: 1,
        center_bone_index: 0,
        center_position: [0.0; 3],
        sort_center_position: Some([0.0; 3]),
        sort_radius: Some(1.0),
    };

    let tables = [
        to_bytes(&vertex_remap),
        to_bytes(&indices),
        to_bytes(&bone_indices),
        to_bytes(&submesh),
        Vec::new(),
    ];
    let counts = [3u32, 3, 3, 1, 0];

    // Magic, five arrays, and the bone count.
    let mut offset = 4 + 5 * 8 + 4;
    let mut header = SKIN_MAGIC.to_vec();
    let mut data = Vec::new();
    for (table, count) in tables.iter().zip(counts) {
        header.extend_from_slice(&to_bytes(&M2Array::new(count, offset)));
        data.extend_from_slice(table);
        while data.len() % 4 != 0 {
            data.push(0);
        }
        offset = 4 + 5 * 8 + 4 + data.len() as u32;
    }
    header.extend_from_slice(&to_bytes(&1u32));
    header.extend_from_slice(&data);
    header
}

/// A 4x4 texture with a single mipmap.
pub fn blp(format: PixelFormat, color_encoding: ColorEncoding, data: &[u8]) -> Vec<u8> {
    let mut mipmap_offsets = [0; 16];
    let mut mipmap_sizes = [0; 16];
    mipmap_offsets[0] = 148;
    mipmap_sizes[0] = data.len() as u32;

    let header = BlpHeader {
        version: 1,
        color_encoding,
        alpha_depth: 0,
        format,
        has_mipmaps: 0,
        width: 4,
        height: 4,
        mipmap_offsets,
        mipmap_sizes,
        palette: None,
    };

    let mut bytes = BLP_MAGIC.to_vec();
    bytes.extend_from_slice(&to_bytes(&header));
    bytes.extend_from_slice(data);
    bytes
}

pub fn wolf_texture() -> Vec<u8> {
    blp(PixelFormat::Dxt1, ColorEncoding::Dxt, &[0u8; 8])
}

/// All files for [MODEL_NAME].
pub fn wolf_files() -> MemoryFetcher {
    let mut fetcher = MemoryFetcher::new();
    fetcher.insert(MODEL_NAME, wolf_model());
    fetcher.insert(SKIN_NAME, wolf_skin());
    fetcher.insert(TEXTURE_NAME, wolf_texture());
    fetcher.insert(WALK_NAME, walk_animation([0.0, 2.0, 0.0]));
    fetcher.insert(WALK_VARIATION_NAME, walk_animation([0.0, 4.0, 0.0]));
    fetcher
}
