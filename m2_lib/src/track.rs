//! Keyframe animation tracks used by bones, colors, and texture animations.
//!
//! # Overview
//! A [Track] stores one [SubSequence] for each sequence in the model
//! or a single [SubSequence] if the track is bound to a global sequence.
//! Keyframes for sequences without embedded data live in separate `.anim` files.
//! These sub-sequences are [SubSequence::Deferred] until [Track::hydrate]
//! decodes them from the external buffer.
//!
//! Timestamps are stored in milliseconds and converted to seconds.
use binrw::binrw;
use glam::{Quat, Vec2, Vec3};
use log::warn;

use crate::{cursor::ByteCursor, error::FormatError, version::Layout, M2Array};

/// The size in bytes of the pre Wrath track layout with interpolation ranges.
pub const LEGACY_TRACK_SIZE: u64 = 28;

/// The fixed size part of a track.
/// Each array points to a table of arrays with one entry per sub-sequence.
#[binrw]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackHeader {
    pub interpolation: u16,
    /// The global sequence index or `-1`.
    pub global_sequence: i16,
    pub timestamps: M2Array,
    pub values: M2Array,
}

/// The element type for the values of a [Track].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `i16` normalized by `32767`.
    Fixed16,
    Vec2,
    Vec3,
    /// Four `f32` in xyzw order.
    Quat,
    /// Four `i16` in xyzw order.
    CompressedQuat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Discrete,
    Linear,
    /// Bezier or hermite interpolation.
    Smooth,
}

impl InterpolationMode {
    fn from_raw(value: u16) -> Result<Self, FormatError> {
        match value {
            0 => Ok(Self::Discrete),
            1 => Ok(Self::Linear),
            2 | 3 => Ok(Self::Smooth),
            _ => Err(FormatError::InterpolationMode(value)),
        }
    }
}

/// Decoded keyframe values with an element type determined by [ValueKind].
#[derive(Debug, Clone, PartialEq)]
pub enum Keys {
    Scalar(Vec<f32>),
    Vec2(Vec<Vec2>),
    Vec3(Vec<Vec3>),
    Quat(Vec<Quat>),
}

impl Keys {
    fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Fixed16 => Self::Scalar(Vec::new()),
            ValueKind::Vec2 => Self::Vec2(Vec::new()),
            ValueKind::Vec3 => Self::Vec3(Vec::new()),
            ValueKind::Quat | ValueKind::CompressedQuat => Self::Quat(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Keys::Scalar(v) => v.len(),
            Keys::Vec2(v) => v.len(),
            Keys::Vec3(v) => v.len(),
            Keys::Quat(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            Keys::Scalar(v) => v.get(index).copied().map(Value::Scalar),
            Keys::Vec2(v) => v.get(index).copied().map(Value::Vec2),
            Keys::Vec3(v) => v.get(index).copied().map(Value::Vec3),
            Keys::Quat(v) => v.get(index).copied().map(Value::Quat),
        }
    }
}

/// A single keyframe value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Scalar(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Quat(Quat),
}

/// The keyframes of a [Track] for a single sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum SubSequence {
    Resolved {
        /// Keyframe times in seconds.
        timestamps: Vec<f32>,
        values: Keys,
    },
    /// Keyframes stored in an external animation file.
    /// Offsets are relative to the external buffer.
    Deferred {
        timestamps: M2Array,
        values: M2Array,
    },
}

impl SubSequence {
    /// The number of keyframes including keyframes that are not loaded yet.
    pub fn len(&self) -> usize {
        match self {
            SubSequence::Resolved { timestamps, .. } => timestamps.len(),
            SubSequence::Deferred { timestamps, .. } => timestamps.count as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, SubSequence::Deferred { .. })
    }

    /// The time of the last keyframe in seconds or [None] if nothing is loaded.
    pub fn end_time(&self) -> Option<f32> {
        match self {
            SubSequence::Resolved { timestamps, .. } => timestamps.last().copied(),
            SubSequence::Deferred { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub interpolation: InterpolationMode,
    /// The index into the global sequences or [None] for tracks played by named sequences.
    pub global_sequence: Option<u16>,
    pub value_kind: ValueKind,
    pub sub_sequences: Vec<SubSequence>,
}

impl Track {
    /// Read the track at the current position.
    ///
    /// `embedded` has one entry for each sequence with `true` if the keyframes are in this buffer.
    /// Returns [None] without failing for the unsupported legacy layout.
    pub fn read(
        cursor: &mut ByteCursor,
        layout: Layout,
        value_kind: ValueKind,
        embedded: &[bool],
    ) -> Result<Option<Self>, FormatError> {
        let offset = cursor.position();
        if layout.has_legacy_tracks() {
            warn!("Skipping unsupported {layout:?} track at offset {offset}");
            cursor.skip(LEGACY_TRACK_SIZE)?;
            return Ok(None);
        }

        let TrackHeader {
            interpolation,
            global_sequence,
            timestamps,
            values,
        } = cursor.read_type()?;
        let interpolation = InterpolationMode::from_raw(interpolation)?;
        let global_sequence = u16::try_from(global_sequence).ok();

        let expected = if global_sequence.is_some() {
            1
        } else {
            embedded.len()
        };
        let found = timestamps.count as usize;
        if found != 0 && found != expected {
            return Err(FormatError::SubSequenceCount {
                offset,
                expected,
                found,
            });
        }
        if timestamps.count != values.count {
            return Err(FormatError::MismatchedKeyframes {
                offset,
                timestamps: timestamps.count as usize,
                values: values.count as usize,
            });
        }

        let timestamp_arrays = cursor.read_vec_with(timestamps, |c| c.read_array())?;
        let value_arrays = cursor.read_vec_with(values, |c| c.read_array())?;

        let sub_sequences = timestamp_arrays
            .into_iter()
            .zip(value_arrays)
            .enumerate()
            .map(|(i, (timestamps, values))| {
                // Global sequences are always stored in the model itself.
                let is_embedded =
                    global_sequence.is_some() || embedded.get(i).copied().unwrap_or(true);
                if is_embedded || (timestamps.count == 0 && values.count == 0) {
                    Ok(SubSequence::Resolved {
                        timestamps: read_timestamps(cursor, timestamps)?,
                        values: read_values(cursor, value_kind, values)?,
                    })
                } else {
                    Ok(SubSequence::Deferred { timestamps, values })
                }
            })
            .collect::<Result<Vec<_>, FormatError>>()?;

        Ok(Some(Self {
            interpolation,
            global_sequence,
            value_kind,
            sub_sequences,
        }))
    }

    /// `true` if the track is a single constant value
    /// that should not be animated.
    pub fn is_static(&self) -> bool {
        match self.sub_sequences.as_slice() {
            [SubSequence::Resolved { timestamps, .. }] => {
                timestamps.len() == 1 && timestamps[0] == 0.0
            }
            _ => false,
        }
    }

    /// The constant value for tracks where [Track::is_static] is `true`.
    pub fn static_value(&self) -> Option<Value> {
        if self.is_static() {
            match &self.sub_sequences[0] {
                SubSequence::Resolved { values, .. } => values.get(0),
                SubSequence::Deferred { .. } => None,
            }
        } else {
            None
        }
    }

    /// `true` if the sub-sequence at `index` has keyframes for a timed clip.
    pub fn animates(&self, index: usize) -> bool {
        !self.is_static()
            && self
                .sub_sequences
                .get(index)
                .map(|s| !s.is_empty())
                .unwrap_or_default()
    }

    /// Decode the deferred sub-sequence at `index` from an external buffer
    /// without modifying the track.
    ///
    /// Returns `None` if the sub-sequence is missing or already resolved.
    pub fn decode_deferred(
        &self,
        index: usize,
        cursor: &mut ByteCursor,
    ) -> Result<Option<SubSequence>, FormatError> {
        match self.sub_sequences.get(index) {
            Some(SubSequence::Deferred { timestamps, values }) => Ok(Some(SubSequence::Resolved {
                timestamps: read_timestamps(cursor, *timestamps)?,
                values: read_values(cursor, self.value_kind, *values)?,
            })),
            _ => Ok(None),
        }
    }

    /// Decode the deferred sub-sequence at `index` from an external buffer.
    ///
    /// Returns `true` if the sub-sequence changed from deferred to resolved.
    pub fn hydrate(&mut self, index: usize, cursor: &mut ByteCursor) -> Result<bool, FormatError> {
        match self.decode_deferred(index, cursor)? {
            Some(sub_sequence) => {
                self.sub_sequences[index] = sub_sequence;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Read millisecond timestamps referenced by `array` as seconds.
pub fn read_timestamps(cursor: &mut ByteCursor, array: M2Array) -> Result<Vec<f32>, FormatError> {
    cursor.read_vec_with(array, |c| c.read_u32().map(|ms| (ms as f64 / 1000.0) as f32))
}

/// Read keyframe values referenced by `array`.
pub fn read_values(
    cursor: &mut ByteCursor,
    kind: ValueKind,
    array: M2Array,
) -> Result<Keys, FormatError> {
    if array.count == 0 {
        return Ok(Keys::empty(kind));
    }

    match kind {
        ValueKind::Fixed16 => cursor
            .read_vec_with(array, |c| c.read_i16().map(fixed16_to_f32))
            .map(Keys::Scalar),
        ValueKind::Vec2 => cursor
            .read_vec_with(array, |c| Ok(Vec2::new(c.read_f32()?, c.read_f32()?)))
            .map(Keys::Vec2),
        ValueKind::Vec3 => cursor
            .read_vec_with(array, |c| {
                Ok(Vec3::new(c.read_f32()?, c.read_f32()?, c.read_f32()?))
            })
            .map(Keys::Vec3),
        ValueKind::Quat => cursor
            .read_vec_with(array, |c| {
                Ok(Quat::from_xyzw(
                    c.read_f32()?,
                    c.read_f32()?,
                    c.read_f32()?,
                    c.read_f32()?,
                ))
            })
            .map(Keys::Quat),
        ValueKind::CompressedQuat => cursor
            .read_vec_with(array, |c| {
                Ok(Quat::from_xyzw(
                    decompress_quat_component(c.read_i16()?),
                    decompress_quat_component(c.read_i16()?),
                    decompress_quat_component(c.read_i16()?),
                    decompress_quat_component(c.read_i16()?),
                ))
            })
            .map(Keys::Quat),
    }
}

pub fn fixed16_to_f32(value: i16) -> f32 {
    (value as f64 / 32767.0) as f32
}

/// Convert a component of a 16-bit quaternion.
///
/// This is not symmetric, so `32767` and `-32768` both map to `0.0`.
pub fn decompress_quat_component(value: i16) -> f32 {
    let value = value as i32;
    let shifted = if value < 0 { value + 32768 } else { value - 32767 };
    (shifted as f64 / 32767.0) as f32
}
