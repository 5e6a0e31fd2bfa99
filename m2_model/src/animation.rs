//! Utilities for working with animation data.
use std::ops::{Add, Mul, Sub};

use glam::{Quat, Vec2, Vec3};
use m2_lib::{
    m2::{Bone, Color, M2, TextureTransform, TextureWeight},
    track::{InterpolationMode, Keys, SubSequence, Track, Value},
};

/// An animated definition in the model.
/// The index is the position in the corresponding list of [Animations].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    Bone(usize),
    Color(usize),
    TextureWeight(usize),
    TextureTransform(usize),
}

/// The animated value of a [Target].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Property {
    Translation,
    Rotation,
    Scale,
    Color,
    Alpha,
    Weight,
}

/// The definitions with animation tracks moved out of an [M2].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Animations {
    pub bones: Vec<Bone>,
    pub colors: Vec<Color>,
    pub texture_weights: Vec<TextureWeight>,
    pub texture_transforms: Vec<TextureTransform>,
}

impl Animations {
    /// Take the animated definitions from `m2` without copying any tracks.
    pub fn take_from_m2(m2: &mut M2) -> Self {
        Self {
            bones: std::mem::take(&mut m2.bones),
            colors: std::mem::take(&mut m2.colors),
            texture_weights: std::mem::take(&mut m2.texture_weights),
            texture_transforms: std::mem::take(&mut m2.texture_transforms),
        }
    }

    /// All tracks with their target and property.
    pub fn tracks(&self) -> impl Iterator<Item = (Target, Property, &Track)> {
        let bones = self.bones.iter().enumerate().flat_map(|(i, b)| {
            [
                (Property::Translation, &b.translation),
                (Property::Rotation, &b.rotation),
                (Property::Scale, &b.scale),
            ]
            .into_iter()
            .filter_map(move |(p, t)| t.as_ref().map(|t| (Target::Bone(i), p, t)))
        });

        let colors = self.colors.iter().enumerate().flat_map(|(i, c)| {
            [(Property::Color, &c.color), (Property::Alpha, &c.alpha)]
                .into_iter()
                .filter_map(move |(p, t)| t.as_ref().map(|t| (Target::Color(i), p, t)))
        });

        let weights = self.texture_weights.iter().enumerate().filter_map(|(i, w)| {
            w.weight
                .as_ref()
                .map(|t| (Target::TextureWeight(i), Property::Weight, t))
        });

        let transforms = self.texture_transforms.iter().enumerate().flat_map(|(i, t)| {
            [
                (Property::Translation, &t.translation),
                (Property::Rotation, &t.rotation),
                (Property::Scale, &t.scale),
            ]
            .into_iter()
            .filter_map(move |(p, t)| t.as_ref().map(|t| (Target::TextureTransform(i), p, t)))
        });

        bones.chain(colors).chain(weights).chain(transforms)
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = (Target, Property, &mut Track)> {
        let bones = self.bones.iter_mut().enumerate().flat_map(|(i, b)| {
            [
                (Property::Translation, &mut b.translation),
                (Property::Rotation, &mut b.rotation),
                (Property::Scale, &mut b.scale),
            ]
            .into_iter()
            .filter_map(move |(p, t)| t.as_mut().map(|t| (Target::Bone(i), p, t)))
        });

        let colors = self.colors.iter_mut().enumerate().flat_map(|(i, c)| {
            [(Property::Color, &mut c.color), (Property::Alpha, &mut c.alpha)]
                .into_iter()
                .filter_map(move |(p, t)| t.as_mut().map(|t| (Target::Color(i), p, t)))
        });

        let weights = self
            .texture_weights
            .iter_mut()
            .enumerate()
            .filter_map(|(i, w)| {
                w.weight
                    .as_mut()
                    .map(|t| (Target::TextureWeight(i), Property::Weight, t))
            });

        let transforms = self
            .texture_transforms
            .iter_mut()
            .enumerate()
            .flat_map(|(i, t)| {
                [
                    (Property::Translation, &mut t.translation),
                    (Property::Rotation, &mut t.rotation),
                    (Property::Scale, &mut t.scale),
                ]
                .into_iter()
                .filter_map(move |(p, t)| {
                    t.as_mut().map(|t| (Target::TextureTransform(i), p, t))
                })
            });

        bones.chain(colors).chain(weights).chain(transforms)
    }

    pub fn track(&self, target: Target, property: Property) -> Option<&Track> {
        match (target, property) {
            (Target::Bone(i), Property::Translation) => self.bones.get(i)?.translation.as_ref(),
            (Target::Bone(i), Property::Rotation) => self.bones.get(i)?.rotation.as_ref(),
            (Target::Bone(i), Property::Scale) => self.bones.get(i)?.scale.as_ref(),
            (Target::Color(i), Property::Color) => self.colors.get(i)?.color.as_ref(),
            (Target::Color(i), Property::Alpha) => self.colors.get(i)?.alpha.as_ref(),
            (Target::TextureWeight(i), Property::Weight) => {
                self.texture_weights.get(i)?.weight.as_ref()
            }
            (Target::TextureTransform(i), Property::Translation) => {
                self.texture_transforms.get(i)?.translation.as_ref()
            }
            (Target::TextureTransform(i), Property::Rotation) => {
                self.texture_transforms.get(i)?.rotation.as_ref()
            }
            (Target::TextureTransform(i), Property::Scale) => {
                self.texture_transforms.get(i)?.scale.as_ref()
            }
            _ => None,
        }
    }
}

/// Sample the sub-sequence at `index` of `track` at `time` in seconds.
/// Returns `None` if the sub-sequence is empty or not loaded yet.
pub fn sample(track: &Track, index: usize, time: f32) -> Option<Value> {
    match track.sub_sequences.get(index)? {
        SubSequence::Resolved { timestamps, values } => {
            sample_keys(track.interpolation, timestamps, values, time)
        }
        SubSequence::Deferred { .. } => None,
    }
}

/// Sample `values` at `time` in seconds.
///
/// Times before the first keyframe or after the last keyframe use the first or last value.
pub fn sample_keys(
    interpolation: InterpolationMode,
    timestamps: &[f32],
    values: &Keys,
    time: f32,
) -> Option<Value> {
    let count = timestamps.len().min(values.len());
    if count == 0 {
        return None;
    }
    let timestamps = &timestamps[..count];

    // The first keyframe after time.
    let next = timestamps.partition_point(|t| *t <= time);
    if next == 0 {
        return values.get(0);
    }
    if next == count {
        return values.get(count - 1);
    }

    let previous = next - 1;
    let (start, end) = (timestamps[previous], timestamps[next]);
    let factor = if end > start {
        (time - start) / (end - start)
    } else {
        0.0
    };

    match interpolation {
        InterpolationMode::Discrete => values.get(previous),
        InterpolationMode::Linear => {
            interpolate_linear(values.get(previous)?, values.get(next)?, factor)
        }
        InterpolationMode::Smooth => {
            let p1 = values.get(previous)?;
            let p2 = values.get(next)?;
            let p0 = previous.checked_sub(1).and_then(|i| values.get(i)).unwrap_or(p1);
            let p3 = values.get(next + 1).filter(|_| next + 1 < count).unwrap_or(p2);
            interpolate_smooth(p0, p1, p2, p3, factor)
        }
    }
}

fn interpolate_linear(a: Value, b: Value, factor: f32) -> Option<Value> {
    match (a, b) {
        (Value::Scalar(a), Value::Scalar(b)) => Some(Value::Scalar(a + (b - a) * factor)),
        (Value::Vec2(a), Value::Vec2(b)) => Some(Value::Vec2(a.lerp(b, factor))),
        (Value::Vec3(a), Value::Vec3(b)) => Some(Value::Vec3(a.lerp(b, factor))),
        (Value::Quat(a), Value::Quat(b)) => Some(Value::Quat(a.slerp(b, factor))),
        _ => None,
    }
}

fn interpolate_smooth(p0: Value, p1: Value, p2: Value, p3: Value, factor: f32) -> Option<Value> {
    match (p0, p1, p2, p3) {
        (Value::Scalar(p0), Value::Scalar(p1), Value::Scalar(p2), Value::Scalar(p3)) => {
            Some(Value::Scalar(catmull_rom(p0, p1, p2, p3, factor)))
        }
        (Value::Vec2(p0), Value::Vec2(p1), Value::Vec2(p2), Value::Vec2(p3)) => {
            Some(Value::Vec2(catmull_rom(p0, p1, p2, p3, factor)))
        }
        (Value::Vec3(p0), Value::Vec3(p1), Value::Vec3(p2), Value::Vec3(p3)) => {
            Some(Value::Vec3(catmull_rom(p0, p1, p2, p3, factor)))
        }
        // Splines for quaternions don't preserve length.
        (_, Value::Quat(p1), Value::Quat(p2), _) => Some(Value::Quat(p1.slerp(p2, factor))),
        _ => None,
    }
}

fn catmull_rom<T>(p0: T, p1: T, p2: T, p3: T, t: f32) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f32, Output = T>,
{
    let t2 = t * t;
    let t3 = t2 * t;
    (p1 * 2.0
        + (p2 - p0) * t
        + (p0 * 2.0 - p1 * 5.0 + p2 * 4.0 - p3) * t2
        + (p1 * 3.0 - p0 - p2 * 3.0 + p3) * t3)
        * 0.5
}

/// Rotation angles around the Z axis for each keyframe in radians.
///
/// Angles accumulate across keyframes instead of wrapping at `PI`,
/// so the result can be interpolated without spinning in the wrong direction.
///
/// This is for callers that animate a texture transform with a single UV angle.
/// Sampling with [Animations::track] interpolates the quaternions directly.
pub fn unwrapped_rotation_angles(rotations: &[Quat]) -> Vec<f32> {
    let mut angle = 0.0;
    let mut previous: Option<Vec2> = None;

    rotations
        .iter()
        .map(|rotation| {
            let direction = (*rotation * Vec3::X).truncate();
            angle = match previous {
                Some(p) => angle + p.perp_dot(direction).atan2(p.dot(direction)),
                None => direction.y.atan2(direction.x),
            };
            previous = Some(direction);
            angle
        })
        .collect()
}
