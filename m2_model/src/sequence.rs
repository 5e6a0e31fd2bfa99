//! Playback of named sequences and global sequences.
//!
//! # Overview
//! A [SequenceController] owns the [Animations] of a model and a [Mixer] for each animated [Target].
//! Playing a sequence adds an [Action] for the sequence's [Clip] to the mixer of every target it animates.
//!
//! Keyframes for sequences without the embedded flag are stored in separate `.anim` files.
//! The first [SequenceController::play] for such a sequence returns the name of the file to fetch
//! instead of starting playback.
//! Playback starts once the fetched bytes are passed to [SequenceController::finish_hydration]
//! unless the sequence was stopped in the meantime.
//!
//! ```text
//! Registered --play--> Hydrating --finish_hydration(Ok)--> Ready
//!     ^                    |
//!     +--finish_hydration(Err)
//! ```
use std::collections::BTreeMap;

use indexmap::IndexMap;
use log::{error, warn};
use m2_lib::{
    cursor::ByteCursor,
    m2::{GlobalSequence, M2, Sequence},
    track::{Track, Value},
};

use crate::{
    animation::{Animations, Property, Target, sample},
    animation_names::animation_name,
    error::HydrateError,
    fetch::{Fetch, FetchError},
    naming::animation_file_name,
};

/// The size of the header at the start of `.anim` files.
/// Offsets in deferred tracks are relative to the end of this header.
// TODO: Check if files with an AFM2 chunk header need any other handling.
pub const EXTERNAL_ANIMATION_HEADER_SIZE: u64 = 8;

/// Identifies a named sequence by its animation id and variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceKey {
    pub id: u16,
    pub variation_index: u16,
}

impl SequenceKey {
    pub fn new(id: u16, variation_index: u16) -> Self {
        Self {
            id,
            variation_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    /// Keyframes may still be in an external file.
    Registered,
    /// Waiting for the external file requested by the first play.
    Hydrating {
        /// Start playback once the keyframes are loaded.
        play_requested: bool,
    },
    /// All keyframes are loaded.
    Ready,
}

/// The result of [SequenceController::play].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayStatus {
    Playing,
    /// Fetch the resource with this name and pass the result to [SequenceController::finish_hydration].
    Fetch(String),
    /// An earlier fetch for this sequence has not finished yet.
    Pending,
    /// No sequence matches the id and variation.
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClipKey {
    /// The index into the named sequences and the sub-sequence index of each track.
    Sequence(usize),
    /// The index into the global sequences.
    Global(usize),
}

/// The tracks animated by a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub key: ClipKey,
    /// The looping duration in seconds.
    pub duration: f32,
    /// The animated properties in the order of [Animations::tracks].
    pub bindings: Vec<(Target, Property)>,
}

impl Clip {
    /// The unique targets in the order of their first binding.
    pub fn targets(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = Vec::new();
        for (target, _) in &self.bindings {
            if !targets.contains(target) {
                targets.push(*target);
            }
        }
        targets
    }
}

/// An active playback of a [Clip].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action {
    pub clip: ClipKey,
    /// The current time in seconds.
    pub time: f32,
}

/// The active actions for a single [Target].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Mixer {
    pub actions: Vec<Action>,
}

impl Mixer {
    fn play(&mut self, clip: ClipKey) {
        if !self.actions.iter().any(|a| a.clip == clip) {
            self.actions.push(Action { clip, time: 0.0 });
        }
    }

    fn stop_all(&mut self) {
        self.actions.clear();
    }
}

/// A value sampled by [SequenceController::evaluate].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledValue {
    pub target: Target,
    pub property: Property,
    pub clip: ClipKey,
    pub value: Value,
}

/// An entry from [SequenceController::list_sequences].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceName {
    pub id: u16,
    /// The name from [animation_name] or an empty string for unknown ids.
    pub name: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
struct SequenceEntry {
    index: usize,
    embedded: bool,
    state: SequenceState,
    clip: Clip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceController {
    base_name: String,
    sequences: Vec<Sequence>,
    global_sequences: Vec<GlobalSequence>,
    animations: Animations,
    entries: IndexMap<SequenceKey, SequenceEntry>,
    global_clips: Vec<Clip>,
    mixers: BTreeMap<Target, Mixer>,
    global_mixers: BTreeMap<Target, Mixer>,
}

impl SequenceController {
    /// Register every sequence and global sequence.
    ///
    /// `base_name` is the model name without the extension for naming external animation files.
    pub fn new(
        base_name: String,
        sequences: Vec<Sequence>,
        global_sequences: Vec<GlobalSequence>,
        animations: Animations,
    ) -> Self {
        let mut entries = IndexMap::new();
        for (index, sequence) in sequences.iter().enumerate() {
            let key = SequenceKey::new(sequence.id, sequence.variation_index);
            if entries.contains_key(&key) {
                warn!("Ignoring duplicate sequence {key:?} at index {index}");
                continue;
            }

            let embedded = sequence.is_embedded();
            let clip = sequence_clip(&animations, index, sequence);
            entries.insert(
                key,
                SequenceEntry {
                    index,
                    embedded,
                    state: if embedded {
                        SequenceState::Ready
                    } else {
                        SequenceState::Registered
                    },
                    clip,
                },
            );
        }

        let global_clips = global_sequences
            .iter()
            .enumerate()
            .map(|(i, g)| global_clip(&animations, i, g))
            .collect();

        Self {
            base_name,
            sequences,
            global_sequences,
            animations,
            entries,
            global_clips,
            mixers: BTreeMap::new(),
            global_mixers: BTreeMap::new(),
        }
    }

    /// Move the sequences and animated definitions out of `m2`.
    pub fn take_from_m2(base_name: String, m2: &mut M2) -> Self {
        let sequences = std::mem::take(&mut m2.sequences);
        let global_sequences = std::mem::take(&mut m2.global_sequences);
        let animations = Animations::take_from_m2(m2);
        Self::new(base_name, sequences, global_sequences, animations)
    }

    pub fn animations(&self) -> &Animations {
        &self.animations
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn global_sequences(&self) -> &[GlobalSequence] {
        &self.global_sequences
    }

    pub fn clip(&self, key: ClipKey) -> Option<&Clip> {
        match key {
            ClipKey::Sequence(index) => self
                .entries
                .values()
                .find(|e| e.index == index)
                .map(|e| &e.clip),
            ClipKey::Global(index) => self.global_clips.get(index),
        }
    }

    pub fn mixer(&self, target: Target) -> Option<&Mixer> {
        self.mixers.get(&target)
    }

    pub fn global_mixer(&self, target: Target) -> Option<&Mixer> {
        self.global_mixers.get(&target)
    }

    /// Start playing the sequence or request its external keyframes.
    pub fn play(&mut self, id: u16, variation_index: u16) -> PlayStatus {
        let key = SequenceKey::new(id, variation_index);
        let Some(entry) = self.entries.get_mut(&key) else {
            return PlayStatus::NotFound;
        };

        match entry.state {
            SequenceState::Ready => {
                play_clip(&mut self.mixers, &entry.clip);
                PlayStatus::Playing
            }
            SequenceState::Registered => {
                entry.state = SequenceState::Hydrating {
                    play_requested: true,
                };
                PlayStatus::Fetch(animation_file_name(&self.base_name, id, variation_index))
            }
            SequenceState::Hydrating { .. } => {
                // Reuse the fetch already in progress.
                entry.state = SequenceState::Hydrating {
                    play_requested: true,
                };
                PlayStatus::Pending
            }
        }
    }

    /// Decode the keyframes for a sequence fetched after [SequenceController::play].
    ///
    /// Playback starts if the sequence was not stopped while fetching.
    /// Errors are logged and return the sequence to [SequenceState::Registered].
    pub fn finish_hydration(
        &mut self,
        id: u16,
        variation_index: u16,
        result: Result<Vec<u8>, FetchError>,
    ) -> Result<bool, HydrateError> {
        let key = SequenceKey::new(id, variation_index);
        let name = animation_file_name(&self.base_name, id, variation_index);

        let Some(entry) = self.entries.get_mut(&key) else {
            warn!("Ignoring animation {name:?} for unknown sequence {key:?}");
            return Ok(false);
        };
        let SequenceState::Hydrating { play_requested } = entry.state else {
            warn!("Ignoring animation {name:?} for sequence {key:?} in state {:?}", entry.state);
            return Ok(false);
        };

        let result = result
            .map_err(|source| HydrateError::Fetch {
                name: name.clone(),
                source,
            })
            .and_then(|bytes| {
                hydrate_tracks(&mut self.animations, entry.index, &bytes).map_err(|source| {
                    HydrateError::Format {
                        name: name.clone(),
                        source,
                    }
                })
            });

        match result {
            Ok(()) => {
                entry.clip.duration = clip_duration(
                    &self.animations,
                    &entry.clip,
                    self.sequences[entry.index].duration(),
                );
                entry.state = SequenceState::Ready;
                if play_requested {
                    play_clip(&mut self.mixers, &entry.clip);
                }
                Ok(play_requested)
            }
            Err(e) => {
                error!("Error loading sequence {key:?}: {e}");
                entry.state = SequenceState::Registered;
                Err(e)
            }
        }
    }

    /// [SequenceController::play] and fetch external keyframes with `fetcher` if needed.
    ///
    /// Returns `true` if the sequence is playing.
    pub async fn play_with<F: Fetch>(
        &mut self,
        fetcher: &F,
        id: u16,
        variation_index: u16,
    ) -> Result<bool, HydrateError> {
        match self.play(id, variation_index) {
            PlayStatus::Playing => Ok(true),
            PlayStatus::Fetch(name) => {
                let result = fetcher.fetch(&name).await;
                self.finish_hydration(id, variation_index, result)
            }
            PlayStatus::Pending | PlayStatus::NotFound => Ok(false),
        }
    }

    /// Stop every action on the targets animated by the sequence.
    /// This also stops other sequences playing on the same targets.
    ///
    /// A pending play for the sequence is cancelled.
    pub fn stop(&mut self, id: u16, variation_index: u16) {
        let key = SequenceKey::new(id, variation_index);
        if let Some(entry) = self.entries.get_mut(&key) {
            if let SequenceState::Hydrating { .. } = entry.state {
                entry.state = SequenceState::Hydrating {
                    play_requested: false,
                };
            }

            for target in entry.clip.targets() {
                if let Some(mixer) = self.mixers.get_mut(&target) {
                    mixer.stop_all();
                }
            }
        }
    }

    /// Stop all named sequences and cancel all pending plays.
    /// Global sequences keep playing.
    pub fn stop_all(&mut self) {
        for entry in self.entries.values_mut() {
            if let SequenceState::Hydrating { .. } = entry.state {
                entry.state = SequenceState::Hydrating {
                    play_requested: false,
                };
            }
        }
        for mixer in self.mixers.values_mut() {
            mixer.stop_all();
        }
    }

    /// Start playing all global sequences.
    pub fn play_global(&mut self) {
        for clip in &self.global_clips {
            play_clip(&mut self.global_mixers, clip);
        }
    }

    pub fn stop_global(&mut self) {
        for mixer in self.global_mixers.values_mut() {
            mixer.stop_all();
        }
    }

    /// Advance all actions by `delta_seconds` and loop at the end of each clip.
    pub fn update(&mut self, delta_seconds: f32) {
        for (mixers, global) in [(&mut self.mixers, false), (&mut self.global_mixers, true)] {
            for mixer in mixers.values_mut() {
                for action in &mut mixer.actions {
                    let duration = match action.clip {
                        ClipKey::Sequence(index) if !global => self
                            .entries
                            .values()
                            .find(|e| e.index == index)
                            .map(|e| e.clip.duration),
                        ClipKey::Global(index) => self.global_clips.get(index).map(|c| c.duration),
                        _ => None,
                    }
                    .unwrap_or_default();

                    action.time = if duration > 0.0 {
                        (action.time + delta_seconds).rem_euclid(duration)
                    } else {
                        0.0
                    };
                }
            }
        }
    }

    /// Sample every animated property for all active actions.
    pub fn evaluate(&self) -> Vec<SampledValue> {
        let mut values = Vec::new();
        for (target, mixer) in self.mixers.iter().chain(self.global_mixers.iter()) {
            for action in &mixer.actions {
                let Some(clip) = self.clip(action.clip) else {
                    continue;
                };
                let index = match action.clip {
                    ClipKey::Sequence(index) => index,
                    ClipKey::Global(_) => 0,
                };

                for (_, property) in clip.bindings.iter().filter(|(t, _)| t == target) {
                    if let Some(value) = self
                        .animations
                        .track(*target, *property)
                        .and_then(|track| sample(track, index, action.time))
                    {
                        values.push(SampledValue {
                            target: *target,
                            property: *property,
                            clip: action.clip,
                            value,
                        });
                    }
                }
            }
        }
        values
    }

    /// One entry for each sequence id with variation `0` sorted by id.
    pub fn list_sequences(&self) -> Vec<SequenceName> {
        let mut names: Vec<_> = self
            .entries
            .keys()
            .filter(|k| k.variation_index == 0)
            .map(|k| SequenceName {
                id: k.id,
                name: animation_name(k.id).unwrap_or_default(),
            })
            .collect();
        names.sort_by_key(|n| n.id);
        names
    }

    /// All variation indices for the sequence `id` in ascending order.
    pub fn list_variations(&self, id: u16) -> Vec<u16> {
        let mut variations: Vec<_> = self
            .entries
            .keys()
            .filter(|k| k.id == id)
            .map(|k| k.variation_index)
            .collect();
        variations.sort();
        variations
    }

    pub fn has_global_sequences(&self) -> bool {
        !self.global_sequences.is_empty()
    }

    pub fn state(&self, id: u16, variation_index: u16) -> Option<SequenceState> {
        self.entries
            .get(&SequenceKey::new(id, variation_index))
            .map(|e| e.state)
    }

    /// `true` if the sequence is playing on any target.
    pub fn is_playing(&self, id: u16, variation_index: u16) -> bool {
        self.entries
            .get(&SequenceKey::new(id, variation_index))
            .map(|e| {
                let clip = ClipKey::Sequence(e.index);
                self.mixers
                    .values()
                    .any(|m| m.actions.iter().any(|a| a.clip == clip))
            })
            .unwrap_or_default()
    }

    /// `true` if any global sequence is playing.
    pub fn is_global_playing(&self) -> bool {
        self.global_mixers.values().any(|m| !m.actions.is_empty())
    }

    /// `true` if the sequence has keyframes in the model.
    pub fn is_embedded(&self, id: u16, variation_index: u16) -> bool {
        self.entries
            .get(&SequenceKey::new(id, variation_index))
            .map(|e| e.embedded)
            .unwrap_or_default()
    }
}

fn play_clip(mixers: &mut BTreeMap<Target, Mixer>, clip: &Clip) {
    for target in clip.targets() {
        mixers.entry(target).or_default().play(clip.key);
    }
}

fn is_named_track(track: &Track) -> bool {
    track.global_sequence.is_none()
}

fn sequence_clip(animations: &Animations, index: usize, sequence: &Sequence) -> Clip {
    let bindings = animations
        .tracks()
        .filter(|(_, _, t)| is_named_track(t) && t.animates(index))
        .map(|(target, property, _)| (target, property))
        .collect();

    let mut clip = Clip {
        key: ClipKey::Sequence(index),
        duration: 0.0,
        bindings,
    };
    clip.duration = clip_duration(animations, &clip, sequence.duration());
    clip
}

fn global_clip(animations: &Animations, index: usize, global_sequence: &GlobalSequence) -> Clip {
    let bindings = animations
        .tracks()
        .filter(|(_, _, t)| t.global_sequence == Some(index as u16) && t.animates(0))
        .map(|(target, property, _)| (target, property))
        .collect();

    let mut clip = Clip {
        key: ClipKey::Global(index),
        duration: 0.0,
        bindings,
    };
    clip.duration = clip_duration(animations, &clip, global_sequence.duration);
    clip
}

/// The time of the last loaded keyframe in any bound track
/// or the declared duration if no keyframes are loaded.
fn clip_duration(animations: &Animations, clip: &Clip, declared_ms: u32) -> f32 {
    let index = match clip.key {
        ClipKey::Sequence(index) => index,
        ClipKey::Global(_) => 0,
    };

    clip.bindings
        .iter()
        .filter_map(|(target, property)| {
            animations
                .track(*target, *property)?
                .sub_sequences
                .get(index)?
                .end_time()
        })
        .reduce(f32::max)
        .filter(|d| *d > 0.0)
        .unwrap_or(declared_ms as f32 / 1000.0)
}

fn hydrate_tracks(
    animations: &mut Animations,
    index: usize,
    bytes: &[u8],
) -> Result<(), m2_lib::error::FormatError> {
    let mut cursor = ByteCursor::new(bytes);
    cursor.set_chunk_origin(EXTERNAL_ANIMATION_HEADER_SIZE);

    // Decode every track before assigning so errors leave all tracks deferred.
    let decoded = animations
        .tracks()
        .filter(|(_, _, t)| is_named_track(t))
        .map(|(_, _, t)| t.decode_deferred(index, &mut cursor))
        .collect::<Result<Vec<_>, _>>()?;

    let tracks = animations
        .tracks_mut()
        .filter(|(_, _, t)| is_named_track(t));
    for ((_, _, track), sub_sequence) in tracks.zip(decoded) {
        if let Some(sub_sequence) = sub_sequence {
            track.sub_sequences[index] = sub_sequence;
        }
    }
    Ok(())
}
