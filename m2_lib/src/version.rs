//! Version specific layouts for M2 and skin data.
//!
//! The header version selects a [Layout] once.
//! Every decoding function that depends on the version takes the [Layout]
//! instead of comparing version numbers directly.
//!
//! | Layout | Versions |
//! | --- | --- |
//! | [Layout::Classic] | `< 260` |
//! | [Layout::BurningCrusade] | `260..=263` |
//! | [Layout::Wrath] | `264..=273` |
//! | [Layout::Legion] | `>= 274` |

/// The first version with submesh sort centers and bone name hashes.
pub const VERSION_BURNING_CRUSADE_MIN: u32 = 260;

/// The last version with the legacy header fields and track layout.
pub const VERSION_BURNING_CRUSADE: u32 = 263;

/// The first version with external `SKIN` files.
pub const VERSION_WRATH: u32 = 264;

/// The last version with a combined sequence blend time.
pub const VERSION_WARLORDS: u32 = 273;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layout {
    Classic,
    BurningCrusade,
    Wrath,
    Legion,
}

impl Layout {
    pub fn from_version(version: u32) -> Self {
        if version < VERSION_BURNING_CRUSADE_MIN {
            Self::Classic
        } else if version <= VERSION_BURNING_CRUSADE {
            Self::BurningCrusade
        } else if version <= VERSION_WARLORDS {
            Self::Wrath
        } else {
            Self::Legion
        }
    }

    /// Header tables removed after Burning Crusade
    /// and sequences with start and end timestamps instead of a duration.
    pub fn has_legacy_fields(&self) -> bool {
        *self <= Self::BurningCrusade
    }

    /// Tracks with an interpolation range table and flat keyframe arrays.
    pub fn has_legacy_tracks(&self) -> bool {
        *self <= Self::BurningCrusade
    }

    /// Skin profiles are stored in separate files starting with `SKIN`.
    pub fn has_external_skins(&self) -> bool {
        *self >= Self::Wrath
    }

    pub fn has_split_blend_time(&self) -> bool {
        *self >= Self::Legion
    }

    pub fn has_submesh_sort_center(&self) -> bool {
        *self >= Self::BurningCrusade
    }

    pub fn has_bone_name_hash(&self) -> bool {
        *self >= Self::BurningCrusade
    }

    /// Bone rotations use 16-bit quaternion components.
    pub fn has_compressed_bone_rotations(&self) -> bool {
        *self >= Self::BurningCrusade
    }
}
