//! # m2_model
//! m2_model provides high level data access for the files that make up a model.
//!
//! A model is loaded from a single `.m2` file and the skin and texture files it references.
//! Files are requested by name through a [Fetch] implementation like [DirectoryFetcher].
//!
//! ```rust no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use m2_model::{fetch::DirectoryFetcher, load_model_blocking};
//!
//! let fetcher = DirectoryFetcher::new("extracted");
//! let mut root = load_model_blocking(&fetcher, "creature/wolf/wolf.m2")?;
//!
//! for sequence in root.sequences.list_sequences() {
//!     println!("{} {}", sequence.id, sequence.name);
//! }
//!
//! // Play "Walk" and fetch its keyframes if necessary.
//! futures::executor::block_on(root.sequences.play_with(&fetcher, 4, 0))?;
//! root.sequences.update(0.5);
//! let values = root.sequences.evaluate();
//! # Ok(())
//! # }
//! ```
use futures::future::{try_join, try_join_all};
use log::warn;
use m2_lib::{blp::Blp, m2::M2, skin::Skin};

use crate::{
    error::LoadModelError,
    fetch::Fetch,
    naming::{model_base_name, skin_file_name, texture_file_name},
    sequence::SequenceController,
    texture::ImageTexture,
};

pub use fetch::{DirectoryFetcher, MemoryFetcher};

pub mod animation;
pub mod animation_names;
pub mod error;
pub mod fetch;
pub mod naming;
pub mod sequence;
pub mod texture;

/// A model combined with its topology, textures, and sequence playback.
#[derive(Debug)]
pub struct ModelRoot {
    pub name: String,
    /// The decoded model.
    /// Animated definitions are moved to [sequences](#structfield.sequences).
    pub model: M2,
    /// The first skin profile.
    pub skin: Skin,
    /// The decoded texture for each texture in the model
    /// or [None] for runtime or unsupported textures.
    pub textures: Vec<Option<ImageTexture>>,
    pub sequences: SequenceController,
}

impl ModelRoot {
    /// Triangle list indices into the model's vertices.
    pub fn triangle_indices(&self) -> Vec<u32> {
        remap_indices(&self.skin, &self.skin.indices)
    }

    /// Triangle list indices into the model's vertices for a single submesh.
    pub fn submesh_triangle_indices(&self, submesh_index: usize) -> Option<Vec<u32>> {
        let submesh = self.skin.submeshes.get(submesh_index)?;
        let start = submesh.index_start as usize;
        let end = start + submesh.index_count as usize;
        let indices = self.skin.indices.get(start..end)?;
        Some(remap_indices(&self.skin, indices))
    }
}

fn remap_indices(skin: &Skin, indices: &[u16]) -> Vec<u32> {
    indices
        .iter()
        .filter_map(|i| skin.vertex_remap.get(*i as usize))
        .map(|v| *v as u32)
        .collect()
}

/// Load the model `name` and all of its skin and texture files using `fetcher`.
///
/// Skin and texture files are fetched concurrently.
/// Keyframes in external animation files are not loaded until a sequence is played.
#[tracing::instrument(skip_all)]
pub async fn load_model<F: Fetch>(fetcher: &F, name: &str) -> Result<ModelRoot, LoadModelError> {
    let bytes = fetcher
        .fetch(name)
        .await
        .map_err(|source| LoadModelError::ModelFetch {
            name: name.to_string(),
            source,
        })?;
    let m2 = M2::from_bytes(&bytes).map_err(|source| LoadModelError::Model {
        name: name.to_string(),
        source,
    })?;

    let base_name = model_base_name(name);

    let texture_file_ids = m2.chunks.texture_file_ids.as_deref();
    let textures = m2
        .textures
        .iter()
        .enumerate()
        .map(|(i, t)| load_texture(fetcher, texture_file_name(t, i, texture_file_ids)));

    let (skin, textures) = try_join(
        load_skin(fetcher, &m2, base_name),
        try_join_all(textures),
    )
    .await?;

    Ok(combine(name, m2, skin, textures))
}

/// Blocking version of [load_model].
pub fn load_model_blocking<F: Fetch>(fetcher: &F, name: &str) -> Result<ModelRoot, LoadModelError> {
    futures::executor::block_on(load_model(fetcher, name))
}

fn combine(name: &str, mut m2: M2, skin: Skin, textures: Vec<Option<ImageTexture>>) -> ModelRoot {
    let sequences = SequenceController::take_from_m2(model_base_name(name).to_string(), &mut m2);
    ModelRoot {
        name: name.to_string(),
        model: m2,
        skin,
        textures,
        sequences,
    }
}

async fn load_skin<F: Fetch>(fetcher: &F, m2: &M2, base_name: &str) -> Result<Skin, LoadModelError> {
    if !m2.layout.has_external_skins() {
        return m2.skin_profiles.first().cloned().ok_or(LoadModelError::MissingSkin);
    }

    if m2.skin_profile_count() == 0 {
        return Err(LoadModelError::MissingSkin);
    }

    let name = skin_file_name(base_name, 0, m2.chunks.skin_file_ids.as_deref());
    let bytes = fetcher
        .fetch(&name)
        .await
        .map_err(|source| LoadModelError::SkinFetch {
            name: name.clone(),
            source,
        })?;
    Skin::from_bytes(bytes, m2.layout).map_err(|source| LoadModelError::Skin { name, source })
}

async fn load_texture<F: Fetch>(
    fetcher: &F,
    name: Option<String>,
) -> Result<Option<ImageTexture>, LoadModelError> {
    let Some(name) = name else {
        return Ok(None);
    };

    let bytes = fetcher
        .fetch(&name)
        .await
        .map_err(|source| LoadModelError::TextureFetch {
            name: name.clone(),
            source,
        })?;
    let blp = Blp::from_bytes(bytes).map_err(|source| LoadModelError::Texture {
        name: name.clone(),
        source,
    })?;

    match ImageTexture::from_blp(&blp, Some(name.clone())) {
        Ok(texture) => Ok(Some(texture)),
        Err(e) => {
            warn!("Skipping texture {name:?}: {e}");
            Ok(None)
        }
    }
}
