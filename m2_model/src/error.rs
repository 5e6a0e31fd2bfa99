use m2_lib::error::FormatError;
use thiserror::Error;

use crate::fetch::FetchError;

#[derive(Debug, Error)]
pub enum LoadModelError {
    #[error("error fetching model {name:?}")]
    ModelFetch {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("error reading model {name:?}")]
    Model {
        name: String,
        #[source]
        source: FormatError,
    },

    #[error("error fetching skin {name:?}")]
    SkinFetch {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("error reading skin {name:?}")]
    Skin {
        name: String,
        #[source]
        source: FormatError,
    },

    #[error("model has no skin profiles")]
    MissingSkin,

    #[error("error fetching texture {name:?}")]
    TextureFetch {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("error reading texture {name:?}")]
    Texture {
        name: String,
        #[source]
        source: FormatError,
    },
}

#[derive(Debug, Error)]
pub enum HydrateError {
    #[error("error fetching animation {name:?}")]
    Fetch {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("error reading animation {name:?}")]
    Format {
        name: String,
        #[source]
        source: FormatError,
    },
}
