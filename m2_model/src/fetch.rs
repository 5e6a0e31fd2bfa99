//! Retrieving files referenced by a model.
//!
//! Skins, textures, and animations are requested by name relative to the model.
//! The [Fetch] trait abstracts over where the bytes come from.
use std::{
    collections::BTreeMap,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("resource {0:?} not found")]
    NotFound(String),

    #[error("request for {name:?} failed with status {status}")]
    Status { name: String, status: u16 },

    #[error("error reading {name:?}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// A source of bytes for named resources.
pub trait Fetch {
    fn fetch(&self, name: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>>;
}

impl<T: Fetch> Fetch for &T {
    fn fetch(&self, name: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> {
        (*self).fetch(name)
    }
}

/// Reads resources from files relative to a root folder.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_owned(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Fetch for DirectoryFetcher {
    fn fetch(&self, name: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> {
        let path = self.root.join(name);
        let name = name.to_string();
        async move {
            std::fs::read(&path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => FetchError::NotFound(name),
                _ => FetchError::Io { name, source: e },
            })
        }
    }
}

/// Serves resources from memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryFetcher {
    pub files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<N: Into<String>>(&mut self, name: N, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }
}

impl Fetch for MemoryFetcher {
    fn fetch(&self, name: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> {
        let result = self
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(name.to_string()));
        std::future::ready(result)
    }
}
