//! Sources of raw sample bytes.
//!
//! The engine never interprets transport semantics beyond success or
//! failure; a fetcher either hands back the whole file or an error.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpSampleFetcher;

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use std::path::{Component, Path, PathBuf};

use crate::error::FetchError;
use crate::models::{AudioFileFormat, SampleKey};

/// Supplies the raw audio bytes for a sample
#[async_trait]
pub trait SampleFetcher: Send + Sync {
    /// Fetch the complete audio file for `key`
    async fn fetch(&self, key: &SampleKey) -> Result<Bytes, FetchError>;
}

/// Derive a decoder hint from a key that looks like a file name
pub fn format_hint(key: &SampleKey) -> Option<AudioFileFormat> {
    match key {
        SampleKey::Name(name) => Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(AudioFileFormat::from_extension),
        SampleKey::Id(_) => None,
    }
}

/// Reads samples from a library folder on the local filesystem.
///
/// String keys are paths relative to `root`; numeric keys are not
/// addressable and report [`FetchError::NotFound`].
pub struct FileSampleFetcher {
    root: PathBuf,
}

impl FileSampleFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &SampleKey) -> Result<PathBuf, FetchError> {
        let name = match key {
            SampleKey::Name(name) => name,
            SampleKey::Id(_) => {
                return Err(FetchError::NotFound { key: key.to_string() });
            }
        };

        let relative = Path::new(name);
        // Keys must stay inside the library root
        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(FetchError::NotFound { key: key.to_string() });
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl SampleFetcher for FileSampleFetcher {
    async fn fetch(&self, key: &SampleKey) -> Result<Bytes, FetchError> {
        let path = self.resolve(key)?;
        debug!("Reading sample {} from {}", key, path.display());

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound { key: key.to_string() })
            }
            Err(e) => Err(FetchError::Io(e)),
        }
    }
}
