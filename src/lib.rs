pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod models;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod testutil;

pub use audio::{
    AudioContext, AudioContextManager, AudioHost, ContextState, CpalHost, OfflineHost, OutputConfig,
    PlaybackController, PlaybackEvent,
};
pub use cache::{BlobCache, CacheInsert, CacheStats, SampleLoader};
pub use config::{ConfigManager, EngineConfig};
pub use error::*;
pub use fetch::{FileSampleFetcher, SampleFetcher};
#[cfg(feature = "http")]
pub use fetch::HttpSampleFetcher;
pub use logging::AudioLogger;
pub use models::*;
