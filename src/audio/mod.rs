pub mod buffer;
pub mod context;
pub mod controller;
pub mod decoder;
pub mod device;
pub mod nodes;
pub mod offline;
pub mod position;
pub mod render;
pub mod resampler;

use std::sync::Arc;

use crate::error::AudioError;

pub use buffer::AudioBuffer;
pub use context::{AudioContext, AudioContextManager, ContextId};
pub use controller::{PlaybackController, PlaybackEvent};
pub use decoder::decode_blob;
pub use device::CpalHost;
pub use nodes::{GainNode, NodeId, SourceNode};
pub use offline::OfflineHost;
pub use position::PositionTracker;
pub use render::{ContextState, Renderer};
pub use resampler::LinearResampler;

/// Output format negotiated with the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

impl OutputConfig {
    /// Used when the platform cannot report a format
    pub const FALLBACK: OutputConfig = OutputConfig {
        sample_rate: 44_100,
        channels: 2,
    };
}

/// The audio platform: reports its output format and opens streams that
/// pull frames from a [`Renderer`]
pub trait AudioHost {
    fn output_config(&self) -> Result<OutputConfig, AudioError>;

    /// Open a paused output stream that renders through `renderer`
    fn open_output(&self, renderer: Arc<Renderer>) -> Result<Box<dyn OutputStream>, AudioError>;
}

/// A platform stream; dropping it releases the device
pub trait OutputStream {
    fn play(&self) -> Result<(), AudioError>;

    fn pause(&self) -> Result<(), AudioError>;
}
