use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{AudioHost, OutputConfig, OutputStream, Renderer};
use crate::error::AudioError;

/// Manually clocked host for tests and headless rendering.
///
/// Nothing plays until [`OfflineHost::render`] pulls frames through the
/// renderer of the most recently opened stream. The host can also refuse to
/// resume (as an autoplay policy would) and close the context on demand.
pub struct OfflineHost {
    config: Option<OutputConfig>,
    resume_allowed: Arc<AtomicBool>,
    renderer: Mutex<Option<Arc<Renderer>>>,
    streams_opened: AtomicUsize,
}

impl OfflineHost {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self::with_config(Some(OutputConfig { sample_rate, channels }))
    }

    /// Host whose format query always fails
    pub fn without_output_config() -> Self {
        Self::with_config(None)
    }

    fn with_config(config: Option<OutputConfig>) -> Self {
        Self {
            config,
            resume_allowed: Arc::new(AtomicBool::new(true)),
            renderer: Mutex::new(None),
            streams_opened: AtomicUsize::new(0),
        }
    }

    pub fn set_resume_allowed(&self, allowed: bool) {
        self.resume_allowed.store(allowed, Ordering::Release);
    }

    /// Pull `frames` frames from the current stream, returning the interleaved mix
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let renderer = self.renderer.lock().clone();
        match renderer {
            Some(renderer) => {
                let mut out = vec![0.0; frames * renderer.channels() as usize];
                renderer.render(&mut out);
                out
            }
            None => Vec::new(),
        }
    }

    /// Render `secs` seconds in blocks of `block` frames
    pub fn render_secs(&self, secs: f64, block: usize) {
        let renderer = self.renderer.lock().clone();
        if let Some(renderer) = renderer {
            let total = (secs * renderer.sample_rate() as f64).round() as usize;
            let block = block.max(1);
            let mut out = vec![0.0; block * renderer.channels() as usize];
            let mut done = 0;
            while done < total {
                let frames = block.min(total - done);
                renderer.render(&mut out[..frames * renderer.channels() as usize]);
                done += frames;
            }
        }
    }

    /// Close the current context the way a platform would
    pub fn revoke(&self) {
        if let Some(renderer) = self.renderer.lock().as_ref() {
            debug!("Offline host revoking audio context");
            renderer.close();
        }
    }

    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::Acquire)
    }
}

impl AudioHost for OfflineHost {
    fn output_config(&self) -> Result<OutputConfig, AudioError> {
        self.config
            .ok_or_else(|| AudioError::InitializationFailed("Offline host has no output format".to_string()))
    }

    fn open_output(&self, renderer: Arc<Renderer>) -> Result<Box<dyn OutputStream>, AudioError> {
        *self.renderer.lock() = Some(renderer);
        self.streams_opened.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(OfflineStream {
            resume_allowed: Arc::clone(&self.resume_allowed),
        }))
    }
}

struct OfflineStream {
    resume_allowed: Arc<AtomicBool>,
}

impl OutputStream for OfflineStream {
    fn play(&self) -> Result<(), AudioError> {
        if self.resume_allowed.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(AudioError::ResumeRefused("playback requires a user gesture".to_string()))
        }
    }

    fn pause(&self) -> Result<(), AudioError> {
        Ok(())
    }
}
