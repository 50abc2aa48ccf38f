//! The shared audio-rendering resource and the manager that owns it.

use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::nodes::{GainNode, SourceNode};
use super::render::{ContextState, Renderer};
use super::resampler::LinearResampler;
use super::{AudioHost, OutputConfig, OutputStream};
use crate::error::AudioError;
use crate::models::DecodedAudio;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an audio context; buffers and nodes remember the one that made them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn new(raw: u64) -> Self {
        ContextId(raw)
    }

    fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A rendering context: clock, render graph and (once resumed) a platform stream.
///
/// Contexts start Suspended. The platform output is opened on the first
/// `resume`, and the platform may close the context at any time.
pub struct AudioContext {
    id: ContextId,
    renderer: Arc<Renderer>,
    host: Rc<dyn AudioHost>,
    output: RefCell<Option<Box<dyn OutputStream>>>,
}

impl AudioContext {
    pub(crate) fn new(host: Rc<dyn AudioHost>, config: OutputConfig) -> Self {
        Self {
            id: ContextId::next(),
            renderer: Arc::new(Renderer::new(config.sample_rate, config.channels)),
            host,
            output: RefCell::new(None),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn state(&self) -> ContextState {
        self.renderer.state()
    }

    /// Context clock in seconds
    pub fn current_time(&self) -> f64 {
        self.renderer.current_time()
    }

    pub fn sample_rate(&self) -> u32 {
        self.renderer.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.renderer.channels()
    }

    pub fn renderer(&self) -> &Arc<Renderer> {
        &self.renderer
    }

    /// Ask the platform to start rendering; refusal is reported, not retried
    pub fn resume(&self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(AudioError::ContextClosed),
            ContextState::Suspended => {
                let mut output = self.output.borrow_mut();
                let stream = match output.take() {
                    Some(stream) => stream,
                    None => self.host.open_output(Arc::clone(&self.renderer))?,
                };
                let result = stream.play();
                *output = Some(stream);
                result?;

                self.renderer.set_state(ContextState::Running);
                debug!("Audio context {} resumed", self.id);
                Ok(())
            }
        }
    }

    pub fn suspend(&self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Running => {
                if let Some(stream) = self.output.borrow().as_ref() {
                    stream.pause()?;
                }
                self.renderer.set_state(ContextState::Suspended);
                debug!("Audio context {} suspended", self.id);
                Ok(())
            }
            ContextState::Suspended => Ok(()),
            ContextState::Closed => Err(AudioError::ContextClosed),
        }
    }

    /// Release the platform stream; the context cannot be used afterwards
    pub fn close(&self) {
        self.renderer.close();
        self.output.borrow_mut().take();
    }

    /// Wrap decoded audio as a buffer of this context, resampling if needed
    pub fn create_buffer(&self, decoded: &DecodedAudio) -> Result<Arc<AudioBuffer>, AudioError> {
        if self.state() == ContextState::Closed {
            return Err(AudioError::ContextClosed);
        }

        let converted;
        let audio = if decoded.sample_rate == self.sample_rate() {
            decoded
        } else {
            converted = LinearResampler::resample(decoded, self.sample_rate());
            &converted
        };

        Ok(Arc::new(AudioBuffer::new(
            self.id,
            audio.samples.clone(),
            audio.channels,
            audio.sample_rate,
        )))
    }

    pub fn create_gain(&self, gain: f32) -> Result<GainNode, AudioError> {
        if self.state() == ContextState::Closed {
            return Err(AudioError::ContextClosed);
        }
        Ok(GainNode::new(self.id, gain))
    }

    pub fn create_buffer_source(&self, buffer: Arc<AudioBuffer>) -> Result<SourceNode, AudioError> {
        if buffer.context_id() != self.id {
            return Err(AudioError::ForeignNode);
        }
        if self.state() == ContextState::Closed {
            return Err(AudioError::ContextClosed);
        }
        Ok(SourceNode::new(self.id, buffer, Arc::clone(&self.renderer)))
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owner of the single live [`AudioContext`].
///
/// Everything else borrows `Rc` handles from here. The context is created on
/// first use and only replaced by [`AudioContextManager::reset`] (or by
/// `acquire` once the platform has closed it).
pub struct AudioContextManager {
    host: Rc<dyn AudioHost>,
    current: RefCell<Option<Rc<AudioContext>>>,
    generation: Cell<u64>,
}

impl AudioContextManager {
    pub fn new(host: Rc<dyn AudioHost>) -> Self {
        Self {
            host,
            current: RefCell::new(None),
            generation: Cell::new(0),
        }
    }

    /// The live context, created on demand. Never fails.
    pub fn acquire(&self) -> Rc<AudioContext> {
        if let Some(ctx) = self.current.borrow().as_ref() {
            if ctx.state() != ContextState::Closed {
                return Rc::clone(ctx);
            }
        }

        let (ctx, _) = self.build_context();
        *self.current.borrow_mut() = Some(Rc::clone(&ctx));
        ctx
    }

    /// Resume the live context, creating it first if necessary
    pub fn resume(&self) -> Result<(), AudioError> {
        self.acquire().resume()
    }

    /// Close the current context and install a fresh one.
    ///
    /// The new context is installed even when the platform format query
    /// fails; that failure is still returned.
    pub fn reset(&self) -> Result<Rc<AudioContext>, AudioError> {
        if let Some(old) = self.current.borrow_mut().take() {
            info!("Resetting audio context {} ({})", old.id(), old.state().as_str());
            old.close();
        }

        let (ctx, failure) = self.build_context();
        *self.current.borrow_mut() = Some(Rc::clone(&ctx));

        match failure {
            Some(err) => Err(err),
            None => Ok(ctx),
        }
    }

    /// Peek without creating
    pub fn current(&self) -> Option<Rc<AudioContext>> {
        self.current.borrow().clone()
    }

    /// Number of contexts created so far
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    fn build_context(&self) -> (Rc<AudioContext>, Option<AudioError>) {
        let (config, failure) = match self.host.output_config() {
            Ok(config) => (config, None),
            Err(err) => {
                warn!("Output format unavailable ({}), using {} Hz / {} ch", err, OutputConfig::FALLBACK.sample_rate, OutputConfig::FALLBACK.channels);
                (OutputConfig::FALLBACK, Some(err))
            }
        };

        self.generation.set(self.generation.get() + 1);
        let ctx = Rc::new(AudioContext::new(Rc::clone(&self.host), config));
        info!(
            "Created audio context {} ({} Hz, {} channels)",
            ctx.id(),
            config.sample_rate,
            config.channels
        );
        (ctx, failure)
    }
}
