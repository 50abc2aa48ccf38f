//! Render graph shared between the control thread and the platform's
//! audio callback.
//!
//! The renderer owns the context clock: `current_time` is derived from the
//! number of frames actually pulled by the output, so it only advances while
//! the context is running.

use log::trace;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::nodes::{NodeId, NodeShared};

/// Lifecycle of an audio context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContextState {
    Suspended = 0,
    Running = 1,
    Closed = 2,
}

impl ContextState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ContextState::Suspended,
            1 => ContextState::Running,
            _ => ContextState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextState::Suspended => "suspended",
            ContextState::Running => "running",
            ContextState::Closed => "closed",
        }
    }
}

/// A started source node as seen by the render thread
pub(crate) struct Voice {
    pub(crate) node: Arc<NodeShared>,
    pub(crate) buffer: Arc<AudioBuffer>,
    pub(crate) cursor: usize,
    pub(crate) ended_tx: Option<Sender<NodeId>>,
}

impl Voice {
    /// Mix this voice into `out`; returns false once the voice is finished
    fn mix_into(&mut self, out: &mut [f32], out_channels: usize) -> bool {
        if self.node.is_stopped() {
            return false;
        }

        let total = self.buffer.frames();
        if total == 0 {
            self.finish();
            return false;
        }

        let gain = self.node.output_gain();
        let looping = self.node.is_looping();

        for frame in out.chunks_exact_mut(out_channels) {
            if self.cursor >= total {
                if looping {
                    self.cursor = 0;
                } else {
                    break;
                }
            }

            if let Some(gain) = gain {
                for (channel, sample) in frame.iter_mut().enumerate() {
                    *sample += self.buffer.mapped_sample(self.cursor, channel, out_channels) * gain;
                }
            }
            self.cursor += 1;
        }

        if self.cursor >= total && !looping {
            self.finish();
            return false;
        }

        true
    }

    fn finish(&mut self) {
        self.node.mark_ended();
        if let Some(tx) = self.ended_tx.take() {
            // The controller may already be gone
            let _ = tx.send(self.node.id());
        }
        trace!("Source node {} reached the end of its buffer", self.node.id());
    }
}

#[derive(Default)]
struct Graph {
    voices: Vec<Voice>,
}

/// Mixer and clock of one audio context
pub struct Renderer {
    sample_rate: u32,
    channels: u16,
    state: AtomicU8,
    frames_rendered: AtomicU64,
    graph: Mutex<Graph>,
}

impl Renderer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            state: AtomicU8::new(ContextState::Suspended as u8),
            frames_rendered: AtomicU64::new(0),
            graph: Mutex::new(Graph::default()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn state(&self) -> ContextState {
        ContextState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `state`; Closed is terminal and is never left
    pub fn set_state(&self, state: ContextState) {
        let _ = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            if current == ContextState::Closed as u8 {
                None
            } else {
                Some(state as u8)
            }
        });
    }

    /// Close the context and drop every voice without completion events
    pub fn close(&self) {
        self.state.store(ContextState::Closed as u8, Ordering::Release);
        self.graph.lock().voices.clear();
    }

    /// Seconds of audio rendered since the context was created
    pub fn current_time(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames_rendered.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Acquire)
    }

    pub fn active_voices(&self) -> usize {
        self.graph.lock().voices.len()
    }

    pub(crate) fn add_voice(&self, voice: Voice) {
        self.graph.lock().voices.push(voice);
    }

    pub(crate) fn remove_voice(&self, id: NodeId) {
        self.graph.lock().voices.retain(|voice| voice.node.id() != id);
    }

    /// Fill `out` (interleaved, `channels` wide) with the mix of all voices.
    ///
    /// Outputs silence and leaves the clock untouched unless running.
    /// Returns the number of frames the clock advanced by.
    pub fn render(&self, out: &mut [f32]) -> usize {
        out.fill(0.0);

        let channels = self.channels as usize;
        if channels == 0 || self.state() != ContextState::Running {
            return 0;
        }

        let frames = out.len() / channels;
        let mix = &mut out[..frames * channels];
        {
            let mut graph = self.graph.lock();
            graph.voices.retain_mut(|voice| voice.mix_into(mix, channels));
        }

        self.frames_rendered.fetch_add(frames as u64, Ordering::AcqRel);
        frames
    }
}

/// Volume stored as f32 bits so the render thread reads it without locking
pub(crate) fn store_gain(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

pub(crate) fn load_gain(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}
