use super::context::ContextId;

/// Decoded, playable audio bound to the context that created it.
///
/// Samples are interleaved f32 at the context's sample rate. A buffer is
/// immutable once built and is shared with the render thread through `Arc`.
#[derive(Debug)]
pub struct AudioBuffer {
    context_id: ContextId,
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    frames: usize,
}

impl AudioBuffer {
    pub(crate) fn new(context_id: ContextId, samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let frames = if channels == 0 { 0 } else { samples.len() / channels as usize };
        Self {
            context_id,
            samples,
            channels,
            sample_rate,
            frames,
        }
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Length in seconds; 0.0 for an empty buffer
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    /// Sample for `frame`, mapped onto output channel `channel` of an
    /// `out_channels`-wide bus.
    ///
    /// Mono fans out to every channel, multichannel folds down to mono by
    /// averaging, and missing channels are silent.
    #[inline]
    pub(crate) fn mapped_sample(&self, frame: usize, channel: usize, out_channels: usize) -> f32 {
        let in_channels = self.channels as usize;
        let base = frame * in_channels;

        if in_channels == 1 {
            self.samples[base]
        } else if out_channels == 1 {
            let sum: f32 = self.samples[base..base + in_channels].iter().sum();
            sum / in_channels as f32
        } else if channel < in_channels {
            self.samples[base + channel]
        } else {
            0.0
        }
    }
}
