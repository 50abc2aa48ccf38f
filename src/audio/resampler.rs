/*!
Linear resampler for whole decoded buffers.

Samples are auditioned from memory, so the complete interleaved buffer is
converted in one pass from the file's rate to the context rate. The output
has `ceil(frames * dst / src)` frames; the last input frame is held for
interpolation past the end.
*/

use crate::models::DecodedAudio;

#[derive(Debug, Clone, Copy)]
pub struct LinearResampler {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
}

impl LinearResampler {
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        Self {
            src_rate,
            dst_rate,
            channels,
        }
    }

    pub fn config(&self) -> (u32, u32, usize) {
        (self.src_rate, self.dst_rate, self.channels)
    }

    /// Number of output frames produced for `in_frames` input frames
    pub fn output_frames(&self, in_frames: usize) -> usize {
        if self.src_rate == 0 || self.dst_rate == 0 {
            return 0;
        }
        let numerator = in_frames as u64 * self.dst_rate as u64;
        numerator.div_ceil(self.src_rate as u64) as usize
    }

    /// Resample interleaved samples; the input length should be a multiple of the channel count
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        let ch = self.channels;
        if ch == 0 || self.src_rate == 0 || self.dst_rate == 0 {
            return Vec::new();
        }

        let in_frames = input.len() / ch;
        if in_frames == 0 {
            return Vec::new();
        }
        if self.src_rate == self.dst_rate {
            return input[..in_frames * ch].to_vec();
        }

        let step = self.src_rate as f64 / self.dst_rate as f64;
        let out_frames = self.output_frames(in_frames);
        let last = in_frames - 1;
        let mut out = Vec::with_capacity(out_frames * ch);

        for j in 0..out_frames {
            let pos = j as f64 * step;
            let i = (pos.floor() as usize).min(last);
            let next = (i + 1).min(last);
            let frac = (pos - i as f64).clamp(0.0, 1.0) as f32;

            let base0 = i * ch;
            let base1 = next * ch;
            out.extend((0..ch).map(|c| {
                let s0 = input[base0 + c];
                let s1 = input[base1 + c];
                s0 + (s1 - s0) * frac
            }));
        }

        out
    }

    /// Convert a decoded buffer to `dst_rate`, keeping its channel layout
    pub fn resample(decoded: &DecodedAudio, dst_rate: u32) -> DecodedAudio {
        if decoded.sample_rate == dst_rate {
            return decoded.clone();
        }

        let resampler = LinearResampler::new(decoded.sample_rate, dst_rate, decoded.channels as usize);
        DecodedAudio::new(resampler.process(&decoded.samples), decoded.channels, dst_rate)
    }
}
