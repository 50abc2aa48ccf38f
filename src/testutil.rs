//! WAV fixtures generated in memory.

use bytes::Bytes;

/// 16-bit PCM WAV file with `frames` frames produced by `sample(frame, channel)`
pub fn wav_bytes(sample_rate: u32, channels: u16, frames: usize, sample: impl Fn(usize, u16) -> f32) -> Bytes {
    let data_len = frames * channels as usize * 2;
    let mut out = Vec::with_capacity(44 + data_len);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
    out.extend_from_slice(&(channels * 2).to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_len as u32).to_le_bytes());
    for frame in 0..frames {
        for channel in 0..channels {
            let value = (sample(frame, channel).clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    Bytes::from(out)
}

/// A 440 Hz tone lasting `secs` seconds
pub fn tone_wav(sample_rate: u32, channels: u16, secs: f64) -> Bytes {
    let frames = (secs * sample_rate as f64).round() as usize;
    wav_bytes(sample_rate, channels, frames, |frame, _| {
        let t = frame as f32 / sample_rate as f32;
        0.5 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
    })
}

pub fn silent_wav(sample_rate: u32, channels: u16, frames: usize) -> Bytes {
    wav_bytes(sample_rate, channels, frames, |_, _| 0.0)
}
