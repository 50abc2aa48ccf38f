//! In-memory decoding of sample files through symphonia.

use bytes::Bytes;
use log::{debug, warn};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::resampler::LinearResampler;
use crate::error::DecodeError;
use crate::logging::OperationTimer;
use crate::models::{AudioFileFormat, DecodedAudio, SampleBlob};

const SLOW_DECODE: std::time::Duration = std::time::Duration::from_millis(250);

/// Decode a complete audio file into interleaved f32 at its own rate.
///
/// Undecodable packets are skipped with a warning. A file that yields no
/// frames at all is reported as [`DecodeError::EmptyAudio`].
pub fn decode_blob(bytes: Bytes, format: Option<AudioFileFormat>) -> Result<DecodedAudio, DecodeError> {
    let timer = OperationTimer::new("sample decode");

    let mut hint = Hint::new();
    if let Some(format) = format {
        hint.with_extension(format.extension());
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| match e {
            SymphoniaError::Unsupported(what) => DecodeError::UnsupportedFormat {
                format: what.to_string(),
            },
            other => DecodeError::CorruptedData(other.to_string()),
        })?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedFormat {
            format: "no decodable audio track".to_string(),
        })?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat {
            format: e.to_string(),
        })?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut buf_frames = 0usize;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) if !samples.is_empty() => {
                warn!("Stopping decode early after a read error: {}", e);
                break;
            }
            Err(e) => return Err(DecodeError::CorruptedData(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                if sample_buf.is_none() || decoded.capacity() > buf_frames {
                    buf_frames = decoded.capacity();
                    sample_buf = Some(SampleBuffer::new(buf_frames as u64, spec));
                }
                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(DecodeError::DecodeFailed(e.to_string())),
        }
    }

    let audio = DecodedAudio::new(samples, channels, sample_rate);
    if audio.is_empty() || audio.sample_rate == 0 {
        return Err(DecodeError::EmptyAudio);
    }

    let elapsed = timer.finish_with_threshold(SLOW_DECODE);
    debug!(
        "Decoded {} frames ({} Hz, {} ch) in {}ms",
        audio.frames,
        audio.sample_rate,
        audio.channels,
        elapsed.as_millis()
    );
    Ok(audio)
}

/// Decode on the blocking pool and convert to `target_rate`
pub async fn decode_for_rate(blob: SampleBlob, target_rate: u32) -> Result<DecodedAudio, DecodeError> {
    tokio::task::spawn_blocking(move || {
        let decoded = decode_blob(blob.bytes, blob.format)?;
        Ok(LinearResampler::resample(&decoded, target_rate))
    })
    .await
    .map_err(|e| DecodeError::DecodeFailed(format!("Decode task failed: {}", e)))?
}
