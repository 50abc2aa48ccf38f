use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a sample in the library.
///
/// Numeric database ids and string ids (paths, hashes) are kept apart, so
/// `SampleKey::Id(1)` and `SampleKey::Name("1".into())` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleKey {
    Id(i64),
    Name(String),
}

impl SampleKey {
    /// Numeric id, if this key is one
    pub fn as_id(&self) -> Option<i64> {
        match self {
            SampleKey::Id(id) => Some(*id),
            SampleKey::Name(_) => None,
        }
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleKey::Id(id) => write!(f, "{}", id),
            SampleKey::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<i64> for SampleKey {
    fn from(id: i64) -> Self {
        SampleKey::Id(id)
    }
}

impl From<i32> for SampleKey {
    fn from(id: i32) -> Self {
        SampleKey::Id(i64::from(id))
    }
}

impl From<&str> for SampleKey {
    fn from(name: &str) -> Self {
        SampleKey::Name(name.to_string())
    }
}

impl From<String> for SampleKey {
    fn from(name: String) -> Self {
        SampleKey::Name(name)
    }
}

/// Container formats the sample library indexes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AudioFileFormat {
    Wav,
    Aiff,
    Flac,
    Mp3,
    Ogg,
    M4a,
}

impl AudioFileFormat {
    /// Match a file extension (without the dot, any case)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(AudioFileFormat::Wav),
            "aiff" | "aif" => Some(AudioFileFormat::Aiff),
            "flac" => Some(AudioFileFormat::Flac),
            "mp3" => Some(AudioFileFormat::Mp3),
            "ogg" | "oga" => Some(AudioFileFormat::Ogg),
            "m4a" | "mp4" => Some(AudioFileFormat::M4a),
            _ => None,
        }
    }

    /// Match a `Content-Type` header value
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence {
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(AudioFileFormat::Wav),
            "audio/aiff" | "audio/x-aiff" => Some(AudioFileFormat::Aiff),
            "audio/flac" | "audio/x-flac" => Some(AudioFileFormat::Flac),
            "audio/mpeg" => Some(AudioFileFormat::Mp3),
            "audio/ogg" => Some(AudioFileFormat::Ogg),
            "audio/mp4" | "audio/x-m4a" => Some(AudioFileFormat::M4a),
            _ => None,
        }
    }

    /// Canonical extension, used as a probe hint
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFileFormat::Wav => "wav",
            AudioFileFormat::Aiff => "aiff",
            AudioFileFormat::Flac => "flac",
            AudioFileFormat::Mp3 => "mp3",
            AudioFileFormat::Ogg => "ogg",
            AudioFileFormat::M4a => "m4a",
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            AudioFileFormat::Wav => "WAV",
            AudioFileFormat::Aiff => "AIFF",
            AudioFileFormat::Flac => "FLAC",
            AudioFileFormat::Mp3 => "MP3",
            AudioFileFormat::Ogg => "OGG Vorbis",
            AudioFileFormat::M4a => "M4A",
        }
    }
}

/// Raw audio fetched for a sample, plus an optional format hint
#[derive(Debug, Clone)]
pub struct SampleBlob {
    pub bytes: bytes::Bytes,
    pub format: Option<AudioFileFormat>,
}

impl SampleBlob {
    pub fn new(bytes: bytes::Bytes) -> Self {
        Self { bytes, format: None }
    }

    pub fn with_format(bytes: bytes::Bytes, format: AudioFileFormat) -> Self {
        Self {
            bytes,
            format: Some(format),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Playback state of a controller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlaybackState {
    /// No buffer loaded
    Empty,
    /// Bytes are being decoded
    Loading,
    /// Buffer decoded, never started
    Ready,
    Playing,
    Paused,
    /// Buffer loaded, position reset to the start
    Stopped,
}

impl PlaybackState {
    /// Get a human-readable string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Empty => "Empty",
            PlaybackState::Loading => "Loading",
            PlaybackState::Ready => "Ready",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Stopped => "Stopped",
        }
    }

    /// Whether a decoded buffer is attached in this state
    pub fn has_buffer(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Stopped
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State published to the UI collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub is_playing: bool,
    pub is_looping: bool,
    /// Fraction of the buffer played, 0.0 to 1.0
    pub playback_position: f64,
    /// Buffer length in seconds, 0.0 when nothing is loaded
    pub duration: f64,
    pub sample: Option<SampleKey>,
}

impl PlaybackSnapshot {
    pub fn empty() -> Self {
        Self {
            state: PlaybackState::Empty,
            is_playing: false,
            is_looping: false,
            playback_position: 0.0,
            duration: 0.0,
            sample: None,
        }
    }

    /// Position in seconds
    pub fn position_secs(&self) -> f64 {
        self.playback_position * self.duration
    }

    /// Format position as MM:SS.mmm
    pub fn position_formatted(&self) -> String {
        format_clock(self.position_secs())
    }

    /// Format duration as MM:SS.mmm
    pub fn duration_formatted(&self) -> String {
        format_clock(self.duration)
    }
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

fn format_clock(secs: f64) -> String {
    let millis = (secs.max(0.0) * 1000.0).round() as u64;
    format!("{:02}:{:02}.{:03}", millis / 60_000, (millis / 1000) % 60, millis % 1000)
}

/// Interleaved f32 audio straight out of the decoder, at the file's own rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    pub frames: usize,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let frames = if channels == 0 { 0 } else { samples.len() / channels as usize };
        Self {
            samples,
            channels,
            sample_rate,
            frames,
        }
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Get duration of this buffer
    pub fn duration(&self) -> Duration {
        if self.sample_rate > 0 {
            Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
        } else {
            Duration::from_secs(0)
        }
    }
}
