use thiserror::Error;

/// Main engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Audio(err) => err.user_message(),
            EngineError::Decode(err) => err.user_message(),
            EngineError::Fetch(err) => err.user_message(),
            EngineError::Playback(err) => err.user_message(),
            EngineError::Config(err) => err.user_message(),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            EngineError::Audio(err) => err.recovery_suggestions(),
            EngineError::Decode(err) => err.recovery_suggestions(),
            EngineError::Fetch(err) => err.recovery_suggestions(),
            EngineError::Playback(_) => vec!["Select a sample before pressing play".to_string()],
            EngineError::Config(err) => err.recovery_suggestions(),
        }
    }

    /// Check if this error allows for automatic recovery
    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::Audio(err) => err.is_recoverable(),
            EngineError::Decode(err) => err.is_recoverable(),
            EngineError::Fetch(err) => err.is_recoverable(),
            EngineError::Playback(_) => true,
            EngineError::Config(_) => true, // Defaults are always available
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EngineError::Audio(AudioError::ResumeRefused(_)) => ErrorSeverity::Info,
            EngineError::Audio(AudioError::ContextClosed)
            | EngineError::Audio(AudioError::ContextReplaced) => ErrorSeverity::Warning,
            EngineError::Audio(_) => ErrorSeverity::Error,
            EngineError::Decode(DecodeError::EmptyAudio) => ErrorSeverity::Warning,
            EngineError::Decode(_) => ErrorSeverity::Error,
            EngineError::Fetch(FetchError::NotFound { .. }) => ErrorSeverity::Warning,
            EngineError::Fetch(_) => ErrorSeverity::Error,
            EngineError::Playback(_) => ErrorSeverity::Info,
            EngineError::Config(_) => ErrorSeverity::Warning,
        }
    }

    /// What the caller should do before retrying the failed operation
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            EngineError::Audio(AudioError::ResumeRefused(_)) => RecoveryAction::RetryAfterGesture,
            EngineError::Audio(AudioError::ContextClosed)
            | EngineError::Audio(AudioError::ContextReplaced) => RecoveryAction::Reload,
            EngineError::Audio(AudioError::StreamError(_)) => RecoveryAction::ResetContext,
            _ => RecoveryAction::None,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Follow-up a caller performs after a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Nothing to do; the request simply failed
    None,
    /// Retry once the user has interacted with the page or window again
    RetryAfterGesture,
    /// Tear down the audio context and build a fresh one
    ResetContext,
    /// Decode the sample again against the current context
    Reload,
}

/// Audio platform and rendering errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio context refused to resume: {0}")]
    ResumeRefused(String),

    #[error("Audio context is closed")]
    ContextClosed,

    #[error("Audio context was replaced; the loaded buffer is no longer valid")]
    ContextReplaced,

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Source node was already started")]
    NodeAlreadyStarted,

    #[error("Node belongs to a different audio context")]
    ForeignNode,
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            AudioError::ResumeRefused(_) => {
                "Audio is paused by the system - click or press a key to enable sound".to_string()
            }
            AudioError::ContextClosed => {
                "Audio output was interrupted - the sample will be reloaded".to_string()
            }
            AudioError::ContextReplaced => {
                "Audio output was restarted - the sample needs to be reloaded".to_string()
            }
            AudioError::StreamError(msg) => format!("Audio playback interrupted: {}", msg),
            AudioError::InitializationFailed(msg) => {
                format!("Could not open audio output: {}", msg)
            }
            AudioError::DeviceNotFound { device } => {
                format!("Output device '{}' was not found", device)
            }
            AudioError::UnsupportedFormat { format } => {
                format!("Output format '{}' is not supported by the audio device", format)
            }
            AudioError::NodeAlreadyStarted | AudioError::ForeignNode => {
                "Internal audio graph error".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            AudioError::ResumeRefused(_) => vec![
                "Interact with the application, then press play again".to_string(),
            ],
            AudioError::ContextClosed | AudioError::ContextReplaced => vec![
                "Select the sample again to reload it".to_string(),
                "Check that your audio device is still connected".to_string(),
            ],
            AudioError::StreamError(_) => vec![
                "Check audio device connections".to_string(),
                "Stop and start playback again".to_string(),
            ],
            AudioError::InitializationFailed(_) => vec![
                "Close applications holding the output device exclusively".to_string(),
                "Restart the audition session once the device is free".to_string(),
            ],
            AudioError::DeviceNotFound { .. } => vec![
                "Check that your audio device is connected and powered on".to_string(),
                "Remove 'preferred_device' from the configuration to use the default device".to_string(),
            ],
            AudioError::UnsupportedFormat { .. } => vec![
                "Pick another output device with --device".to_string(),
            ],
            AudioError::NodeAlreadyStarted | AudioError::ForeignNode => vec![
                "Stop playback and try again".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::ResumeRefused(_) => true,  // Next user gesture
            AudioError::ContextClosed => true,     // Reset and reload
            AudioError::ContextReplaced => true,   // Reload
            AudioError::StreamError(_) => true,
            AudioError::InitializationFailed(_) => true,
            AudioError::DeviceNotFound { .. } => true, // Fallback to default device
            AudioError::UnsupportedFormat { .. } => false,
            AudioError::NodeAlreadyStarted => false,
            AudioError::ForeignNode => false,
        }
    }
}

/// Audio decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Decoded audio is empty")]
    EmptyAudio,

    #[error("Decode failed: {0}")]
    DecodeFailed(String),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::UnsupportedFormat { format } => {
                format!("Sample format '{}' cannot be decoded", format)
            }
            DecodeError::CorruptedData(msg) => {
                format!("Sample appears to be corrupted or damaged: {}", msg)
            }
            DecodeError::EmptyAudio => "Sample contains no audio".to_string(),
            DecodeError::DecodeFailed(msg) => format!("Failed to decode audio data: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DecodeError::UnsupportedFormat { .. } => vec![
                "Supported formats: WAV, AIFF, FLAC, MP3, OGG/Vorbis, M4A".to_string(),
                "Check if the file extension matches the actual format".to_string(),
            ],
            DecodeError::CorruptedData(_) | DecodeError::DecodeFailed(_) => vec![
                "Try playing the file in another audio player to confirm corruption".to_string(),
                "Rescan the folder to refresh the sample".to_string(),
            ],
            DecodeError::EmptyAudio => vec!["Skip to the next sample".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        false // The bytes themselves are bad; only a different sample helps
    }
}

/// Errors from the byte fetch collaborator
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Sample not found: {key}")]
    NotFound { key: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn user_message(&self) -> String {
        match self {
            FetchError::NotFound { key } => format!("Sample '{}' could not be found", key),
            FetchError::Network(msg) => format!("Could not download sample audio: {}", msg),
            FetchError::Io(err) => format!("Could not read sample audio: {}", err),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            FetchError::NotFound { .. } => vec![
                "The file may have been moved or deleted - rescan the library".to_string(),
            ],
            FetchError::Network(_) => vec![
                "Check that the sample server is running".to_string(),
                "Verify 'server_url' in the configuration".to_string(),
            ],
            FetchError::Io(_) => vec!["Check file permissions".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

/// Playback state errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("No sample is loaded")]
    NothingLoaded,
}

impl PlaybackError {
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::NothingLoaded => "Nothing to play - select a sample first".to_string(),
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => format!("Cannot access configuration file: {}", err),
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Try creating the directory manually: ~/.config/sample-deck/".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Configuration will use default values".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err: EngineError = AudioError::ContextClosed.into();
        assert!(matches!(err, EngineError::Audio(AudioError::ContextClosed)));

        let err: EngineError = DecodeError::EmptyAudio.into();
        assert!(matches!(err, EngineError::Decode(DecodeError::EmptyAudio)));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EngineError = FetchError::from(io).into();
        assert!(matches!(err, EngineError::Fetch(FetchError::Io(_))));
    }

    #[test]
    fn test_recovery_actions() {
        let suspended: EngineError = AudioError::ResumeRefused("no gesture".to_string()).into();
        assert_eq!(suspended.recovery_action(), RecoveryAction::RetryAfterGesture);
        assert!(suspended.is_recoverable());

        let closed: EngineError = AudioError::ContextClosed.into();
        assert_eq!(closed.recovery_action(), RecoveryAction::Reload);

        let decode: EngineError = DecodeError::CorruptedData("bad header".to_string()).into();
        assert_eq!(decode.recovery_action(), RecoveryAction::None);
        assert!(!decode.is_recoverable());
    }

    #[test]
    fn test_severity_levels() {
        let suspended: EngineError = AudioError::ResumeRefused("policy".to_string()).into();
        assert_eq!(suspended.severity(), ErrorSeverity::Info);
        assert_eq!(suspended.severity().log_level(), log::Level::Info);

        let stream: EngineError = AudioError::StreamError("device gone".to_string()).into();
        assert_eq!(stream.severity(), ErrorSeverity::Error);
        assert_eq!(stream.severity().as_str(), "ERROR");

        let missing: EngineError = FetchError::NotFound { key: "42".to_string() }.into();
        assert_eq!(missing.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_user_messages_are_not_empty() {
        let errors: Vec<EngineError> = vec![
            AudioError::ContextReplaced.into(),
            DecodeError::UnsupportedFormat { format: "xm".to_string() }.into(),
            FetchError::Network("timeout".to_string()).into(),
            PlaybackError::NothingLoaded.into(),
            ConfigError::ConfigDirNotFound.into(),
        ];

        for err in errors {
            assert!(!err.user_message().is_empty());
            assert!(!err.recovery_suggestions().is_empty());
        }
    }
}
