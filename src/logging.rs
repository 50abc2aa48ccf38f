use chrono::{DateTime, Utc};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timings of the most recent load
#[derive(Debug, Clone, Default)]
pub struct LoadMetrics {
    pub fetch_time: Duration,
    pub decode_time: Duration,
    pub seek_time: Duration,
}

/// Audio event for telemetry and debugging
#[derive(Debug, Clone)]
pub struct AudioEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AudioEventType,
    pub duration: Option<Duration>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEventType {
    SampleLoaded,
    CacheHit,
    CacheMiss,
    CacheEvicted,
    PlaybackStarted,
    PlaybackPaused,
    PlaybackStopped,
    PlaybackEnded,
    SeekOperation,
    LoopToggled,
    ContextReset,
    ResumeFailed,
    DecodeError,
}

impl AudioEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEventType::SampleLoaded => "SAMPLE_LOADED",
            AudioEventType::CacheHit => "CACHE_HIT",
            AudioEventType::CacheMiss => "CACHE_MISS",
            AudioEventType::CacheEvicted => "CACHE_EVICTED",
            AudioEventType::PlaybackStarted => "PLAYBACK_STARTED",
            AudioEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            AudioEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            AudioEventType::PlaybackEnded => "PLAYBACK_ENDED",
            AudioEventType::SeekOperation => "SEEK_OPERATION",
            AudioEventType::LoopToggled => "LOOP_TOGGLED",
            AudioEventType::ContextReset => "CONTEXT_RESET",
            AudioEventType::ResumeFailed => "RESUME_FAILED",
            AudioEventType::DecodeError => "DECODE_ERROR",
        }
    }
}

/// Bounded history of engine events, mirrored to the `log` facade.
///
/// Clones share the same history, so the controller and a telemetry reader
/// can hold the logger at the same time.
#[derive(Clone)]
pub struct AudioLogger {
    events: Arc<Mutex<VecDeque<AudioEvent>>>,
    max_events: usize,
    metrics: Arc<Mutex<LoadMetrics>>,
}

impl AudioLogger {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
            metrics: Arc::new(Mutex::new(LoadMetrics::default())),
        }
    }

    /// Initialize env_logger; level comes from `SAMPLE_DECK_LOG_LEVEL`
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var("SAMPLE_DECK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        builder.filter_level(parse_level(&log_level));
        builder.try_init()?;

        info!("Sample deck logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Record an event and forward it to the standard logger
    pub fn log_event(&self, event_type: AudioEventType, details: String, duration: Option<Duration>) {
        match event_type {
            AudioEventType::PlaybackStarted
            | AudioEventType::PlaybackPaused
            | AudioEventType::PlaybackStopped
            | AudioEventType::PlaybackEnded
            | AudioEventType::SampleLoaded => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::CacheHit | AudioEventType::CacheMiss | AudioEventType::CacheEvicted => {
                trace!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::SeekOperation | AudioEventType::LoopToggled => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::ContextReset | AudioEventType::ResumeFailed => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::DecodeError => {
                error!("[{}] {}", event_type.as_str(), details);
            }
        }

        let mut events = self.events.lock();
        events.push_back(AudioEvent {
            timestamp: Utc::now(),
            event_type,
            duration,
            details,
        });
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub fn log_sample_loaded(&self, key: &str, duration_secs: f64, decode_time: Duration) {
        self.metrics.lock().decode_time = decode_time;
        self.log_event(
            AudioEventType::SampleLoaded,
            format!("Loaded sample {} ({:.3}s)", key, duration_secs),
            Some(decode_time),
        );
    }

    pub fn log_cache_hit(&self, key: &str) {
        self.log_event(AudioEventType::CacheHit, format!("Cache hit for sample {}", key), None);
    }

    pub fn log_cache_miss(&self, key: &str, fetch_time: Duration) {
        self.metrics.lock().fetch_time = fetch_time;
        self.log_event(
            AudioEventType::CacheMiss,
            format!("Cache miss for sample {}", key),
            Some(fetch_time),
        );
    }

    pub fn log_cache_evicted(&self, key: &str) {
        self.log_event(AudioEventType::CacheEvicted, format!("Evicted sample {}", key), None);
    }

    pub fn log_playback_started(&self, key: &str, offset_secs: f64) {
        self.log_event(
            AudioEventType::PlaybackStarted,
            format!("Started sample {} at {:.3}s", key, offset_secs),
            None,
        );
    }

    pub fn log_playback_paused(&self, offset_secs: f64) {
        self.log_event(
            AudioEventType::PlaybackPaused,
            format!("Playback paused at {:.3}s", offset_secs),
            None,
        );
    }

    pub fn log_playback_stopped(&self, reason: &str) {
        self.log_event(AudioEventType::PlaybackStopped, format!("Playback stopped: {}", reason), None);
    }

    pub fn log_playback_ended(&self, key: &str) {
        self.log_event(AudioEventType::PlaybackEnded, format!("Sample {} finished", key), None);
    }

    pub fn log_seek_operation(&self, from_secs: f64, to_secs: f64, seek_time: Duration) {
        self.metrics.lock().seek_time = seek_time;
        self.log_event(
            AudioEventType::SeekOperation,
            format!("Seek from {:.3}s to {:.3}s", from_secs, to_secs),
            Some(seek_time),
        );
    }

    pub fn log_loop_toggled(&self, looping: bool) {
        let details = if looping { "Loop enabled" } else { "Loop disabled" };
        self.log_event(AudioEventType::LoopToggled, details.to_string(), None);
    }

    pub fn log_context_reset(&self, reason: &str, generation: u64) {
        self.log_event(
            AudioEventType::ContextReset,
            format!("Audio context reset ({}), generation {}", reason, generation),
            None,
        );
    }

    pub fn log_resume_failed(&self, error: &str) {
        self.log_event(AudioEventType::ResumeFailed, format!("Resume refused: {}", error), None);
    }

    pub fn log_decode_error(&self, key: &str, error: &str) {
        self.log_event(
            AudioEventType::DecodeError,
            format!("Decode error for sample {}: {}", key, error),
            None,
        );
    }

    /// Most recent `count` events, oldest first
    pub fn get_recent_events(&self, count: usize) -> Vec<AudioEvent> {
        let events = self.events.lock();
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn get_load_metrics(&self) -> LoadMetrics {
        self.metrics.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn get_event_statistics(&self) -> EventStatistics {
        let events = self.events.lock();
        let mut stats = EventStatistics::default();

        for event in events.iter() {
            match event.event_type {
                AudioEventType::CacheHit => stats.cache_hits += 1,
                AudioEventType::CacheMiss => stats.cache_misses += 1,
                AudioEventType::CacheEvicted => stats.evictions += 1,
                AudioEventType::DecodeError => stats.decode_errors += 1,
                AudioEventType::ContextReset => stats.context_resets += 1,
                AudioEventType::SeekOperation => stats.seek_operations += 1,
                _ => {}
            }
        }

        stats.total_events = events.len();
        stats
    }
}

impl Default for AudioLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Counts of logged events by kind
#[derive(Debug, Clone, Default)]
pub struct EventStatistics {
    pub total_events: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub evictions: usize,
    pub decode_errors: usize,
    pub context_resets: usize,
    pub seek_operations: usize,
}

impl EventStatistics {
    /// Fraction of loads served from the cache
    pub fn cache_hit_ratio(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: &'static str,
}

impl OperationTimer {
    pub fn new(operation_name: &'static str) -> Self {
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(self) -> Duration {
        let duration = self.elapsed();
        trace!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        duration
    }

    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                "Operation '{}' took {}ms (threshold: {}ms)",
                self.operation_name,
                duration.as_millis(),
                threshold.as_millis()
            );
        } else {
            debug!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        }
        duration
    }
}
