use std::rc::Rc;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use crate::audio::{AudioContextManager, AudioHost, ContextState, OfflineHost, PlaybackController};
use crate::cache::{BlobCache, CacheInsert, SampleLoader};
use crate::error::{AudioError, EngineError, FetchError, PlaybackError, RecoveryAction};
use crate::fetch::{FileSampleFetcher, SampleFetcher};
use crate::logging::{AudioEventType, AudioLogger};
use crate::models::{AudioFileFormat, PlaybackState, SampleBlob, SampleKey};
use crate::testutil::{tone_wav, wav_bytes};

const RATE: u32 = 8000;
const BLOCK: usize = 800;

struct Harness {
    host: Rc<OfflineHost>,
    manager: Rc<AudioContextManager>,
    controller: PlaybackController,
    logger: AudioLogger,
}

fn harness() -> Harness {
    let host = Rc::new(OfflineHost::new(RATE, 1));
    let manager = Rc::new(AudioContextManager::new(Rc::clone(&host) as Rc<dyn AudioHost>));
    let logger = AudioLogger::new();
    let controller = PlaybackController::new(Rc::clone(&manager), logger.clone());
    Harness {
        host,
        manager,
        controller,
        logger,
    }
}

fn sample(secs: f64) -> SampleBlob {
    SampleBlob::with_format(tone_wav(RATE, 1, secs), AudioFileFormat::Wav)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[tokio::test]
async fn test_load_then_play_reports_clock_position() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();

    assert_eq!(h.controller.state(), PlaybackState::Ready);
    assert!(approx(h.controller.duration(), 10.0));
    assert_eq!(h.controller.position(), 0.0);

    assert_ok!(h.controller.play());
    assert!(h.controller.is_playing());

    h.host.render_secs(2.5, BLOCK);
    let update = h.controller.on_frame().unwrap();
    assert!(approx(update.position, 0.25));
    assert!(approx(update.duration, 10.0));
}

#[tokio::test]
async fn test_pause_freezes_position_and_resume_continues() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();
    h.controller.play().unwrap();
    h.host.render_secs(2.5, BLOCK);

    h.controller.pause().unwrap();
    assert_eq!(h.controller.state(), PlaybackState::Paused);
    assert!(approx(h.controller.position(), 0.25));

    // The context keeps rendering silence; the paused offset must not drift
    h.host.render_secs(3.0, BLOCK);
    assert!(approx(h.controller.position(), 0.25));
    assert!(h.controller.on_frame().is_none());

    h.controller.play().unwrap();
    h.host.render_secs(1.0, BLOCK);
    assert!(approx(h.controller.position(), 0.35));
}

#[tokio::test]
async fn test_non_looping_position_is_monotonic_then_stops_at_zero() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(2.0))).await.unwrap();
    h.controller.play().unwrap();

    let mut last = 0.0;
    for _ in 0..19 {
        h.host.render_secs(0.1, BLOCK);
        let update = h.controller.on_frame().unwrap();
        assert!(update.position >= last, "{} < {}", update.position, last);
        assert!(update.position <= 1.0);
        last = update.position;
    }

    h.host.render_secs(0.1, BLOCK);
    assert!(h.controller.on_frame().is_none());
    assert_eq!(h.controller.state(), PlaybackState::Stopped);
    assert_eq!(h.controller.position(), 0.0);
    assert!(!h.controller.is_playing());

    let ended = h
        .logger
        .get_recent_events(10)
        .iter()
        .any(|e| e.event_type == AudioEventType::PlaybackEnded);
    assert!(ended);
}

#[tokio::test]
async fn test_looping_wraps_without_stopping() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();
    h.controller.toggle_loop();
    h.controller.play().unwrap();

    h.host.render_secs(12.5, BLOCK);
    let update = h.controller.on_frame().unwrap();

    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert!(approx(update.position, 0.25));

    h.host.render_secs(10.0, BLOCK);
    assert!(approx(h.controller.on_frame().unwrap().position, 0.25));
}

#[tokio::test]
async fn test_seek_then_play_starts_at_offset() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();

    h.controller.seek(0.5).unwrap();
    assert_eq!(h.controller.state(), PlaybackState::Ready);
    assert!(approx(h.controller.position(), 0.5));

    h.controller.play().unwrap();
    assert!(approx(h.controller.position(), 0.5));
    h.host.render_secs(1.0, BLOCK);
    assert!(approx(h.controller.position(), 0.6));
}

#[tokio::test]
async fn test_seek_quarter_of_ten_seconds_plays_from_two_and_a_half() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();

    h.controller.seek(0.25).unwrap();
    h.controller.play().unwrap();

    assert!(approx(h.controller.snapshot().position_secs(), 2.5));

    // 7.5 s remain before the buffer runs out
    h.host.render_secs(7.4, BLOCK);
    assert_eq!(h.controller.state(), PlaybackState::Playing);
    h.host.render_secs(0.1, BLOCK);
    h.controller.on_frame();
    assert_eq!(h.controller.state(), PlaybackState::Stopped);
}

#[tokio::test]
async fn test_seek_while_playing_restarts_immediately() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();
    h.controller.play().unwrap();
    h.host.render_secs(1.0, BLOCK);

    h.controller.seek(0.8).unwrap();

    assert!(h.controller.is_playing());
    assert!(approx(h.controller.position(), 0.8));
    h.host.render_secs(0.5, BLOCK);
    assert!(approx(h.controller.position(), 0.85));
}

#[tokio::test]
async fn test_seek_clamps_out_of_range_fractions() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();

    h.controller.seek(1.7).unwrap();
    assert!(approx(h.controller.position(), 1.0));

    h.controller.seek(-3.0).unwrap();
    assert_eq!(h.controller.position(), 0.0);

    h.controller.seek(f64::NAN).unwrap();
    assert_eq!(h.controller.position(), 0.0);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut h = harness();
    assert_ok!(h.controller.stop());
    assert_eq!(h.controller.state(), PlaybackState::Empty);

    h.controller.load_blob(Some(sample(10.0))).await.unwrap();
    h.controller.play().unwrap();
    h.host.render_secs(3.0, BLOCK);

    h.controller.stop().unwrap();
    let first = h.controller.snapshot();
    h.controller.stop().unwrap();
    let second = h.controller.snapshot();

    assert_eq!(first, second);
    assert_eq!(second.state, PlaybackState::Stopped);
    assert_eq!(second.playback_position, 0.0);

    let stops = h
        .logger
        .get_recent_events(20)
        .iter()
        .filter(|e| e.event_type == AudioEventType::PlaybackStopped)
        .count();
    assert_eq!(stops, 1);
}

#[tokio::test]
async fn test_toggle_loop_keeps_position_continuous() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();
    h.controller.play().unwrap();
    h.host.render_secs(3.0, BLOCK);

    assert!(h.controller.toggle_loop());
    assert!(approx(h.controller.position(), 0.3));

    // Past the end: the looping node wraps instead of ending
    h.host.render_secs(8.0, BLOCK);
    assert!(approx(h.controller.on_frame().unwrap().position, 0.1));

    assert!(!h.controller.toggle_loop());
    assert!(approx(h.controller.position(), 0.1));
    h.host.render_secs(1.0, BLOCK);
    assert!(approx(h.controller.position(), 0.2));
}

#[tokio::test]
async fn test_load_replaces_playing_sample() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();
    h.controller.play().unwrap();
    h.host.render_secs(1.0, BLOCK);
    let ctx = h.manager.acquire();
    assert_eq!(ctx.renderer().active_voices(), 1);

    h.controller.load_blob(Some(sample(4.0))).await.unwrap();

    assert_eq!(ctx.renderer().active_voices(), 0);
    assert_eq!(h.controller.state(), PlaybackState::Ready);
    assert!(approx(h.controller.duration(), 4.0));
    assert_eq!(h.controller.position(), 0.0);
}

#[tokio::test]
async fn test_load_none_clears_everything() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(1.0))).await.unwrap();
    h.controller.play().unwrap();

    h.controller.load_blob(None).await.unwrap();

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Empty);
    assert_eq!(snapshot.duration, 0.0);
    assert_eq!(snapshot.playback_position, 0.0);
    assert!(matches!(
        h.controller.play(),
        Err(EngineError::Playback(PlaybackError::NothingLoaded))
    ));
}

#[tokio::test]
async fn test_decode_failure_leaves_empty_state() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(1.0))).await.unwrap();

    let garbage = SampleBlob::new(Bytes::from_static(b"this is not an audio file"));
    let result = h.controller.load_blob(Some(garbage)).await;

    assert!(matches!(result, Err(EngineError::Decode(_))));
    assert_eq!(h.controller.state(), PlaybackState::Empty);
    assert_eq!(h.controller.duration(), 0.0);
    assert_eq!(h.logger.get_event_statistics().decode_errors, 1);
}

#[tokio::test]
async fn test_zero_length_sample_is_not_playable() {
    let mut h = harness();
    let empty = SampleBlob::with_format(wav_bytes(RATE, 1, 0, |_, _| 0.0), AudioFileFormat::Wav);

    let result = h.controller.load_blob(Some(empty)).await;

    assert!(matches!(result, Err(EngineError::Decode(_))));
    assert_eq!(h.controller.position(), 0.0);
    assert_err!(h.controller.play());
}

#[tokio::test]
async fn test_resume_refused_until_gesture() {
    let mut h = harness();
    h.host.set_resume_allowed(false);
    h.controller.load_blob(Some(sample(2.0))).await.unwrap();

    let err = h.controller.play().unwrap_err();
    assert!(matches!(err, EngineError::Audio(AudioError::ResumeRefused(_))));
    assert_eq!(err.recovery_action(), RecoveryAction::RetryAfterGesture);
    assert_eq!(h.controller.state(), PlaybackState::Ready);

    h.host.set_resume_allowed(true);
    h.controller.play().unwrap();
    assert!(h.controller.is_playing());
}

#[tokio::test]
async fn test_platform_closing_context_recovers_through_reload() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();
    h.controller.play().unwrap();
    h.host.render_secs(2.0, BLOCK);

    h.host.revoke();
    assert!(h.controller.on_frame().is_none());
    assert_eq!(h.controller.state(), PlaybackState::Paused);

    let err = h.controller.play().unwrap_err();
    assert!(matches!(err, EngineError::Audio(AudioError::ContextClosed)));
    assert_eq!(err.recovery_action(), RecoveryAction::Reload);
    assert_eq!(h.controller.state(), PlaybackState::Empty);
    assert_eq!(h.manager.generation(), 2);
    assert_eq!(h.manager.acquire().state(), ContextState::Suspended);

    h.controller.reload().await.unwrap();
    assert_eq!(h.controller.state(), PlaybackState::Ready);
    h.controller.play().unwrap();
    h.host.render_secs(1.0, BLOCK);
    assert!(approx(h.controller.position(), 0.1));
    assert_eq!(h.logger.get_event_statistics().context_resets, 1);
}

#[tokio::test]
async fn test_external_reset_invalidates_session() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(10.0))).await.unwrap();
    h.controller.play().unwrap();
    h.controller.pause().unwrap();

    h.manager.reset().unwrap();

    let err = h.controller.play().unwrap_err();
    assert!(matches!(err, EngineError::Audio(AudioError::ContextReplaced)));
    assert_eq!(h.controller.state(), PlaybackState::Empty);

    h.controller.reload().await.unwrap();
    h.controller.play().unwrap();
    assert!(h.controller.is_playing());
}

#[tokio::test]
async fn test_volume_scales_rendered_output() {
    let mut h = harness();
    let constant = SampleBlob::with_format(wav_bytes(RATE, 1, 8000, |_, _| 0.5), AudioFileFormat::Wav);
    h.controller.load_blob(Some(constant)).await.unwrap();

    h.controller.set_volume(0.5);
    h.controller.play().unwrap();
    let out = h.host.render(100);
    assert!(out.iter().all(|s| (s - 0.25).abs() < 1e-3));

    h.controller.set_volume(2.0);
    assert_eq!(h.controller.volume(), 1.0);
    let out = h.host.render(100);
    assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-3));
}

#[tokio::test]
async fn test_frame_loop_runs_until_sample_ends() {
    let mut h = harness();
    h.controller.load_blob(Some(sample(0.2))).await.unwrap();
    h.controller.play().unwrap();

    let host = Rc::clone(&h.host);
    let mut updates = Vec::new();
    h.controller
        .run_frame_loop(std::time::Duration::from_millis(1), |update| {
            updates.push(update.position);
            host.render(400);
        })
        .await;

    assert_eq!(h.controller.state(), PlaybackState::Stopped);
    assert!(!updates.is_empty());
    assert!(updates.windows(2).all(|w| w[0] <= w[1]));
}

struct CountingFetcher {
    calls: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl SampleFetcher for CountingFetcher {
    async fn fetch(&self, key: &SampleKey) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match key {
            SampleKey::Id(id) if *id > 0 => Ok(tone_wav(RATE, 1, *id as f64 / 10.0)),
            _ => Err(FetchError::NotFound { key: key.to_string() }),
        }
    }
}

#[tokio::test]
async fn test_load_sample_goes_through_cache() {
    let mut h = harness();
    let mut loader = SampleLoader::new(
        CountingFetcher {
            calls: std::sync::atomic::AtomicUsize::new(0),
        },
        1024 * 1024,
    );

    h.controller.load_sample(&mut loader, 5).await.unwrap();
    assert_eq!(h.controller.current_key(), Some(&SampleKey::Id(5)));
    assert!(approx(h.controller.duration(), 0.5));

    h.controller.load_sample(&mut loader, 7).await.unwrap();
    h.controller.load_sample(&mut loader, 5).await.unwrap();

    let calls = loader.fetcher().calls.load(std::sync::atomic::Ordering::SeqCst);
    assert_eq!(calls, 2);
    assert_eq!(loader.cache_stats().count, 2);

    let stats = h.logger.get_event_statistics();
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.cache_hits, 1);
}

#[tokio::test]
async fn test_load_sample_fetch_failure() {
    let mut h = harness();
    let mut loader = SampleLoader::new(
        CountingFetcher {
            calls: std::sync::atomic::AtomicUsize::new(0),
        },
        1024 * 1024,
    );
    h.controller.load_sample(&mut loader, 3).await.unwrap();

    let result = h.controller.load_sample(&mut loader, -1).await;

    assert!(matches!(result, Err(EngineError::Fetch(FetchError::NotFound { .. }))));
    assert_eq!(h.controller.state(), PlaybackState::Empty);
}

#[tokio::test]
async fn test_file_library_audition() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("snare.wav"), tone_wav(RATE, 2, 0.5)).unwrap();

    let mut h = harness();
    let mut loader = SampleLoader::new(FileSampleFetcher::new(temp_dir.path()), 1024 * 1024);

    h.controller.load_sample(&mut loader, "snare.wav").await.unwrap();
    h.controller.play().unwrap();
    h.host.render_secs(0.25, BLOCK);

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.sample, Some(SampleKey::from("snare.wav")));
    assert!(approx(snapshot.playback_position, 0.5));
}

#[tokio::test]
async fn test_reload_after_failed_load_does_not_revive_previous_sample() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("a.wav"), tone_wav(RATE, 1, 0.5)).unwrap();

    let mut h = harness();
    let mut loader = SampleLoader::new(FileSampleFetcher::new(temp_dir.path()), 1024 * 1024);
    h.controller.load_sample(&mut loader, "a.wav").await.unwrap();

    let failed = h.controller.load_sample(&mut loader, "missing.wav").await;
    assert!(matches!(failed, Err(EngineError::Fetch(FetchError::NotFound { .. }))));
    assert_eq!(h.controller.state(), PlaybackState::Empty);

    assert!(matches!(
        h.controller.reload().await,
        Err(EngineError::Playback(PlaybackError::NothingLoaded))
    ));
    assert_eq!(h.controller.state(), PlaybackState::Empty);
    assert_eq!(h.controller.current_key(), None);

    std::fs::write(temp_dir.path().join("missing.wav"), tone_wav(RATE, 1, 0.25)).unwrap();
    h.controller.load_sample(&mut loader, "missing.wav").await.unwrap();
    h.controller.reload().await.unwrap();
    assert_eq!(h.controller.current_key(), Some(&SampleKey::from("missing.wav")));
    assert!(approx(h.controller.duration(), 0.25));
}

#[test]
fn test_cache_scenario_two_large_blobs() {
    let mut cache = BlobCache::new(1_048_576);

    cache.set(1, Bytes::from(vec![0u8; 600 * 1024]));
    cache.set(2, Bytes::from(vec![0u8; 600 * 1024]));

    assert!(!cache.has(&SampleKey::Id(1)));
    assert!(cache.has(&SampleKey::Id(2)));
}

#[test]
fn test_cache_scenario_oversize_blob() {
    let mut cache = BlobCache::new(1024 * 1024);

    let result = cache.set("big", Bytes::from(vec![0u8; 2 * 1024 * 1024]));

    assert_eq!(result, CacheInsert::Rejected);
    assert_eq!(cache.stats().count, 0);
    assert_eq!(cache.stats().size, 0);
}
