//! Playback of one sample at a time on top of the shared audio context.
//!
//! Every state change goes through [`transition`]. Elapsed time is always
//! read from the context clock, so pausing, seeking and looping stay in step
//! with what was actually rendered.

use log::{debug, trace, warn};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

use super::buffer::AudioBuffer;
use super::context::{AudioContext, AudioContextManager};
use super::decoder::decode_for_rate;
use super::nodes::{GainNode, NodeId, SourceNode};
use super::position::{PositionTracker, PositionUpdate};
use super::render::ContextState;
use crate::cache::SampleLoader;
use crate::error::{AudioError, EngineError, PlaybackError};
use crate::fetch::SampleFetcher;
use crate::logging::AudioLogger;
use crate::models::{PlaybackSnapshot, PlaybackState, SampleBlob, SampleKey};

/// Inputs to the playback state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    LoadStarted,
    Loaded,
    LoadFailed,
    Cleared,
    Play,
    Pause,
    Stop,
    /// The active node ran off the end of a non-looping buffer
    Ended,
    /// The context the session was decoded against is gone
    ContextLost,
}

/// The playback transition table; `None` means the event is ignored
pub fn transition(state: PlaybackState, event: PlaybackEvent) -> Option<PlaybackState> {
    use PlaybackEvent as E;
    use PlaybackState::*;

    match (state, event) {
        (_, E::LoadStarted) => Some(Loading),
        (Loading, E::Loaded) => Some(Ready),
        (Loading, E::LoadFailed) => Some(Empty),
        (_, E::Cleared) => Some(Empty),
        (Ready | Paused | Stopped | Playing, E::Play) => Some(Playing),
        (Playing, E::Pause) => Some(Paused),
        (Ready | Playing | Paused | Stopped, E::Stop) => Some(Stopped),
        (Playing, E::Ended) => Some(Stopped),
        (_, E::ContextLost) => Some(Empty),
        _ => None,
    }
}

/// Decoded sample plus where playback is within it
struct PlaybackSession {
    context: Rc<AudioContext>,
    buffer: Arc<AudioBuffer>,
    duration: f64,
    /// Offset in seconds to resume from while not playing
    paused_offset: f64,
    /// Context time at which offset 0 of the current segment would have played
    started_at: f64,
    key: Option<SampleKey>,
}

impl PlaybackSession {
    fn elapsed(&self) -> f64 {
        self.context.current_time() - self.started_at
    }
}

/// Plays, pauses, seeks and loops one decoded sample.
///
/// At most one source node is alive at a time; every new node is preceded
/// by stopping the previous one.
pub struct PlaybackController {
    manager: Rc<AudioContextManager>,
    gain: Option<GainNode>,
    session: Option<PlaybackSession>,
    last_blob: Option<(SampleBlob, Option<SampleKey>)>,
    active: Option<SourceNode>,
    state: PlaybackState,
    is_looping: bool,
    volume: f32,
    tracker: PositionTracker,
    ended_tx: Sender<NodeId>,
    ended_rx: Receiver<NodeId>,
    logger: AudioLogger,
}

impl PlaybackController {
    pub fn new(manager: Rc<AudioContextManager>, logger: AudioLogger) -> Self {
        let (ended_tx, ended_rx) = mpsc::channel();
        Self {
            manager,
            gain: None,
            session: None,
            last_blob: None,
            active: None,
            state: PlaybackState::Empty,
            is_looping: false,
            volume: 1.0,
            tracker: PositionTracker::new(),
            ended_tx,
            ended_rx,
            logger,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Buffer length in seconds, 0.0 when nothing is loaded
    pub fn duration(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.duration)
    }

    pub fn current_key(&self) -> Option<&SampleKey> {
        self.session.as_ref().and_then(|s| s.key.as_ref())
    }

    pub fn logger(&self) -> &AudioLogger {
        &self.logger
    }

    /// Playback position as a fraction of the buffer
    pub fn position(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        self.offset_secs() / duration
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            is_playing: self.is_playing(),
            is_looping: self.is_looping,
            playback_position: self.position(),
            duration: self.duration(),
            sample: self.current_key().cloned(),
        }
    }

    /// Decode `blob` and make it the current sample; `None` clears
    pub async fn load_blob(&mut self, blob: Option<SampleBlob>) -> Result<(), EngineError> {
        self.load_internal(blob, None).await
    }

    /// Fetch `key` through the loader's cache, then decode it
    pub async fn load_sample<F: SampleFetcher>(
        &mut self,
        loader: &mut SampleLoader<F>,
        key: impl Into<SampleKey>,
    ) -> Result<(), EngineError> {
        let key = key.into();
        self.teardown();
        self.apply(PlaybackEvent::LoadStarted);

        let loaded = match loader.load(&key).await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.last_blob = None;
                self.apply(PlaybackEvent::LoadFailed);
                return Err(e.into());
            }
        };

        let label = key.to_string();
        if loaded.cache_hit {
            self.logger.log_cache_hit(&label);
        } else {
            self.logger.log_cache_miss(&label, loaded.fetch_time);
        }
        for evicted in &loaded.evicted {
            self.logger.log_cache_evicted(&evicted.to_string());
        }

        self.load_internal(Some(loaded.blob), Some(key)).await
    }

    /// Decode the last loaded blob again against the current context
    pub async fn reload(&mut self) -> Result<(), EngineError> {
        match self.last_blob.clone() {
            Some((blob, key)) => self.load_internal(Some(blob), key).await,
            None => Err(PlaybackError::NothingLoaded.into()),
        }
    }

    async fn load_internal(&mut self, blob: Option<SampleBlob>, key: Option<SampleKey>) -> Result<(), EngineError> {
        self.teardown();

        let blob = match blob {
            Some(blob) => blob,
            None => {
                self.last_blob = None;
                self.apply(PlaybackEvent::Cleared);
                return Ok(());
            }
        };

        self.apply(PlaybackEvent::LoadStarted);
        let label = key.as_ref().map_or_else(|| "<blob>".to_string(), |k| k.to_string());
        let ctx = self.manager.acquire();
        let started = Instant::now();

        let decoded = match decode_for_rate(blob.clone(), ctx.sample_rate()).await {
            Ok(decoded) => decoded,
            Err(e) => {
                self.logger.log_decode_error(&label, &e.to_string());
                self.last_blob = None;
                self.apply(PlaybackEvent::LoadFailed);
                return Err(e.into());
            }
        };

        // Kept from here on so `reload` retries this sample if the context went away
        self.last_blob = Some((blob, key.clone()));

        let buffer = match ctx.create_buffer(&decoded) {
            Ok(buffer) => buffer,
            Err(e) => {
                self.apply(PlaybackEvent::LoadFailed);
                return Err(e.into());
            }
        };

        let duration = buffer.duration();
        self.session = Some(PlaybackSession {
            context: ctx,
            buffer,
            duration,
            paused_offset: 0.0,
            started_at: 0.0,
            key,
        });
        self.apply(PlaybackEvent::Loaded);
        self.logger.log_sample_loaded(&label, duration, started.elapsed());
        Ok(())
    }

    /// Start or resume playback from the stored offset
    pub fn play(&mut self) -> Result<(), EngineError> {
        self.drain_ended();
        if self.session.is_none() {
            return Err(PlaybackError::NothingLoaded.into());
        }
        if self.state == PlaybackState::Playing {
            return Ok(());
        }
        self.start_playback()
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.drain_ended();
        if self.state != PlaybackState::Playing {
            return Ok(());
        }

        let offset = self.offset_secs();
        self.stop_active_node();
        if let Some(session) = self.session.as_mut() {
            session.paused_offset = offset;
        }
        self.tracker.cancel();
        self.apply(PlaybackEvent::Pause);
        self.logger.log_playback_paused(offset);
        Ok(())
    }

    /// Stop and rewind to the start; calling it again is a no-op
    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.drain_ended();
        self.stop_active_node();
        self.tracker.cancel();

        if let Some(session) = self.session.as_mut() {
            session.paused_offset = 0.0;
        }
        let was = self.state;
        if self.apply(PlaybackEvent::Stop) && was != PlaybackState::Stopped {
            self.logger.log_playback_stopped("stop requested");
        }
        Ok(())
    }

    /// Jump to `fraction` (clamped to 0..=1) of the buffer
    pub fn seek(&mut self, fraction: f64) -> Result<(), EngineError> {
        self.drain_ended();
        let started = Instant::now();

        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let from = self.offset_secs();
        let target = match self.session.as_mut() {
            Some(session) if session.duration > 0.0 => {
                let target = fraction * session.duration;
                session.paused_offset = target;
                target
            }
            _ => {
                debug!("Ignoring seek with nothing loaded");
                return Ok(());
            }
        };

        if self.state == PlaybackState::Playing {
            self.stop_active_node();
            self.start_playback()?;
        }

        self.logger.log_seek_operation(from, target, started.elapsed());
        Ok(())
    }

    /// Flip looping; the active node follows immediately
    pub fn toggle_loop(&mut self) -> bool {
        self.drain_ended();

        let offset = self.offset_secs();
        self.is_looping = !self.is_looping;
        if let Some(node) = self.active.as_ref() {
            node.set_loop(self.is_looping);
        }

        if self.state == PlaybackState::Playing {
            if let Some(session) = self.session.as_mut() {
                session.started_at = session.context.current_time() - offset;
            }
        }

        self.logger.log_loop_toggled(self.is_looping);
        self.is_looping
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(gain) = self.gain.as_ref() {
            gain.set_gain(self.volume);
        }
    }

    /// Per-frame callback: settles completion events and reports the position
    pub fn on_frame(&mut self) -> Option<PositionUpdate> {
        self.drain_ended();

        if self.state != PlaybackState::Playing {
            self.tracker.cancel();
            return None;
        }

        let closed = self
            .session
            .as_ref()
            .map_or(true, |s| s.context.state() == ContextState::Closed);
        if closed {
            warn!("Audio context closed during playback; pausing");
            let offset = self.offset_secs();
            self.stop_active_node();
            if let Some(session) = self.session.as_mut() {
                session.paused_offset = offset;
            }
            self.tracker.cancel();
            self.apply(PlaybackEvent::Pause);
            return None;
        }

        let (position, duration) = (self.position(), self.duration());
        self.tracker.publish(position, duration)
    }

    /// Drive [`Self::on_frame`] from a timer until playback stops
    pub async fn run_frame_loop<P>(&mut self, interval: Duration, mut publish: P)
    where
        P: FnMut(PositionUpdate),
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.is_playing() {
            ticker.tick().await;
            if let Some(update) = self.on_frame() {
                publish(update);
            }
        }
    }

    fn start_playback(&mut self) -> Result<(), EngineError> {
        let (context, buffer, duration, offset, key) = match self.session.as_ref() {
            Some(s) => (
                Rc::clone(&s.context),
                Arc::clone(&s.buffer),
                s.duration,
                s.paused_offset,
                s.key.clone(),
            ),
            None => return Err(PlaybackError::NothingLoaded.into()),
        };

        let current_id = self.manager.current().map(|c| c.id());
        if current_id != Some(context.id()) {
            warn!("Audio context {} was replaced; sample must be reloaded", context.id());
            self.invalidate_session();
            return Err(AudioError::ContextReplaced.into());
        }

        if context.state() == ContextState::Closed {
            self.recover_closed_context();
            return Err(AudioError::ContextClosed.into());
        }

        if context.state() == ContextState::Suspended {
            if let Err(e) = context.resume() {
                self.logger.log_resume_failed(&e.to_string());
                return Err(e.into());
            }
        }

        let offset = wrap_offset(offset, duration);
        self.stop_active_node();
        self.ensure_gain(&context)?;

        let mut node = context.create_buffer_source(buffer)?;
        node.set_loop(self.is_looping);
        if let Some(gain) = self.gain.as_ref() {
            node.connect(gain)?;
        }
        node.start(offset, Some(self.ended_tx.clone()))?;
        self.active = Some(node);

        if let Some(session) = self.session.as_mut() {
            session.started_at = context.current_time() - offset;
            session.paused_offset = offset;
        }
        self.apply(PlaybackEvent::Play);
        self.tracker.start();

        let label = key.map_or_else(|| "<blob>".to_string(), |k| k.to_string());
        self.logger.log_playback_started(&label, offset);
        Ok(())
    }

    /// The session's context is still the managed one but the platform closed it
    fn recover_closed_context(&mut self) {
        if let Err(e) = self.manager.reset() {
            warn!("Replacement audio context reported: {}", e);
        }
        self.logger
            .log_context_reset("context closed by the platform", self.manager.generation());
        self.invalidate_session();
    }

    fn ensure_gain(&mut self, context: &AudioContext) -> Result<(), AudioError> {
        let bound = self.gain.as_ref().map(|g| g.context_id());
        if bound != Some(context.id()) {
            self.gain = Some(context.create_gain(self.volume)?);
        }
        Ok(())
    }

    /// Offset in seconds the listener is currently at
    fn offset_secs(&self) -> f64 {
        let session = match self.session.as_ref() {
            Some(session) if session.duration > 0.0 => session,
            _ => return 0.0,
        };

        if self.state != PlaybackState::Playing {
            return session.paused_offset;
        }

        let elapsed = session.elapsed();
        if self.is_looping {
            elapsed.rem_euclid(session.duration)
        } else {
            elapsed.clamp(0.0, session.duration)
        }
    }

    fn drain_ended(&mut self) {
        while let Ok(id) = self.ended_rx.try_recv() {
            let is_active = self.active.as_ref().map(|n| n.id()) == Some(id);
            if !is_active {
                trace!("Ignoring completion of stale source node {}", id);
                continue;
            }

            self.active = None;
            if let Some(session) = self.session.as_mut() {
                session.paused_offset = 0.0;
            }
            self.tracker.cancel();
            if self.apply(PlaybackEvent::Ended) {
                let label = self.current_key().map_or_else(|| "<blob>".to_string(), |k| k.to_string());
                self.logger.log_playback_ended(&label);
            }
        }
    }

    fn stop_active_node(&mut self) {
        if let Some(node) = self.active.take() {
            node.stop();
            node.disconnect();
        }
    }

    /// Stop everything before a new source replaces the current one
    fn teardown(&mut self) {
        self.stop_active_node();
        self.session = None;
        self.tracker.reset();
    }

    fn invalidate_session(&mut self) {
        self.teardown();
        self.apply(PlaybackEvent::ContextLost);
    }

    fn apply(&mut self, event: PlaybackEvent) -> bool {
        match transition(self.state, event) {
            Some(next) => {
                if next != self.state {
                    trace!("Playback {} -> {} on {:?}", self.state, next, event);
                }
                self.state = next;
                true
            }
            None => {
                trace!("Playback ignored {:?} in state {}", event, self.state);
                false
            }
        }
    }
}

fn wrap_offset(offset: f64, duration: f64) -> f64 {
    if duration <= 0.0 || !offset.is_finite() {
        return 0.0;
    }
    offset.rem_euclid(duration)
}
