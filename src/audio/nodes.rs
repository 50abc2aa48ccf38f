use log::trace;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::context::ContextId;
use super::render::{load_gain, store_gain, ContextState, Renderer, Voice};
use crate::error::AudioError;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a source node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node flags read by the render thread
pub(crate) struct NodeShared {
    id: NodeId,
    looping: AtomicBool,
    stopped: AtomicBool,
    ended: AtomicBool,
    output: Mutex<Option<Arc<AtomicU32>>>,
}

impl NodeShared {
    pub(crate) fn new() -> Self {
        Self {
            id: NodeId::next(),
            looping: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            output: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Acquire)
    }

    pub(crate) fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Release);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Returns true only for the call that actually stopped the node
    pub(crate) fn mark_stopped(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    pub(crate) fn mark_ended(&self) {
        self.ended.store(true, Ordering::Release);
    }

    pub(crate) fn set_output(&self, gain: Option<Arc<AtomicU32>>) {
        *self.output.lock() = gain;
    }

    /// Gain of the connected stage, `None` while disconnected
    pub(crate) fn output_gain(&self) -> Option<f32> {
        self.output.lock().as_deref().map(load_gain)
    }
}

/// Volume stage between source nodes and the context output.
///
/// One gain node lives as long as its context; it is never rebuilt per play.
pub struct GainNode {
    context_id: ContextId,
    value: Arc<AtomicU32>,
}

impl GainNode {
    pub(crate) fn new(context_id: ContextId, gain: f32) -> Self {
        Self {
            context_id,
            value: Arc::new(AtomicU32::new(gain.to_bits())),
        }
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    pub fn gain(&self) -> f32 {
        load_gain(&self.value)
    }

    pub fn set_gain(&self, gain: f32) {
        store_gain(&self.value, gain.max(0.0));
    }
}

/// One-shot player of an [`AudioBuffer`].
///
/// A source node can be started once. Stopping is idempotent and also
/// happens when the node is dropped, so a discarded node never keeps
/// sounding.
pub struct SourceNode {
    context_id: ContextId,
    shared: Arc<NodeShared>,
    buffer: Arc<AudioBuffer>,
    renderer: Arc<Renderer>,
    started: bool,
}

impl SourceNode {
    pub(crate) fn new(context_id: ContextId, buffer: Arc<AudioBuffer>, renderer: Arc<Renderer>) -> Self {
        Self {
            context_id,
            shared: Arc::new(NodeShared::new()),
            buffer,
            renderer,
            started: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.shared.id()
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    pub fn is_looping(&self) -> bool {
        self.shared.is_looping()
    }

    /// Takes effect immediately, also while playing
    pub fn set_loop(&self, looping: bool) {
        self.shared.set_looping(looping);
    }

    pub fn connect(&self, gain: &GainNode) -> Result<(), AudioError> {
        if gain.context_id() != self.context_id {
            return Err(AudioError::ForeignNode);
        }
        self.shared.set_output(Some(Arc::clone(&gain.value)));
        Ok(())
    }

    pub fn disconnect(&self) {
        self.shared.set_output(None);
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn has_ended(&self) -> bool {
        self.shared.has_ended()
    }

    /// Start playing `offset_secs` into the buffer.
    ///
    /// `ended_tx` receives this node's id when a non-looping node runs off
    /// the end of its buffer. An explicit `stop` sends nothing.
    pub fn start(&mut self, offset_secs: f64, ended_tx: Option<Sender<NodeId>>) -> Result<(), AudioError> {
        if self.started {
            return Err(AudioError::NodeAlreadyStarted);
        }
        if self.renderer.state() == ContextState::Closed {
            return Err(AudioError::ContextClosed);
        }
        self.started = true;

        if self.shared.is_stopped() {
            return Ok(());
        }

        let frames = self.buffer.frames();
        let cursor = ((offset_secs.max(0.0) * self.buffer.sample_rate() as f64).round() as usize).min(frames);

        trace!("Starting source node {} at frame {} of {}", self.id(), cursor, frames);
        self.renderer.add_voice(Voice {
            node: Arc::clone(&self.shared),
            buffer: Arc::clone(&self.buffer),
            cursor,
            ended_tx,
        });
        Ok(())
    }

    /// Silence the node; repeated calls are no-ops
    pub fn stop(&self) {
        if self.shared.mark_stopped() && self.started {
            self.renderer.remove_voice(self.id());
        }
    }
}

impl Drop for SourceNode {
    fn drop(&mut self) {
        self.stop();
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn running_renderer() -> Arc<Renderer> {
        let renderer = Arc::new(Renderer::new(100, 1));
        renderer.set_state(ContextState::Running);
        renderer
    }

    fn buffer(frames: usize) -> Arc<AudioBuffer> {
        Arc::new(AudioBuffer::new(ContextId::new(1), vec![1.0; frames], 1, 100))
    }

    #[test]
    fn test_node_ids_are_unique() {
        let a = NodeShared::new();
        let b = NodeShared::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_start_twice_fails() {
        let renderer = running_renderer();
        let mut node = SourceNode::new(ContextId::new(1), buffer(10), Arc::clone(&renderer));

        assert!(!node.is_started());
        node.start(0.0, None).unwrap();
        assert!(node.is_started());
        assert!(matches!(node.start(0.0, None), Err(AudioError::NodeAlreadyStarted)));
    }

    #[test]
    fn test_connect_rejects_foreign_gain() {
        let renderer = running_renderer();
        let node = SourceNode::new(ContextId::new(1), buffer(10), renderer);
        let gain = GainNode::new(ContextId::new(2), 1.0);

        assert!(matches!(node.connect(&gain), Err(AudioError::ForeignNode)));
    }

    #[test]
    fn test_gain_scales_output() {
        let renderer = running_renderer();
        let gain = GainNode::new(ContextId::new(1), 0.25);
        let mut node = SourceNode::new(ContextId::new(1), buffer(10), Arc::clone(&renderer));
        node.connect(&gain).unwrap();
        node.start(0.0, None).unwrap();

        let mut out = vec![0.0; 4];
        renderer.render(&mut out);
        assert!(out.iter().all(|s| (*s - 0.25).abs() < 1e-6));

        gain.set_gain(0.5);
        renderer.render(&mut out);
        assert!(out.iter().all(|s| (*s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_disconnected_node_is_silent_but_still_ends() {
        let renderer = running_renderer();
        let (tx, rx) = mpsc::channel();
        let mut node = SourceNode::new(ContextId::new(1), buffer(10), Arc::clone(&renderer));
        node.start(0.0, Some(tx)).unwrap();

        let mut out = vec![0.0; 20];
        renderer.render(&mut out);

        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(rx.try_recv().ok(), Some(node.id()));
        assert!(node.has_ended());
    }

    #[test]
    fn test_start_offset_skips_frames() {
        let renderer = running_renderer();
        let (tx, rx) = mpsc::channel();
        let mut node = SourceNode::new(ContextId::new(1), buffer(100), Arc::clone(&renderer));
        node.start(0.5, Some(tx)).unwrap();

        let mut out = vec![0.0; 49];
        renderer.render(&mut out);
        assert!(rx.try_recv().is_err());

        let mut out = vec![0.0; 1];
        renderer.render(&mut out);
        assert_eq!(rx.try_recv().ok(), Some(node.id()));
    }

    #[test]
    fn test_stop_is_idempotent_and_drop_stops() {
        let renderer = running_renderer();
        let mut node = SourceNode::new(ContextId::new(1), buffer(1000), Arc::clone(&renderer));
        node.start(0.0, None).unwrap();
        assert_eq!(renderer.active_voices(), 1);

        node.stop();
        node.stop();
        assert_eq!(renderer.active_voices(), 0);

        let mut other = SourceNode::new(ContextId::new(1), buffer(1000), Arc::clone(&renderer));
        other.start(0.0, None).unwrap();
        assert_eq!(renderer.active_voices(), 1);
        drop(other);
        assert_eq!(renderer.active_voices(), 0);
    }

    #[test]
    fn test_start_on_closed_context_fails() {
        let renderer = running_renderer();
        renderer.close();
        let mut node = SourceNode::new(ContextId::new(1), buffer(10), renderer);

        assert!(matches!(node.start(0.0, None), Err(AudioError::ContextClosed)));
    }
}
