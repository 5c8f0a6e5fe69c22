//! Audio contexts and the construction seam
//!
//! An [`AudioContext`] owns one [`AudioGraph`] ending in the device
//! destination. Contexts are only ever built through a [`ContextFactory`],
//! which is what lets a page's constructor be decorated.

use super::gain::GainNode;
use super::graph::AudioGraph;
use super::node::NodeHandle;
use super::sink::DestinationNode;
use super::source::SourceNode;
use super::QUANTUM_FRAMES;
use crate::dom::Element;
use crate::error::AudioError;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// A node inside a specific context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    context: ContextId,
    handle: NodeHandle,
}

impl NodeRef {
    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle
    }
}

struct ContextInner {
    id: ContextId,
    graph: RwLock<AudioGraph>,
    /// The real output device
    device: NodeHandle,
    /// What `destination()` hands out; the device unless redirected
    default_output: RwLock<NodeHandle>,
    closed: AtomicBool,
}

/// An audio-processing context.
///
/// Cloning shares the same context.
#[derive(Clone)]
pub struct AudioContext {
    inner: Arc<ContextInner>,
}

impl AudioContext {
    fn new() -> Self {
        let mut graph = AudioGraph::new();
        let device = graph.add_node(Box::new(DestinationNode::new("destination")));
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::next(),
                graph: RwLock::new(graph),
                device,
                default_output: RwLock::new(device),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    fn node_ref(&self, handle: NodeHandle) -> NodeRef {
        NodeRef {
            context: self.inner.id,
            handle,
        }
    }

    fn ensure_open(&self) -> Result<(), AudioError> {
        if self.is_closed() {
            Err(AudioError::Closed(self.inner.id))
        } else {
            Ok(())
        }
    }

    fn ensure_own(&self, node: NodeRef) -> Result<(), AudioError> {
        if node.context != self.inner.id {
            return Err(AudioError::ForeignNode);
        }
        if !self.inner.graph.read().contains(node.handle) {
            return Err(AudioError::UnknownNode(node.handle.raw()));
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the context. Further node creation fails.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    /// The context's default output node
    pub fn destination(&self) -> NodeRef {
        self.node_ref(*self.inner.default_output.read())
    }

    /// The real output device, regardless of redirection
    pub fn device_destination(&self) -> NodeRef {
        self.node_ref(self.inner.device)
    }

    /// Make `destination()` return `node` from now on
    pub(crate) fn redirect_destination(&self, node: NodeRef) -> Result<(), AudioError> {
        self.ensure_own(node)?;
        *self.inner.default_output.write() = node.handle;
        Ok(())
    }

    pub fn create_gain(&self) -> Result<GainStage, AudioError> {
        self.ensure_open()?;
        let handle = self
            .inner
            .graph
            .write()
            .add_node(Box::new(GainNode::new("gain")));
        Ok(GainStage {
            context: self.clone(),
            node: self.node_ref(handle),
        })
    }

    /// Route a media element's audio into this context.
    ///
    /// An element can feed at most one source node, across all contexts.
    pub fn create_media_element_source(&self, element: &Element) -> Result<NodeRef, AudioError> {
        self.ensure_open()?;
        element.capture(self.inner.id).map_err(|owner| match owner {
            Some(owner) => AudioError::AlreadyCaptured {
                element: element.id(),
                owner,
            },
            None => AudioError::NotMedia(element.id()),
        })?;
        let silenced = element.is_cors_restricted();
        if silenced {
            tracing::debug!(element = %element.id(), "cross-origin media source outputs silence");
        }
        let handle = self
            .inner
            .graph
            .write()
            .add_node(Box::new(SourceNode::new_media_element(element.id(), silenced)));
        Ok(self.node_ref(handle))
    }

    /// Script-generated signal source at a constant level
    pub fn create_generator(&self, level: f32) -> Result<NodeRef, AudioError> {
        self.ensure_open()?;
        let handle = self
            .inner
            .graph
            .write()
            .add_node(Box::new(SourceNode::new_generator(level, "generator")));
        Ok(self.node_ref(handle))
    }

    /// Connect `from` → `to`. Connecting an existing pair is a no-op.
    pub fn connect(&self, from: NodeRef, to: NodeRef) -> Result<(), AudioError> {
        self.ensure_own(from)?;
        self.ensure_own(to)?;
        let mut graph = self.inner.graph.write();
        if graph.is_connected(from.handle, to.handle) {
            return Ok(());
        }
        graph
            .add_edge(from.handle, to.handle)
            .map(|_| ())
            .ok_or(AudioError::InvalidConnection {
                from: from.handle.raw(),
                to: to.handle.raw(),
            })
    }

    /// Remove `node` and its connections from the graph
    pub fn release(&self, node: NodeRef) -> bool {
        node.context == self.inner.id
            && node.handle != self.inner.device
            && self.inner.graph.write().remove_node(node.handle)
    }

    pub fn is_connected(&self, from: NodeRef, to: NodeRef) -> bool {
        from.context == self.inner.id
            && to.context == self.inner.id
            && self.inner.graph.read().is_connected(from.handle, to.handle)
    }

    pub fn node_count(&self) -> usize {
        self.inner.graph.read().node_count()
    }

    pub fn source_is_silenced(&self, node: NodeRef) -> Option<bool> {
        if node.context != self.inner.id {
            return None;
        }
        self.inner
            .graph
            .read()
            .node_as::<SourceNode>(node.handle)
            .map(|s| s.is_silenced())
    }

    /// Render one quantum and return the peak level at the device
    pub fn render_quantum(&self) -> f32 {
        let mut graph = self.inner.graph.write();
        graph.render(QUANTUM_FRAMES);
        graph
            .node_as::<DestinationNode>(self.inner.device)
            .map_or(0.0, |d| d.level())
    }
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioContext")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A gain node together with the context that owns it
#[derive(Clone)]
pub struct GainStage {
    context: AudioContext,
    node: NodeRef,
}

impl GainStage {
    pub fn node(&self) -> NodeRef {
        self.node
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    /// Current gain; 0.0 once the node has been released
    pub fn gain(&self) -> f32 {
        self.context
            .inner
            .graph
            .read()
            .node_as::<GainNode>(self.node.handle)
            .map_or(0.0, |g| g.gain())
    }

    /// Set gain. Returns false if the stage no longer exists or its context is closed.
    pub fn set_gain(&self, gain: f32) -> bool {
        if self.context.is_closed() {
            return false;
        }
        match self
            .context
            .inner
            .graph
            .write()
            .node_as_mut::<GainNode>(self.node.handle)
        {
            Some(node) => {
                node.set_gain(gain);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for GainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GainStage")
            .field("node", &self.node)
            .field("gain", &self.gain())
            .finish()
    }
}

/// Constructs audio contexts; the seam a page's constructor is swapped at
pub trait ContextFactory: Send + Sync {
    fn construct(&self) -> Result<AudioContext, AudioError>;
}

/// The platform's own context constructor
#[derive(Debug, Clone, Copy)]
pub struct NativeContextFactory {
    available: bool,
}

impl NativeContextFactory {
    pub fn new() -> Self {
        Self { available: true }
    }

    /// A platform without audio output
    pub fn unavailable() -> Self {
        Self { available: false }
    }
}

impl Default for NativeContextFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextFactory for NativeContextFactory {
    fn construct(&self) -> Result<AudioContext, AudioError> {
        if self.available {
            Ok(AudioContext::new())
        } else {
            Err(AudioError::Unavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> AudioContext {
        NativeContextFactory::new().construct().unwrap()
    }

    #[test]
    fn test_unavailable_factory() {
        let err = NativeContextFactory::unavailable().construct().unwrap_err();
        assert!(matches!(err, AudioError::Unavailable));
    }

    #[test]
    fn test_element_source_is_exclusive() {
        let a = context();
        let b = context();
        let el = Element::audio();

        a.create_media_element_source(&el).unwrap();
        let err = a.create_media_element_source(&el).unwrap_err();
        assert!(matches!(err, AudioError::AlreadyCaptured { .. }));
        let err = b.create_media_element_source(&el).unwrap_err();
        assert!(matches!(err, AudioError::AlreadyCaptured { owner, .. } if owner == a.id()));
    }

    #[test]
    fn test_non_media_source_rejected() {
        let err = context()
            .create_media_element_source(&Element::new("div"))
            .unwrap_err();
        assert!(matches!(err, AudioError::NotMedia(_)));
    }

    #[test]
    fn test_boosted_path_renders() {
        let ctx = context();
        let el = Element::video();
        let source = ctx.create_media_element_source(&el).unwrap();
        let stage = ctx.create_gain().unwrap();
        ctx.connect(source, stage.node()).unwrap();
        ctx.connect(stage.node(), ctx.destination()).unwrap();

        stage.set_gain(2.5);
        assert_eq!(ctx.render_quantum(), 2.5);
    }

    #[test]
    fn test_cors_restricted_source_is_silent() {
        let ctx = context();
        let el = Element::video();
        el.set_cross_origin_source(true);
        let source = ctx.create_media_element_source(&el).unwrap();
        ctx.connect(source, ctx.destination()).unwrap();

        assert_eq!(ctx.source_is_silenced(source), Some(true));
        assert_eq!(ctx.render_quantum(), 0.0);
    }

    #[test]
    fn test_foreign_nodes_rejected() {
        let a = context();
        let b = context();
        let stage = b.create_gain().unwrap();
        let err = a.connect(stage.node(), a.destination()).unwrap_err();
        assert!(matches!(err, AudioError::ForeignNode));
    }

    #[test]
    fn test_closed_context() {
        let ctx = context();
        let stage = ctx.create_gain().unwrap();
        ctx.close();
        assert!(!stage.set_gain(2.0));
        assert!(matches!(ctx.create_gain(), Err(AudioError::Closed(_))));
    }

    #[test]
    fn test_release_keeps_device() {
        let ctx = context();
        assert!(!ctx.release(ctx.device_destination()));
        let stage = ctx.create_gain().unwrap();
        assert!(ctx.release(stage.node()));
        assert_eq!(stage.gain(), 0.0);
        assert_eq!(ctx.node_count(), 1);
    }
}
