//! Page Gain Graph Manager
//!
//! Owns one page's boosting pipeline:
//!
//! ```text
//! media element ─▶ source ─▶ element gain ─┐
//! media element ─▶ source ─▶ element gain ─┼─▶ master gain ─▶ device
//!                                          ┘
//! page context ─▶ ... ─▶ intercepted gain ─▶ device
//! ```
//!
//! Master and intercepted stages carry the logical gain. Element stages carry
//! `native volume × logical gain`, so relative native levels survive the boost.

use super::realm::Realm;
use super::shim::{self, InterceptedGains};
use super::tracker::{ElementTracker, SweepReport, WiredElement};
use crate::audio::{AudioContext, GainStage, NodeRef};
use crate::dom::{Element, MutationRecord, WeakElement};
use crate::error::AudioError;
use crate::volume::{clamp_gain, DEFAULT_GAIN};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Result of one wiring attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireOutcome {
    /// Newly routed through its own gain stage
    Wired,
    /// Already in the tracked set
    AlreadyWired,
    /// Previously untracked or rejected; never wired again
    Retired,
    /// Not attached to the document
    Detached,
    /// The manager has no audio context
    Inert,
    NotMedia,
    /// The platform refused to route this element
    Rejected,
}

struct Pipeline {
    context: AudioContext,
    master: GainStage,
}

struct ManagerState {
    gain: f32,
    /// An explicit set happened; late restores are stale
    explicitly_set: bool,
    pipeline: Option<Pipeline>,
    tracker: ElementTracker,
    persist: Option<mpsc::UnboundedSender<f32>>,
}

/// The per-page gain graph owner. Cloning shares the same manager.
#[derive(Clone)]
pub struct GainGraphManager {
    state: Arc<Mutex<ManagerState>>,
    realm: Arc<Realm>,
    intercepted: InterceptedGains,
}

impl GainGraphManager {
    /// Install the interception shim and build the master pipeline.
    ///
    /// Without audio capability the manager is inert but still answers
    /// volume queries.
    pub fn new(realm: Arc<Realm>) -> Self {
        let intercepted = shim::install(&realm);
        let pipeline = match Self::build_pipeline(&realm) {
            Ok(pipeline) => {
                realm.expose_gain(pipeline.master.clone());
                tracing::info!(context = %pipeline.context.id(), "gain pipeline ready");
                Some(pipeline)
            }
            Err(e) => {
                tracing::warn!(error = %e, "audio context unavailable, volume control disabled");
                None
            }
        };

        Self {
            state: Arc::new(Mutex::new(ManagerState {
                gain: DEFAULT_GAIN,
                explicitly_set: false,
                pipeline,
                tracker: ElementTracker::default(),
                persist: None,
            })),
            realm,
            intercepted,
        }
    }

    fn build_pipeline(realm: &Realm) -> Result<Pipeline, AudioError> {
        let context = realm.native_constructor().construct()?;
        let master = context.create_gain()?;
        context.connect(master.node(), context.device_destination())?;
        master.set_gain(DEFAULT_GAIN);
        Ok(Pipeline { context, master })
    }

    /// Send every explicitly set gain to `sink` for persistence
    pub fn set_persist_sink(&self, sink: mpsc::UnboundedSender<f32>) {
        self.state.lock().persist = Some(sink);
    }

    pub fn realm(&self) -> &Arc<Realm> {
        &self.realm
    }

    pub fn is_inert(&self) -> bool {
        self.state.lock().pipeline.is_none()
    }

    /// Current logical gain
    pub fn volume(&self) -> f32 {
        self.state.lock().gain
    }

    pub fn master_gain(&self) -> Option<f32> {
        self.state.lock().pipeline.as_ref().map(|p| p.master.gain())
    }

    pub fn context(&self) -> Option<AudioContext> {
        self.state.lock().pipeline.as_ref().map(|p| p.context.clone())
    }

    pub fn intercepted(&self) -> &InterceptedGains {
        &self.intercepted
    }

    pub fn tracked_count(&self) -> usize {
        self.state.lock().tracker.len()
    }

    pub fn is_tracked(&self, element: &Element) -> bool {
        self.state.lock().tracker.is_tracked(element.id())
    }

    /// Value of `element`'s gain stage, if it is tracked
    pub fn element_gain(&self, element: &Element) -> Option<f32> {
        self.state
            .lock()
            .tracker
            .get(element.id())
            .map(|wired| wired.stage.gain())
    }

    pub fn element_source(&self, element: &Element) -> Option<NodeRef> {
        self.state
            .lock()
            .tracker
            .get(element.id())
            .map(|wired| wired.source)
    }

    /// Route `element` through its own gain stage into the master stage.
    ///
    /// At most once per element object. Failures are logged and remembered.
    pub fn wire(&self, element: &Element) -> WireOutcome {
        let mut state = self.state.lock();
        self.wire_locked(&mut state, element)
    }

    fn wire_locked(&self, state: &mut ManagerState, element: &Element) -> WireOutcome {
        if !element.is_media() {
            return WireOutcome::NotMedia;
        }
        let id = element.id();
        if state.tracker.is_tracked(id) {
            return WireOutcome::AlreadyWired;
        }
        if state.tracker.is_known(id) {
            return WireOutcome::Retired;
        }
        if !element.is_connected() {
            return WireOutcome::Detached;
        }
        let Some(pipeline) = state.pipeline.as_ref() else {
            return WireOutcome::Inert;
        };

        // Without a CORS request mode a cross-origin source outputs silence.
        if element.attribute("crossorigin").is_none() {
            element.set_attribute("crossorigin", "anonymous");
        }

        match Self::attach(pipeline, element) {
            Ok((source, stage)) => {
                // Subscribe before reading the native volume. A change in
                // between waits for the manager lock and re-reads it.
                let listener = element.on_volume_change(self.volume_listener(element.downgrade()));
                stage.set_gain(element.volume() * state.gain);
                state.tracker.track(
                    element,
                    WiredElement {
                        element: element.downgrade(),
                        source,
                        stage,
                        listener,
                    },
                );
                tracing::debug!(element = %id, tag = element.tag(), "media element boosted");
                WireOutcome::Wired
            }
            Err(e) => {
                tracing::debug!(element = %id, error = %e, "cannot boost element");
                state.tracker.reject(element);
                WireOutcome::Rejected
            }
        }
    }

    fn attach(pipeline: &Pipeline, element: &Element) -> Result<(NodeRef, GainStage), AudioError> {
        let context = &pipeline.context;
        let source = context.create_media_element_source(element)?;
        let stage = match context.create_gain() {
            Ok(stage) => stage,
            Err(e) => {
                context.release(source);
                return Err(e);
            }
        };
        let connected = context
            .connect(source, stage.node())
            .and_then(|()| context.connect(stage.node(), pipeline.master.node()));
        if let Err(e) = connected {
            context.release(source);
            context.release(stage.node());
            return Err(e);
        }
        Ok((source, stage))
    }

    /// Recompute an element's stage whenever its native volume changes.
    ///
    /// The volume is read under the manager lock rather than taken from the
    /// notification, so out-of-order notifications still settle on the
    /// element's current volume.
    fn volume_listener(&self, element: WeakElement) -> impl Fn(f32) + Send + Sync + 'static {
        let shared = Arc::downgrade(&self.state);
        move |_| {
            let (Some(shared), Some(element)) = (shared.upgrade(), element.upgrade()) else {
                return;
            };
            let state = shared.lock();
            if let Some(wired) = state.tracker.get(element.id()) {
                wired.stage.set_gain(element.volume() * state.gain);
            }
        }
    }

    /// Wire every attached media element. Returns how many were newly wired.
    pub fn scan_document(&self) -> usize {
        let media = self.realm.document().query_media();
        let mut state = self.state.lock();
        media
            .iter()
            .filter(|el| self.wire_locked(&mut state, el) == WireOutcome::Wired)
            .count()
    }

    /// Wire media in freshly inserted subtrees.
    ///
    /// A batch that brought any media in is followed by a full rescan.
    pub fn handle_mutations(&self, records: &[MutationRecord]) -> usize {
        let mut saw_media = false;
        let mut wired = 0;
        {
            let mut state = self.state.lock();
            for node in records.iter().flat_map(|r| r.added.iter()) {
                if !node.is_connected() {
                    continue;
                }
                let mut candidates = node.descendant_media();
                if node.is_media() {
                    candidates.insert(0, node.clone());
                }
                for element in candidates {
                    saw_media = true;
                    if self.wire_locked(&mut state, &element) == WireOutcome::Wired {
                        wired += 1;
                    }
                }
            }
        }
        if saw_media {
            wired += self.scan_document();
        }
        wired
    }

    /// Set the logical gain (clamped to 0.0 ~ 5.0) and apply it everywhere.
    ///
    /// Returns the applied gain. Persistence is queued, never awaited.
    pub fn set_volume(&self, gain: f32) -> f32 {
        let gain = clamp_gain(gain);
        let persist = {
            let mut state = self.state.lock();
            state.explicitly_set = true;
            self.apply_locked(&mut state, gain);
            state.persist.clone()
        };
        self.scan_document();

        if let Some(persist) = persist {
            if persist.send(gain).is_err() {
                tracing::debug!("volume persistence unavailable");
            }
        }
        tracing::debug!(gain, "volume set");
        gain
    }

    /// Apply a previously saved gain unless an explicit set already happened.
    pub fn restore_volume(&self, gain: f32) -> bool {
        let mut state = self.state.lock();
        if state.explicitly_set {
            tracing::debug!(gain, "ignoring stale restored volume");
            return false;
        }
        self.apply_locked(&mut state, clamp_gain(gain));
        true
    }

    fn apply_locked(&self, state: &mut ManagerState, gain: f32) {
        state.gain = gain;
        if let Some(pipeline) = state.pipeline.as_ref() {
            pipeline.master.set_gain(gain);
        }
        self.intercepted.apply(gain);
        for wired in state.tracker.iter() {
            if let Some(element) = wired.element.upgrade() {
                wired.stage.set_gain(element.volume() * gain);
            }
        }
    }

    /// Drop detached elements from the tracked set
    pub fn sweep(&self) -> SweepReport {
        let report = self.state.lock().tracker.sweep();
        if report.untracked > 0 || report.released > 0 {
            tracing::debug!(
                untracked = report.untracked,
                released = report.released,
                "element sweep"
            );
        }
        report
    }
}

impl std::fmt::Debug for GainGraphManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("GainGraphManager")
            .field("gain", &state.gain)
            .field("inert", &state.pipeline.is_none())
            .field("tracked", &state.tracker.len())
            .finish()
    }
}
