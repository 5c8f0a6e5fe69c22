//! A page's script realm: its document, its audio-context constructor, and
//! the handful of values it exposes on its global scope.

use super::shim::InterceptedGains;
use crate::audio::{AudioContext, ContextFactory, GainStage, NativeContextFactory};
use crate::dom::Document;
use crate::error::AudioError;
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

pub struct Realm {
    document: Document,
    /// The platform constructor, kept for privileged callers
    native: Arc<dyn ContextFactory>,
    /// The constructor page scripts see
    constructor: RwLock<Arc<dyn ContextFactory>>,
    /// Set once the interception shim is installed
    instrumented: OnceLock<InterceptedGains>,
    /// Master gain published for the in-page probe
    exposed_gain: RwLock<Option<GainStage>>,
}

impl Realm {
    pub fn new(document: Document, native: impl ContextFactory + 'static) -> Self {
        let native: Arc<dyn ContextFactory> = Arc::new(native);
        Self {
            document,
            constructor: RwLock::new(native.clone()),
            native,
            instrumented: OnceLock::new(),
            exposed_gain: RwLock::new(None),
        }
    }

    /// A realm on a platform with working audio output
    pub fn with_audio(document: Document) -> Self {
        Self::new(document, NativeContextFactory::new())
    }

    /// A realm whose platform cannot construct audio contexts
    pub fn without_audio(document: Document) -> Self {
        Self::new(document, NativeContextFactory::unavailable())
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// `new AudioContext()` as evaluated by the page's own scripts
    pub fn new_audio_context(&self) -> Result<AudioContext, AudioError> {
        let constructor = self.constructor.read().clone();
        constructor.construct()
    }

    /// The undecorated platform constructor
    pub fn native_constructor(&self) -> Arc<dyn ContextFactory> {
        self.native.clone()
    }

    pub(crate) fn current_constructor(&self) -> Arc<dyn ContextFactory> {
        self.constructor.read().clone()
    }

    pub(crate) fn replace_constructor(&self, constructor: Arc<dyn ContextFactory>) {
        *self.constructor.write() = constructor;
    }

    pub(crate) fn instrumentation(&self) -> &OnceLock<InterceptedGains> {
        &self.instrumented
    }

    /// Whether the interception shim has been installed
    pub fn is_instrumented(&self) -> bool {
        self.instrumented.get().is_some()
    }

    pub(crate) fn expose_gain(&self, stage: GainStage) {
        *self.exposed_gain.write() = Some(stage);
    }

    /// Read the published master gain, `None` when nothing was published
    pub fn probe_gain(&self) -> Option<f32> {
        self.exposed_gain.read().as_ref().map(|stage| stage.gain())
    }
}

impl std::fmt::Debug for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realm")
            .field("document", &self.document)
            .field("instrumented", &self.is_instrumented())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_empty_until_published() {
        let realm = Realm::with_audio(Document::new());
        assert_eq!(realm.probe_gain(), None);

        let ctx = realm.new_audio_context().unwrap();
        let stage = ctx.create_gain().unwrap();
        stage.set_gain(1.75);
        realm.expose_gain(stage);
        assert_eq!(realm.probe_gain(), Some(1.75));
    }

    #[test]
    fn test_realm_without_audio() {
        let realm = Realm::without_audio(Document::new());
        assert!(matches!(realm.new_audio_context(), Err(AudioError::Unavailable)));
    }
}
