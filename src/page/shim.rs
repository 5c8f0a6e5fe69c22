//! Audio-context interception
//!
//! Decorates a realm's context constructor so every context a page script
//! builds sends its output through an interposed gain stage before it
//! reaches the device. The page still gets a plain [`AudioContext`] back.

use super::realm::Realm;
use crate::audio::{AudioContext, ContextFactory, GainStage};
use crate::error::AudioError;
use crate::volume::DEFAULT_GAIN;
use parking_lot::Mutex;
use std::sync::Arc;

struct Registry {
    stages: Vec<GainStage>,
    /// Gain applied to every stage, including ones registered later
    level: f32,
}

/// Interposed gain stages of one page
#[derive(Clone)]
pub struct InterceptedGains {
    inner: Arc<Mutex<Registry>>,
}

impl InterceptedGains {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                stages: Vec::new(),
                level: DEFAULT_GAIN,
            })),
        }
    }

    fn register(&self, stage: GainStage) {
        let mut registry = self.inner.lock();
        stage.set_gain(registry.level);
        registry.stages.push(stage);
    }

    /// Set every live stage to `gain`, dropping stages of closed contexts.
    /// Returns the number of live stages.
    pub fn apply(&self, gain: f32) -> usize {
        let mut registry = self.inner.lock();
        registry.level = gain;
        registry.stages.retain(|stage| stage.set_gain(gain));
        registry.stages.len()
    }

    pub fn level(&self) -> f32 {
        self.inner.lock().level
    }

    pub fn len(&self) -> usize {
        self.inner.lock().stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current gain of each registered stage
    pub fn gains(&self) -> Vec<f32> {
        self.inner.lock().stages.iter().map(|s| s.gain()).collect()
    }
}

impl std::fmt::Debug for InterceptedGains {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.lock();
        f.debug_struct("InterceptedGains")
            .field("stages", &registry.stages.len())
            .field("level", &registry.level)
            .finish()
    }
}

struct InterceptingFactory {
    original: Arc<dyn ContextFactory>,
    gains: InterceptedGains,
}

impl ContextFactory for InterceptingFactory {
    fn construct(&self) -> Result<AudioContext, AudioError> {
        let context = self.original.construct()?;
        let stage = context.create_gain()?;
        context.connect(stage.node(), context.device_destination())?;
        context.redirect_destination(stage.node())?;
        tracing::debug!(context = %context.id(), "intercepted page audio context");
        self.gains.register(stage);
        Ok(context)
    }
}

/// Install the interception shim on `realm`.
///
/// Installing twice is a no-op; both calls return the same collection.
pub fn install(realm: &Realm) -> InterceptedGains {
    realm
        .instrumentation()
        .get_or_init(|| {
            let gains = InterceptedGains::new();
            realm.replace_constructor(Arc::new(InterceptingFactory {
                original: realm.current_constructor(),
                gains: gains.clone(),
            }));
            tracing::info!("audio context interception installed");
            gains
        })
        .clone()
}
