//! Booster - per-page media volume boosting
//!
//! Each page gets a gain graph that routes its media elements (and any audio
//! contexts the page builds itself) through gain stages, so the page can be
//! played louder than its own controls allow. A process-wide coordinator
//! remembers volumes per page and keeps the toolbar badge current.
//!
//! The browser side is modeled headlessly: `dom` is the page tree, `audio` the
//! Web Audio graph, and `messaging` the runtime message channel.

pub mod audio;
pub mod config;
pub mod coordinator;
pub mod dom;
pub mod error;
pub mod messaging;
pub mod page;
pub mod volume;

pub use config::BoosterConfig;
pub use coordinator::{AudiblePage, TabStatus, VolumeCoordinator};
pub use error::{AudioError, ConfigError, TransportError};
pub use messaging::{MessageBus, PageId};
pub use page::{GainGraphManager, PageAgent, Realm};
pub use volume::{Badge, ColorBand};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "BOOSTER_LOG";

/// Install the global tracing subscriber.
///
/// The filter comes from `BOOSTER_LOG` (e.g. `booster_lib=debug`) and
/// defaults to `info`. Later calls are no-ops.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
