//! In-page side of the booster
//!
//! - `realm`: the page's script scope (document, AudioContext constructor)
//! - `shim`: AudioContext interception for page-created contexts
//! - `tracker`: bookkeeping of routed media elements
//! - `manager`: the per-page gain graph
//! - `agent`: async tasks that drive the manager

mod agent;
mod manager;
mod realm;
pub mod shim;
mod tracker;

pub use agent::{handle_request, PageAgent};
pub use manager::{GainGraphManager, WireOutcome};
pub use realm::Realm;
pub use shim::{install, InterceptedGains};
pub use tracker::SweepReport;
