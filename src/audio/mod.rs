//! Audio Graph Module - gain-stage routing per audio context
//!
//! レベル制御はすべて Gain ノードで行う。
//! Source と Destination は信号の出入口のみを担当する。

mod buffer;
mod context;
mod edge;
mod graph;
mod node;

pub mod gain;
pub mod sink;
pub mod source;

pub use buffer::AudioBuffer;
pub use context::{AudioContext, ContextFactory, ContextId, GainStage, NativeContextFactory, NodeRef};
pub use edge::{Edge, EdgeId};
pub use graph::AudioGraph;
pub use node::{AudioNode, NodeHandle, NodeType};

/// Maximum frames per render call
pub const MAX_FRAMES: usize = 4096;

/// Frames rendered per quantum
pub const QUANTUM_FRAMES: usize = 128;
