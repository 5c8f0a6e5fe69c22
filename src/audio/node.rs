//! AudioNode trait and core types

use super::buffer::AudioBuffer;
use std::any::Any;

/// Node の一意識別子
///
/// NodeHandle は不透明なIDであり、ノードの種類を示さない。
/// 種類はノード自体が持つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(u32);

impl NodeHandle {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl From<NodeHandle> for u32 {
    fn from(handle: NodeHandle) -> Self {
        handle.0
    }
}

/// ノードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Source,
    Gain,
    Destination,
}

/// オーディオノードの統一インターフェース
///
/// Source / Gain / Destination がこのトレイトを実装する。
/// すべてモノラル・1ポート。
pub trait AudioNode: Send + Sync {
    fn node_type(&self) -> NodeType;

    fn label(&self) -> &str;

    /// 入力バッファ（Source は None）
    fn input_buffer_mut(&mut self) -> Option<&mut AudioBuffer>;

    fn output_buffer(&self) -> &AudioBuffer;

    /// ノードの処理を実行
    ///
    /// - Source: 信号を生成 → 出力バッファへ
    /// - Gain: 入力 × gain → 出力
    /// - Destination: 入力 → 出力（メータリング用）
    fn process(&mut self, frames: usize);

    fn clear_buffers(&mut self, frames: usize);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
