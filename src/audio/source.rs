//! Source Node - media element and script-generated signals

use super::buffer::AudioBuffer;
use super::node::{AudioNode, NodeType};
use crate::dom::ElementId;
use std::any::Any;

/// ソースの識別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    /// `<audio>` / `<video>` 要素の出力。CORS 制限時は無音
    MediaElement { silenced: bool },
    /// ページのスクリプトが生成する信号（オシレーター等）
    Generator,
}

/// 入力ソースノード
pub struct SourceNode {
    kind: SourceKind,
    label: String,
    /// 出力する信号レベル
    signal: f32,
    output: AudioBuffer,
}

impl SourceNode {
    /// Source bound to a media element, producing nominal full-scale signal
    pub fn new_media_element(element: ElementId, silenced: bool) -> Self {
        Self {
            kind: SourceKind::MediaElement { silenced },
            label: format!("media {}", element),
            signal: 1.0,
            output: AudioBuffer::new(),
        }
    }

    /// Script-generated constant signal
    pub fn new_generator(level: f32, label: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Generator,
            label: label.into(),
            signal: level,
            output: AudioBuffer::new(),
        }
    }

    pub fn is_silenced(&self) -> bool {
        matches!(self.kind, SourceKind::MediaElement { silenced: true })
    }
}

impl AudioNode for SourceNode {
    fn node_type(&self) -> NodeType {
        NodeType::Source
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn input_buffer_mut(&mut self) -> Option<&mut AudioBuffer> {
        None // ソースは入力なし
    }

    fn output_buffer(&self) -> &AudioBuffer {
        &self.output
    }

    fn process(&mut self, frames: usize) {
        self.output.set_valid_frames(frames);
        let level = if self.is_silenced() { 0.0 } else { self.signal };
        self.output.fill(level);
        self.output.update_peak();
    }

    fn clear_buffers(&mut self, frames: usize) {
        self.output.clear(frames);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
