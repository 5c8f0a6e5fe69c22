//! Destination Node - the audio output device

use super::buffer::AudioBuffer;
use super::node::{AudioNode, NodeType};
use std::any::Any;

/// 出力先ノード（コンテキストごとに1つ）
pub struct DestinationNode {
    label: String,
    input: AudioBuffer,
    /// 最後に出力した信号（メータリング用）
    output: AudioBuffer,
}

impl DestinationNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            input: AudioBuffer::new(),
            output: AudioBuffer::new(),
        }
    }

    /// Peak level of the last rendered quantum
    pub fn level(&self) -> f32 {
        self.output.cached_peak()
    }
}

impl AudioNode for DestinationNode {
    fn node_type(&self) -> NodeType {
        NodeType::Destination
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn input_buffer_mut(&mut self) -> Option<&mut AudioBuffer> {
        Some(&mut self.input)
    }

    fn output_buffer(&self) -> &AudioBuffer {
        &self.output
    }

    fn process(&mut self, frames: usize) {
        self.output.set_valid_frames(frames);
        self.output.copy_from(&self.input);
        self.output.update_peak();
    }

    fn clear_buffers(&mut self, frames: usize) {
        self.input.clear(frames);
        self.output.clear(frames);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
