//! Gain Node - linear level stage

use super::buffer::AudioBuffer;
use super::node::{AudioNode, NodeType};
use std::any::Any;

/// ゲインノード
///
/// 入力の合計に gain を掛けて出力する。デフォルトは 1.0。
pub struct GainNode {
    label: String,
    gain: f32,
    input: AudioBuffer,
    output: AudioBuffer,
}

impl GainNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            gain: 1.0,
            input: AudioBuffer::new(),
            output: AudioBuffer::new(),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Set gain (negative values are clamped to 0)
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }
}

impl AudioNode for GainNode {
    fn node_type(&self) -> NodeType {
        NodeType::Gain
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
        self.output.copy_scaled(&self.input, self.gain);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_scales_input() {
        let mut node = GainNode::new("g");
        node.clear_buffers(8);
        node.input_buffer_mut().unwrap().fill(0.5);
        node.set_gain(2.5);
        node.process(8);
        assert_eq!(node.output_buffer().cached_peak(), 1.25);
    }

    #[test]
    fn test_negative_gain_clamped() {
        let mut node = GainNode::new("g");
        node.set_gain(-3.0);
        assert_eq!(node.gain(), 0.0);
    }
}
