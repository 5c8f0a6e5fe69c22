//! Audio Buffer implementation

use super::MAX_FRAMES;

/// モノラルオーディオバッファ
pub struct AudioBuffer {
    data: Box<[f32; MAX_FRAMES]>,
    valid_frames: usize,
    /// Cached peak level (updated during process)
    peak: f32,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self {
            data: Box::new([0.0; MAX_FRAMES]),
            valid_frames: 0,
            peak: 0.0,
        }
    }

    /// Clear the buffer (fill with zeros)
    pub fn clear(&mut self, frames: usize) {
        let frames = frames.min(MAX_FRAMES);
        self.data[..frames].fill(0.0);
        self.valid_frames = frames;
        self.peak = 0.0;
    }

    pub fn valid_frames(&self) -> usize {
        self.valid_frames
    }

    pub fn set_valid_frames(&mut self, frames: usize) {
        self.valid_frames = frames.min(MAX_FRAMES);
    }

    /// Fill the valid region with a constant level
    pub fn fill(&mut self, level: f32) {
        self.data[..self.valid_frames].fill(level);
    }

    /// Mix from another buffer: self += source
    pub fn mix_from(&mut self, source: &AudioBuffer) {
        let frames = self.valid_frames.min(source.valid_frames);
        for (dst, src) in self.data[..frames].iter_mut().zip(&source.data[..frames]) {
            *dst += *src;
        }
    }

    /// Copy from another buffer
    pub fn copy_from(&mut self, source: &AudioBuffer) {
        let frames = self.valid_frames.min(source.valid_frames);
        self.data[..frames].copy_from_slice(&source.data[..frames]);
    }

    /// Copy from another buffer with gain: self = source * gain
    pub fn copy_scaled(&mut self, source: &AudioBuffer, gain: f32) {
        let frames = self.valid_frames.min(source.valid_frames);
        for (dst, src) in self.data[..frames].iter_mut().zip(&source.data[..frames]) {
            *dst = *src * gain;
        }
    }

    /// Get cached peak level without recalculating
    pub fn cached_peak(&self) -> f32 {
        self.peak
    }

    /// Update peak cache
    pub fn update_peak(&mut self) {
        self.peak = self.data[..self.valid_frames]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new()
    }
}
