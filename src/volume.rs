//! Volume units, clamping, and the badge presentation contract
//!
//! Two units are in use: percentages (0–500) at the coordination layer and
//! linear gain multipliers (0.0–5.0) in the audio graph.

use serde::{Deserialize, Serialize};

/// Lowest percentage the controls accept
pub const MIN_PERCENT: f32 = 0.0;
/// Highest percentage the controls accept
pub const MAX_PERCENT: f32 = 500.0;
/// Percentage assumed when nothing is known about a page
pub const DEFAULT_PERCENT: f32 = 100.0;

/// Highest linear gain applied to any stage
pub const MAX_GAIN: f32 = MAX_PERCENT / 100.0;
/// Unity gain
pub const DEFAULT_GAIN: f32 = 1.0;

/// Clamp a percentage into `[MIN_PERCENT, MAX_PERCENT]`.
///
/// `NaN` maps to the minimum so a bad input can never produce a NaN gain.
pub fn clamp_percent(percent: f32) -> f32 {
    if percent.is_nan() {
        return MIN_PERCENT;
    }
    percent.clamp(MIN_PERCENT, MAX_PERCENT)
}

/// Clamp a linear gain into `[0.0, MAX_GAIN]`.
pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        return 0.0;
    }
    gain.clamp(0.0, MAX_GAIN)
}

/// Percentage → linear gain (clamped)
pub fn percent_to_gain(percent: f32) -> f32 {
    clamp_percent(percent) / 100.0
}

/// Linear gain → linear percentage (clamped, not rounded)
pub fn gain_to_percent(gain: f32) -> f32 {
    clamp_percent(gain * 100.0)
}

/// Linear gain → the integer percentage shown to the user
pub fn display_percent(gain: f32) -> u16 {
    clamp_percent((gain * 100.0).round()) as u16
}

/// Add `delta` percent to `current`, clamped.
pub fn step_percent(current: u16, delta: i32) -> u16 {
    clamp_percent(current as f32 + delta as f32) as u16
}

/// Severity band of a volume level, used for the badge color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBand {
    Safe,
    Warning,
    Caution,
    Unsafe,
    Danger,
}

impl ColorBand {
    /// Select the band for an integer percentage. Upper bounds are inclusive.
    pub fn for_percent(percent: u16) -> Self {
        match percent {
            0..=200 => ColorBand::Safe,
            201..=250 => ColorBand::Warning,
            251..=300 => ColorBand::Caution,
            301..=350 => ColorBand::Unsafe,
            _ => ColorBand::Danger,
        }
    }

    /// Background color for the badge
    pub fn hex(&self) -> &'static str {
        match self {
            ColorBand::Safe => "#66ff00",
            ColorBand::Warning => "#ffe600",
            ColorBand::Caution => "#ff9500",
            ColorBand::Unsafe => "#de007e",
            ColorBand::Danger => "#cb0000",
        }
    }
}

/// Whether a volume label at `percent` is drawn with light text
pub fn prefers_light_text(percent: u16) -> bool {
    percent >= 300 || percent <= 200
}

/// Toolbar indicator state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    pub color: Option<ColorBand>,
}

impl Badge {
    /// A badge showing `percent`
    pub fn for_percent(percent: u16) -> Self {
        Self {
            text: percent.to_string(),
            color: Some(ColorBand::for_percent(percent)),
        }
    }

    /// The empty badge shown when no data is available
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn is_cleared(&self) -> bool {
        self.text.is_empty()
    }
}
