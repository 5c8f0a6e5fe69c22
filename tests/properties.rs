//! Property-based tests for volume clamping and the page gain graph.

use booster_lib::dom::{Document, Element};
use booster_lib::volume::{
    clamp_gain, clamp_percent, display_percent, step_percent, ColorBand, MAX_GAIN, MAX_PERCENT,
};
use booster_lib::{GainGraphManager, Realm};
use proptest::prelude::*;
use std::sync::Arc;

fn band_rank(band: ColorBand) -> u8 {
    match band {
        ColorBand::Safe => 0,
        ColorBand::Warning => 1,
        ColorBand::Caution => 2,
        ColorBand::Unsafe => 3,
        ColorBand::Danger => 4,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Any input, NaN and infinities included, clamps into range.
    #[test]
    fn clamp_percent_in_range(p in prop::num::f32::ANY) {
        let c = clamp_percent(p);
        prop_assert!((0.0..=MAX_PERCENT).contains(&c), "clamp_percent({}) = {}", p, c);
        prop_assert_eq!(clamp_percent(c), c);
    }

    #[test]
    fn clamp_gain_in_range(g in prop::num::f32::ANY) {
        let c = clamp_gain(g);
        prop_assert!((0.0..=MAX_GAIN).contains(&c), "clamp_gain({}) = {}", g, c);
        prop_assert_eq!(clamp_gain(c), c);
    }

    /// In-range values pass through untouched.
    #[test]
    fn clamp_gain_identity_in_range(g in 0.0f32..=5.0f32) {
        prop_assert_eq!(clamp_gain(g), g);
    }

    #[test]
    fn stepping_stays_in_range(current in 0u16..=500, delta in -1000i32..1000) {
        let stepped = step_percent(current, delta);
        prop_assert!(stepped <= 500);
        if (0..=500).contains(&(current as i32 + delta)) {
            prop_assert_eq!(stepped as i32, current as i32 + delta);
        }
    }

    #[test]
    fn display_percent_in_range(g in prop::num::f32::ANY) {
        prop_assert!(display_percent(g) <= 500);
    }

    /// Louder never maps to a calmer band.
    #[test]
    fn bands_are_monotonic(a in 0u16..=500, b in 0u16..=500) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(band_rank(ColorBand::for_percent(lo)) <= band_rank(ColorBand::for_percent(hi)));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// set_volume then volume() returns the clamped value exactly, and
    /// every stage carries it.
    #[test]
    fn set_then_get_is_exact(gain in -2.0f32..8.0f32, native in 0.0f32..=1.0f32) {
        let document = Document::new();
        let audio = Element::audio();
        audio.set_volume(native);
        document.append_child(document.body(), &audio);
        let manager = GainGraphManager::new(Arc::new(Realm::with_audio(document)));
        manager.scan_document();

        let applied = manager.set_volume(gain);
        prop_assert_eq!(applied, clamp_gain(gain));
        prop_assert_eq!(manager.volume(), applied);
        prop_assert_eq!(manager.master_gain(), Some(applied));
        prop_assert_eq!(manager.element_gain(&audio), Some(audio.volume() * applied));
    }

    /// Wiring the same element repeatedly never adds a second source.
    #[test]
    fn wiring_is_idempotent(repeats in 1usize..8) {
        let document = Document::new();
        let video = Element::video();
        document.append_child(document.body(), &video);
        let manager = GainGraphManager::new(Arc::new(Realm::with_audio(document)));

        for _ in 0..repeats {
            manager.wire(&video);
            manager.scan_document();
        }
        prop_assert_eq!(manager.tracked_count(), 1);
        prop_assert_eq!(video.volume_listener_count(), 1);
    }
}
