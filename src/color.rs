use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::classify::GroupKey;
use crate::data::insights::{Comparison, Sex};
use crate::data::model::Metric;
use crate::playback::player::TrackLabel;

// ---------------------------------------------------------------------------
// Fixed colours
// ---------------------------------------------------------------------------

const HEALTHY: &str = "#6c90b0";
const ASTHMA: &str = "#e57a77";
const SMOKER: &str = "#9b59b6";
const VAPER: &str = "#f1c40f";
const CHEST: &str = "#7ca1cc";
const INHALE: &str = "#3498db";
const EXHALE: &str = "#e74c3c";
const TREND: &str = "#2c3e50";

/// Parse `#rrggbb`; malformed input falls back to grey.
pub fn hex_color(hex: &str) -> Color32 {
    match hex.parse::<Srgb<u8>>() {
        Ok(rgb) => Color32::from_rgb(rgb.red, rgb.green, rgb.blue),
        Err(e) => {
            log::warn!("bad colour {hex:?}: {e}");
            Color32::GRAY
        }
    }
}

/// The same hue with a different HSL lightness (0..1).
pub fn with_lightness(color: Color32, lightness: f32) -> Color32 {
    let rgb: Srgb = Srgb::new(color.r(), color.g(), color.b()).into_format();
    let mut hsl: Hsl = rgb.into_color();
    hsl.lightness = lightness.clamp(0.0, 1.0);
    let rgb: Srgb = hsl.into_color();
    let rgb: Srgb<u8> = rgb.into_format();
    Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
}

pub fn group_color(group: GroupKey) -> Color32 {
    match group {
        GroupKey::Normal => hex_color(HEALTHY),
        GroupKey::Asthma => hex_color(ASTHMA),
        GroupKey::Smoker => hex_color(SMOKER),
        GroupKey::Vaper => hex_color(VAPER),
        GroupKey::Unknown => Color32::GRAY,
    }
}

pub fn metric_color(metric: Metric) -> Color32 {
    match metric {
        Metric::Flow | Metric::Volume => hex_color(INHALE),
        Metric::Chest => hex_color(CHEST),
        Metric::Abdomen => hex_color(ASTHMA),
        Metric::Pressure => hex_color(SMOKER),
        Metric::Ratio => hex_color(TREND),
    }
}

/// Line colour for a track: group colour in comparisons, metric colour for a
/// single subject.
pub fn track_color(label: TrackLabel, metric: Metric) -> Color32 {
    match label {
        TrackLabel::Group(g) => group_color(g),
        TrackLabel::Subject(_) => metric_color(metric),
    }
}

/// Colours of the two cohorts of a comparison, in split order.
pub fn cohort_colors(comparison: Comparison) -> [Color32; 2] {
    let healthy = hex_color(HEALTHY);
    match comparison {
        Comparison::Asthma => [hex_color(ASTHMA), healthy],
        Comparison::Smoking => [hex_color(SMOKER), healthy],
        Comparison::Vaping => [hex_color(VAPER), healthy],
        Comparison::Sex => [sex_color(Some(Sex::Male)), sex_color(Some(Sex::Female))],
    }
}

pub fn sex_color(sex: Option<Sex>) -> Color32 {
    match sex {
        Some(Sex::Male) => hex_color(INHALE),
        Some(Sex::Female) => hex_color(EXHALE),
        None => Color32::GRAY,
    }
}

pub fn trend_color() -> Color32 {
    hex_color(TREND)
}

/// Lung gauge colour by breathing direction.
pub fn breath_color(inhaling: bool) -> Color32 {
    hex_color(if inhaling { INHALE } else { EXHALE })
}

// ---------------------------------------------------------------------------
// Category palette
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.55, 0.6);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours() {
        assert_eq!(hex_color("#6c90b0"), Color32::from_rgb(0x6c, 0x90, 0xb0));
        assert_eq!(hex_color("nonsense"), Color32::GRAY);
    }

    #[test]
    fn lightness_extremes_are_black_and_white() {
        let c = group_color(GroupKey::Asthma);
        assert_eq!(with_lightness(c, 0.0), Color32::BLACK);
        assert_eq!(with_lightness(c, 1.0), Color32::WHITE);
    }

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        let colours = generate_palette(4);
        assert_eq!(colours.len(), 4);
        assert_ne!(colours[0], colours[2]);
    }

    #[test]
    fn cohorts_get_distinct_colours() {
        for comparison in [Comparison::Asthma, Comparison::Smoking, Comparison::Vaping, Comparison::Sex] {
            let [a, b] = cohort_colors(comparison);
            assert_ne!(a, b, "{comparison:?}");
        }
        assert_eq!(cohort_colors(Comparison::Sex)[0], Color32::from_rgb(0x34, 0x98, 0xdb));
    }

    #[test]
    fn comparison_tracks_use_group_colours() {
        assert_eq!(
            track_color(TrackLabel::Group(GroupKey::Vaper), Metric::Chest),
            group_color(GroupKey::Vaper)
        );
    }
}
