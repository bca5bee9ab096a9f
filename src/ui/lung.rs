use eframe::egui::{self, Align2, Color32, FontId, Sense, Stroke, Ui};

use crate::color::{breath_color, metric_color, with_lightness};
use crate::data::model::{Metric, Sample, Series};

// ---------------------------------------------------------------------------
// Lung / chest / abdomen gauges
// ---------------------------------------------------------------------------

const MIN_RADIUS: f32 = 18.0;
const MAX_RADIUS: f32 = 60.0;
/// Relative size change of the chest and abdomen circles at the series extremes.
const AMPLIFICATION: f32 = 0.35;

/// Per-series scaling for the gauges, computed once when a series is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeScales {
    pub max_flow: f64,
    pub chest: MotionScale,
    pub abdomen: MotionScale,
}

/// Mean and largest deviation of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionScale {
    pub mean: f64,
    pub span: f64,
}

impl MotionScale {
    fn of(series: &Series, metric: Metric) -> Self {
        let mean = series.mean(metric).unwrap_or(0.0);
        let span = series
            .samples()
            .iter()
            .map(|s| (metric.value(s) - mean).abs())
            .filter(|d| d.is_finite())
            .fold(0.0, f64::max);
        MotionScale { mean, span }
    }

    /// Circle radius around `base`, growing above the mean and shrinking below.
    pub fn radius(&self, value: f64, base: f32) -> f32 {
        if !(self.span > 0.0) || !value.is_finite() {
            return base;
        }
        let t = ((value - self.mean) / self.span).clamp(-1.0, 1.0) as f32;
        base * (1.0 + AMPLIFICATION * t)
    }
}

impl GaugeScales {
    pub fn from_series(series: &Series) -> Self {
        GaugeScales {
            max_flow: series.max_abs_flow(),
            chest: MotionScale::of(series, Metric::Chest),
            abdomen: MotionScale::of(series, Metric::Abdomen),
        }
    }

    /// Map flow in `[-max_flow, max_flow]` linearly onto the radius range.
    pub fn lung_radius(&self, flow: f64) -> f32 {
        if !(self.max_flow > 0.0) || !flow.is_finite() {
            return (MIN_RADIUS + MAX_RADIUS) / 2.0;
        }
        let t = ((flow / self.max_flow + 1.0) / 2.0).clamp(0.0, 1.0) as f32;
        MIN_RADIUS + t * (MAX_RADIUS - MIN_RADIUS)
    }
}

/// Draw the lung gauge next to the chest and abdomen circles.
pub fn gauges(ui: &mut Ui, scales: &GaugeScales, sample: Option<&Sample>) {
    let size = egui::vec2(ui.available_width().min(3.0 * 2.2 * MAX_RADIUS), 2.4 * MAX_RADIUS);
    let (rect, _) = ui.allocate_exact_size(size, Sense::hover());
    let painter = ui.painter_at(rect);
    let cell = rect.width() / 3.0;
    let centre = |i: usize| egui::pos2(rect.left() + cell * (i as f32 + 0.5), rect.center().y - 8.0);
    let caption = |i: usize, text: &str| {
        painter.text(
            egui::pos2(centre(i).x, rect.bottom() - 4.0),
            Align2::CENTER_BOTTOM,
            text,
            FontId::proportional(13.0),
            ui.visuals().text_color(),
        );
    };

    let Some(sample) = sample else {
        for i in 0..3 {
            painter.circle_stroke(centre(i), MIN_RADIUS, Stroke::new(1.0, Color32::GRAY));
        }
        return;
    };

    let inhaling = sample.flow >= 0.0;
    let lung = breath_color(inhaling);
    painter.circle(
        centre(0),
        scales.lung_radius(sample.flow),
        with_lightness(lung, 0.75),
        Stroke::new(2.0, lung),
    );
    caption(0, if inhaling { "Inhale" } else { "Exhale" });

    let base = (MIN_RADIUS + MAX_RADIUS) / 2.0;
    for (i, metric, scale) in [
        (1, Metric::Chest, &scales.chest),
        (2, Metric::Abdomen, &scales.abdomen),
    ] {
        let color = metric_color(metric);
        painter.circle(
            centre(i),
            scale.radius(metric.value(sample), base),
            with_lightness(color, 0.8),
            Stroke::new(2.0, color),
        );
        caption(i, metric.label());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> Series {
        [-1.0, 0.5, 2.0]
            .iter()
            .enumerate()
            .map(|(i, &flow)| Sample {
                time: i as f64,
                flow,
                chest: 10.0 + i as f64,
                abdomen: 5.0,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn lung_radius_spans_the_flow_range() {
        let scales = GaugeScales::from_series(&series());
        assert_eq!(scales.max_flow, 2.0);
        assert_eq!(scales.lung_radius(-2.0), MIN_RADIUS);
        assert_eq!(scales.lung_radius(2.0), MAX_RADIUS);
        assert_eq!(scales.lung_radius(0.0), (MIN_RADIUS + MAX_RADIUS) / 2.0);
        // out-of-range flow is clamped
        assert_eq!(scales.lung_radius(9.0), MAX_RADIUS);
    }

    #[test]
    fn motion_is_amplified_around_the_mean() {
        let scales = GaugeScales::from_series(&series());
        assert_eq!(scales.chest.mean, 11.0);
        assert_eq!(scales.chest.radius(11.0, 40.0), 40.0);
        assert!(scales.chest.radius(12.0, 40.0) > 40.0);
        assert!(scales.chest.radius(10.0, 40.0) < 40.0);
        // constant abdomen stays at the base size
        assert_eq!(scales.abdomen.radius(5.0, 40.0), 40.0);
    }

    #[test]
    fn silent_series_uses_the_middle_radius() {
        let scales = GaugeScales::from_series(&Series::default());
        assert_eq!(scales.lung_radius(0.3), (MIN_RADIUS + MAX_RADIUS) / 2.0);
    }
}
