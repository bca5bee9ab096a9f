use eframe::egui::{self, Color32, RichText, Stroke, Ui};
use egui_plot::{Legend, Line, LineStyle, MarkerShape, Plot, PlotPoints, Points, Polygon};

use crate::color::{cohort_colors, metric_color, sex_color, trend_color};
use crate::data::insights::{AgePoint, AgeRange, BandPoint, Comparison, Sex, age_points, linear_regression};
use crate::data::model::Metric;
use crate::state::{AppState, CohortBand, InsightTab, SEX_METRICS};

// ---------------------------------------------------------------------------
// Insights view
// ---------------------------------------------------------------------------

pub fn insights_view(ui: &mut Ui, state: &mut AppState) {
    if state.subjects.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            if state.loading_subjects {
                ui.spinner();
            } else {
                ui.heading("No subjects loaded");
            }
        });
        return;
    }
    state.ensure_insights();

    ui.horizontal(|ui: &mut Ui| {
        for tab in InsightTab::ALL {
            ui.selectable_value(&mut state.insights.tab, tab, tab.label());
        }
    });
    controls(ui, state);
    ui.separator();

    if state.insights.loading {
        ui.horizontal(|ui: &mut Ui| {
            ui.spinner();
            ui.label("Loading cohort recordings…");
        });
        return;
    }

    let comparison = state.insights.comparison();
    let metric = state.insights.metric();
    let (bin_width, window) = (state.config.insights.bin_width, state.config.insights.window);
    let chart_height = (ui.available_height() * 0.5).max(220.0);

    let bands = state.insights.bands(&state.subjects, bin_width, window);
    if comparison.is_none() && bands.iter().all(|b| b.members == 0) {
        ui.label(format!(
            "No participants in the {} age range",
            state.insights.age_range.label()
        ));
    } else {
        let colors = match comparison {
            Some(c) => cohort_colors(c).to_vec(),
            None => vec![metric_color(Metric::Flow)],
        };
        ui.strong(format!("Mean {} with 95% confidence interval", metric.label()));
        band_chart(ui, bands, &colors, metric, chart_height);
        summary(ui, bands, &colors);
    }

    if state.insights.tab == InsightTab::Age {
        ui.separator();
        let mean_flow = state.insights.data.as_ref().map(|d| &d.mean_flow);
        let points = mean_flow.map_or_else(Vec::new, |m| age_points(&state.subjects, m));
        ui.strong("Age vs. mean flow");
        age_scatter(ui, &points, chart_height);
    }
}

fn controls(ui: &mut Ui, state: &mut AppState) {
    let insights = &mut state.insights;
    match insights.tab {
        InsightTab::Asthma => {}
        InsightTab::SmokingVaping => {
            ui.horizontal(|ui: &mut Ui| {
                for substance in [Comparison::Smoking, Comparison::Vaping] {
                    ui.selectable_value(&mut insights.substance, substance, substance.label());
                }
            });
        }
        InsightTab::Sex => {
            ui.horizontal(|ui: &mut Ui| {
                ui.strong("Metric");
                egui::ComboBox::from_id_salt("sex_metric")
                    .selected_text(insights.sex_metric.label())
                    .show_ui(ui, |ui: &mut Ui| {
                        for metric in SEX_METRICS {
                            ui.selectable_value(&mut insights.sex_metric, metric, metric.label());
                        }
                    });
            });
        }
        InsightTab::Age => {
            ui.horizontal(|ui: &mut Ui| {
                ui.strong("Age group");
                for range in AgeRange::PRESETS {
                    ui.selectable_value(&mut insights.age_range, range, range.label());
                }
            });
        }
    }
}

/// Counts per cohort under the chart.
fn summary(ui: &mut Ui, bands: &[CohortBand], colors: &[Color32]) {
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for (band, color) in bands.iter().zip(colors) {
            let recorded = band.points.iter().map(|p| p.n).max().unwrap_or(0);
            ui.label(
                RichText::new(format!(
                    "{}: {} subjects, {recorded} with recordings",
                    band.label, band.members
                ))
                .color(*color),
            );
            ui.separator();
        }
    });
}

fn band_chart(ui: &mut Ui, bands: &[CohortBand], colors: &[Color32], metric: Metric, height: f32) {
    Plot::new("insight_bands")
        .height(height)
        .legend(Legend::default())
        .x_axis_label("Time (s)")
        .y_axis_label(metric.axis_label())
        .allow_boxed_zoom(false)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .show(ui, |plot_ui| {
            for (band, &color) in bands.iter().zip(colors) {
                let shade = color.gamma_multiply(0.25);
                for quad in band_quads(&band.points) {
                    plot_ui.polygon(
                        Polygon::new(PlotPoints::from(quad.to_vec()))
                            .fill_color(shade)
                            .stroke(Stroke::NONE),
                    );
                }
                let mean: PlotPoints = band.points.iter().map(|p| [p.time, p.mean]).collect();
                plot_ui.line(
                    Line::new(mean)
                        .name(format!("{} (n = {})", band.label, band.members))
                        .color(color)
                        .width(2.0),
                );
            }
        });
}

/// The interval between neighbouring bins as convex quads, since plot
/// polygons are filled as convex shapes.
pub fn band_quads(points: &[BandPoint]) -> Vec<[[f64; 2]; 4]> {
    points
        .windows(2)
        .map(|w| {
            let (a, b) = (&w[0], &w[1]);
            [
                [a.time, a.lower],
                [b.time, b.lower],
                [b.time, b.upper],
                [a.time, a.upper],
            ]
        })
        .collect()
}

fn age_scatter(ui: &mut Ui, points: &[AgePoint], height: f32) {
    if points.is_empty() {
        ui.label("No subjects with both an age and a recording");
        return;
    }
    let xy: Vec<[f64; 2]> = points.iter().map(|p| [p.age, p.mean_flow]).collect();
    let fit = linear_regression(&xy);
    let (min_age, max_age) = xy
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    Plot::new("age_scatter")
        .height(height)
        .legend(Legend::default())
        .x_axis_label("Age (years)")
        .y_axis_label(Metric::Flow.axis_label())
        .allow_boxed_zoom(false)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .show(ui, |plot_ui| {
            for sex in [Some(Sex::Male), Some(Sex::Female), None] {
                for asthma in [false, true] {
                    let group: Vec<[f64; 2]> = points
                        .iter()
                        .filter(|p| p.sex == sex && p.asthma == asthma)
                        .map(|p| [p.age, p.mean_flow])
                        .collect();
                    if group.is_empty() {
                        continue;
                    }
                    let shape = if asthma { MarkerShape::Diamond } else { MarkerShape::Circle };
                    plot_ui.points(
                        Points::new(group)
                            .name(scatter_label(sex, asthma))
                            .shape(shape)
                            .filled(true)
                            .radius(5.0)
                            .color(sex_color(sex)),
                    );
                }
            }
            if let Some(fit) = fit {
                let trend = vec![[min_age, fit.at(min_age)], [max_age, fit.at(max_age)]];
                plot_ui.line(
                    Line::new(PlotPoints::from(trend))
                        .name("Trend")
                        .color(trend_color())
                        .style(LineStyle::dashed_loose())
                        .width(2.0),
                );
            }
        });

    if let Some(fit) = fit {
        ui.label(format!(
            "Trend: {:+.4} L/s per year (n = {})",
            fit.slope,
            points.len()
        ));
    }
}

fn scatter_label(sex: Option<Sex>, asthma: bool) -> String {
    let sex = match sex {
        Some(Sex::Male) => "Male",
        Some(Sex::Female) => "Female",
        None => "Unknown sex",
    };
    if asthma {
        format!("{sex}, asthmatic")
    } else {
        sex.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(time: f64, lower: f64, upper: f64) -> BandPoint {
        BandPoint {
            time,
            n: 2,
            mean: (lower + upper) / 2.0,
            lower,
            upper,
        }
    }

    #[test]
    fn quads_span_neighbouring_bins() {
        let quads = band_quads(&[point(0.0, 1.0, 2.0), point(0.1, 0.5, 3.0), point(0.2, 1.0, 1.0)]);
        assert_eq!(quads.len(), 2);
        assert_eq!(quads[0], [[0.0, 1.0], [0.1, 0.5], [0.1, 3.0], [0.0, 2.0]]);
        assert_eq!(quads[1][2], [0.2, 1.0]);
    }

    #[test]
    fn single_bin_has_no_quads() {
        assert!(band_quads(&[point(0.0, 1.0, 2.0)]).is_empty());
        assert!(band_quads(&[]).is_empty());
    }

    #[test]
    fn scatter_labels_name_asthma() {
        assert_eq!(scatter_label(Some(Sex::Female), true), "Female, asthmatic");
        assert_eq!(scatter_label(None, false), "Unknown sex");
    }
}
