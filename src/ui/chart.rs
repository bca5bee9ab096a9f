use eframe::egui::Ui;
use egui_plot::{Legend, Line, Plot, PlotBounds, PlotPoints, Points};

use crate::color::track_color;
use crate::data::model::{Metric, Sample};
use crate::playback::player::WindowFrame;

// ---------------------------------------------------------------------------
// Windowed line chart
// ---------------------------------------------------------------------------

/// One chart of a metric against time. The x-range follows the playback
/// window and the y-range stays fixed so lines do not jump while playing.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    pub id: String,
    pub metric: Metric,
    pub y_domain: (f64, f64),
    /// Shade the area under the line.
    pub fill: bool,
    pub height: f32,
}

impl ChartRenderer {
    pub fn new(id: impl Into<String>, metric: Metric, y_domain: (f64, f64), fill: bool) -> Self {
        Self {
            id: id.into(),
            metric,
            y_domain,
            fill,
            height: 220.0,
        }
    }

    /// Draw `frame`, or an empty chart when nothing is playing.
    pub fn render(&self, ui: &mut Ui, frame: Option<&WindowFrame<'_>>) {
        let (y_min, y_max) = self.y_domain;
        let (x_min, x_max) = frame.map_or((0.0, 1.0), |f| (f.start, f.end()));

        Plot::new(self.id.as_str())
            .height(self.height)
            .legend(Legend::default())
            .x_axis_label("Time (s)")
            .y_axis_label(self.metric.axis_label())
            .allow_boxed_zoom(false)
            .allow_drag(false)
            .allow_scroll(false)
            .allow_zoom(false)
            .show(ui, |plot_ui| {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max([x_min, y_min], [x_max, y_max]));

                let Some(frame) = frame else {
                    return;
                };
                for track in &frame.tracks {
                    let points = line_points(track.visible, self.metric);
                    if points.is_empty() {
                        continue;
                    }
                    let color = track_color(track.label, self.metric);
                    let head = points[points.len() - 1];

                    let mut line = Line::new(PlotPoints::from(points))
                        .name(track.label.to_string())
                        .color(color)
                        .width(2.0);
                    if self.fill {
                        line = line.fill(y_min as f32);
                    }
                    plot_ui.line(line);

                    // position indicator
                    plot_ui.points(Points::new(vec![head]).radius(4.0).color(color));
                }
            });
    }
}

/// Plot coordinates of the visible samples for one metric.
pub fn line_points(visible: &[Sample], metric: Metric) -> Vec<[f64; 2]> {
    visible.iter().map(|s| [s.time, metric.value(s)]).collect()
}
