use eframe::egui::{self, Ui};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Bar, BarChart, Legend, Plot};

use crate::color::{generate_palette, group_color};
use crate::data::demographics::{GroupingField, age_histogram, category_counts};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Demographics view
// ---------------------------------------------------------------------------

pub fn demographics_view(ui: &mut Ui, state: &mut AppState) {
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

    ui.horizontal(|ui: &mut Ui| {
        ui.strong("Group by");
        egui::ComboBox::from_id_salt("grouping_field")
            .selected_text(state.grouping_field.label())
            .show_ui(ui, |ui: &mut Ui| {
                for field in GroupingField::ALL {
                    ui.selectable_value(&mut state.grouping_field, field, field.label());
                }
            });
        ui.label(format!("{} subjects", state.subjects.len()));
    });
    ui.separator();

    let chart_height = (ui.available_height() * 0.45).max(160.0);
    ui.columns(2, |cols| {
        category_chart(&mut cols[0], state, chart_height);
        age_chart(&mut cols[1], state, chart_height);
    });
    ui.separator();

    subject_table(ui, state);
}

/// One bar per category so each gets its own legend entry.
fn category_chart(ui: &mut Ui, state: &AppState, height: f32) {
    let counts = category_counts(&state.subjects, state.grouping_field);
    let palette = generate_palette(counts.len());

    ui.strong(format!("Subjects by {}", state.grouping_field.label()));
    Plot::new("category_counts")
        .height(height)
        .legend(Legend::default())
        .y_axis_label("Subjects")
        .show_x(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for (i, ((category, count), color)) in counts.iter().zip(palette).enumerate() {
                let bar = Bar::new(i as f64, *count as f64).width(0.7).fill(color);
                plot_ui.bar_chart(BarChart::new(vec![bar]).name(category).color(color));
            }
        });
}

fn age_chart(ui: &mut Ui, state: &AppState, height: f32) {
    let width = state.config.age_bin_width;
    let bars: Vec<Bar> = age_histogram(&state.subjects, width)
        .iter()
        .map(|b| {
            Bar::new((b.start + b.end) / 2.0, b.count as f64)
                .width(width * 0.9)
                .name(format!("{:.0}-{:.0}", b.start, b.end))
        })
        .collect();

    ui.strong("Age distribution");
    Plot::new("age_histogram")
        .height(height)
        .x_axis_label("Age (years)")
        .y_axis_label("Subjects")
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name("Age"));
        });
}

fn subject_table(ui: &mut Ui, state: &AppState) {
    let subjects = &state.subjects;
    let headers = [
        "Subject", "Group", "Sex", "Age", "Height", "Weight", "Asthma", "Smoking", "Vaping",
    ];

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .column(Column::auto().at_least(60.0))
        .columns(Column::auto().at_least(50.0), headers.len() - 1)
        .header(20.0, |mut header| {
            for title in headers {
                header.col(|ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, subjects.len(), |mut row| {
                let s = &subjects[row.index()];
                let flag = |set: bool| if set { "Yes" } else { "No" };

                row.col(|ui| {
                    ui.label(s.id.to_string());
                });
                row.col(|ui| {
                    ui.colored_label(group_color(s.group), s.group.label());
                });
                row.col(|ui| {
                    ui.label(s.sex.as_deref().unwrap_or("-"));
                });
                for value in [s.age, s.height, s.weight] {
                    row.col(|ui| {
                        ui.label(value.map_or("-".to_string(), |v| format!("{v:.0}")));
                    });
                }
                for set in [s.asthma, s.smoking_history, s.vaping_history] {
                    row.col(|ui| {
                        ui.label(flag(set));
                    });
                }
            });
        });
}
