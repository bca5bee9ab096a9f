use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::color::{breath_color, group_color};
use crate::data::classify::GroupKey;
use crate::data::loader::Dataset;
use crate::data::model::Metric;
use crate::playback::breath::DetectorPolicy;
use crate::state::{AppState, Panel, PanelKind, Selection, View};
use crate::ui::lung;

// ---------------------------------------------------------------------------
// Left side panel – selection and playback controls
// ---------------------------------------------------------------------------

/// Render the left control panel for the active view.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Respira Viewer");
    ui.separator();

    let Some(root) = state.dataset.as_ref().map(|d| d.root().display().to_string()) else {
        ui.label("No dataset loaded.");
        if ui.button("Open dataset folder…").clicked() {
            open_folder_dialog(state);
        }
        return;
    };
    ui.label(RichText::new(root).small());
    if state.loading_subjects {
        ui.horizontal(|ui: &mut Ui| {
            ui.spinner();
            ui.label("Loading subjects…");
        });
    }
    ui.separator();

    let kind = match state.view {
        View::Breathing => PanelKind::Breathing,
        View::ChestAbdomen => PanelKind::ChestAbdomen,
        View::Demographics | View::Insights => {
            ui.label(format!("{} subjects", state.subjects.len()));
            return;
        }
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            selection_combo(ui, state, kind);
            ui.separator();

            // ---- Playback ----
            ui.strong("Speed");
            let (min, max) = (state.config.playback.min_speed, state.config.playback.max_speed);
            let session = &mut state.panel_mut(kind).session;
            let mut speed = session.speed();
            if ui
                .add(egui::Slider::new(&mut speed, min..=max).step_by(0.1).suffix("×"))
                .changed()
            {
                session.set_speed(speed);
            }
            if ui.button("Restart").clicked() {
                state.replay(kind);
            }
            ui.separator();

            // ---- Breath detection ----
            if kind == PanelKind::Breathing {
                ui.strong("Breath detection");
                let current = state.panel(kind).policy;
                egui::ComboBox::from_id_salt("detector_policy")
                    .selected_text(current.label())
                    .show_ui(ui, |ui: &mut Ui| {
                        for policy in DetectorPolicy::ALL {
                            if ui.selectable_label(current == policy, policy.label()).clicked() {
                                state.set_policy(kind, policy);
                            }
                        }
                    });
                ui.separator();
            }

            legend(ui, state.panel(kind));
        });
}

fn selection_text(state: &AppState, selection: Selection) -> String {
    match selection {
        Selection::AllGroups => "All Groups (Comparison)".to_string(),
        Selection::Subject(id) => match state.subject(id) {
            Some(info) => format!("Subject {id} ({})", info.group),
            None => format!("Subject {id}"),
        },
    }
}

fn selection_combo(ui: &mut Ui, state: &mut AppState, kind: PanelKind) {
    ui.strong("Subject");
    let current = state.panel(kind).selection;
    let options: Vec<(Selection, String)> = std::iter::once(Selection::AllGroups)
        .chain(state.subjects.iter().map(|s| Selection::Subject(s.id)))
        .map(|sel| (sel, selection_text(state, sel)))
        .collect();

    let mut picked = None;
    egui::ComboBox::from_id_salt(("selection", kind as u8))
        .selected_text(current.map_or("-".to_string(), |sel| selection_text(state, sel)))
        .width(ui.available_width())
        .show_ui(ui, |ui: &mut Ui| {
            for (sel, text) in &options {
                if ui.selectable_label(current == Some(*sel), text).clicked() {
                    picked = Some(*sel);
                }
            }
        });
    if let Some(sel) = picked {
        if Some(sel) != current {
            state.select(kind, sel);
        }
    }
}

fn legend(ui: &mut Ui, panel: &Panel) {
    ui.strong("Legend");
    match panel.selection {
        Some(Selection::AllGroups) => {
            for group in GroupKey::COMPARED {
                let present = panel.groups.as_ref().is_some_and(|g| g.contains_key(&group));
                let text = if present {
                    RichText::new(group.label()).color(group_color(group))
                } else {
                    RichText::new(format!("{} (no data)", group.label())).weak()
                };
                ui.label(text);
            }
        }
        _ => {
            ui.label(RichText::new("Inhale").color(breath_color(true)));
            ui.label(RichText::new("Exhale").color(breath_color(false)));
        }
    }
}

// ---------------------------------------------------------------------------
// Central panel – animated charts
// ---------------------------------------------------------------------------

/// Advance `panel` by one frame and draw it. Returns whether it is still
/// animating.
pub fn animated_view(ui: &mut Ui, panel: &mut Panel) -> bool {
    if let Some(err) = &panel.error {
        ui.label(RichText::new(err).color(Color32::RED));
    }
    if let Some(notice) = &panel.notice {
        ui.label(notice);
    }
    if panel.loading {
        ui.horizontal(|ui: &mut Ui| {
            ui.spinner();
            ui.label("Loading…");
        });
    }
    if panel.charts.is_empty() {
        return false;
    }

    {
        let frame = panel.session.frame();
        for chart in &panel.charts {
            chart.render(ui, frame.as_ref());
        }
    }

    ui.separator();
    readout(ui, panel);
    if let Some(scales) = &panel.gauge {
        lung::gauges(ui, scales, panel.session.readout().latest.as_ref());
    }
    panel.session.is_running()
}

fn readout(ui: &mut Ui, panel: &Panel) {
    let session = &panel.session;
    let metrics: &[Metric] = match panel.kind {
        PanelKind::Breathing => &[Metric::Flow, Metric::Volume],
        PanelKind::ChestAbdomen => &[Metric::Chest, Metric::Abdomen, Metric::Ratio],
    };
    ui.horizontal_wrapped(|ui: &mut Ui| {
        let latest = session.readout().latest;
        if matches!(panel.selection, Some(Selection::AllGroups)) {
            // first group drives the numbers
            if let Some(track) = session.tracks().first() {
                ui.label(RichText::new(track.label.to_string()).strong());
            }
        }
        ui.label(format!("t = {:.1} s", session.position()));
        ui.separator();
        for &metric in metrics {
            let value = latest.map_or("--".to_string(), |s| format!("{:.2}", metric.value(&s)));
            ui.label(format!("{}: {value} {}", metric.label(), metric.unit()));
            ui.separator();
        }
        if panel.kind == PanelKind::Breathing {
            let rate = session
                .breath_rate()
                .map_or("--".to_string(), |r| format!("{r:.1}"));
            ui.label(format!("Breaths/min: {rate}"));
            let inhaling = session.is_inhaling();
            ui.label(
                RichText::new(if inhaling { "Inhaling" } else { "Exhaling" })
                    .color(breath_color(inhaling)),
            );
        }
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open dataset folder…").clicked() {
                open_folder_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        for view in View::ALL {
            ui.selectable_value(&mut state.view, view, view.label());
        }

        ui.separator();

        if !state.subjects.is_empty() {
            ui.label(format!("{} subjects", state.subjects.len()));
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Folder dialog
// ---------------------------------------------------------------------------

pub fn open_folder_dialog(state: &mut AppState) {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Open respiratory dataset folder")
        .pick_folder()
    else {
        return;
    };

    if !Dataset::new(&path).looks_valid() {
        log::warn!("{} has no subject-info.csv", path.display());
        state.status_message = Some(format!(
            "{} does not look like a dataset folder (subject-info.csv missing)",
            path.display()
        ));
        return;
    }
    state.open_dataset(path);
}
