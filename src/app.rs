use eframe::egui;

use crate::data::loader::Dataset;
use crate::state::{AppState, PanelKind, View};
use crate::ui::{demographics, insights, panels};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RespiraApp {
    pub state: AppState,
}

impl RespiraApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut state = AppState::default();
        state.worker.set_context(cc.egui_ctx.clone());

        // pick up a dataset in the working directory
        match std::env::current_dir() {
            Ok(cwd) if Dataset::new(&cwd).looks_valid() => state.open_dataset(cwd),
            Ok(_) => log::info!("No dataset in the working directory"),
            Err(e) => log::warn!("Cannot read working directory: {e}"),
        }

        Self { state }
    }
}

impl eframe::App for RespiraApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.state.poll();

        // ---- Top panel: menu bar and view tabs ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: selection and playback ----
        egui::SidePanel::left("control_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: the active view ----
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.state.dataset.is_none() {
                ui.centered_and_justified(|ui| {
                    ui.heading("Open a dataset folder to start  (File → Open dataset folder…)");
                });
                return;
            }
            let animating = match self.state.view {
                View::Breathing => panels::animated_view(ui, self.state.panel_mut(PanelKind::Breathing)),
                View::ChestAbdomen => {
                    panels::animated_view(ui, self.state.panel_mut(PanelKind::ChestAbdomen))
                }
                View::Demographics => {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        demographics::demographics_view(ui, &mut self.state);
                    });
                    false
                }
                View::Insights => {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        insights::insights_view(ui, &mut self.state);
                    });
                    false
                }
            };
            if animating {
                ctx.request_repaint();
            }
        });
    }
}
