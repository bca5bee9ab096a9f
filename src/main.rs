mod app;
mod color;
mod config;
mod data;
mod playback;
mod state;
mod ui;
mod worker;

use app::RespiraApp;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Respira Viewer – Breathing Data Player",
        options,
        Box::new(|cc| Ok(Box::new(RespiraApp::new(cc)))),
    )
}
