mod app;
mod color;
mod config;
mod data;
mod regress;
mod state;
mod ui;

use app::Co2ScopeApp;
use config::DataPaths;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let paths = DataPaths::default();
    log::info!(
        "data paths: consolidated={}, treated={}, model={}",
        paths.consolidated.display(),
        paths.treated.display(),
        paths.model.display()
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "CO₂ Scope – Vehicle Emissions",
        options,
        Box::new(move |_cc| Ok(Box::new(Co2ScopeApp::new(&paths)))),
    )
}
