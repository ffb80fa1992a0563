use eframe::egui;

use crate::config::DataPaths;
use crate::state::{AppState, Tab};
use crate::ui::{charts, form, panels};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct Co2ScopeApp {
    pub state: AppState,
}

impl Co2ScopeApp {
    pub fn new(paths: &DataPaths) -> Self {
        Self {
            state: AppState::load(paths),
        }
    }
}

impl eframe::App for Co2ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: tabs and status ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        match self.state.tab {
            Tab::Data => {
                // ---- Left side panel: filters ----
                egui::SidePanel::left("filter_panel")
                    .default_width(240.0)
                    .resizable(true)
                    .show(ctx, |ui| {
                        panels::filter_panel(ui, &mut self.state);
                    });

                // ---- Central panel: table + charts ----
                egui::CentralPanel::default().show(ctx, |ui| {
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, false])
                        .show(ui, |ui| {
                            ui.push_id("data_table", |ui| {
                                panels::data_table(ui, &mut self.state);
                            });
                            ui.separator();
                            charts::charts_section(ui, &mut self.state);
                        });
                });
            }
            Tab::Regression => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    form::prediction_form(ui, &mut self.state);
                });
            }
        }
    }
}
