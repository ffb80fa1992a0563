use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column as TableColumn, DatePickerButton, TableBuilder};

use crate::data::prepare::DISPLAY_COLUMNS;
use crate::state::{AppState, FilterControl, Tab};

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top bar: tab switcher, row counts, status line.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.heading("CO₂ Scope");
        ui.separator();

        if ui
            .selectable_label(state.tab == Tab::Data, "Data")
            .clicked()
        {
            state.tab = Tab::Data;
        }
        if ui
            .selectable_label(state.tab == Tab::Regression, "Regression")
            .clicked()
        {
            state.tab = Tab::Regression;
        }

        ui.separator();

        if let Some(data) = &state.data {
            ui.label(format!(
                "{} vehicles loaded, {} visible",
                data.consolidated.n_rows(),
                state.visible_rows.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the filter panel. Controls are created per column from its
/// classification; the panel ends with a full refilter pass.
pub fn filter_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    if state.data.is_none() {
        ui.label("No dataset loaded.");
        return;
    }

    ui.checkbox(&mut state.filter_panel.enabled, "Add filters");

    if state.filter_panel.enabled {
        ui.separator();
        ui.strong("Filter dataframe on");

        let column_names: Vec<String> = state
            .data
            .as_ref()
            .map(|d| {
                d.consolidated
                    .column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        for name in &column_names {
            let mut active = state.filter_panel.is_active(name);
            if ui.checkbox(&mut active, name).changed() {
                if let Some(column) = state
                    .data
                    .as_ref()
                    .and_then(|d| d.consolidated.column(name))
                {
                    state.filter_panel.toggle_column(column);
                }
            }
        }

        ui.separator();

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui: &mut Ui| {
                let active: Vec<String> = state.filter_panel.active_columns.clone();
                for name in &active {
                    filter_control(ui, state, name);
                }
            });
    }

    // Recompute visible rows after any control changes.
    state.refilter();
}

fn filter_control(ui: &mut Ui, state: &mut AppState, column: &str) {
    let Some(control) = state.filter_panel.controls.get_mut(column) else {
        return;
    };

    match control {
        FilterControl::Categorical { all, selected } => {
            let header = format!("{column}  ({}/{})", selected.len(), all.len());
            egui::CollapsingHeader::new(RichText::new(header).strong())
                .id_salt(column)
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    ui.horizontal(|ui: &mut Ui| {
                        if ui.small_button("All").clicked() {
                            *selected = all.clone();
                        }
                        if ui.small_button("None").clicked() {
                            selected.clear();
                        }
                    });
                    for val in all.iter() {
                        let mut checked = selected.contains(val);
                        if ui.checkbox(&mut checked, val.to_string()).changed() {
                            if checked {
                                selected.insert(val.clone());
                            } else {
                                selected.remove(val);
                            }
                        }
                    }
                });
        }
        FilterControl::Numeric { min, max, step, lo, hi } => {
            ui.strong(format!("Values for {column}"));
            let step = if *step > 0.0 { *step } else { 1.0 };
            ui.add(
                egui::Slider::new(lo, *min..=*max)
                    .step_by(step)
                    .text("min"),
            );
            ui.add(
                egui::Slider::new(hi, *min..=*max)
                    .step_by(step)
                    .text("max"),
            );
            if *lo > *hi {
                std::mem::swap(lo, hi);
            }
            ui.add_space(4.0);
        }
        FilterControl::Temporal {
            start,
            end,
            use_start,
            use_end,
            ..
        } => {
            ui.strong(format!("Values for {column}"));
            let start_salt = format!("{column}_start");
            let end_salt = format!("{column}_end");
            ui.horizontal(|ui: &mut Ui| {
                ui.checkbox(use_start, "from");
                ui.add_enabled(*use_start, DatePickerButton::new(start).id_salt(&start_salt));
            });
            ui.horizontal(|ui: &mut Ui| {
                ui.checkbox(use_end, "to");
                ui.add_enabled(*use_end, DatePickerButton::new(end).id_salt(&end_salt));
            });
            ui.add_space(4.0);
        }
        FilterControl::Text { pattern } => {
            ui.strong(format!("Substring or regex in {column}"));
            ui.text_edit_singleline(pattern);
            ui.add_space(4.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Data table
// ---------------------------------------------------------------------------

/// Render the filtered, sortable table with emission columns shaded on the
/// shared colour scale.
pub fn data_table(ui: &mut Ui, state: &mut AppState) {
    let Some(data) = &state.data else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No data loaded — check the configured paths.");
        });
        return;
    };

    let mut sort_request: Option<String> = None;
    let shaded = ["co2_emissions_g_km", "combined_l_100_km"];

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .columns(TableColumn::auto().at_least(80.0), DISPLAY_COLUMNS.len())
        .header(20.0, |mut header| {
            for name in DISPLAY_COLUMNS {
                header.col(|ui: &mut Ui| {
                    let marker = match &state.sort {
                        Some((col, true)) if col == name => " ⏶",
                        Some((col, false)) if col == name => " ⏷",
                        _ => "",
                    };
                    if ui
                        .button(RichText::new(format!("{name}{marker}")).strong())
                        .clicked()
                    {
                        sort_request = Some(name.to_string());
                    }
                });
            }
        })
        .body(|body| {
            body.rows(18.0, state.visible_rows.len(), |mut row| {
                let row_idx = state.visible_rows[row.index()];
                for name in DISPLAY_COLUMNS {
                    row.col(|ui: &mut Ui| {
                        let column = data.consolidated.column(name).expect("display column");
                        if shaded.contains(&name) {
                            if let Some(color) = column
                                .numeric(row_idx)
                                .and_then(|v| data.charts.shade_for(name, v))
                            {
                                ui.painter().rect_filled(
                                    ui.max_rect(),
                                    0.0,
                                    color.gamma_multiply(0.35),
                                );
                            }
                        }
                        ui.label(column.value(row_idx).to_string());
                    });
                }
            });
        });

    if let Some(column) = sort_request {
        state.set_sort(&column);
    }
}
