use eframe::egui::{self, ComboBox, RichText, Slider, Ui};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Regression tab – prediction form
// ---------------------------------------------------------------------------

/// Render the prediction form: six selectors bounded to the values observed
/// in the treated dataset, three consumption sliders bounded to its ranges,
/// a submit button and the result metric. Nothing runs until submit.
pub fn prediction_form(ui: &mut Ui, state: &mut AppState) {
    let Some(data) = &state.data else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No model loaded — check the configured paths.");
        });
        return;
    };
    let options = data.form_options.clone();
    let form = &mut state.form;

    ui.heading("Estimate CO₂ emissions");
    ui.label(format!(
        "Selectors and ranges reflect the {} vehicles the model was trained on.",
        data.treated.n_rows()
    ));
    ui.add_space(8.0);

    ui.columns(2, |columns: &mut [Ui]| {
        let left = &mut columns[0];
        ComboBox::from_label("Model year")
            .selected_text(form.model_year.to_string())
            .show_ui(left, |ui: &mut Ui| {
                for year in &options.model_years {
                    ui.selectable_value(&mut form.model_year, *year, year.to_string());
                }
            });
        ComboBox::from_label("Transmission")
            .selected_text(&form.transmission)
            .show_ui(left, |ui: &mut Ui| {
                for t in &options.transmissions {
                    ui.selectable_value(&mut form.transmission, t.clone(), t);
                }
            });
        ComboBox::from_label("Vehicle class")
            .selected_text(&form.vehicle_class)
            .show_ui(left, |ui: &mut Ui| {
                for v in &options.vehicle_classes {
                    ui.selectable_value(&mut form.vehicle_class, v.clone(), v);
                }
            });

        let right = &mut columns[1];
        ComboBox::from_label("Fuel type")
            .selected_text(&form.fuel_type)
            .show_ui(right, |ui: &mut Ui| {
                for f in &options.fuel_types {
                    ui.selectable_value(&mut form.fuel_type, f.clone(), f);
                }
            });
        ComboBox::from_label("Cylinders")
            .selected_text(&form.cylinders_class)
            .show_ui(right, |ui: &mut Ui| {
                for c in &options.cylinders_classes {
                    ui.selectable_value(&mut form.cylinders_class, c.clone(), c);
                }
            });
        ComboBox::from_label("Engine size")
            .selected_text(&form.engine_size_class)
            .show_ui(right, |ui: &mut Ui| {
                for e in &options.engine_size_classes {
                    ui.selectable_value(&mut form.engine_size_class, e.clone(), e);
                }
            });
    });

    ui.add_space(8.0);
    ui.add(
        Slider::new(&mut form.city, options.city_range.0..=options.city_range.1)
            .text("City consumption (l/100 km)"),
    );
    ui.add(
        Slider::new(
            &mut form.highway,
            options.highway_range.0..=options.highway_range.1,
        )
        .text("Highway consumption (l/100 km)"),
    );
    ui.add(
        Slider::new(
            &mut form.combined,
            options.combined_range.0..=options.combined_range.1,
        )
        .text("Combined consumption (l/100 km)"),
    );

    ui.add_space(12.0);
    if ui.button(RichText::new("Predict emission").strong()).clicked() {
        state.submit_prediction();
    }

    if let Some(result) = state.form.result {
        ui.add_space(12.0);
        ui.group(|ui: &mut Ui| {
            ui.label("Predicted emission (g/km)");
            ui.label(
                RichText::new(format!("{result:.2}"))
                    .size(28.0)
                    .strong()
                    .color(egui::Color32::LIGHT_GREEN),
            );
        });
    }
}
