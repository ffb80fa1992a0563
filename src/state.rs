use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::color::{ColorMap, DivergingScale};
use crate::config::DataPaths;
use crate::data::aggregate::{
    column_mean, group_mean, scatter_by, treemap, GroupMean, ScatterSeries, TreemapNode,
};
use crate::data::filter::{
    apply_filters, classify, coerce_datetime_columns, numeric_step, ColumnFilter, ColumnKind,
    FilterSet,
};
use crate::data::loader::DataCache;
use crate::data::model::{CellValue, Column, DataError, Table};
use crate::data::prepare::prepare_consolidated;
use crate::regress::{EmissionModel, FormOptions, PredictionInput};

// ---------------------------------------------------------------------------
// Derived chart data
// ---------------------------------------------------------------------------

/// Everything the six charts need, computed once from the unfiltered
/// consolidated view.
pub struct ChartData {
    /// Global [min, max] of CO2 emissions; anchors the shared colour scale.
    pub co2_scale: DivergingScale,
    /// Per-column scale for shading the fuel-consumption table column.
    pub combined_scale: DivergingScale,
    pub co2_mean: f64,
    pub by_make: Vec<GroupMean>,
    pub by_class: Vec<GroupMean>,
    pub by_year: Vec<GroupMean>,
    pub scatter_fuel: Vec<ScatterSeries>,
    pub scatter_class: Vec<ScatterSeries>,
    pub fuel_colors: ColorMap,
    pub class_colors: ColorMap,
    pub tree: TreemapNode,
}

impl ChartData {
    pub fn build(view: &Table) -> Result<Self, DataError> {
        let co2 = "co2_emissions_g_km";
        let (min, max) = view
            .require_column(co2)?
            .numeric_min_max()
            .ok_or_else(|| DataError::NotNumeric(co2.to_string()))?;
        let mean = column_mean(view, co2)?.unwrap_or(0.0);
        let (cmb_min, cmb_max) = view
            .require_column("combined_l_100_km")?
            .numeric_min_max()
            .ok_or_else(|| DataError::NotNumeric("combined_l_100_km".to_string()))?;

        Ok(ChartData {
            co2_scale: DivergingScale::new(min, max),
            combined_scale: DivergingScale::new(cmb_min, cmb_max),
            co2_mean: mean,
            by_make: group_mean(view, "make", co2)?,
            by_class: group_mean(view, "vehicle_class", co2)?,
            by_year: group_mean(view, "model_year", co2)?,
            scatter_fuel: scatter_by(view, "combined_l_100_km", co2, "fuel_type")?,
            scatter_class: scatter_by(view, "combined_l_100_km", co2, "vehicle_class")?,
            fuel_colors: ColorMap::new(&view.require_column("fuel_type")?.distinct_values()),
            class_colors: ColorMap::new(
                &view.require_column("vehicle_class")?.distinct_values(),
            ),
            tree: treemap(
                view,
                co2,
                &["make", "vehicle_class", "fuel_type", "model_year", "model"],
                co2,
            )?,
        })
    }

    /// Shading colour for the gradient-styled table columns.
    pub fn shade_for(&self, column: &str, value: f64) -> Option<eframe::egui::Color32> {
        match column {
            "co2_emissions_g_km" => Some(self.co2_scale.color_for(value)),
            "combined_l_100_km" => Some(self.combined_scale.color_for(value)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Filter panel state
// ---------------------------------------------------------------------------

/// UI state of one column's filter control, shaped by its [`ColumnKind`].
#[derive(Debug, Clone)]
pub enum FilterControl {
    Categorical {
        all: BTreeSet<CellValue>,
        selected: BTreeSet<CellValue>,
    },
    Numeric {
        min: f64,
        max: f64,
        step: f64,
        lo: f64,
        hi: f64,
    },
    Temporal {
        start: NaiveDate,
        end: NaiveDate,
        use_start: bool,
        use_end: bool,
    },
    Text {
        pattern: String,
    },
}

impl FilterControl {
    /// Build the control matching the column's classification. Defaults are
    /// non-constraining: everything selected, full range.
    pub fn for_column(column: &Column) -> Self {
        match classify(column) {
            ColumnKind::Categorical => {
                let all = column.distinct_values();
                FilterControl::Categorical {
                    selected: all.clone(),
                    all,
                }
            }
            ColumnKind::Numeric => {
                let (min, max) = column.numeric_min_max().unwrap_or((0.0, 0.0));
                FilterControl::Numeric {
                    min,
                    max,
                    step: numeric_step(min, max),
                    lo: min,
                    hi: max,
                }
            }
            ColumnKind::Temporal => {
                let (start, end) = column
                    .date_min_max()
                    .map(|(lo, hi)| (lo.date(), hi.date()))
                    .unwrap_or_else(|| (NaiveDate::default(), NaiveDate::default()));
                FilterControl::Temporal {
                    start,
                    end,
                    use_start: true,
                    use_end: true,
                }
            }
            ColumnKind::Text => FilterControl::Text {
                pattern: String::new(),
            },
        }
    }

    /// The predicate this control currently expresses.
    pub fn to_filter(&self) -> ColumnFilter {
        match self {
            FilterControl::Categorical { selected, .. } => {
                ColumnFilter::ValueSet(selected.clone())
            }
            FilterControl::Numeric { lo, hi, .. } => ColumnFilter::Range { lo: *lo, hi: *hi },
            FilterControl::Temporal {
                start,
                end,
                use_start,
                use_end,
                ..
            } => ColumnFilter::DateRange {
                start: use_start.then_some(*start),
                end: use_end.then_some(*end),
            },
            FilterControl::Text { pattern } => ColumnFilter::Pattern(pattern.clone()),
        }
    }
}

/// State of the whole filter panel: which columns the user chose to filter
/// on, and the per-column control state.
#[derive(Debug, Clone, Default)]
pub struct FilterPanel {
    pub enabled: bool,
    pub active_columns: Vec<String>,
    pub controls: BTreeMap<String, FilterControl>,
}

impl FilterPanel {
    /// Toggle a column in or out of the filtered set, creating its control
    /// from the column's classification on first use.
    pub fn toggle_column(&mut self, column: &Column) {
        if let Some(pos) = self.active_columns.iter().position(|c| *c == column.name) {
            self.active_columns.remove(pos);
        } else {
            self.active_columns.push(column.name.clone());
            self.controls
                .entry(column.name.clone())
                .or_insert_with(|| FilterControl::for_column(column));
        }
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active_columns.iter().any(|c| c == name)
    }

    /// The AND-composed filter set for the current cycle. Disabled panel or
    /// no active columns → empty set → identity passthrough.
    pub fn to_filter_set(&self) -> FilterSet {
        if !self.enabled {
            return FilterSet::new();
        }
        self.active_columns
            .iter()
            .filter_map(|name| {
                self.controls
                    .get(name)
                    .map(|c| (name.clone(), c.to_filter()))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Prediction form state
// ---------------------------------------------------------------------------

/// Current widget selections on the Regression tab plus the last prediction.
/// Submitting with unchanged selections recomputes the same value; not
/// submitting computes nothing.
#[derive(Debug, Clone)]
pub struct FormState {
    pub model_year: i64,
    pub transmission: String,
    pub vehicle_class: String,
    pub fuel_type: String,
    pub engine_size_class: String,
    pub cylinders_class: String,
    pub city: f64,
    pub highway: f64,
    pub combined: f64,
    pub result: Option<f64>,
}

impl FormState {
    /// Initial selections: first option of each selector, lower bound of
    /// each slider.
    pub fn from_options(options: &FormOptions) -> Self {
        FormState {
            model_year: options.model_years.first().copied().unwrap_or(2000),
            transmission: options.transmissions.first().cloned().unwrap_or_default(),
            vehicle_class: options.vehicle_classes.first().cloned().unwrap_or_default(),
            fuel_type: options.fuel_types.first().cloned().unwrap_or_default(),
            engine_size_class: options
                .engine_size_classes
                .first()
                .cloned()
                .unwrap_or_default(),
            cylinders_class: options
                .cylinders_classes
                .first()
                .cloned()
                .unwrap_or_default(),
            city: options.city_range.0,
            highway: options.highway_range.0,
            combined: options.combined_range.0,
            result: None,
        }
    }

    /// Assemble the single input record, in schema order.
    pub fn to_input(&self) -> PredictionInput {
        PredictionInput {
            model_year: self.model_year,
            transmission: self.transmission.clone(),
            vehicle_class_grouped: self.vehicle_class.clone(),
            fuel_type: self.fuel_type.clone(),
            engine_size_l_class: self.engine_size_class.clone(),
            cylinders_class: self.cylinders_class.clone(),
            city_l_100_km: self.city,
            highway_l_100_km: self.highway,
            combined_l_100_km: self.combined,
        }
    }

    /// Run the model on the current selections and keep the scalar result.
    pub fn submit(&mut self, model: &EmissionModel) -> Result<(), String> {
        match model.predict(&self.to_input()) {
            Ok(prediction) => {
                self.result = Some(prediction);
                Ok(())
            }
            Err(err) => Err(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Data,
    Regression,
}

/// Everything loaded at startup, immutable afterwards.
pub struct LoadedData {
    /// Prepared consolidated view (display columns, fuel labels, datetime
    /// coercion applied once).
    pub consolidated: Table,
    pub treated: Arc<Table>,
    pub model: Arc<EmissionModel>,
    pub charts: ChartData,
    pub form_options: FormOptions,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub data: Option<LoadedData>,
    pub tab: Tab,
    pub filter_panel: FilterPanel,
    /// Indices of consolidated rows passing the current filters, in display
    /// order (cached, resorted on demand).
    pub visible_rows: Vec<usize>,
    /// Current sort: column name and ascending flag.
    pub sort: Option<(String, bool)>,
    pub form: FormState,
    /// Labels of the treemap node the user has drilled into, root-first.
    pub treemap_path: Vec<String>,
    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    /// Load the datasets and the model from the configured paths. Failures
    /// are fatal for the affected view and surface in the status line.
    pub fn load(paths: &DataPaths) -> Self {
        let mut cache = DataCache::new();
        let mut status_message = None;

        let data = match Self::load_data(&mut cache, paths) {
            Ok(data) => Some(data),
            Err(err) => {
                log::error!("failed to load data: {err:#}");
                status_message = Some(format!("Load error: {err:#}"));
                None
            }
        };

        let form = data
            .as_ref()
            .map(|d| FormState::from_options(&d.form_options))
            .unwrap_or_else(|| FormState::from_options(&empty_options()));
        let visible_rows = data
            .as_ref()
            .map(|d| (0..d.consolidated.n_rows()).collect())
            .unwrap_or_default();

        AppState {
            data,
            tab: Tab::Data,
            filter_panel: FilterPanel::default(),
            visible_rows,
            sort: None,
            form,
            treemap_path: Vec::new(),
            status_message,
        }
    }

    fn load_data(cache: &mut DataCache, paths: &DataPaths) -> anyhow::Result<LoadedData> {
        let raw = cache.table(&paths.consolidated)?;
        let mut consolidated = prepare_consolidated(&raw)?;
        coerce_datetime_columns(&mut consolidated);

        let charts = ChartData::build(&consolidated)?;
        let treated = cache.table(&paths.treated)?;
        let form_options = FormOptions::from_table(&treated)?;
        let model = cache.model(&paths.model)?;

        Ok(LoadedData {
            consolidated,
            treated,
            model,
            charts,
            form_options,
        })
    }

    /// Recompute `visible_rows` from the current filters and sort.
    pub fn refilter(&mut self) {
        let Some(data) = &self.data else {
            return;
        };
        let filters = self.filter_panel.to_filter_set();
        self.visible_rows = apply_filters(&data.consolidated, &filters);
        self.resort();
    }

    /// Toggle sorting on a column: unsorted → ascending → descending.
    pub fn set_sort(&mut self, column: &str) {
        self.sort = match self.sort.take() {
            Some((col, true)) if col == column => Some((col, false)),
            Some((col, false)) if col == column => None,
            _ => Some((column.to_string(), true)),
        };
        self.resort();
    }

    fn resort(&mut self) {
        let Some(data) = &self.data else {
            return;
        };
        match &self.sort {
            Some((column, ascending)) => {
                if let Some(col) = data.consolidated.column(column) {
                    self.visible_rows.sort_by(|&a, &b| {
                        let ord = col.value(a).cmp(&col.value(b));
                        if *ascending {
                            ord
                        } else {
                            ord.reverse()
                        }
                    });
                }
            }
            None => self.visible_rows.sort_unstable(),
        }
    }

    /// Run the prediction for the current form selections.
    pub fn submit_prediction(&mut self) {
        let Some(data) = &self.data else {
            return;
        };
        if let Err(err) = self.form.submit(&data.model) {
            log::error!("prediction failed: {err}");
            self.status_message = Some(format!("Prediction error: {err}"));
        }
    }
}

fn empty_options() -> FormOptions {
    FormOptions {
        model_years: Vec::new(),
        transmissions: Vec::new(),
        vehicle_classes: Vec::new(),
        fuel_types: Vec::new(),
        engine_size_classes: Vec::new(),
        cylinders_classes: Vec::new(),
        city_range: (0.0, 0.0),
        highway_range: (0.0, 0.0),
        combined_range: (0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ColumnData;

    fn consolidated() -> Table {
        let makes = ["acura", "acura", "bmw", "chevrolet"];
        let classes = ["suv", "compact", "suv", "mid"];
        let fuels = ["reg_gasoline", "diesel", "reg_gasoline", "ethanol"];
        Table::from_columns(vec![
            Column::new(
                "model_year",
                ColumnData::Int(vec![Some(2020), Some(2020), Some(2021), Some(2021)]),
            ),
            Column::new(
                "make",
                ColumnData::Str(makes.iter().map(|s| Some((*s).into())).collect()),
            ),
            Column::new(
                "model",
                ColumnData::Str(vec![
                    Some("ILX".into()),
                    Some("MDX".into()),
                    Some("X3".into()),
                    Some("Malibu".into()),
                ]),
            ),
            Column::new(
                "co2_emissions_g_km",
                ColumnData::Float(vec![Some(220.0), Some(180.0), Some(260.0), Some(200.0)]),
            ),
            Column::new(
                "fuel_type",
                ColumnData::Str(fuels.iter().map(|s| Some((*s).into())).collect()),
            ),
            Column::new(
                "vehicle_class",
                ColumnData::Str(classes.iter().map(|s| Some((*s).into())).collect()),
            ),
            Column::new(
                "combined_l_100_km",
                ColumnData::Float(vec![Some(9.5), Some(7.7), Some(11.2), Some(8.6)]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn chart_data_covers_all_dimensions() {
        let charts = ChartData::build(&consolidated()).unwrap();
        assert_eq!(charts.by_make.len(), 3);
        assert_eq!(charts.by_year.len(), 2);
        assert_eq!(charts.co2_mean, 215.0);
        assert_eq!(charts.scatter_fuel.len(), 3);
        // Bars sorted descending by mean.
        assert!(charts.by_make[0].mean >= charts.by_make[1].mean);
        assert_eq!(charts.tree.count, 4);
    }

    #[test]
    fn filter_panel_disabled_is_identity() {
        let table = consolidated();
        let mut panel = FilterPanel::default();
        panel.toggle_column(table.column("make").unwrap());
        // Panel off → no filters even with active columns.
        assert!(panel.to_filter_set().is_empty());
        panel.enabled = true;
        assert_eq!(panel.to_filter_set().len(), 1);
        // Toggling again removes the column.
        panel.toggle_column(table.column("make").unwrap());
        assert!(panel.to_filter_set().is_empty());
    }

    #[test]
    fn categorical_control_defaults_to_all_selected() {
        let table = consolidated();
        let control = FilterControl::for_column(table.column("make").unwrap());
        let FilterControl::Categorical { all, selected } = &control else {
            panic!("make should classify categorical");
        };
        assert_eq!(all.len(), 3);
        assert_eq!(all, selected);
        let ColumnFilter::ValueSet(set) = control.to_filter() else {
            panic!("categorical control builds a value-set filter");
        };
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn numeric_control_spans_min_max() {
        let col = Column::new(
            "co2_emissions_g_km",
            ColumnData::Float((0..30).map(|i| Some(100.0 + i as f64)).collect()),
        );
        let control = FilterControl::for_column(&col);
        let FilterControl::Numeric { min, max, step, lo, hi } = control else {
            panic!("wide float column should classify numeric");
        };
        assert_eq!((min, max), (100.0, 129.0));
        assert_eq!((lo, hi), (min, max));
        assert!((step - 0.29).abs() < 1e-9);
    }

    #[test]
    fn form_submission_is_idempotent_on_state() {
        let options = FormOptions {
            model_years: vec![2020],
            transmissions: vec!["A1".into()],
            vehicle_classes: vec!["SUV".into()],
            fuel_types: vec!["X".into()],
            engine_size_classes: vec!["small".into()],
            cylinders_classes: vec!["4".into()],
            city_range: (9.0, 12.0),
            highway_range: (7.0, 9.0),
            combined_range: (8.0, 10.0),
        };
        let mut form = FormState::from_options(&options);
        assert_eq!(form.result, None);

        let input = form.to_input();
        assert_eq!(input.model_year, 2020);
        assert_eq!(input.combined_l_100_km, 8.0);

        let model = EmissionModel {
            feature_order: crate::regress::FEATURE_ORDER
                .iter()
                .map(|s| s.to_string())
                .collect(),
            intercept: 10.0,
            terms: vec![crate::regress::ModelTerm::Numeric {
                feature: "combined_l_100_km".into(),
                coefficient: 20.0,
            }],
        };
        form.submit(&model).unwrap();
        assert_eq!(form.result, Some(170.0));
        // Same selections, same value.
        form.submit(&model).unwrap();
        assert_eq!(form.result, Some(170.0));
    }
}
