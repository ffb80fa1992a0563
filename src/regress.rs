use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::model::{CellValue, ColumnData, DataError, Table};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("reading model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing model artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("artifact feature order {found:?} does not match the expected schema")]
    SchemaMismatch { found: Vec<String> },
    #[error("model term references unknown feature '{0}'")]
    UnknownFeature(String),
    #[error("feature '{feature}' has no weight for value '{value}'")]
    UnknownCategory { feature: String, value: String },
}

/// The feature names of the treated dataset, in the order the model was
/// trained on.
pub const FEATURE_ORDER: [&str; 9] = [
    "model_year",
    "transmission",
    "vehicle_class_grouped",
    "fuel_type",
    "engine_size_l_class",
    "cylinders_class",
    "city_l_100_km",
    "highway_l_100_km",
    "combined_l_100_km",
];

// ---------------------------------------------------------------------------
// Prediction input – one synthesized record
// ---------------------------------------------------------------------------

/// A single input record matching the treated schema. Built fresh on every
/// form submission and consumed immediately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionInput {
    pub model_year: i64,
    pub transmission: String,
    pub vehicle_class_grouped: String,
    pub fuel_type: String,
    pub engine_size_l_class: String,
    pub cylinders_class: String,
    pub city_l_100_km: f64,
    pub highway_l_100_km: f64,
    pub combined_l_100_km: f64,
}

impl PredictionInput {
    /// The record as (field, value) pairs in schema order.
    pub fn to_record(&self) -> Vec<(&'static str, CellValue)> {
        vec![
            ("model_year", CellValue::Int(self.model_year)),
            ("transmission", CellValue::Str(self.transmission.clone())),
            (
                "vehicle_class_grouped",
                CellValue::Str(self.vehicle_class_grouped.clone()),
            ),
            ("fuel_type", CellValue::Str(self.fuel_type.clone())),
            (
                "engine_size_l_class",
                CellValue::Str(self.engine_size_l_class.clone()),
            ),
            ("cylinders_class", CellValue::Str(self.cylinders_class.clone())),
            ("city_l_100_km", CellValue::Float(self.city_l_100_km)),
            ("highway_l_100_km", CellValue::Float(self.highway_l_100_km)),
            ("combined_l_100_km", CellValue::Float(self.combined_l_100_km)),
        ]
    }

    fn numeric(&self, feature: &str) -> Option<f64> {
        match feature {
            "model_year" => Some(self.model_year as f64),
            "city_l_100_km" => Some(self.city_l_100_km),
            "highway_l_100_km" => Some(self.highway_l_100_km),
            "combined_l_100_km" => Some(self.combined_l_100_km),
            _ => None,
        }
    }

    fn categorical(&self, feature: &str) -> Option<&str> {
        match feature {
            "transmission" => Some(&self.transmission),
            "vehicle_class_grouped" => Some(&self.vehicle_class_grouped),
            "fuel_type" => Some(&self.fuel_type),
            "engine_size_l_class" => Some(&self.engine_size_l_class),
            "cylinders_class" => Some(&self.cylinders_class),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EmissionModel – the externally trained artifact
// ---------------------------------------------------------------------------

/// One additive term of the regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelTerm {
    /// `coefficient * value`
    Numeric { feature: String, coefficient: f64 },
    /// One-hot encoded categorical: the weight of the observed value.
    OneHot {
        feature: String,
        weights: BTreeMap<String, f64>,
    },
}

/// The pre-trained regression artifact. Loaded once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionModel {
    /// Feature names in training order; validated against [`FEATURE_ORDER`].
    pub feature_order: Vec<String>,
    pub intercept: f64,
    pub terms: Vec<ModelTerm>,
}

impl EmissionModel {
    /// Load and validate the artifact.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        let model: EmissionModel = serde_json::from_str(&text)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.feature_order != FEATURE_ORDER {
            return Err(ModelError::SchemaMismatch {
                found: self.feature_order.clone(),
            });
        }
        for term in &self.terms {
            let feature = match term {
                ModelTerm::Numeric { feature, .. } => feature,
                ModelTerm::OneHot { feature, .. } => feature,
            };
            if !FEATURE_ORDER.contains(&feature.as_str()) {
                return Err(ModelError::UnknownFeature(feature.clone()));
            }
        }
        Ok(())
    }

    /// Predict CO2 emissions (g/km) for one record.
    pub fn predict(&self, input: &PredictionInput) -> Result<f64, ModelError> {
        let mut acc = self.intercept;
        for term in &self.terms {
            match term {
                ModelTerm::Numeric { feature, coefficient } => {
                    let value = input
                        .numeric(feature)
                        .ok_or_else(|| ModelError::UnknownFeature(feature.clone()))?;
                    acc += coefficient * value;
                }
                ModelTerm::OneHot { feature, weights } => {
                    let value = input
                        .categorical(feature)
                        .ok_or_else(|| ModelError::UnknownFeature(feature.clone()))?;
                    let weight = weights.get(value).ok_or_else(|| ModelError::UnknownCategory {
                        feature: feature.clone(),
                        value: value.to_string(),
                    })?;
                    acc += weight;
                }
            }
        }
        Ok(acc)
    }
}

// ---------------------------------------------------------------------------
// Form options – widget domains from the treated dataset
// ---------------------------------------------------------------------------

/// Domains for the prediction form: each categorical field offers the sorted
/// distinct values observed in the treated dataset; each slider is bounded to
/// the observed [min, max].
#[derive(Debug, Clone)]
pub struct FormOptions {
    pub model_years: Vec<i64>,
    pub transmissions: Vec<String>,
    pub vehicle_classes: Vec<String>,
    pub fuel_types: Vec<String>,
    pub engine_size_classes: Vec<String>,
    pub cylinders_classes: Vec<String>,
    pub city_range: (f64, f64),
    pub highway_range: (f64, f64),
    pub combined_range: (f64, f64),
}

fn distinct_ints(table: &Table, name: &str) -> Result<Vec<i64>, DataError> {
    let column = table.require_column(name)?;
    let mut out: Vec<i64> = column
        .distinct_values()
        .into_iter()
        .filter_map(|v| match v {
            CellValue::Int(i) => Some(i),
            _ => None,
        })
        .collect();
    out.sort_unstable();
    Ok(out)
}

fn distinct_strings(table: &Table, name: &str) -> Result<Vec<String>, DataError> {
    let column = table.require_column(name)?;
    let values = match &column.data {
        ColumnData::Str(_) => column.distinct_values(),
        _ => return Err(DataError::WrongType(name.to_string())),
    };
    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            CellValue::Str(s) => Some(s),
            _ => None,
        })
        .collect())
}

fn numeric_range(table: &Table, name: &str) -> Result<(f64, f64), DataError> {
    table
        .require_column(name)?
        .numeric_min_max()
        .ok_or_else(|| DataError::NotNumeric(name.to_string()))
}

impl FormOptions {
    pub fn from_table(treated: &Table) -> Result<Self, DataError> {
        Ok(FormOptions {
            model_years: distinct_ints(treated, "model_year")?,
            transmissions: distinct_strings(treated, "transmission")?,
            vehicle_classes: distinct_strings(treated, "vehicle_class_grouped")?,
            fuel_types: distinct_strings(treated, "fuel_type")?,
            engine_size_classes: distinct_strings(treated, "engine_size_l_class")?,
            cylinders_classes: distinct_strings(treated, "cylinders_class")?,
            city_range: numeric_range(treated, "city_l_100_km")?,
            highway_range: numeric_range(treated, "highway_l_100_km")?,
            combined_range: numeric_range(treated, "combined_l_100_km")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn fixed_input() -> PredictionInput {
        PredictionInput {
            model_year: 2020,
            transmission: "A1".into(),
            vehicle_class_grouped: "SUV".into(),
            fuel_type: "X".into(),
            engine_size_l_class: "small".into(),
            cylinders_class: "4".into(),
            city_l_100_km: 9.0,
            highway_l_100_km: 7.0,
            combined_l_100_km: 8.0,
        }
    }

    fn small_model() -> EmissionModel {
        EmissionModel {
            feature_order: FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
            intercept: 20.0,
            terms: vec![
                ModelTerm::Numeric {
                    feature: "combined_l_100_km".into(),
                    coefficient: 23.0,
                },
                ModelTerm::OneHot {
                    feature: "fuel_type".into(),
                    weights: [("X".to_string(), -4.0), ("D".to_string(), 11.0)]
                        .into_iter()
                        .collect(),
                },
            ],
        }
    }

    #[test]
    fn record_has_nine_fields_in_schema_order() {
        let record = fixed_input().to_record();
        let names: Vec<&str> = record.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, FEATURE_ORDER.to_vec());
        assert_eq!(record[0].1, CellValue::Int(2020));
        assert_eq!(record[1].1, CellValue::Str("A1".into()));
        assert_eq!(record[6].1, CellValue::Float(9.0));
        assert_eq!(record[8].1, CellValue::Float(8.0));
    }

    #[test]
    fn predict_is_linear_in_the_terms() {
        let model = small_model();
        let input = fixed_input();
        // 20 + 23 * 8.0 - 4.0
        let prediction = model.predict(&input).unwrap();
        assert!((prediction - 200.0).abs() < 1e-9);
        // The input is unchanged and reusable.
        assert_eq!(input, fixed_input());
        assert!((model.predict(&input).unwrap() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_category_is_an_error() {
        let model = small_model();
        let mut input = fixed_input();
        input.fuel_type = "Z".into();
        assert!(matches!(
            model.predict(&input),
            Err(ModelError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn artifact_schema_is_validated() {
        let mut model = small_model();
        model.feature_order.swap(0, 1);
        assert!(matches!(
            model.validate(),
            Err(ModelError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn artifact_round_trips_through_json() {
        let json = serde_json::to_string(&small_model()).unwrap();
        let parsed: EmissionModel = serde_json::from_str(&json).unwrap();
        parsed.validate().unwrap();
        assert_eq!(
            parsed.predict(&fixed_input()).unwrap(),
            small_model().predict(&fixed_input()).unwrap()
        );
    }

    fn treated() -> Table {
        Table::from_columns(vec![
            Column::new("model_year", ColumnData::Int(vec![Some(2021), Some(2020)])),
            Column::new(
                "transmission",
                ColumnData::Str(vec![Some("AS8".into()), Some("A1".into())]),
            ),
            Column::new(
                "vehicle_class_grouped",
                ColumnData::Str(vec![Some("SUV".into()), Some("sedan".into())]),
            ),
            Column::new(
                "fuel_type",
                ColumnData::Str(vec![Some("X".into()), Some("D".into())]),
            ),
            Column::new(
                "engine_size_l_class",
                ColumnData::Str(vec![Some("small".into()), Some("large".into())]),
            ),
            Column::new(
                "cylinders_class",
                ColumnData::Str(vec![Some("4".into()), Some("8".into())]),
            ),
            Column::new(
                "city_l_100_km",
                ColumnData::Float(vec![Some(9.5), Some(12.0)]),
            ),
            Column::new(
                "highway_l_100_km",
                ColumnData::Float(vec![Some(7.0), Some(9.0)]),
            ),
            Column::new(
                "combined_l_100_km",
                ColumnData::Float(vec![Some(8.3), Some(10.6)]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn form_options_come_from_observed_values() {
        let options = FormOptions::from_table(&treated()).unwrap();
        assert_eq!(options.model_years, vec![2020, 2021]);
        assert_eq!(options.transmissions, vec!["A1", "AS8"]);
        assert_eq!(options.city_range, (9.5, 12.0));
        assert_eq!(options.combined_range, (8.3, 10.6));
    }

    #[test]
    fn form_options_require_the_treated_schema() {
        let t = Table::from_columns(vec![Column::new(
            "model_year",
            ColumnData::Int(vec![Some(2020)]),
        )])
        .unwrap();
        assert!(FormOptions::from_table(&t).is_err());
    }
}
