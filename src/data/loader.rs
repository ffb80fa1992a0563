use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, TimeUnit};
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, ColumnData, Table};
use crate::regress::EmissionModel;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a tabular dataset from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – Parquet file, one column per field (recommended)
/// * `.json`    – records-oriented array: `[{ "col": value, ... }, ...]`
/// * `.csv`     – header row, per-column type inference
pub fn load_table(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Load the serialized regression artifact.
pub fn load_model(path: &Path) -> Result<EmissionModel> {
    EmissionModel::load(path).with_context(|| format!("loading model from {}", path.display()))
}

// ---------------------------------------------------------------------------
// Load-once cache
// ---------------------------------------------------------------------------

/// Memoizes tables and the model artifact by path for the process lifetime,
/// so UI repaints never re-read storage. Handles are `Arc`s; everything
/// behind them is immutable after the first load.
#[derive(Default)]
pub struct DataCache {
    tables: HashMap<PathBuf, Arc<Table>>,
    models: HashMap<PathBuf, Arc<EmissionModel>>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&mut self, path: &Path) -> Result<Arc<Table>> {
        if let Some(table) = self.tables.get(path) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(
            load_table(path).with_context(|| format!("loading table from {}", path.display()))?,
        );
        log::info!(
            "loaded {} rows x {} columns from {}",
            table.n_rows(),
            table.columns().len(),
            path.display()
        );
        self.tables.insert(path.to_path_buf(), Arc::clone(&table));
        Ok(table)
    }

    pub fn model(&mut self, path: &Path) -> Result<Arc<EmissionModel>> {
        if let Some(model) = self.models.get(path) {
            return Ok(Arc::clone(model));
        }
        let model = Arc::new(load_model(path)?);
        log::info!(
            "loaded model with {} terms from {}",
            model.terms.len(),
            path.display()
        );
        self.models.insert(path.to_path_buf(), Arc::clone(&model));
        Ok(model)
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file into a [`Table`].
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Dictionary-encoded string columns come
/// back as categorical columns; date and timestamp columns come back as
/// timezone-naive timestamps.
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let batches: Vec<_> = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("reading parquet record batches")?;
    let batch = concat_batches(&schema, &batches).context("concatenating record batches")?;

    let mut columns = Vec::with_capacity(schema.fields().len());
    for (idx, field) in schema.fields().iter().enumerate() {
        match arrow_to_column(field.name(), batch.column(idx)) {
            Some(column) => columns.push(column),
            None => log::warn!(
                "skipping column '{}' with unsupported type {:?}",
                field.name(),
                field.data_type()
            ),
        }
    }

    Table::from_columns(columns).context("assembling table")
}

/// Convert one Arrow column into typed column storage. Returns `None` for
/// types the dashboard has no use for (nested lists, binary, ...).
fn arrow_to_column(name: &str, array: &ArrayRef) -> Option<Column> {
    let (canonical, categorical): (DataType, bool) = match array.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => (DataType::Utf8, false),
        DataType::Dictionary(_, value) if matches!(**value, DataType::Utf8 | DataType::LargeUtf8) => {
            (DataType::Utf8, true)
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => (DataType::Int64, false),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => (DataType::Float64, false),
        DataType::Boolean => (DataType::Boolean, false),
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            // Timezones are stripped; the dashboard is timezone-naive.
            (DataType::Timestamp(TimeUnit::Microsecond, None), false)
        }
        _ => return None,
    };

    let array = cast(array, &canonical).ok()?;
    let data = match canonical {
        DataType::Utf8 => {
            let arr = array.as_any().downcast_ref::<StringArray>()?;
            ColumnData::Str(
                (0..arr.len())
                    .map(|i| (!arr.is_null(i)).then(|| arr.value(i).to_string()))
                    .collect(),
            )
        }
        DataType::Int64 => {
            let arr = array.as_any().downcast_ref::<Int64Array>()?;
            ColumnData::Int((0..arr.len()).map(|i| (!arr.is_null(i)).then(|| arr.value(i))).collect())
        }
        DataType::Float64 => {
            let arr = array.as_any().downcast_ref::<Float64Array>()?;
            ColumnData::Float(
                (0..arr.len())
                    .map(|i| (!arr.is_null(i)).then(|| arr.value(i)))
                    .collect(),
            )
        }
        DataType::Boolean => {
            let arr = array.as_any().downcast_ref::<BooleanArray>()?;
            ColumnData::Bool(
                (0..arr.len())
                    .map(|i| (!arr.is_null(i)).then(|| arr.value(i)))
                    .collect(),
            )
        }
        DataType::Timestamp(TimeUnit::Microsecond, None) => {
            let arr = array.as_any().downcast_ref::<TimestampMicrosecondArray>()?;
            ColumnData::Date(
                (0..arr.len())
                    .map(|i| {
                        (!arr.is_null(i))
                            .then(|| DateTime::from_timestamp_micros(arr.value(i)))
                            .flatten()
                            .map(|dt| dt.naive_utc())
                    })
                    .collect(),
            )
        }
        _ => return None,
    };

    Some(Column {
        name: name.to_string(),
        data,
        categorical,
    })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default
/// `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "model_year": 2020, "make": "acura", "co2_emissions_g_km": 199.0 },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    table_from_json_str(&text)
}

fn table_from_json_str(text: &str) -> Result<Table> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    // Union of keys across records; missing keys become nulls.
    let mut names: Vec<String> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if seen.insert(key.clone()) {
                names.push(key.clone());
            }
        }
    }

    let mut cells: BTreeMap<String, Vec<Option<JsonValue>>> = names
        .iter()
        .map(|n| (n.clone(), Vec::with_capacity(records.len())))
        .collect();
    for rec in records {
        let obj = rec.as_object().expect("validated above");
        for name in &names {
            cells
                .get_mut(name)
                .expect("key present")
                .push(obj.get(name).filter(|v| !v.is_null()).cloned());
        }
    }

    let columns = names
        .iter()
        .map(|name| {
            let values = &cells[name];
            json_values_to_column(name, values)
                .with_context(|| format!("column '{name}' mixes incompatible JSON types"))
        })
        .collect::<Result<Vec<_>>>()?;

    Table::from_columns(columns).context("assembling table")
}

fn json_values_to_column(name: &str, values: &[Option<JsonValue>]) -> Result<Column> {
    let mut all_int = true;
    let mut all_number = true;
    let mut all_string = true;
    let mut all_bool = true;
    for v in values.iter().flatten() {
        all_int &= v.as_i64().is_some();
        all_number &= v.is_number();
        all_string &= v.is_string();
        all_bool &= v.is_boolean();
    }

    let data = if all_int {
        ColumnData::Int(values.iter().map(|v| v.as_ref().and_then(JsonValue::as_i64)).collect())
    } else if all_number {
        ColumnData::Float(values.iter().map(|v| v.as_ref().and_then(JsonValue::as_f64)).collect())
    } else if all_bool {
        ColumnData::Bool(values.iter().map(|v| v.as_ref().and_then(JsonValue::as_bool)).collect())
    } else if all_string {
        ColumnData::Str(
            values
                .iter()
                .map(|v| v.as_ref().and_then(|v| v.as_str().map(str::to_string)))
                .collect(),
        )
    } else {
        bail!("unsupported value mix");
    };
    Ok(Column::new(name, data))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one vehicle per row. Column
/// types are inferred: all-integer → Int, all-numeric → Float,
/// true/false → Bool, anything else → Str. Empty cells are nulls.
fn load_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        if record.len() != headers.len() {
            bail!(
                "CSV row {row_no}: {} fields, expected {}",
                record.len(),
                headers.len()
            );
        }
        for (col, value) in record.iter().enumerate() {
            raw[col].push((!value.is_empty()).then(|| value.to_string()));
        }
    }

    let columns = headers
        .iter()
        .zip(raw.iter())
        .map(|(name, values)| infer_csv_column(name, values))
        .collect();
    Table::from_columns(columns).context("assembling table")
}

fn infer_csv_column(name: &str, values: &[Option<String>]) -> Column {
    let non_null = || values.iter().flatten();

    if non_null().all(|s| s.parse::<i64>().is_ok()) && non_null().next().is_some() {
        return Column::new(
            name,
            ColumnData::Int(values.iter().map(|v| v.as_ref().and_then(|s| s.parse().ok())).collect()),
        );
    }
    if non_null().all(|s| s.parse::<f64>().is_ok()) && non_null().next().is_some() {
        return Column::new(
            name,
            ColumnData::Float(
                values.iter().map(|v| v.as_ref().and_then(|s| s.parse().ok())).collect(),
            ),
        );
    }
    if non_null().all(|s| s == "true" || s == "false") && non_null().next().is_some() {
        return Column::new(
            name,
            ColumnData::Bool(
                values
                    .iter()
                    .map(|v| v.as_ref().map(|s| s == "true"))
                    .collect(),
            ),
        );
    }
    Column::new(name, ColumnData::Str(values.to_vec()))
}
