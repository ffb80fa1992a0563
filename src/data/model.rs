use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors for table operations
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DataError {
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error("column '{name}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        actual: usize,
        expected: usize,
    },
    #[error("column '{0}' is not numeric")]
    NotNumeric(String),
    #[error("column '{0}' does not hold the expected type")]
    WrongType(String),
}

// ---------------------------------------------------------------------------
// CellValue – a single dynamically-typed cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the dtypes the datasets carry.
/// Used in `BTreeMap` / `BTreeSet` downstream so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Timezone-naive timestamp.
    Date(NaiveDateTime),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Int(_) => 2,
                Float(_) => 3,
                Str(_) => 4,
                Date(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Str(s) => s.hash(state),
            CellValue::Int(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Date(d) => d.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Str(s) => write!(f, "{s}"),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.2}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Try to interpret the value as an `f64` for ranges and aggregation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// ---------------------------------------------------------------------------
// Column – one typed column of the table
// ---------------------------------------------------------------------------

/// Typed column storage. `None` entries are nulls.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Str(Vec<Option<String>>),
    Date(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Str(v) => v.len(),
            ColumnData::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
    /// Declared categorical at load time (e.g. arrow dictionary encoding).
    pub categorical: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Column {
            name: name.into(),
            data,
            categorical: false,
        }
    }

    pub fn categorical(name: impl Into<String>, data: ColumnData) -> Self {
        Column {
            name: name.into(),
            data,
            categorical: true,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cell at `row` as a dynamically-typed value.
    pub fn value(&self, row: usize) -> CellValue {
        match &self.data {
            ColumnData::Int(v) => v[row].map_or(CellValue::Null, CellValue::Int),
            ColumnData::Float(v) => v[row].map_or(CellValue::Null, CellValue::Float),
            ColumnData::Bool(v) => v[row].map_or(CellValue::Null, CellValue::Bool),
            ColumnData::Str(v) => v[row]
                .as_ref()
                .map_or(CellValue::Null, |s| CellValue::Str(s.clone())),
            ColumnData::Date(v) => v[row].map_or(CellValue::Null, CellValue::Date),
        }
    }

    /// Cell at `row` as `f64`, if the column is numeric and the cell non-null.
    pub fn numeric(&self, row: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Int(v) => v[row].map(|i| i as f64),
            ColumnData::Float(v) => v[row],
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Int(_) | ColumnData::Float(_))
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self.data, ColumnData::Date(_))
    }

    /// Sorted set of distinct non-null values.
    pub fn distinct_values(&self) -> BTreeSet<CellValue> {
        (0..self.len())
            .map(|row| self.value(row))
            .filter(|v| !v.is_null())
            .collect()
    }

    /// Inclusive [min, max] over the non-null numeric values.
    pub fn numeric_min_max(&self) -> Option<(f64, f64)> {
        let mut bounds: Option<(f64, f64)> = None;
        for row in 0..self.len() {
            if let Some(v) = self.numeric(row) {
                if v.is_nan() {
                    continue;
                }
                bounds = Some(match bounds {
                    Some((lo, hi)) => (lo.min(v), hi.max(v)),
                    None => (v, v),
                });
            }
        }
        bounds
    }

    /// Inclusive [min, max] over the non-null timestamps.
    pub fn date_min_max(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let ColumnData::Date(values) = &self.data else {
            return None;
        };
        let mut bounds: Option<(NaiveDateTime, NaiveDateTime)> = None;
        for v in values.iter().flatten() {
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(*v), hi.max(*v)),
                None => (*v, *v),
            });
        }
        bounds
    }
}

// ---------------------------------------------------------------------------
// Table – the loaded dataset, read-only after construction
// ---------------------------------------------------------------------------

/// A column-oriented table. Rows have no identity beyond their position.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table, checking that all columns have the same length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, DataError> {
        let n_rows = columns.first().map_or(0, Column::len);
        for col in &columns {
            if col.len() != n_rows {
                return Err(DataError::LengthMismatch {
                    name: col.name.clone(),
                    actual: col.len(),
                    expected: n_rows,
                });
            }
        }
        Ok(Table { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> Result<&Column, DataError> {
        self.column(name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    }

    /// Replace a column in place, keeping its position.
    pub fn replace_column(&mut self, column: Column) -> Result<(), DataError> {
        if column.len() != self.n_rows {
            return Err(DataError::LengthMismatch {
                name: column.name.clone(),
                actual: column.len(),
                expected: self.n_rows,
            });
        }
        let slot = self
            .columns
            .iter_mut()
            .find(|c| c.name == column.name)
            .ok_or_else(|| DataError::MissingColumn(column.name.clone()))?;
        *slot = column;
        Ok(())
    }

    /// New table holding only `names`, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Table, DataError> {
        let columns = names
            .iter()
            .map(|name| self.require_column(name).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Table::from_columns(columns)
    }

    pub fn cell(&self, row: usize, column: &str) -> Result<CellValue, DataError> {
        Ok(self.require_column(column)?.value(row))
    }
}
