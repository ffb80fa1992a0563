use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use super::model::{CellValue, Column, ColumnData, Table};

/// Columns with fewer distinct values than this are treated as categorical.
pub const CATEGORICAL_THRESHOLD: usize = 10;

// ---------------------------------------------------------------------------
// Column classification
// ---------------------------------------------------------------------------

/// The filter control and predicate a column gets. Computed once per column,
/// so the UI and the predicate builder never probe types themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Multi-select over the distinct values.
    Categorical,
    /// Two-ended inclusive range.
    Numeric,
    /// Date range, applied only when both endpoints are set.
    Temporal,
    /// Substring / regex match on the string rendering.
    Text,
}

/// Classify a column:
/// * declared categorical, or fewer than [`CATEGORICAL_THRESHOLD`] distinct
///   values → `Categorical`
/// * numeric dtype → `Numeric`
/// * timestamp dtype → `Temporal`
/// * anything else → `Text`
pub fn classify(column: &Column) -> ColumnKind {
    if column.categorical || column.distinct_values().len() < CATEGORICAL_THRESHOLD {
        ColumnKind::Categorical
    } else if column.is_numeric() {
        ColumnKind::Numeric
    } else if column.is_temporal() {
        ColumnKind::Temporal
    } else {
        ColumnKind::Text
    }
}

/// Slider step for a numeric column's range control.
pub fn numeric_step(min: f64, max: f64) -> f64 {
    (max - min) / 100.0
}

// ---------------------------------------------------------------------------
// Datetime coercion
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Try to coerce every string column whose non-null values all parse as
/// timezone-naive timestamps into a `Date` column. Columns with any
/// non-parseable value are left untouched.
pub fn coerce_datetime_columns(table: &mut Table) {
    let candidates: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| matches!(c.data, ColumnData::Str(_)) && !c.categorical)
        .map(|c| c.name.clone())
        .collect();

    for name in candidates {
        let Some(column) = table.column(&name) else {
            continue;
        };
        let ColumnData::Str(values) = &column.data else {
            continue;
        };

        let mut parsed: Vec<Option<NaiveDateTime>> = Vec::with_capacity(values.len());
        let mut all_parse = true;
        let mut any_value = false;
        for v in values {
            match v {
                Some(s) => match parse_datetime(s) {
                    Some(dt) => {
                        any_value = true;
                        parsed.push(Some(dt));
                    }
                    None => {
                        all_parse = false;
                        break;
                    }
                },
                None => parsed.push(None),
            }
        }

        if all_parse && any_value {
            let coerced = Column::new(name, ColumnData::Date(parsed));
            // Same length by construction, replace cannot fail.
            let _ = table.replace_column(coerced);
        }
    }
}

// ---------------------------------------------------------------------------
// Filter predicates
// ---------------------------------------------------------------------------

/// One column's filter, built from the control matching its [`ColumnKind`].
#[derive(Debug, Clone)]
pub enum ColumnFilter {
    /// Keep rows whose value is in the set. An empty set keeps nothing.
    ValueSet(BTreeSet<CellValue>),
    /// Keep rows with `lo <= v <= hi`.
    Range { lo: f64, hi: f64 },
    /// Keep rows within the inclusive date range. With either endpoint
    /// missing the filter is skipped for this cycle.
    DateRange {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    /// Keep rows whose string rendering matches the pattern (regex,
    /// case-sensitive, unanchored). A pattern that fails to compile is
    /// matched as a literal substring instead.
    Pattern(String),
}

/// Column name → filter. AND-composed; absence of a column means no
/// constraint from it.
pub type FilterSet = BTreeMap<String, ColumnFilter>;

enum CompiledMatcher {
    Regex(Regex),
    Literal(String),
}

impl CompiledMatcher {
    fn new(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(re) => CompiledMatcher::Regex(re),
            Err(err) => {
                log::debug!("pattern '{pattern}' is not a valid regex ({err}), matching literally");
                CompiledMatcher::Literal(pattern.to_string())
            }
        }
    }

    fn is_match(&self, haystack: &str) -> bool {
        match self {
            CompiledMatcher::Regex(re) => re.is_match(haystack),
            CompiledMatcher::Literal(s) => haystack.contains(s.as_str()),
        }
    }
}

enum CompiledFilter<'a> {
    ValueSet(&'a BTreeSet<CellValue>),
    Range { lo: f64, hi: f64 },
    DateRange { start: NaiveDateTime, end: NaiveDateTime },
    Pattern(CompiledMatcher),
    /// Filters that impose no constraint this cycle.
    Pass,
}

fn compile<'a>(filter: &'a ColumnFilter) -> CompiledFilter<'a> {
    match filter {
        ColumnFilter::ValueSet(set) => CompiledFilter::ValueSet(set),
        ColumnFilter::Range { lo, hi } => CompiledFilter::Range { lo: *lo, hi: *hi },
        ColumnFilter::DateRange { start, end } => match (start, end) {
            (Some(s), Some(e)) => CompiledFilter::DateRange {
                // Inclusive bounds at midnight on both ends.
                start: s.and_hms_opt(0, 0, 0).unwrap_or(NaiveDateTime::MIN),
                end: e.and_hms_opt(0, 0, 0).unwrap_or(NaiveDateTime::MAX),
            },
            _ => CompiledFilter::Pass,
        },
        ColumnFilter::Pattern(p) => {
            if p.is_empty() {
                CompiledFilter::Pass
            } else {
                CompiledFilter::Pattern(CompiledMatcher::new(p))
            }
        }
    }
}

fn row_passes(column: &Column, row: usize, filter: &CompiledFilter) -> bool {
    match filter {
        CompiledFilter::Pass => true,
        CompiledFilter::ValueSet(set) => set.contains(&column.value(row)),
        CompiledFilter::Range { lo, hi } => match column.numeric(row) {
            Some(v) => *lo <= v && v <= *hi,
            None => false,
        },
        CompiledFilter::DateRange { start, end } => match &column.data {
            ColumnData::Date(values) => match values[row] {
                Some(dt) => *start <= dt && dt <= *end,
                None => false,
            },
            _ => false,
        },
        CompiledFilter::Pattern(matcher) => {
            let cell = column.value(row);
            if cell.is_null() {
                return false;
            }
            matcher.is_match(&cell.to_string())
        }
    }
}

/// Return indices of rows passing all filters, in row order.
///
/// An empty `FilterSet` is an identity passthrough. Filters on columns the
/// table does not have are ignored.
pub fn apply_filters(table: &Table, filters: &FilterSet) -> Vec<usize> {
    let compiled: Vec<(&Column, CompiledFilter)> = filters
        .iter()
        .filter_map(|(name, filter)| table.column(name).map(|col| (col, compile(filter))))
        .collect();

    (0..table.n_rows())
        .filter(|&row| {
            compiled
                .iter()
                .all(|entry| row_passes(entry.0, row, &entry.1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, ColumnData, Table};

    fn vehicles() -> Table {
        Table::from_columns(vec![
            Column::new(
                "make",
                ColumnData::Str(vec![
                    Some("acura".into()),
                    Some("bmw".into()),
                    Some("acura".into()),
                    Some("chevrolet".into()),
                ]),
            ),
            Column::new(
                "co2",
                ColumnData::Float(vec![Some(200.0), Some(250.0), Some(180.0), Some(300.0)]),
            ),
            Column::new(
                "model",
                ColumnData::Str(vec![
                    Some("ILX".into()),
                    Some("M240i".into()),
                    Some("MDX SH-AWD".into()),
                    Some("Malibu".into()),
                ]),
            ),
        ])
        .unwrap()
    }

    fn str_set(vals: &[&str]) -> BTreeSet<CellValue> {
        vals.iter().map(|s| CellValue::Str((*s).into())).collect()
    }

    #[test]
    fn no_filters_is_identity() {
        let t = vehicles();
        assert_eq!(apply_filters(&t, &FilterSet::new()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn categorical_subset_keeps_matching_rows() {
        let t = vehicles();
        let mut filters = FilterSet::new();
        filters.insert("make".into(), ColumnFilter::ValueSet(str_set(&["acura"])));
        assert_eq!(apply_filters(&t, &filters), vec![0, 2]);

        filters.insert("make".into(), ColumnFilter::ValueSet(BTreeSet::new()));
        assert!(apply_filters(&t, &filters).is_empty());
    }

    #[test]
    fn numeric_range_is_inclusive() {
        let t = vehicles();
        let mut filters = FilterSet::new();
        filters.insert("co2".into(), ColumnFilter::Range { lo: 180.0, hi: 250.0 });
        assert_eq!(apply_filters(&t, &filters), vec![0, 1, 2]);
    }

    #[test]
    fn and_composition_is_commutative() {
        let t = vehicles();
        let mut a = FilterSet::new();
        a.insert("co2".into(), ColumnFilter::Range { lo: 180.0, hi: 250.0 });
        a.insert("make".into(), ColumnFilter::ValueSet(str_set(&["acura", "bmw"])));

        let mut b = FilterSet::new();
        b.insert("make".into(), ColumnFilter::ValueSet(str_set(&["acura", "bmw"])));
        b.insert("co2".into(), ColumnFilter::Range { lo: 180.0, hi: 250.0 });

        assert_eq!(apply_filters(&t, &a), apply_filters(&t, &b));
        assert_eq!(apply_filters(&t, &a), vec![0, 1, 2]);
    }

    #[test]
    fn pattern_matches_substring_and_regex() {
        let t = vehicles();
        let mut filters = FilterSet::new();

        filters.insert("model".into(), ColumnFilter::Pattern("M".into()));
        assert_eq!(apply_filters(&t, &filters), vec![1, 2, 3]);

        filters.insert("model".into(), ColumnFilter::Pattern("^M\\d+".into()));
        assert_eq!(apply_filters(&t, &filters), vec![1]);

        // Case-sensitive.
        filters.insert("model".into(), ColumnFilter::Pattern("malibu".into()));
        assert!(apply_filters(&t, &filters).is_empty());

        // Empty pattern imposes no constraint.
        filters.insert("model".into(), ColumnFilter::Pattern(String::new()));
        assert_eq!(apply_filters(&t, &filters), vec![0, 1, 2, 3]);
    }

    #[test]
    fn invalid_regex_falls_back_to_substring() {
        let t = vehicles();
        let mut filters = FilterSet::new();
        // "SH-AWD(" does not compile as a regex but appears literally in row 2.
        filters.insert("model".into(), ColumnFilter::Pattern("AWD(".into()));
        assert!(apply_filters(&t, &filters).is_empty());
        filters.insert("model".into(), ColumnFilter::Pattern("SH-AWD".into()));
        assert_eq!(apply_filters(&t, &filters), vec![2]);
        filters.insert("model".into(), ColumnFilter::Pattern("(SH-AWD".into()));
        assert!(apply_filters(&t, &filters).is_empty());
    }

    fn date_table() -> Table {
        Table::from_columns(vec![Column::new(
            "sold_on",
            ColumnData::Str(vec![
                Some("2021-03-01".into()),
                Some("2021-06-15".into()),
                Some("2022-01-10".into()),
            ]),
        )])
        .unwrap()
    }

    #[test]
    fn coercion_converts_fully_parseable_columns() {
        let mut t = date_table();
        coerce_datetime_columns(&mut t);
        assert!(t.column("sold_on").unwrap().is_temporal());
        assert_eq!(classify(t.column("sold_on").unwrap()), ColumnKind::Categorical);
    }

    #[test]
    fn coercion_leaves_mixed_columns_alone() {
        let mut t = Table::from_columns(vec![Column::new(
            "note",
            ColumnData::Str(vec![Some("2021-03-01".into()), Some("n/a".into())]),
        )])
        .unwrap();
        coerce_datetime_columns(&mut t);
        assert!(!t.column("note").unwrap().is_temporal());
    }

    #[test]
    fn date_range_filters_inclusively_and_skips_partial_input() {
        let mut t = date_table();
        coerce_datetime_columns(&mut t);

        let mut filters = FilterSet::new();
        filters.insert(
            "sold_on".into(),
            ColumnFilter::DateRange {
                start: NaiveDate::from_ymd_opt(2021, 3, 1),
                end: NaiveDate::from_ymd_opt(2021, 12, 31),
            },
        );
        assert_eq!(apply_filters(&t, &filters), vec![0, 1]);

        // One endpoint → no filtering this cycle.
        filters.insert(
            "sold_on".into(),
            ColumnFilter::DateRange {
                start: NaiveDate::from_ymd_opt(2021, 3, 1),
                end: None,
            },
        );
        assert_eq!(apply_filters(&t, &filters), vec![0, 1, 2]);
    }

    #[test]
    fn classification_follows_distinct_count_and_dtype() {
        let t = vehicles();
        // 3 distinct makes → categorical.
        assert_eq!(classify(t.column("make").unwrap()), ColumnKind::Categorical);
        // 4 distinct floats is still under the threshold.
        assert_eq!(classify(t.column("co2").unwrap()), ColumnKind::Categorical);

        let wide = Column::new(
            "co2",
            ColumnData::Float((0..20).map(|i| Some(i as f64)).collect()),
        );
        assert_eq!(classify(&wide), ColumnKind::Numeric);

        let text = Column::new(
            "model",
            ColumnData::Str((0..20).map(|i| Some(format!("trim {i}"))).collect()),
        );
        assert_eq!(classify(&text), ColumnKind::Text);

        let declared = Column::categorical(
            "transmission",
            ColumnData::Str((0..20).map(|i| Some(format!("A{i}"))).collect()),
        );
        assert_eq!(classify(&declared), ColumnKind::Categorical);
    }
}
