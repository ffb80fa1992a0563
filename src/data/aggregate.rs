use std::collections::BTreeMap;

use super::model::{CellValue, DataError, Table};

// ---------------------------------------------------------------------------
// Grouped means
// ---------------------------------------------------------------------------

/// Mean of `value_col` per distinct value of `group_col`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub key: CellValue,
    pub mean: f64,
    pub count: usize,
}

/// Group rows by `group_col` and average `value_col`, dropping rows where
/// either side is null. The result is sorted descending by mean, the order
/// the bar charts display.
pub fn group_mean(table: &Table, group_col: &str, value_col: &str) -> Result<Vec<GroupMean>, DataError> {
    let keys = table.require_column(group_col)?;
    let values = table.require_column(value_col)?;
    if !values.is_numeric() {
        return Err(DataError::NotNumeric(value_col.to_string()));
    }

    let mut acc: BTreeMap<CellValue, (f64, usize)> = BTreeMap::new();
    for row in 0..table.n_rows() {
        let key = keys.value(row);
        if key.is_null() {
            continue;
        }
        let Some(v) = values.numeric(row) else {
            continue;
        };
        if v.is_nan() {
            continue;
        }
        let entry = acc.entry(key).or_insert((0.0, 0));
        entry.0 += v;
        entry.1 += 1;
    }

    let mut groups: Vec<GroupMean> = acc
        .into_iter()
        .map(|(key, (sum, count))| GroupMean {
            key,
            mean: sum / count as f64,
            count,
        })
        .collect();
    groups.sort_by(|a, b| b.mean.total_cmp(&a.mean));
    Ok(groups)
}

/// Arithmetic mean of a numeric column, nulls and NaNs dropped.
pub fn column_mean(table: &Table, name: &str) -> Result<Option<f64>, DataError> {
    let column = table.require_column(name)?;
    if !column.is_numeric() {
        return Err(DataError::NotNumeric(name.to_string()));
    }
    let mut sum = 0.0;
    let mut count = 0usize;
    for row in 0..table.n_rows() {
        if let Some(v) = column.numeric(row) {
            if !v.is_nan() {
                sum += v;
                count += 1;
            }
        }
    }
    Ok((count > 0).then(|| sum / count as f64))
}

// ---------------------------------------------------------------------------
// Scatter series
// ---------------------------------------------------------------------------

/// Raw `[x, y]` points for one value of the coloring dimension.
#[derive(Debug, Clone)]
pub struct ScatterSeries {
    pub label: String,
    pub points: Vec<[f64; 2]>,
}

/// Split the rows into one point series per distinct value of `color_col`,
/// keeping only rows where both axes are present. Series are ordered by key.
pub fn scatter_by(
    table: &Table,
    x_col: &str,
    y_col: &str,
    color_col: &str,
) -> Result<Vec<ScatterSeries>, DataError> {
    let xs = table.require_column(x_col)?;
    let ys = table.require_column(y_col)?;
    let colors = table.require_column(color_col)?;
    if !xs.is_numeric() {
        return Err(DataError::NotNumeric(x_col.to_string()));
    }
    if !ys.is_numeric() {
        return Err(DataError::NotNumeric(y_col.to_string()));
    }

    let mut series: BTreeMap<CellValue, Vec<[f64; 2]>> = BTreeMap::new();
    for row in 0..table.n_rows() {
        let key = colors.value(row);
        if key.is_null() {
            continue;
        }
        if let (Some(x), Some(y)) = (xs.numeric(row), ys.numeric(row)) {
            if !x.is_nan() && !y.is_nan() {
                series.entry(key).or_default().push([x, y]);
            }
        }
    }

    Ok(series
        .into_iter()
        .map(|(key, points)| ScatterSeries {
            label: key.to_string(),
            points,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Treemap hierarchy
// ---------------------------------------------------------------------------

/// One node of the treemap: total and mean of the value column over the rows
/// under this node, with children one path level deeper.
#[derive(Debug, Clone)]
pub struct TreemapNode {
    pub label: String,
    pub total: f64,
    pub mean: f64,
    pub count: usize,
    pub children: Vec<TreemapNode>,
}

/// Group rows through `path` (one nesting level per column), aggregating
/// `value_col`. The root carries the constant label. Rows with a null in any
/// path column or a missing value are skipped.
pub fn treemap(
    table: &Table,
    root_label: &str,
    path: &[&str],
    value_col: &str,
) -> Result<TreemapNode, DataError> {
    for name in path {
        table.require_column(name)?;
    }
    let values = table.require_column(value_col)?;
    if !values.is_numeric() {
        return Err(DataError::NotNumeric(value_col.to_string()));
    }

    let rows: Vec<usize> = (0..table.n_rows())
        .filter(|&row| {
            values.numeric(row).is_some_and(|v| !v.is_nan())
                && path
                    .iter()
                    .all(|col| !table.column(col).unwrap().value(row).is_null())
        })
        .collect();

    Ok(build_node(table, root_label.to_string(), &rows, path, value_col))
}

fn build_node(
    table: &Table,
    label: String,
    rows: &[usize],
    remaining_path: &[&str],
    value_col: &str,
) -> TreemapNode {
    let values = table.column(value_col).unwrap();
    let total: f64 = rows.iter().filter_map(|&r| values.numeric(r)).sum();
    let count = rows.len();
    let mean = if count > 0 { total / count as f64 } else { 0.0 };

    let children = match remaining_path.split_first() {
        None => Vec::new(),
        Some((level, rest)) => {
            let column = table.column(level).unwrap();
            let mut buckets: BTreeMap<CellValue, Vec<usize>> = BTreeMap::new();
            for &row in rows {
                buckets.entry(column.value(row)).or_default().push(row);
            }
            buckets
                .into_iter()
                .map(|(key, bucket)| build_node(table, key.to_string(), &bucket, rest, value_col))
                .collect()
        }
    };

    TreemapNode {
        label,
        total,
        mean,
        count,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, ColumnData};

    fn emissions() -> Table {
        Table::from_columns(vec![
            Column::new(
                "make",
                ColumnData::Str(vec![
                    Some("A".into()),
                    Some("A".into()),
                    Some("B".into()),
                    Some("B".into()),
                    None,
                ]),
            ),
            Column::new(
                "class",
                ColumnData::Str(vec![
                    Some("suv".into()),
                    Some("compact".into()),
                    Some("suv".into()),
                    Some("suv".into()),
                    Some("suv".into()),
                ]),
            ),
            Column::new(
                "co2",
                ColumnData::Float(vec![Some(10.0), Some(20.0), Some(30.0), None, Some(40.0)]),
            ),
            Column::new(
                "combined",
                ColumnData::Float(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn group_means_drop_nulls_and_sort_descending() {
        let groups = group_mean(&emissions(), "make", "co2").unwrap();
        // B's null row is excluded, A averages 10 and 20.
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, CellValue::Str("B".into()));
        assert_eq!(groups[0].mean, 30.0);
        assert_eq!(groups[0].count, 1);
        assert_eq!(groups[1].key, CellValue::Str("A".into()));
        assert_eq!(groups[1].mean, 15.0);
        assert_eq!(groups[1].count, 2);
    }

    #[test]
    fn group_mean_requires_numeric_values() {
        assert!(matches!(
            group_mean(&emissions(), "co2", "make"),
            Err(DataError::NotNumeric(_))
        ));
    }

    #[test]
    fn column_mean_drops_missing() {
        // (10 + 20 + 30 + 40) / 4
        assert_eq!(column_mean(&emissions(), "co2").unwrap(), Some(25.0));
        let empty = Table::from_columns(vec![Column::new(
            "co2",
            ColumnData::Float(vec![None, None]),
        )])
        .unwrap();
        assert_eq!(column_mean(&empty, "co2").unwrap(), None);
    }

    #[test]
    fn scatter_series_split_by_category() {
        let series = scatter_by(&emissions(), "combined", "co2", "make").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "A");
        assert_eq!(series[0].points, vec![[1.0, 10.0], [2.0, 20.0]]);
        // B's second row has no co2 value, and the null-make row is dropped.
        assert_eq!(series[1].points, vec![[3.0, 30.0]]);
    }

    #[test]
    fn treemap_aggregates_per_level() {
        let root = treemap(&emissions(), "co2", &["make", "class"], "co2").unwrap();
        assert_eq!(root.label, "co2");
        assert_eq!(root.count, 3);
        assert_eq!(root.total, 60.0);
        assert_eq!(root.mean, 20.0);

        assert_eq!(root.children.len(), 2);
        let a = &root.children[0];
        assert_eq!(a.label, "A");
        assert_eq!(a.total, 30.0);
        assert_eq!(a.children.len(), 2); // compact + suv
        let b = &root.children[1];
        assert_eq!(b.label, "B");
        assert_eq!(b.count, 1);
        assert!(b.children.iter().all(|c| c.label == "suv"));
    }
}
