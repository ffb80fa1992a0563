use super::model::{Column, ColumnData, DataError, Table};

/// Columns of the consolidated view, in display order.
pub const DISPLAY_COLUMNS: [&str; 7] = [
    "model_year",
    "make",
    "model",
    "co2_emissions_g_km",
    "fuel_type",
    "vehicle_class",
    "combined_l_100_km",
];

/// Single-letter fuel codes → descriptive labels.
pub const FUEL_LABELS: [(&str, &str); 5] = [
    ("X", "reg_gasoline"),
    ("Z", "premium_gasoline"),
    ("D", "diesel"),
    ("E", "ethanol"),
    ("N", "natural_gas"),
];

pub fn fuel_label(code: &str) -> Option<&'static str> {
    FUEL_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
}

/// Relabel the `fuel_type` column in place. Unknown codes pass through
/// unchanged with a warning.
pub fn relabel_fuel_codes(table: &mut Table) -> Result<(), DataError> {
    let column = table.require_column("fuel_type")?;
    let ColumnData::Str(values) = &column.data else {
        // Already relabeled or not a code column.
        return Ok(());
    };

    let relabeled: Vec<Option<String>> = values
        .iter()
        .map(|v| {
            v.as_ref().map(|code| match fuel_label(code) {
                Some(label) => label.to_string(),
                None => {
                    log::warn!("unknown fuel code '{code}' left unmapped");
                    code.clone()
                }
            })
        })
        .collect();

    table.replace_column(Column::categorical("fuel_type", ColumnData::Str(relabeled)))
}

/// Build the consolidated view shown on the Data tab: keep the display
/// columns in order, relabel fuel codes, and check the columns the charts
/// aggregate over are numeric.
pub fn prepare_consolidated(raw: &Table) -> Result<Table, DataError> {
    let mut view = raw.select(&DISPLAY_COLUMNS)?;
    relabel_fuel_codes(&mut view)?;

    for name in ["co2_emissions_g_km", "combined_l_100_km"] {
        if !view.require_column(name)?.is_numeric() {
            return Err(DataError::NotNumeric(name.to_string()));
        }
    }
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;

    fn raw() -> Table {
        let codes = ["X", "Z", "D", "E", "N"];
        Table::from_columns(vec![
            Column::new("model_year", ColumnData::Int(vec![Some(2020); 5])),
            Column::new(
                "make",
                ColumnData::Str(codes.iter().map(|_| Some("acura".into())).collect()),
            ),
            Column::new(
                "model",
                ColumnData::Str(codes.iter().map(|c| Some(format!("trim {c}"))).collect()),
            ),
            Column::new(
                "co2_emissions_g_km",
                ColumnData::Float(vec![Some(200.0); 5]),
            ),
            Column::new(
                "fuel_type",
                ColumnData::Str(codes.iter().map(|c| Some((*c).into())).collect()),
            ),
            Column::new(
                "vehicle_class",
                ColumnData::Str(codes.iter().map(|_| Some("compact".into())).collect()),
            ),
            Column::new("combined_l_100_km", ColumnData::Float(vec![Some(8.0); 5])),
            // Columns dropped before display.
            Column::new("co2_rating", ColumnData::Int(vec![Some(5); 5])),
            Column::new("engine_size_l", ColumnData::Float(vec![Some(2.0); 5])),
        ])
        .unwrap()
    }

    #[test]
    fn fuel_mapping_is_total_on_known_codes() {
        let mut t = raw();
        relabel_fuel_codes(&mut t).unwrap();
        let labels: Vec<CellValue> = {
            let col = t.column("fuel_type").unwrap();
            (0..t.n_rows()).map(|r| col.value(r)).collect()
        };
        let expect = [
            "reg_gasoline",
            "premium_gasoline",
            "diesel",
            "ethanol",
            "natural_gas",
        ];
        for (got, want) in labels.iter().zip(expect) {
            assert_eq!(*got, CellValue::Str(want.into()));
        }
        // No residual raw codes.
        for (code, _) in FUEL_LABELS {
            assert!(!labels.contains(&CellValue::Str(code.into())));
        }
    }

    #[test]
    fn unknown_codes_pass_through() {
        let mut t = Table::from_columns(vec![Column::new(
            "fuel_type",
            ColumnData::Str(vec![Some("X".into()), Some("Q".into())]),
        )])
        .unwrap();
        relabel_fuel_codes(&mut t).unwrap();
        let col = t.column("fuel_type").unwrap();
        assert_eq!(col.value(0), CellValue::Str("reg_gasoline".into()));
        assert_eq!(col.value(1), CellValue::Str("Q".into()));
        assert!(col.categorical);
    }

    #[test]
    fn consolidated_view_keeps_display_columns_in_order() {
        let view = prepare_consolidated(&raw()).unwrap();
        assert_eq!(view.column_names(), DISPLAY_COLUMNS.to_vec());
        assert!(view.column("co2_rating").is_none());
    }

    #[test]
    fn missing_display_column_is_fatal() {
        let t = Table::from_columns(vec![Column::new(
            "make",
            ColumnData::Str(vec![Some("acura".into())]),
        )])
        .unwrap();
        assert!(matches!(
            prepare_consolidated(&t),
            Err(DataError::MissingColumn(_))
        ));
    }

    #[test]
    fn non_numeric_chart_column_is_fatal() {
        let mut t = raw();
        t.replace_column(Column::new(
            "co2_emissions_g_km",
            ColumnData::Str(vec![Some("200".into()); 5]),
        ))
        .unwrap();
        assert!(matches!(
            prepare_consolidated(&t),
            Err(DataError::NotNumeric(_))
        ));
    }
}
