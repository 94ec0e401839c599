// src/station/mod.rs
//
// Monthly station summaries: STATION, STATION_NAME, ELEVATION, LATITUDE,
// LONGITUDE, DATE, TPCP, MMXT, MMNT. Precipitation is in tenths of mm,
// temperatures in tenths of °C, -9999 marks a missing value.

use anyhow::{Context, Result};
use arrow::array::ArrayRef;
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use tracing::{info, instrument};

use crate::{
    aggregate::{keys_where, missing_by_group},
    config::Config,
    io::read::{expand_inputs, read_all},
    table::{
        convert::{convert_columns, date_part, DatePart},
        missing::normalize_table,
        transform::{divide, normalize_name},
        ColumnKind, Table,
    },
};

pub const STATION: &str = "station";
pub const STATION_NAME: &str = "station_name";
pub const ELEVATION: &str = "elevation";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const DATE: &str = "date";
pub const TPCP: &str = "tpcp";
pub const MMXT: &str = "mmxt";
pub const MMNT: &str = "mmnt";
pub const YEAR: &str = "year";
pub const MONTH: &str = "month";

pub fn default_kinds() -> BTreeMap<String, ColumnKind> {
    [
        (STATION, ColumnKind::Text),
        (STATION_NAME, ColumnKind::Text),
        (ELEVATION, ColumnKind::Numeric),
        (LATITUDE, ColumnKind::Numeric),
        (LONGITUDE, ColumnKind::Numeric),
        (DATE, ColumnKind::Date),
        (TPCP, ColumnKind::Numeric),
        (MMXT, ColumnKind::Numeric),
        (MMNT, ColumnKind::Numeric),
    ]
    .into_iter()
    .map(|(n, k)| (n.to_string(), k))
    .collect()
}

/// Tenths → units for the three measurement columns.
pub fn default_divisors() -> BTreeMap<String, f64> {
    [TPCP, MMXT, MMNT]
        .into_iter()
        .map(|n| (n.to_string(), 10.0))
        .collect()
}

/// Turn a freshly read all-text table into the cleaned form:
/// lowercase names, renames, typed columns, sentinel → absent,
/// unit conversion, then `year` and `month` appended.
#[instrument(level = "info", skip_all, fields(rows = raw.num_rows()))]
pub fn prepare(raw: Table, config: &Config) -> Result<Table> {
    let mut t = if config.tidy_names {
        raw.rename_with(normalize_name)?
    } else {
        raw.rename_with(|n| n.trim().to_lowercase())?
    };
    for (from, to) in &config.renames {
        if t.has_column(from) {
            t = t.rename(from, to)?;
        }
    }

    t = convert_columns(t, &config.columns, &config.date_format)?;

    let measured: Vec<String> = t
        .column_names()
        .into_iter()
        .filter(|n| {
            matches!(
                config.columns.get(n),
                Some(ColumnKind::Numeric | ColumnKind::Integer)
            )
        })
        .collect();
    t = normalize_table(t, &measured, config.sentinel)?;

    for (name, divisor) in &config.divide {
        if !t.has_column(name) {
            continue;
        }
        let units = divide(t.numeric(name)?, *divisor);
        t = t.with_column(name, Arc::new(units) as ArrayRef)?;
    }

    if t.has_column(&config.date_column) {
        let dates = t
            .date(&config.date_column)
            .context("deriving year and month")?;
        let year = date_part(dates, DatePart::Year);
        let month = date_part(dates, DatePart::Month);
        t = t
            .with_column(YEAR, Arc::new(year) as ArrayRef)?
            .with_column(MONTH, Arc::new(month) as ArrayRef)?;
    }

    info!(columns = t.num_columns(), "prepared table");
    Ok(t)
}

/// Read every input matched by `patterns` and prepare the combined table.
pub fn load(patterns: &[String], config: &Config) -> Result<Table> {
    let paths: Vec<PathBuf> = expand_inputs(patterns)?;
    let raw = read_all(&paths, config.delimiter_byte())?;
    prepare(raw, config)
}

/// Names of stations with at least one absent `target` value.
pub fn stations_with_missing(table: &Table, target: &str, config: &Config) -> Result<Vec<String>> {
    let scan = missing_by_group(table, target, &config.group_column)?;
    Ok(keys_where(&scan, |missing| *missing))
}
