// src/table/convert.rs

use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{
        Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int32Array, StringArray,
    },
    datatypes::DataType,
};
use chrono::{Datelike, Duration, NaiveDate};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

use super::{kind::describe, ColumnKind, Table};

pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";

/// Which part of a date to pull out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
}

/// Trim whitespace and strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Days since 1970-01-01, the Date32 representation.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.signed_duration_since(epoch()).num_days() as i32
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    epoch().checked_add_signed(Duration::days(i64::from(days)))
}

pub fn parse_date(s: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(clean_str(s), format).ok()
}

/// Text → numeric. Blank or unparseable cells become absent.
pub fn to_numeric(text: &StringArray) -> Float64Array {
    text.iter()
        .map(|opt| opt.and_then(|s| clean_str(s).parse::<f64>().ok()))
        .collect()
}

/// Text → integer. Accepts integral decimals such as `"12.0"`.
pub fn to_integer(text: &StringArray) -> Int32Array {
    text.iter()
        .map(|opt| {
            opt.and_then(|s| {
                let c = clean_str(s);
                c.parse::<i32>().ok().or_else(|| {
                    c.parse::<f64>()
                        .ok()
                        .filter(|v| v.fract() == 0.0 && *v >= i32::MIN as f64 && *v <= i32::MAX as f64)
                        .map(|v| v as i32)
                })
            })
        })
        .collect()
}

/// Text → date using a chrono format string. Failures become absent.
pub fn to_date(text: &StringArray, format: &str) -> Date32Array {
    text.iter()
        .map(|opt| opt.and_then(|s| parse_date(s, format)).map(date_to_days))
        .collect()
}

/// Pull one calendar field out of every date.
pub fn date_part(dates: &Date32Array, part: DatePart) -> Int32Array {
    dates
        .iter()
        .map(|opt| {
            opt.and_then(days_to_date).map(|d| match part {
                DatePart::Year => d.year(),
                DatePart::Month => d.month() as i32,
                DatePart::Day => d.day() as i32,
            })
        })
        .collect()
}

/// Convert a column to `kind`.
///
/// Text columns are parsed; a column already of `kind` passes through; any
/// other pairing is an error.
pub fn convert_column(array: &ArrayRef, kind: ColumnKind, date_format: &str) -> Result<ArrayRef> {
    if array.data_type() == &kind.data_type() {
        return Ok(array.clone());
    }
    let text = array.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
        anyhow!(
            "cannot convert {} column to {}",
            describe(array.data_type()),
            kind
        )
    })?;

    let out: ArrayRef = match kind {
        ColumnKind::Numeric => Arc::new(to_numeric(text)),
        ColumnKind::Integer => Arc::new(to_integer(text)),
        ColumnKind::Date => Arc::new(to_date(text, date_format)),
        ColumnKind::Text => array.clone(),
    };
    Ok(out)
}

/// Convert every column named in `kinds` that exists in `table`.
pub fn convert_columns(
    table: Table,
    kinds: &BTreeMap<String, ColumnKind>,
    date_format: &str,
) -> Result<Table> {
    let mut out = table;
    for (name, kind) in kinds {
        if !out.has_column(name) {
            continue;
        }
        let col = out.column(name)?;
        let before = col.null_count();
        let converted = convert_column(col, *kind, date_format)
            .with_context(|| format!("converting column '{}'", name))?;
        let lost = converted.null_count().saturating_sub(before);
        if lost > 0 {
            debug!(column = %name, kind = %kind, lost, "cells could not be parsed, now absent");
        }
        out = out.with_column(name, converted)?;
    }
    Ok(out)
}

/// Render every cell of a column as text, `None` for absent.
///
/// Numbers use the shortest display form (`10` not `10.0`), dates are ISO `YYYY-MM-DD`.
pub fn format_cells(array: &ArrayRef) -> Result<Vec<Option<String>>> {
    let any = array.as_any();
    let cells: Vec<Option<String>> = match array.data_type() {
        DataType::Utf8 => downcast::<StringArray>(any)?
            .iter()
            .map(|o| o.map(str::to_string))
            .collect(),
        DataType::Float64 => downcast::<Float64Array>(any)?
            .iter()
            .map(|o| o.map(|v| v.to_string()))
            .collect(),
        DataType::Int32 => downcast::<Int32Array>(any)?
            .iter()
            .map(|o| o.map(|v| v.to_string()))
            .collect(),
        DataType::Date32 => downcast::<Date32Array>(any)?
            .iter()
            .map(|o| {
                o.and_then(days_to_date)
                    .map(|d| d.format("%Y-%m-%d").to_string())
            })
            .collect(),
        DataType::Boolean => downcast::<BooleanArray>(any)?
            .iter()
            .map(|o| o.map(|v| if v { "TRUE" } else { "FALSE" }.to_string()))
            .collect(),
        other => bail!("cannot render {:?} column as text", other),
    };
    Ok(cells)
}

fn downcast<T: Array + 'static>(any: &dyn std::any::Any) -> Result<&T> {
    any.downcast_ref::<T>()
        .ok_or_else(|| anyhow!("array does not match its declared type"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: Vec<Option<&str>>) -> StringArray {
        StringArray::from(values)
    }

    #[test]
    fn clean_str_strips_quotes_and_space() {
        assert_eq!(clean_str("  \"20100101\" "), "20100101");
        assert_eq!(clean_str("\""), "\"");
        assert_eq!(clean_str(" plain "), "plain");
    }

    #[test]
    fn numeric_conversion_marks_garbage_absent() {
        let out = to_numeric(&text(vec![Some("12"), Some(" -9999 "), Some("abc"), None, Some("")]));
        assert_eq!(
            out.iter().collect::<Vec<_>>(),
            vec![Some(12.0), Some(-9999.0), None, None, None]
        );
    }

    #[test]
    fn integer_conversion_accepts_integral_decimals() {
        let out = to_integer(&text(vec![Some("2010"), Some("3.0"), Some("3.5")]));
        assert_eq!(out.iter().collect::<Vec<_>>(), vec![Some(2010), Some(3), None]);
    }

    #[test]
    fn dates_parse_and_split() {
        let dates = to_date(
            &text(vec![Some("20100301"), Some("2010-03-01"), Some("20101201")]),
            DEFAULT_DATE_FORMAT,
        );
        assert_eq!(dates.null_count(), 1);
        assert_eq!(
            date_part(&dates, DatePart::Year).iter().collect::<Vec<_>>(),
            vec![Some(2010), None, Some(2010)]
        );
        assert_eq!(
            date_part(&dates, DatePart::Month).iter().collect::<Vec<_>>(),
            vec![Some(3), None, Some(12)]
        );
        assert_eq!(
            date_part(&dates, DatePart::Day).iter().collect::<Vec<_>>(),
            vec![Some(1), None, Some(1)]
        );
    }

    #[test]
    fn days_round_trip() {
        let d = NaiveDate::from_ymd_opt(2010, 3, 1).unwrap();
        assert_eq!(days_to_date(date_to_days(d)), Some(d));
        assert_eq!(date_to_days(epoch()), 0);
    }

    #[test]
    fn convert_columns_skips_unknown_and_rejects_bad_pairs() -> Result<()> {
        let t = Table::new(vec![
            ("date", Arc::new(text(vec![Some("20100101")])) as ArrayRef),
            ("tpcp", Arc::new(text(vec![Some("5")])) as ArrayRef),
        ])?;
        let mut kinds = BTreeMap::new();
        kinds.insert("date".to_string(), ColumnKind::Date);
        kinds.insert("tpcp".to_string(), ColumnKind::Numeric);
        kinds.insert("absent_column".to_string(), ColumnKind::Numeric);

        let out = convert_columns(t, &kinds, DEFAULT_DATE_FORMAT)?;
        assert_eq!(out.numeric("tpcp")?.value(0), 5.0);
        assert_eq!(out.date("date")?.len(), 1);

        // numeric → date is not a conversion we do
        let mut bad = BTreeMap::new();
        bad.insert("tpcp".to_string(), ColumnKind::Date);
        assert!(convert_columns(out, &bad, DEFAULT_DATE_FORMAT).is_err());
        Ok(())
    }

    #[test]
    fn format_cells_renders_each_kind() -> Result<()> {
        let nums: ArrayRef = Arc::new(Float64Array::from(vec![Some(10.0), Some(2.5), None]));
        assert_eq!(
            format_cells(&nums)?,
            vec![Some("10".to_string()), Some("2.5".to_string()), None]
        );

        let d = date_to_days(NaiveDate::from_ymd_opt(2010, 7, 1).unwrap());
        let dates: ArrayRef = Arc::new(Date32Array::from(vec![Some(d)]));
        assert_eq!(format_cells(&dates)?, vec![Some("2010-07-01".to_string())]);

        let flags: ArrayRef = Arc::new(BooleanArray::from(vec![true, false]));
        assert_eq!(
            format_cells(&flags)?,
            vec![Some("TRUE".to_string()), Some("FALSE".to_string())]
        );
        Ok(())
    }
}
