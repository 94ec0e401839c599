// src/table/missing.rs

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, Float64Array, Int32Array};
use std::sync::Arc;
use tracing::debug;

use super::{kind::describe, ColumnKind, Table};

/// Code used in the station files for "no measurement".
pub const DEFAULT_SENTINEL: f64 = -9999.0;

/// Whether absent values may be skipped by arithmetic.
///
/// `Propagate` is the default: one absent input makes the result absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipAbsent {
    #[default]
    Propagate,
    Skip,
}

impl SkipAbsent {
    pub fn from_flag(skip: bool) -> Self {
        if skip {
            SkipAbsent::Skip
        } else {
            SkipAbsent::Propagate
        }
    }
}

/// Running totals over numeric-or-absent values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub present: usize,
    pub absent: usize,
    pub total: f64,
}

impl Tally {
    pub fn push(&mut self, value: Option<f64>) {
        match value {
            Some(v) => {
                self.present += 1;
                self.total += v;
            }
            None => self.absent += 1,
        }
    }

    /// With `Skip`, an all-absent input sums to `0.0`.
    pub fn sum(&self, skip: SkipAbsent) -> Option<f64> {
        match skip {
            SkipAbsent::Propagate if self.absent > 0 => None,
            _ => Some(self.total),
        }
    }

    /// Absent when nothing is present to average.
    pub fn mean(&self, skip: SkipAbsent) -> Option<f64> {
        if self.present == 0 {
            return None;
        }
        self.sum(skip).map(|s| s / self.present as f64)
    }
}

impl FromIterator<Option<f64>> for Tally {
    fn from_iter<I: IntoIterator<Item = Option<f64>>>(iter: I) -> Self {
        let mut t = Tally::default();
        for v in iter {
            t.push(v);
        }
        t
    }
}

/// Replace every occurrence of `sentinel` with an absent value.
pub fn normalize_sentinel(values: &Float64Array, sentinel: f64) -> Float64Array {
    values
        .iter()
        .map(|opt| opt.filter(|v| *v != sentinel))
        .collect()
}

/// Integer version of [`normalize_sentinel`]. A sentinel with a fractional
/// part, or outside the `i32` range, can never match.
pub fn normalize_sentinel_int(values: &Int32Array, sentinel: f64) -> Int32Array {
    let code = (sentinel.fract() == 0.0
        && sentinel >= i32::MIN as f64
        && sentinel <= i32::MAX as f64)
        .then_some(sentinel as i32);
    values
        .iter()
        .map(|opt| opt.filter(|v| Some(*v) != code))
        .collect()
}

/// Apply [`normalize_sentinel`] to each named numeric or integer column.
pub fn normalize_table<S: AsRef<str>>(table: Table, columns: &[S], sentinel: f64) -> Result<Table> {
    let mut out = table;
    for name in columns {
        let name = name.as_ref();
        let before = out.column(name)?.null_count();
        let normalized: ArrayRef = match out.kind(name)? {
            Some(ColumnKind::Numeric) => {
                Arc::new(normalize_sentinel(out.numeric(name)?, sentinel)) as ArrayRef
            }
            Some(ColumnKind::Integer) => {
                Arc::new(normalize_sentinel_int(out.integer(name)?, sentinel)) as ArrayRef
            }
            _ => bail!(
                "normalizing sentinel in '{}': column is {}, expected numeric or integer",
                name,
                describe(out.column(name)?.data_type())
            ),
        };
        let replaced = normalized.null_count() - before;
        debug!(column = %name, sentinel, replaced, "normalized sentinel");
        out = out
            .with_column(name, normalized)
            .with_context(|| format!("normalizing sentinel in '{}'", name))?;
    }
    Ok(out)
}

pub fn count_absent(values: &dyn Array) -> usize {
    values.null_count()
}

pub fn count_present(values: &dyn Array) -> usize {
    values.len() - values.null_count()
}

pub fn sum(values: &Float64Array, skip: SkipAbsent) -> Option<f64> {
    values.iter().collect::<Tally>().sum(skip)
}

pub fn mean(values: &Float64Array, skip: SkipAbsent) -> Option<f64> {
    values.iter().collect::<Tally>().mean(skip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn precip() -> Float64Array {
        Float64Array::from(vec![Some(10.0), Some(-9999.0), Some(20.0), None])
    }

    #[test]
    fn sentinel_becomes_absent() {
        let out = normalize_sentinel(&precip(), DEFAULT_SENTINEL);
        assert_eq!(
            out.iter().collect::<Vec<_>>(),
            vec![Some(10.0), None, Some(20.0), None]
        );
        assert!(out.iter().flatten().all(|v| v != DEFAULT_SENTINEL));
    }

    #[test]
    fn arithmetic_needs_opt_in_to_skip_absent() {
        let values = normalize_sentinel(&precip(), DEFAULT_SENTINEL);
        assert_eq!(sum(&values, SkipAbsent::Propagate), None);
        assert_eq!(mean(&values, SkipAbsent::Propagate), None);
        assert_eq!(sum(&values, SkipAbsent::Skip), Some(30.0));
        assert_eq!(mean(&values, SkipAbsent::Skip), Some(15.0));
        assert_eq!(count_absent(&values), 2);
        assert_eq!(count_present(&values), 2);
    }

    #[test]
    fn empty_and_all_absent_inputs() {
        let empty = Float64Array::from(Vec::<Option<f64>>::new());
        assert_eq!(sum(&empty, SkipAbsent::Propagate), Some(0.0));
        assert_eq!(mean(&empty, SkipAbsent::Skip), None);

        let gone = Float64Array::from(vec![None::<f64>, None]);
        assert_eq!(sum(&gone, SkipAbsent::Skip), Some(0.0));
        assert_eq!(mean(&gone, SkipAbsent::Skip), None);
        assert_eq!(sum(&gone, SkipAbsent::Propagate), None);
    }

    #[test]
    fn normalize_table_requires_numeric_columns() -> Result<()> {
        let t = Table::new(vec![
            ("tpcp", Arc::new(precip()) as ArrayRef),
            (
                "name",
                Arc::new(arrow::array::StringArray::from(vec!["a", "b", "c", "d"])) as ArrayRef,
            ),
        ])?;
        let out = normalize_table(t.clone(), &["tpcp"], DEFAULT_SENTINEL)?;
        assert_eq!(out.numeric("tpcp")?.null_count(), 2);
        assert!(normalize_table(t, &["name"], DEFAULT_SENTINEL).is_err());
        Ok(())
    }

    #[test]
    fn integer_columns_lose_sentinel_too() -> Result<()> {
        let ints = Int32Array::from(vec![Some(1671), Some(-9999), None]);
        assert_eq!(
            normalize_sentinel_int(&ints, DEFAULT_SENTINEL)
                .iter()
                .collect::<Vec<_>>(),
            vec![Some(1671), None, None]
        );
        assert_eq!(normalize_sentinel_int(&ints, -9999.5).null_count(), 1);

        let t = Table::new(vec![("elevation", Arc::new(ints) as ArrayRef)])?;
        let out = normalize_table(t, &["elevation"], DEFAULT_SENTINEL)?;
        assert_eq!(out.integer("elevation")?.null_count(), 2);
        Ok(())
    }
}
