// src/table/mod.rs

pub mod convert;
pub mod kind;
pub mod missing;
pub mod transform;

use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int32Array, StringArray},
    compute::{concat_batches, filter_record_batch},
    datatypes::{Field, Schema, SchemaRef},
    record_batch::{RecordBatch, RecordBatchOptions},
    util::pretty::pretty_format_batches,
};
use std::{collections::HashSet, fmt, sync::Arc};

pub use kind::ColumnKind;

/// Ordered, named, equal-length columns. Absent values are Arrow nulls.
///
/// Every constructor goes through [`Table::from_parts`], so a `Table` always
/// has unique column names and a uniform row count.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    /// Build a table from `(name, array)` pairs, in order.
    pub fn new<N: Into<String>>(columns: Vec<(N, ArrayRef)>) -> Result<Self> {
        let rows = columns.first().map(|(_, a)| a.len()).unwrap_or(0);

        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        for (name, array) in columns {
            let name = name.into();
            if array.len() != rows {
                bail!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    array.len(),
                    rows
                );
            }
            fields.push(Field::new(name, array.data_type().clone(), true));
            arrays.push(array);
        }

        Self::from_parts(Arc::new(Schema::new(fields)), arrays, rows)
    }

    /// Wrap an existing record batch.
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        let rows = batch.num_rows();
        Self::from_parts(batch.schema(), batch.columns().to_vec(), rows)
    }

    /// Zero columns, zero rows.
    pub fn empty() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
        }
    }

    fn from_parts(schema: SchemaRef, columns: Vec<ArrayRef>, rows: usize) -> Result<Self> {
        let mut seen = HashSet::with_capacity(schema.fields().len());
        for f in schema.fields() {
            if !seen.insert(f.name().as_str()) {
                bail!("duplicate column name '{}'", f.name());
            }
        }

        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        let batch = RecordBatch::try_new_with_options(schema, columns, &options)
            .context("building table")?;
        Ok(Self { batch })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// The underlying record batch, for Arrow writers and kernels.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        self.batch.column_by_name(name).ok_or_else(|| {
            anyhow!(
                "no column named '{}' (have: {})",
                name,
                self.column_names().join(", ")
            )
        })
    }

    pub fn kind(&self, name: &str) -> Result<Option<ColumnKind>> {
        Ok(ColumnKind::of(self.column(name)?.data_type()))
    }

    pub fn numeric(&self, name: &str) -> Result<&Float64Array> {
        self.typed(name, ColumnKind::Numeric)
    }

    pub fn integer(&self, name: &str) -> Result<&Int32Array> {
        self.typed(name, ColumnKind::Integer)
    }

    pub fn text(&self, name: &str) -> Result<&StringArray> {
        self.typed(name, ColumnKind::Text)
    }

    pub fn date(&self, name: &str) -> Result<&Date32Array> {
        self.typed(name, ColumnKind::Date)
    }

    fn typed<T: Array + 'static>(&self, name: &str, expected: ColumnKind) -> Result<&T> {
        let col = self.column(name)?;
        col.as_any().downcast_ref::<T>().ok_or_else(|| {
            anyhow!(
                "column '{}' is {}, expected {}",
                name,
                kind::describe(col.data_type()),
                expected
            )
        })
    }

    /// Keep only the named columns, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut cols = Vec::with_capacity(names.len());
        for n in names {
            let n = n.as_ref();
            cols.push((n.to_string(), self.column(n)?.clone()));
        }
        self.rebuild(cols)
    }

    /// Remove the named columns. Every name must exist.
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        for n in names {
            self.column(n.as_ref())?;
        }
        let cols = self
            .named_columns()
            .filter(|(n, _)| !names.iter().any(|d| d.as_ref() == n))
            .collect();
        self.rebuild(cols)
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<Self> {
        self.column(from)?;
        if from != to && self.has_column(to) {
            bail!("cannot rename '{}' to '{}': column already exists", from, to);
        }
        self.rename_with(|n| if n == from { to.to_string() } else { n.to_string() })
    }

    /// Rename every column through `f`. Fails if two columns end up with the same name.
    pub fn rename_with<F: Fn(&str) -> String>(&self, f: F) -> Result<Self> {
        let cols = self.named_columns().map(|(n, a)| (f(&n), a)).collect();
        self.rebuild(cols)
    }

    /// Append `array` as `name`, or replace the existing column in place.
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Self> {
        // Only a table with neither columns nor rows takes its length from the new column.
        let sized = self.num_columns() > 0 || self.num_rows() > 0;
        if sized && array.len() != self.num_rows() {
            bail!(
                "column '{}' has {} rows, table has {}",
                name,
                array.len(),
                self.num_rows()
            );
        }
        let mut cols: Vec<(String, ArrayRef)> = self.named_columns().collect();
        match cols.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = array,
            None => cols.push((name.to_string(), array)),
        }
        Table::new(cols)
    }

    /// Keep rows where `mask` is true; null mask entries drop the row.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Self> {
        if mask.len() != self.num_rows() {
            bail!(
                "row mask has {} entries, table has {} rows",
                mask.len(),
                self.num_rows()
            );
        }
        let batch = filter_record_batch(&self.batch, mask).context("filtering rows")?;
        Ok(Self { batch })
    }

    pub fn head(&self, n: usize) -> Self {
        Self {
            batch: self.batch.slice(0, n.min(self.num_rows())),
        }
    }

    /// Stack tables vertically. All schemas must match the first.
    pub fn bind_rows(tables: &[Table]) -> Result<Self> {
        let Some(first) = tables.first() else {
            return Ok(Self::empty());
        };
        let schema = first.schema();
        for (i, t) in tables.iter().enumerate().skip(1) {
            if t.schema() != schema {
                bail!(
                    "table #{} columns [{}] do not match [{}]",
                    i,
                    t.column_names().join(", "),
                    first.column_names().join(", ")
                );
            }
        }
        let batch = concat_batches(&schema, tables.iter().map(|t| &t.batch))
            .context("concatenating tables")?;
        Ok(Self { batch })
    }

    /// Place `other`'s columns after this table's columns.
    pub fn bind_cols(&self, other: &Table) -> Result<Self> {
        if self.num_columns() > 0 && other.num_columns() > 0 && self.num_rows() != other.num_rows()
        {
            bail!(
                "cannot bind columns: {} rows vs {} rows",
                self.num_rows(),
                other.num_rows()
            );
        }
        let cols = self.named_columns().chain(other.named_columns()).collect();
        Table::new(cols)
    }

    fn named_columns(&self) -> impl Iterator<Item = (String, ArrayRef)> + '_ {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect::<Vec<_>>()
            .into_iter()
            .zip(self.batch.columns().iter().cloned())
    }

    // keeps the row count when every column is dropped
    fn rebuild(&self, cols: Vec<(String, ArrayRef)>) -> Result<Self> {
        if cols.is_empty() {
            return Self::from_parts(Arc::new(Schema::empty()), Vec::new(), self.num_rows());
        }
        Table::new(cols)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.num_columns() == 0 {
            return write!(f, "<table with 0 columns and {} rows>", self.num_rows());
        }
        let pretty = pretty_format_batches(std::slice::from_ref(&self.batch)).map_err(|_| fmt::Error)?;
        write!(f, "{}", pretty)
    }
}
