// src/io/write.rs

use anyhow::{Context, Result};
use csv::WriterBuilder;
use parquet::{
    arrow::ArrowWriter,
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

use crate::table::{convert::format_cells, Table};

/// Sibling path the output is written to before being renamed into place.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Run `write` against a temp sibling of `path`, then rename it into place.
/// The temp file is removed if writing fails. Returns the final size in bytes.
fn write_via_temp<F: FnOnce(File) -> Result<()>>(path: &Path, write: F) -> Result<u64> {
    let temp = temp_path(path);
    let file = File::create(&temp).with_context(|| format!("creating file {}", temp.display()))?;
    if let Err(e) = write(file) {
        if let Err(rm) = fs::remove_file(&temp) {
            warn!(path = %temp.display(), error = %rm, "could not remove temp file");
        }
        return Err(e);
    }
    fs::rename(&temp, path)
        .with_context(|| format!("renaming {} -> {}", temp.display(), path.display()))?;
    let metadata = fs::metadata(path).context("getting file metadata")?;
    Ok(metadata.len())
}

/// Serialize `table` as delimited text with a header row; absent cells are written as `na`.
#[instrument(level = "info", skip(table, path), fields(path = %path.display(), rows = table.num_rows()))]
pub fn write_csv(table: &Table, path: &Path, delimiter: u8, na: &str) -> Result<u64> {
    let bytes = write_via_temp(path, |file| write_csv_to(table, file, delimiter, na))?;
    info!(bytes, "wrote csv");
    Ok(bytes)
}

/// Same as [`write_csv`] over any writer.
pub fn write_csv_to<W: Write>(table: &Table, writer: W, delimiter: u8, na: &str) -> Result<()> {
    let mut wtr = WriterBuilder::new().delimiter(delimiter).from_writer(writer);

    wtr.write_record(table.column_names())
        .context("writing header row")?;

    let columns = table
        .batch()
        .columns()
        .iter()
        .map(format_cells)
        .collect::<Result<Vec<_>>>()?;

    for row in 0..table.num_rows() {
        let record = columns
            .iter()
            .map(|col| col[row].as_deref().unwrap_or(na));
        wtr.write_record(record)
            .with_context(|| format!("writing row {}", row))?;
    }
    wtr.flush().context("flushing csv writer")?;
    Ok(())
}

/// Write `table` as a single Parquet file. Returns the file size in bytes.
#[instrument(level = "info", skip(table, path), fields(path = %path.display(), rows = table.num_rows()))]
pub fn write_parquet(table: &Table, path: &Path) -> Result<u64> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let bytes = write_via_temp(path, |file| {
        let mut writer = ArrowWriter::try_new(file, table.schema(), Some(props))
            .context("creating parquet writer")?;
        writer
            .write(table.batch())
            .context("writing batch to parquet")?;
        writer.close().context("closing parquet writer")?;
        Ok(())
    })?;
    info!(bytes, "wrote parquet");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read::read_delimited;
    use arrow::array::{Array, ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn sample() -> Result<Table> {
        Table::new(vec![
            (
                "station_name",
                Arc::new(StringArray::from(vec![Some("BOULDER CO US"), None])) as ArrayRef,
            ),
            (
                "tpcp",
                Arc::new(Float64Array::from(vec![Some(7.4), None])) as ArrayRef,
            ),
            (
                "date",
                Arc::new(Date32Array::from(vec![Some(14610), Some(14641)])) as ArrayRef,
            ),
        ])
    }

    #[test]
    fn csv_writes_na_and_iso_dates() -> Result<()> {
        let mut buf = Vec::new();
        write_csv_to(&sample()?, &mut buf, b',', "NA")?;
        let text = String::from_utf8(buf)?;
        assert_eq!(
            text,
            "station_name,tpcp,date\nBOULDER CO US,7.4,2010-01-01\nNA,NA,2010-02-01\n"
        );
        Ok(())
    }

    #[test]
    fn csv_file_round_trips_through_reader() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.csv");
        let bytes = write_csv(&sample()?, &path, b'\t', "")?;
        assert!(bytes > 0);
        assert!(!temp_path(&path).exists());

        let back = read_delimited(&path, b'\t')?;
        assert_eq!(back.num_rows(), 2);
        assert_eq!(back.text("tpcp")?.iter().collect::<Vec<_>>(), vec![Some("7.4"), None]);
        Ok(())
    }

    #[test]
    fn parquet_keeps_types_and_nulls() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.parquet");
        write_parquet(&sample()?, &path)?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        let back = Table::bind_rows(
            &batches
                .into_iter()
                .map(Table::from_batch)
                .collect::<Result<Vec<_>>>()?,
        )?;
        assert_eq!(back.num_rows(), 2);
        assert_eq!(back.numeric("tpcp")?.null_count(), 1);
        assert_eq!(back.date("date")?.value(1), 14641);
        Ok(())
    }

    #[test]
    fn failed_write_leaves_no_temp_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.csv");
        let t = Table::new(vec![(
            "wide",
            Arc::new(Int64Array::from(vec![1_i64, 2])) as ArrayRef,
        )])?;

        assert!(write_csv(&t, &path, b',', "NA").is_err());
        assert!(!temp_path(&path).exists());
        assert!(!path.exists());
        Ok(())
    }
}
