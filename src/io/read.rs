// src/io/read.rs

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, StringArray};
use csv::{ReaderBuilder, Trim};
use glob::glob;
use rayon::prelude::*;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, instrument};

use crate::table::Table;

/// Read a delimited file with a header row. Every column comes back as text;
/// empty cells are absent.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_delimited<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Table> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
    let table = read_delimited_from(BufReader::new(file), delimiter)
        .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
    info!(rows = table.num_rows(), columns = table.num_columns(), "loaded");
    Ok(table)
}

/// Same as [`read_delimited`] over any reader.
pub fn read_delimited_from<R: Read>(reader: R, delimiter: u8) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("reading header row")?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        bail!("input has no header row");
    }

    // column-major, one Vec per header
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx + 1))?;
        for (col, field) in cells.iter_mut().zip(record.iter()) {
            col.push(if field.is_empty() {
                None
            } else {
                Some(field.to_string())
            });
        }
    }
    debug!(rows = cells[0].len(), "parsed records");

    let columns: Vec<(String, ArrayRef)> = headers
        .into_iter()
        .zip(cells)
        .map(|(name, col)| (name, Arc::new(StringArray::from(col)) as ArrayRef))
        .collect();
    Table::new(columns)
}

/// Expand each pattern with `glob`. A pattern that matches nothing is an error.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for pattern in patterns {
        let before = out.len();
        for entry in glob(pattern).with_context(|| format!("bad input pattern {}", pattern))? {
            let path = entry.with_context(|| format!("expanding {}", pattern))?;
            if path.is_file() {
                out.push(path);
            }
        }
        if out.len() == before {
            bail!("no input files match {}", pattern);
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}

/// Read every path in parallel and stack the results in path order.
pub fn read_all(paths: &[PathBuf], delimiter: u8) -> Result<Table> {
    let tables = paths
        .par_iter()
        .map(|p| read_delimited(p, delimiter))
        .collect::<Result<Vec<_>>>()?;
    Table::bind_rows(&tables).context("combining input files")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,stationtab::io=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    #[test]
    fn reads_text_columns_with_absent_blanks() -> Result<()> {
        init_test_logging();
        let data = "STATION_NAME,TPCP\n\"BOULDER CO US\",74\n,  \nELBERT,-9999\n";
        let t = read_delimited_from(Cursor::new(data), b',')?;
        assert_eq!(t.column_names(), vec!["STATION_NAME", "TPCP"]);
        assert_eq!(t.num_rows(), 3);

        let names = t.text("STATION_NAME")?;
        assert_eq!(
            names.iter().collect::<Vec<_>>(),
            vec![Some("BOULDER CO US"), None, Some("ELBERT")]
        );
        assert_eq!(
            t.text("TPCP")?.iter().collect::<Vec<_>>(),
            vec![Some("74"), None, Some("-9999")]
        );
        Ok(())
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let data = "A,B\n1,2\n3\n";
        let err = read_delimited_from(Cursor::new(data), b',').unwrap_err();
        assert!(format!("{:#}", err).contains("record 2"), "{:#}", err);
    }

    #[test]
    fn header_only_gives_zero_rows() -> Result<()> {
        let t = read_delimited_from(Cursor::new("A;B\n"), b';')?;
        assert_eq!(t.column_names(), vec!["A", "B"]);
        assert!(t.is_empty());
        Ok(())
    }

    #[test]
    fn glob_and_parallel_read() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        fs::write(dir.path().join("a.csv"), "K,V\nx,1\n")?;
        fs::write(dir.path().join("b.csv"), "K,V\ny,2\nz,3\n")?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;

        let pattern = format!("{}/*.csv", dir.path().display());
        let paths = expand_inputs(&[pattern])?;
        assert_eq!(paths.len(), 2);

        let t = read_all(&paths, b',')?;
        assert_eq!(
            t.text("K")?.iter().collect::<Vec<_>>(),
            vec![Some("x"), Some("y"), Some("z")]
        );

        let missing = format!("{}/*.tsv", dir.path().display());
        assert!(expand_inputs(&[missing]).is_err());
        Ok(())
    }

    #[test]
    fn mismatched_files_do_not_combine() -> Result<()> {
        let dir = tempdir()?;
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, "K,V\nx,1\n")?;
        fs::write(&b, "K,W\ny,2\n")?;
        assert!(read_all(&[a, b], b',').is_err());
        Ok(())
    }
}
