// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::info;

use crate::{
    station,
    table::{convert::DEFAULT_DATE_FORMAT, missing::DEFAULT_SENTINEL, ColumnKind},
};

/// Settings for reading, cleaning and summarising station files.
///
/// Every field has a default, so a YAML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Numeric code that marks a missing measurement.
    pub sentinel: f64,
    /// chrono format of the date column on input.
    pub date_format: String,
    /// Name of the date column after renaming; `year` and `month` are derived from it.
    pub date_column: String,
    /// Text written for absent cells.
    pub na: String,
    pub delimiter: char,
    pub group_column: String,
    pub target_column: String,
    /// Also collapse non-alphanumeric runs in column names to `_`.
    pub tidy_names: bool,
    /// Applied after names are lowercased.
    pub renames: BTreeMap<String, String>,
    /// Kind of each column after renaming. Unlisted columns stay text.
    pub columns: BTreeMap<String, ColumnKind>,
    /// Divisor applied to each listed column after sentinel normalization.
    pub divide: BTreeMap<String, f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            date_column: station::DATE.to_string(),
            na: "NA".to_string(),
            delimiter: ',',
            group_column: station::STATION_NAME.to_string(),
            target_column: station::TPCP.to_string(),
            tidy_names: false,
            renames: BTreeMap::new(),
            columns: station::default_kinds(),
            divide: station::default_divisors(),
        }
    }
}

impl Config {
    /// Parse a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg = Self::from_yaml(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character, got {:?}", self.delimiter);
        }
        if !self.sentinel.is_finite() {
            bail!("sentinel must be a finite number");
        }
        for (col, divisor) in &self.divide {
            if !divisor.is_finite() || *divisor == 0.0 {
                bail!("divisor for '{}' must be finite and non-zero", col);
            }
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_yaml_keeps_defaults() -> Result<()> {
        let cfg = Config::from_yaml(
            r#"
sentinel: -999
renames:
  tpcp: precip
columns:
  precip: numeric
"#,
        )?;
        assert_eq!(cfg.sentinel, -999.0);
        assert_eq!(cfg.renames.get("tpcp").map(String::as_str), Some("precip"));
        assert_eq!(cfg.columns.get("precip"), Some(&ColumnKind::Numeric));
        assert_eq!(cfg.date_format, DEFAULT_DATE_FORMAT);
        assert_eq!(cfg.group_column, "station_name");
        Ok(())
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_yaml("delimiter: \"é\"").is_err());
        assert!(Config::from_yaml("sentinel: .nan").is_err());
        assert!(Config::from_yaml("not_a_field: 1").is_err());
        assert!(Config::from_yaml("divide:\n  tpcp: 0").is_err());
    }

    #[test]
    fn loads_from_file() -> Result<()> {
        let mut f = NamedTempFile::new()?;
        writeln!(f, "delimiter: \";\"\nna: \"\"")?;
        let cfg = Config::load_or_default(Some(f.path()))?;
        assert_eq!(cfg.delimiter_byte(), b';');
        assert_eq!(cfg.na, "");
        assert_eq!(Config::load_or_default(None)?, Config::default());
        Ok(())
    }
}
