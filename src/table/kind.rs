// src/table/kind.rs

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ColumnKind {
    Numeric,
    Integer,
    Text,
    Date,
}

impl ColumnKind {
    /// The Arrow type used to store this kind.
    pub fn data_type(self) -> DataType {
        match self {
            ColumnKind::Numeric => DataType::Float64,
            ColumnKind::Integer => DataType::Int32,
            ColumnKind::Text => DataType::Utf8,
            ColumnKind::Date => DataType::Date32,
        }
    }

    /// Reverse of [`ColumnKind::data_type`]; `None` for Arrow types a table never builds.
    pub fn of(dt: &DataType) -> Option<Self> {
        match dt {
            DataType::Float64 => Some(ColumnKind::Numeric),
            DataType::Int32 => Some(ColumnKind::Integer),
            DataType::Utf8 => Some(ColumnKind::Text),
            DataType::Date32 => Some(ColumnKind::Date),
            _ => None,
        }
    }

    /// Map a loose type name onto a kind.
    ///
    /// Covers:
    /// - NUMERIC, NUMBER, DOUBLE, FLOAT, REAL, DECIMAL* → Numeric
    /// - INTEGER, INT, BIGINT, SMALLINT                 → Integer
    /// - DATE                                           → Date
    /// - TEXT, CHAR*, VARCHAR*, STRING                  → Text
    pub fn parse(ty: &str) -> Option<Self> {
        let upper = ty.trim().to_ascii_uppercase();
        if upper == "NUMERIC"
            || upper == "NUMBER"
            || upper == "DOUBLE"
            || upper == "FLOAT"
            || upper == "REAL"
            || upper.starts_with("DECIMAL")
        {
            Some(ColumnKind::Numeric)
        } else if upper == "INTEGER" || upper == "INT" || upper == "BIGINT" || upper == "SMALLINT"
        {
            Some(ColumnKind::Integer)
        } else if upper == "DATE" {
            Some(ColumnKind::Date)
        } else if upper == "TEXT"
            || upper == "STRING"
            || upper.starts_with("CHAR")
            || upper.starts_with("VARCHAR")
        {
            Some(ColumnKind::Text)
        } else {
            None
        }
    }
}

impl TryFrom<String> for ColumnKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ColumnKind::parse(&s).ok_or_else(|| format!("unknown column kind '{}'", s))
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Integer => "integer",
            ColumnKind::Text => "text",
            ColumnKind::Date => "date",
        };
        f.write_str(s)
    }
}

/// Human name for an Arrow type, in kind terms where possible.
pub fn describe(dt: &DataType) -> String {
    match ColumnKind::of(dt) {
        Some(k) => k.to_string(),
        None => format!("{:?}", dt),
    }
}
