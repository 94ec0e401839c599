// src/table/transform.rs

use arrow::array::{BooleanArray, Float64Array, StringArray};
use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("pattern should compile"));

/// Lowercase a column name and collapse anything that is not a letter or
/// digit into a single `_`, e.g. `"STATION NAME"` → `"station_name"`.
pub fn normalize_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    NON_WORD
        .replace_all(&lower, "_")
        .trim_matches('_')
        .to_string()
}

/// Multiply every present value by `factor`.
pub fn scale(values: &Float64Array, factor: f64) -> Float64Array {
    values.iter().map(|opt| opt.map(|v| v * factor)).collect()
}

/// Divide every present value by `divisor` (tenths → units is `10.0`).
pub fn divide(values: &Float64Array, divisor: f64) -> Float64Array {
    values.iter().map(|opt| opt.map(|v| v / divisor)).collect()
}

/// Vectorized conditional: `then` where `predicate` holds, else `otherwise`.
/// Absent stays absent.
pub fn if_else<P: Fn(f64) -> bool>(
    values: &Float64Array,
    predicate: P,
    then: f64,
    otherwise: f64,
) -> Float64Array {
    values
        .iter()
        .map(|opt| opt.map(|v| if predicate(v) { then } else { otherwise }))
        .collect()
}

/// Same as [`if_else`] but producing a text label per row.
pub fn label_where<P: Fn(f64) -> bool>(
    values: &Float64Array,
    predicate: P,
    then: &str,
    otherwise: &str,
) -> StringArray {
    values
        .iter()
        .map(|opt| opt.map(|v| if predicate(v) { then } else { otherwise }))
        .collect()
}

/// Replace values matching `predicate`; `replacement` may itself be absent.
pub fn replace_where<P: Fn(f64) -> bool>(
    values: &Float64Array,
    predicate: P,
    replacement: Option<f64>,
) -> Float64Array {
    values
        .iter()
        .map(|opt| match opt {
            Some(v) if predicate(v) => replacement,
            other => other,
        })
        .collect()
}

/// Row mask over a numeric column. Absent rows are never selected.
pub fn mask<P: Fn(f64) -> bool>(values: &Float64Array, predicate: P) -> BooleanArray {
    values
        .iter()
        .map(|opt| Some(opt.is_some_and(&predicate)))
        .collect()
}

/// Row mask over a text column. Absent rows are never selected.
pub fn text_mask<P: Fn(&str) -> bool>(values: &StringArray, predicate: P) -> BooleanArray {
    values
        .iter()
        .map(|opt| Some(opt.is_some_and(&predicate)))
        .collect()
}
