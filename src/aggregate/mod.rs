// src/aggregate/mod.rs

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::table::{
    convert::format_cells,
    missing::{SkipAbsent, Tally},
    Table,
};

/// Fold each value into the accumulator of its group.
///
/// Rows whose key is `None` belong to no group and are skipped. Keys come
/// out in ascending order.
pub fn group_reduce<K, V, A, I, J, G, F>(keys: I, values: J, init: G, mut fold: F) -> BTreeMap<K, A>
where
    K: Ord,
    I: IntoIterator<Item = Option<K>>,
    J: IntoIterator<Item = V>,
    G: Fn() -> A,
    F: FnMut(&mut A, V),
{
    let mut groups = BTreeMap::new();
    for (key, value) in keys.into_iter().zip(values) {
        if let Some(key) = key {
            fold(groups.entry(key).or_insert_with(&init), value);
        }
    }
    groups
}

/// Logical OR of `predicate` over each group. Once a group is `true` the
/// predicate is not evaluated for its remaining rows.
pub fn group_any<K, V, I, J, P>(keys: I, values: J, mut predicate: P) -> BTreeMap<K, bool>
where
    K: Ord,
    I: IntoIterator<Item = Option<K>>,
    J: IntoIterator<Item = V>,
    P: FnMut(&V) -> bool,
{
    group_reduce(keys, values, || false, |seen, v| {
        if !*seen {
            *seen = predicate(&v);
        }
    })
}

/// For each distinct key: does any row of the group have an absent value?
pub fn any_absent_by_group<K, I, J>(keys: I, values: J) -> BTreeMap<K, bool>
where
    K: Ord,
    I: IntoIterator<Item = Option<K>>,
    J: IntoIterator<Item = Option<f64>>,
{
    group_any(keys, values, |v| v.is_none())
}

/// Keys whose value satisfies `keep`, in map order.
pub fn keys_where<K: Clone, V, P: Fn(&V) -> bool>(groups: &BTreeMap<K, V>, keep: P) -> Vec<K> {
    groups
        .iter()
        .filter(|(_, v)| keep(v))
        .map(|(k, _)| k.clone())
        .collect()
}

/// Grouped-missingness scan over a table.
///
/// `target` must be numeric; `group` may be any column kind and is keyed by
/// its text rendering.
#[tracing::instrument(level = "debug", skip(table), fields(rows = table.num_rows()))]
pub fn missing_by_group(table: &Table, target: &str, group: &str) -> Result<BTreeMap<String, bool>> {
    let values = table
        .numeric(target)
        .with_context(|| format!("scanning '{}' for absent values", target))?;
    let keys = format_cells(table.column(group)?)
        .with_context(|| format!("grouping by '{}'", group))?;

    let skipped = keys.iter().filter(|k| k.is_none()).count();
    if skipped > 0 {
        debug!(skipped, "rows without a group key left out");
    }

    let result = any_absent_by_group(keys, values.iter());
    debug!(groups = result.len(), "missingness scan done");
    Ok(result)
}

/// Per-group summary of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupStats {
    pub count: usize,
    pub absent: usize,
    pub sum: Option<f64>,
    pub mean: Option<f64>,
}

impl GroupStats {
    fn from_tally(t: &Tally, skip: SkipAbsent) -> Self {
        Self {
            count: t.present,
            absent: t.absent,
            sum: t.sum(skip),
            mean: t.mean(skip),
        }
    }
}

/// Count, sum and mean of `target` per distinct value of `group`.
pub fn group_stats(
    table: &Table,
    target: &str,
    group: &str,
    skip: SkipAbsent,
) -> Result<BTreeMap<String, GroupStats>> {
    let values = table.numeric(target)?;
    let keys = format_cells(table.column(group)?)?;

    let tallies = group_reduce(keys, values.iter(), Tally::default, |t, v| t.push(v));
    Ok(tallies
        .into_iter()
        .map(|(k, t)| (k, GroupStats::from_tally(&t, skip)))
        .collect())
}
