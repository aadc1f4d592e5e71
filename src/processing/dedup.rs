//! Per-table duplicate removal keyed by table key suffix.

use std::collections::HashMap;

use crate::error::IngestionResult;
use crate::types::TableCollection;

use super::{apply_per_key, StepOutcome};

/// Column subsets keyed by table key suffix (`"sales"` targets `df_sales`). An empty subset
/// compares whole rows.
pub type DedupSubsets = HashMap<String, Vec<String>>;

/// Replace every table named in `subsets` with its deduplicated version.
///
/// Tables without an entry pass through untouched, and entries for missing tables are
/// ignored. Suffixes are visited in sorted order so the first reported error is stable.
pub fn dedup_all(tables: TableCollection, subsets: &DedupSubsets) -> IngestionResult<TableCollection> {
    dedup_all_with(tables, subsets, |_| {})
}

/// [`dedup_all`], reporting every entry's [`StepOutcome`] to `on_step`.
pub fn dedup_all_with(
    tables: TableCollection,
    subsets: &DedupSubsets,
    on_step: impl FnMut(StepOutcome<'_>),
) -> IngestionResult<TableCollection> {
    apply_per_key(tables, subsets, |table, columns, _| table.unique(columns), on_step)
}
