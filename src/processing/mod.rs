//! Table transformations applied after loading.
//!
//! - [`grouping`]: file name → table key, and the merge/replace insertion policy
//! - [`dedup`]: per-table duplicate removal
//! - [`filter`]: declarative row filters
//!
//! ## Example: dedup then filter
//!
//! ```rust
//! use data_harvest_reader::processing::{apply_filters_all, dedup_all, DedupSubsets, FilterRule, FilterSubsets};
//! use data_harvest_reader::types::{DataType, Field, Schema, Table, TableCollection, Value};
//!
//! let schema = Schema::new(vec![
//!     Field::new("id", DataType::Int64),
//!     Field::new("age", DataType::Int64),
//! ]);
//! let people = Table::new(
//!     schema,
//!     vec![
//!         vec![Value::Int64(1), Value::Int64(30)],
//!         vec![Value::Int64(1), Value::Int64(30)],
//!         vec![Value::Int64(2), Value::Int64(12)],
//!     ],
//! );
//! let mut tables = TableCollection::new();
//! tables.insert("df_people".to_string(), people);
//!
//! let dedup = DedupSubsets::from([("people".to_string(), vec!["id".to_string()])]);
//! let filters = FilterSubsets::from([("people".to_string(), vec![FilterRule::new("age", ">=", 18)])]);
//!
//! let tables = dedup_all(tables, &dedup).unwrap();
//! let tables = apply_filters_all(tables, &filters).unwrap();
//! assert_eq!(tables["df_people"].row_count(), 1);
//! ```

use std::collections::HashMap;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{Table, TableCollection};

pub mod dedup;
pub mod filter;
pub mod grouping;

pub use dedup::{dedup_all, dedup_all_with, DedupSubsets};
pub use filter::{
    apply_filters, apply_filters_all, apply_filters_all_with, FilterOperation, FilterRule, FilterSubsets,
    FilterValues, LogicalOperator, ALLOWED_OPERATIONS,
};
pub use grouping::{normalize_stem, table_key, InsertOutcome, TableGrouper, KEY_PREFIX};

/// What happened to one `df_<suffix>` entry of a batch dedup or filter pass.
#[derive(Debug)]
pub enum StepOutcome<'a> {
    /// The table was replaced by its transformed version.
    Applied {
        key: &'a str,
        rows_before: usize,
        rows_after: usize,
    },
    /// No table is loaded under `key`; the entry was skipped.
    Unmatched { key: &'a str },
    /// Transforming `key` failed; the pass stops with `error`.
    Failed {
        key: &'a str,
        error: &'a IngestionError,
    },
}

// Suffixes are visited in sorted order so the first failure is stable.
fn apply_per_key<C>(
    mut tables: TableCollection,
    subsets: &HashMap<String, C>,
    mut step: impl FnMut(&Table, &C, &str) -> IngestionResult<Table>,
    mut on_step: impl FnMut(StepOutcome<'_>),
) -> IngestionResult<TableCollection> {
    let mut suffixes: Vec<&String> = subsets.keys().collect();
    suffixes.sort();
    for suffix in suffixes {
        let key = format!("{KEY_PREFIX}{suffix}");
        let Some(table) = tables.get(&key) else {
            on_step(StepOutcome::Unmatched { key: &key });
            continue;
        };
        let rows_before = table.row_count();
        let out = match step(table, &subsets[suffix], &key) {
            Ok(out) => out,
            Err(error) => {
                on_step(StepOutcome::Failed { key: &key, error: &error });
                return Err(error);
            }
        };
        on_step(StepOutcome::Applied {
            key: &key,
            rows_before,
            rows_after: out.row_count(),
        });
        tables.insert(key, out);
    }
    Ok(tables)
}
