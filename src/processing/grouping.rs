//! File-name → table-key derivation and the merge/insert policy.
//!
//! In merge mode, files whose stems differ only by numeric, date-time, or compact-timestamp
//! `_` groups share one key and their rows are concatenated:
//!
//! ```rust
//! use data_harvest_reader::processing::grouping::table_key;
//!
//! assert_eq!(table_key("in/sales_2023-01-01 00:00:00.csv", true), "df_sales");
//! assert_eq!(table_key("in/sales_20230101000000.parquet", true), "df_sales");
//! assert_eq!(table_key("in/sales_7.json", true), "df_sales");
//! assert_eq!(table_key("in/sales_7.json", false), "df_sales_7");
//! ```

use std::collections::hash_map::Entry;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::IngestionResult;
use crate::ingestion::registry::split_extension;
use crate::types::{Table, TableCollection};

/// Prefix of every collection key.
pub const KEY_PREFIX: &str = "df_";

// Alternatives in precedence order: bare digits, `YYYY-MM-DD HH:MM:SS`, 14-digit timestamp.
static SUFFIX_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+|\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}|\d{14})$")
        .unwrap_or_else(|e| panic!("invalid suffix pattern: {e}"))
});

/// File name without directories and without its extension.
pub fn file_stem(name: &str) -> &str {
    split_extension(name).0
}

/// Remove every `_`-delimited group (other than the leading one) that is entirely a suffix
/// pattern. Applied to all such groups, not only the last.
pub fn normalize_stem(stem: &str) -> String {
    let mut groups = stem.split('_');
    let mut out = groups.next().unwrap_or_default().to_string();
    for group in groups {
        if !SUFFIX_GROUP.is_match(group) {
            out.push('_');
            out.push_str(group);
        }
    }
    out
}

/// Collection key for a logical file name.
pub fn table_key(name: &str, join_similar: bool) -> String {
    let stem = file_stem(name);
    if join_similar {
        format!("{KEY_PREFIX}{}", normalize_stem(stem))
    } else {
        format!("{KEY_PREFIX}{stem}")
    }
}

/// What [`TableGrouper::insert`] did with a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// First table for this key.
    Created,
    /// Rows were appended to the existing table (merge mode).
    Merged,
    /// An existing table was overwritten (merge mode off).
    Replaced,
}

/// Builds a [`TableCollection`] one decoded file at a time.
///
/// Only the joining thread owns a grouper, so the collection has a single writer.
#[derive(Debug, Default)]
pub struct TableGrouper {
    join_similar: bool,
    tables: TableCollection,
}

impl TableGrouper {
    pub fn new(join_similar: bool) -> Self {
        Self {
            join_similar,
            tables: TableCollection::new(),
        }
    }

    /// Insert the table decoded from `name`, returning its key and what happened.
    ///
    /// In merge mode a colliding key has its rows appended (schemas must match). Otherwise the
    /// later table wins.
    pub fn insert(&mut self, name: &str, table: Table) -> IngestionResult<(String, InsertOutcome)> {
        let key = table_key(name, self.join_similar);
        let outcome = match self.tables.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(table);
                InsertOutcome::Created
            }
            Entry::Occupied(mut slot) if self.join_similar => {
                let merged = slot.get().concat(&table)?;
                slot.insert(merged);
                InsertOutcome::Merged
            }
            Entry::Occupied(mut slot) => {
                slot.insert(table);
                InsertOutcome::Replaced
            }
        };
        Ok((key, outcome))
    }

    pub fn get(&self, key: &str) -> Option<&Table> {
        self.tables.get(key)
    }

    pub fn into_tables(self) -> TableCollection {
        self.tables
    }
}
