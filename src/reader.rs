//! The read pipeline: classify → enumerate → load → dedup → filter.
//!
//! ```no_run
//! use data_harvest_reader::reader::{DataReader, ReadOptions};
//!
//! # fn main() -> Result<(), data_harvest_reader::IngestionError> {
//! let options = ReadOptions::from_json_str(
//!     r#"{
//!         "join_similar": true,
//!         "duplicated_subset_dict": {"sales": ["order_id"]},
//!         "filter_subset": {"sales": [{"column": "amount", "operation": ">", "values": 0}]}
//!     }"#,
//! )?;
//! let tables = DataReader::default().read("exports/", &options)?;
//! for (key, table) in &tables {
//!     println!("{key}: {} rows", table.row_count());
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::IngestionResult;
use crate::execution::{LoaderMetrics, LoaderOptions, ParallelLoader};
use crate::ingestion::observability::{LogObserver, ReadEvent, ReadObserver, Reporter, Severity, Stage};
use crate::ingestion::registry::{FormatOptions, FormatRegistry};
use crate::ingestion::source::SourceInput;
use crate::processing::{apply_filters_all_with, dedup_all_with, DedupSubsets, FilterSubsets, StepOutcome};
use crate::types::TableCollection;

/// Per-call options.
///
/// Deserializable from JSON with the keys `join_similar`, `duplicated_subset_dict` and
/// `filter_subset`; decoder options (`format`) are set in code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Merge files whose names differ only by a numeric or timestamp suffix.
    pub join_similar: bool,
    #[serde(rename = "duplicated_subset_dict")]
    pub duplicated_subset: Option<DedupSubsets>,
    pub filter_subset: Option<FilterSubsets>,
    #[serde(skip)]
    pub format: FormatOptions,
}

impl ReadOptions {
    pub fn from_json_str(input: &str) -> IngestionResult<Self> {
        Ok(serde_json::from_str(input)?)
    }
}

/// Reader-wide configuration.
#[derive(Clone)]
pub struct ReaderOptions {
    pub loader: LoaderOptions,
    /// Receives lifecycle events and failures. `None` disables reporting.
    pub observer: Option<Arc<dyn ReadObserver>>,
    /// Failures at or above this severity also trigger [`ReadObserver::on_alert`].
    pub alert_at_or_above: Severity,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            loader: LoaderOptions::default(),
            observer: Some(Arc::new(LogObserver)),
            alert_at_or_above: Severity::Critical,
        }
    }
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("loader", &self.loader)
            .field("observer", &self.observer.as_ref().map(|_| "<observer>"))
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

/// Reads a directory or zip archive into a [`TableCollection`].
///
/// A reader owns its [`FormatRegistry`] and loader pool configuration and can be reused for any
/// number of reads.
pub struct DataReader {
    registry: FormatRegistry,
    loader: ParallelLoader,
    reporter: Reporter,
}

impl DataReader {
    pub fn new(options: ReaderOptions) -> Self {
        let reporter = Reporter::new(options.observer, options.alert_at_or_above);
        Self {
            registry: FormatRegistry::with_defaults(),
            loader: ParallelLoader::new(options.loader).with_reporter(reporter.clone()),
            reporter,
        }
    }

    /// Replace the format registry.
    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FormatRegistry {
        &mut self.registry
    }

    /// Metrics of the most recent load.
    pub fn metrics(&self) -> Arc<LoaderMetrics> {
        self.loader.metrics()
    }

    /// Read every file of `source` into a table keyed `df_<name>`.
    ///
    /// Dedup and filter entries are matched by key suffix; entries naming a table that was not
    /// loaded only produce an [`ReadEvent::UnmatchedKey`] warning. Any failure aborts the whole
    /// read and is reported to the observer before being returned.
    pub fn read(&self, source: impl Into<SourceInput>, options: &ReadOptions) -> IngestionResult<TableCollection> {
        let input = source.into();
        let subject = describe_input(&input);
        let source = input
            .classify()
            .inspect_err(|e| self.reporter.failure(Stage::Source, &subject, e))?;
        self.reporter.event(ReadEvent::Started {
            source: source.to_string(),
        });

        let handles = source
            .enumerate()
            .inspect_err(|e| self.reporter.failure(Stage::Source, &subject, e))?;
        self.reporter.event(ReadEvent::SourceEnumerated { files: handles.len() });

        let mut tables = self
            .loader
            .load(&handles, &self.registry, &options.format, options.join_similar)?;

        if let Some(subsets) = &options.duplicated_subset {
            tables = self.dedup(tables, subsets)?;
        }
        if let Some(subsets) = &options.filter_subset {
            tables = self.filter(tables, subsets)?;
        }

        self.reporter.event(ReadEvent::Completed { tables: tables.len() });
        Ok(tables)
    }

    fn dedup(&self, tables: TableCollection, subsets: &DedupSubsets) -> IngestionResult<TableCollection> {
        dedup_all_with(tables, subsets, |outcome| {
            self.report_step(Stage::Dedup, outcome, |key, rows_before, rows_after| {
                ReadEvent::DedupApplied {
                    key,
                    rows_before,
                    rows_after,
                }
            })
        })
    }

    fn filter(&self, tables: TableCollection, subsets: &FilterSubsets) -> IngestionResult<TableCollection> {
        apply_filters_all_with(tables, subsets, |outcome| {
            self.report_step(Stage::Filter, outcome, |key, rows_before, rows_after| {
                ReadEvent::FiltersApplied {
                    key,
                    rows_before,
                    rows_after,
                }
            })
        })
    }

    fn report_step(
        &self,
        stage: Stage,
        outcome: StepOutcome<'_>,
        applied: impl FnOnce(String, usize, usize) -> ReadEvent,
    ) {
        match outcome {
            StepOutcome::Unmatched { key } => self.reporter.event(ReadEvent::UnmatchedKey {
                stage,
                key: key.to_string(),
            }),
            StepOutcome::Applied {
                key,
                rows_before,
                rows_after,
            } => self.reporter.event(applied(key.to_string(), rows_before, rows_after)),
            StepOutcome::Failed { key, error } => self.reporter.failure(stage, key, error),
        }
    }
}

impl Default for DataReader {
    fn default() -> Self {
        Self::new(ReaderOptions::default())
    }
}

impl fmt::Debug for DataReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataReader")
            .field("registry", &self.registry)
            .field("loader", self.loader.options())
            .finish()
    }
}

/// Read `source` with a default [`DataReader`].
pub fn read(source: impl Into<SourceInput>, options: &ReadOptions) -> IngestionResult<TableCollection> {
    DataReader::default().read(source, options)
}

fn describe_input(input: &SourceInput) -> String {
    match input {
        SourceInput::Path(p) => p.display().to_string(),
        SourceInput::Bytes(b) => format!("in-memory archive ({} bytes)", b.len()),
    }
}
