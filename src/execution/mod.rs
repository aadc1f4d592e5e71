//! Parallel file loading.
//!
//! [`ParallelLoader`] sits between source enumeration and the table transforms in
//! [`crate::processing`] and provides:
//!
//! - one decode task per file on a dedicated rayon pool
//! - a cap on files decoded at once (`max_in_flight_files`), on top of the pool size
//! - real-time [`LoaderMetrics`] plus observer hooks for monitoring
//!
//! Results fan in on the calling thread in file-name order, which is where keys are derived and
//! tables merged, so the result map has exactly one writer.

mod metrics;
mod semaphore;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::observability::{ReadEvent, ReadObserver, Reporter, Severity, Stage};
use crate::ingestion::registry::{split_extension, FormatOptions, FormatRegistry};
use crate::ingestion::source::FileHandle;
use crate::processing::grouping::{InsertOutcome, TableGrouper};
use crate::types::{Table, TableCollection};

pub use metrics::{LoaderMetrics, LoaderMetricsSnapshot};

use semaphore::Semaphore;

/// Configuration for the [`ParallelLoader`].
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Number of worker threads used for decoding.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on files decoded concurrently.
    ///
    /// This is an additional throttle on top of `num_threads`; it bounds how many decoded files
    /// are held in memory by workers at once.
    pub max_in_flight_files: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        let n = available_parallelism();
        Self {
            num_threads: Some(n),
            max_in_flight_files: n,
        }
    }
}

/// Decodes a batch of [`FileHandle`]s concurrently and groups them into a [`TableCollection`].
pub struct ParallelLoader {
    opts: LoaderOptions,
    reporter: Reporter,
    metrics: Arc<LoaderMetrics>,
}

impl ParallelLoader {
    /// Create a new loader with the given options.
    ///
    /// # Panics
    ///
    /// Panics if `max_in_flight_files == 0` or `num_threads == Some(0)`.
    pub fn new(opts: LoaderOptions) -> Self {
        assert!(opts.max_in_flight_files > 0, "max_in_flight_files must be > 0");
        if let Some(n) = opts.num_threads {
            assert!(n > 0, "num_threads must be > 0 when set");
        }
        Self {
            opts,
            reporter: Reporter::new(None, Severity::Critical),
            metrics: Arc::new(LoaderMetrics::new()),
        }
    }

    /// Attach an observer for per-file events and failures.
    pub fn with_observer(mut self, observer: Arc<dyn ReadObserver>, alert_at_or_above: Severity) -> Self {
        self.reporter = Reporter::new(Some(observer), alert_at_or_above);
        self
    }

    pub(crate) fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Get a handle to real-time load metrics.
    pub fn metrics(&self) -> Arc<LoaderMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.opts
    }

    /// Decode every handle and group the tables by key.
    ///
    /// Fail-fast: once a task fails, tasks not yet started are skipped and no partial collection
    /// is produced. Every task that fails before the stop is reported to the observer. When
    /// several files fail concurrently, the returned error is the one rayon observed first, which
    /// is not necessarily the first in file-name order.
    ///
    /// Elapsed time is recorded in [`LoaderMetrics`] whether or not the load succeeds.
    pub fn load(
        &self,
        handles: &[FileHandle],
        registry: &FormatRegistry,
        options: &FormatOptions,
        join_similar: bool,
    ) -> IngestionResult<TableCollection> {
        let start = Instant::now();
        self.metrics.begin_run();
        let result = self.decode_and_group(handles, registry, options, join_similar);
        self.metrics.end_run(start.elapsed());
        result
    }

    fn decode_and_group(
        &self,
        handles: &[FileHandle],
        registry: &FormatRegistry,
        options: &FormatOptions,
        join_similar: bool,
    ) -> IngestionResult<TableCollection> {
        let pool = self.build_pool()?;
        let sem = Semaphore::new(self.opts.max_in_flight_files);
        let decoded: Vec<(String, Table)> = pool.install(|| {
            handles
                .par_iter()
                .map(|handle| self.load_one(handle, registry, options, &sem))
                .collect::<IngestionResult<Vec<_>>>()
        })?;

        let mut grouper = TableGrouper::new(join_similar);
        for (name, table) in decoded {
            let rows = table.row_count();
            let (key, outcome) = grouper
                .insert(&name, table)
                .inspect_err(|e| self.reporter.failure(Stage::Load, &name, e))?;
            match outcome {
                InsertOutcome::Created => {}
                InsertOutcome::Merged => self.reporter.event(ReadEvent::TablesMerged { key, name, rows }),
                InsertOutcome::Replaced => self.reporter.event(ReadEvent::KeyCollision { key, name }),
            }
        }

        Ok(grouper.into_tables())
    }

    fn load_one(
        &self,
        handle: &FileHandle,
        registry: &FormatRegistry,
        options: &FormatOptions,
        sem: &Semaphore,
    ) -> IngestionResult<(String, Table)> {
        let (_permit, waited) = sem.acquire();
        if waited > Duration::ZERO {
            self.metrics.on_throttle_wait(waited);
        }

        let name = handle.name();
        self.metrics.on_file_start();
        self.reporter.event(ReadEvent::FileStarted { name: name.to_string() });

        let (_, extension) = split_extension(name);
        let result = registry
            .resolve(extension)
            .and_then(|decoder| decoder.decode(handle, options));

        self.metrics.on_file_end(result.as_ref().ok().map(Table::row_count));
        match result {
            Ok(table) => {
                self.reporter.event(ReadEvent::FileLoaded {
                    name: name.to_string(),
                    rows: table.row_count(),
                });
                Ok((name.to_string(), table))
            }
            Err(e) => {
                self.reporter.failure(Stage::Load, name, &e);
                Err(e)
            }
        }
    }

    fn build_pool(&self) -> IngestionResult<ThreadPool> {
        ThreadPoolBuilder::new()
            .num_threads(self.opts.num_threads.unwrap_or_else(available_parallelism))
            .thread_name(|i| format!("data-harvest-loader-{i}"))
            .build()
            .map_err(|e| IngestionError::Io(std::io::Error::other(e)))
    }
}

impl Default for ParallelLoader {
    fn default() -> Self {
        Self::new(LoaderOptions::default())
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
