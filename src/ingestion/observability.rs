//! Observer hooks for pipeline lifecycle events and failures.
//!
//! Every stage reports through a [`ReadObserver`]: lifecycle events via
//! [`ReadObserver::on_event`], failures via [`ReadObserver::on_failure`] (and
//! [`ReadObserver::on_alert`] once a failure reaches the configured severity threshold). Errors
//! are always reported before they are returned to the caller.
//!
//! The default observer is [`LogObserver`], which forwards to the `log` facade.

use std::error::Error as StdError;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::IngestionError;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

/// Pipeline stage a failure or warning belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Source,
    Load,
    Dedup,
    Filter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Source => "source",
            Stage::Load => "load",
            Stage::Dedup => "dedup",
            Stage::Filter => "filter",
        })
    }
}

/// Where a failure happened: the stage, and the file or table it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext {
    pub stage: Stage,
    /// File name (load stage), table key (dedup/filter), or source description.
    pub subject: String,
}

/// Lifecycle events emitted during a `read` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadEvent {
    Started { source: String },
    SourceEnumerated { files: usize },
    FileStarted { name: String },
    FileLoaded { name: String, rows: usize },
    /// Merge mode appended a file's rows onto an existing table.
    TablesMerged { key: String, name: String, rows: usize },
    /// Merge mode is off and a later file replaced an earlier table with the same key.
    KeyCollision { key: String, name: String },
    DedupApplied { key: String, rows_before: usize, rows_after: usize },
    FiltersApplied { key: String, rows_before: usize, rows_after: usize },
    /// A dedup/filter entry names a table that was not loaded.
    UnmatchedKey { stage: Stage, key: String },
    Completed { tables: usize },
}

impl ReadEvent {
    pub fn severity(&self) -> Severity {
        match self {
            ReadEvent::KeyCollision { .. } | ReadEvent::UnmatchedKey { .. } => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for ReadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadEvent::Started { source } => write!(f, "starting data reading from {source}"),
            ReadEvent::SourceEnumerated { files } => write!(f, "found {files} file(s)"),
            ReadEvent::FileStarted { name } => write!(f, "initiating reading of {name}"),
            ReadEvent::FileLoaded { name, rows } => {
                write!(f, "file reading for {name} finished rows={rows}")
            }
            ReadEvent::TablesMerged { key, name, rows } => {
                write!(f, "merged {name} into {key} rows={rows}")
            }
            ReadEvent::KeyCollision { key, name } => {
                write!(f, "{name} replaced existing table {key} (merge mode off)")
            }
            ReadEvent::DedupApplied {
                key,
                rows_before,
                rows_after,
            } => write!(f, "deduplicated {key} rows={rows_before}->{rows_after}"),
            ReadEvent::FiltersApplied {
                key,
                rows_before,
                rows_after,
            } => write!(f, "filtered {key} rows={rows_before}->{rows_after}"),
            ReadEvent::UnmatchedKey { stage, key } => {
                write!(f, "{stage} entry for {key} matches no loaded table")
            }
            ReadEvent::Completed { tables } => {
                write!(f, "data reading process completed tables={tables}")
            }
        }
    }
}

/// Observer interface for pipeline events and failures.
///
/// Implementors can record metrics, logs, or trigger alerts. Observers are shared with worker
/// threads, hence `Send + Sync`.
pub trait ReadObserver: Send + Sync {
    /// Called for lifecycle events.
    fn on_event(&self, _event: &ReadEvent) {}

    /// Called when a stage fails, before the error is returned.
    fn on_failure(&self, _ctx: &FailureContext, _severity: Severity, _error: &IngestionError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &FailureContext, severity: Severity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Severity assigned to a failure: I/O anywhere in the error chain is `Critical`.
pub fn severity_for_error(e: &IngestionError) -> Severity {
    match e {
        IngestionError::Io(_) | IngestionError::Walk(_) => Severity::Critical,
        IngestionError::Zip(zip::result::ZipError::Io(_)) => Severity::Critical,
        IngestionError::Parquet(err) if error_chain_contains_io(err) => Severity::Critical,
        IngestionError::Csv(err) if matches!(err.kind(), ::csv::ErrorKind::Io(_)) => {
            Severity::Critical
        }
        _ => Severity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

/// Observer plus alert threshold, as used by the pipeline stages.
#[derive(Clone)]
pub(crate) struct Reporter {
    observer: Option<Arc<dyn ReadObserver>>,
    alert_at_or_above: Severity,
}

impl Reporter {
    pub(crate) fn new(observer: Option<Arc<dyn ReadObserver>>, alert_at_or_above: Severity) -> Self {
        Self {
            observer,
            alert_at_or_above,
        }
    }

    pub(crate) fn event(&self, event: ReadEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }

    pub(crate) fn failure(&self, stage: Stage, subject: &str, error: &IngestionError) {
        let Some(obs) = &self.observer else {
            return;
        };
        let ctx = FailureContext {
            stage,
            subject: subject.to_string(),
        };
        let sev = severity_for_error(error);
        obs.on_failure(&ctx, sev, error);
        if sev >= self.alert_at_or_above {
            obs.on_alert(&ctx, sev, error);
        }
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ReadObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn ReadObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ReadObserver for CompositeObserver {
    fn on_event(&self, event: &ReadEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }

    fn on_failure(&self, ctx: &FailureContext, severity: Severity, error: &IngestionError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &FailureContext, severity: Severity, error: &IngestionError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards events to the `log` facade.
///
/// Lifecycle events log at `info`, collisions and unmatched keys at `warn`, failures at `error`.
#[derive(Debug, Default)]
pub struct LogObserver;

impl ReadObserver for LogObserver {
    fn on_event(&self, event: &ReadEvent) {
        match event.severity() {
            Severity::Info => log::info!("{event}"),
            _ => log::warn!("{event}"),
        }
    }

    fn on_failure(&self, ctx: &FailureContext, severity: Severity, error: &IngestionError) {
        log::error!(
            "[{severity:?}] {stage} failed for {subject}: {error}",
            stage = ctx.stage,
            subject = ctx.subject
        );
    }

    fn on_alert(&self, ctx: &FailureContext, severity: Severity, error: &IngestionError) {
        log::error!(
            "[ALERT][{severity:?}] {stage} failed for {subject}: {error}",
            stage = ctx.stage,
            subject = ctx.subject
        );
    }
}

/// Logs events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl ReadObserver for StdErrObserver {
    fn on_event(&self, event: &ReadEvent) {
        eprintln!("{} | {:?} | {event}", unix_ts(), event.severity());
    }

    fn on_failure(&self, ctx: &FailureContext, severity: Severity, error: &IngestionError) {
        eprintln!(
            "{} | {severity:?} | {} failed for {}: {error}",
            unix_ts(),
            ctx.stage,
            ctx.subject
        );
    }

    fn on_alert(&self, ctx: &FailureContext, severity: Severity, error: &IngestionError) {
        eprintln!(
            "{} | ALERT {severity:?} | {} failed for {}: {error}",
            unix_ts(),
            ctx.stage,
            ctx.subject
        );
    }
}

const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Appends events to a local log file with time-based rotation.
///
/// Once the current file is older than the rotation period it is renamed to
/// `<file name>.<unix nanos>` and a fresh file is started. Rotated files older than the
/// retention period are deleted on rotation. Writes are best-effort; I/O failures are ignored.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    rotation: Duration,
    retention: Duration,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path` (rotation: 1 week, retention: 4 weeks).
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            rotation: WEEK,
            retention: WEEK * 4,
            lock: Mutex::new(()),
        }
    }

    pub fn with_rotation(mut self, every: Duration) -> Self {
        self.rotation = every;
        self
    }

    pub fn with_retention(mut self, keep_for: Duration) -> Self {
        self.retention = keep_for;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        let _ = self.rotate_if_due();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }

    fn rotate_if_due(&self) -> io::Result<()> {
        let meta = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        let born = meta.created().or_else(|_| meta.modified())?;
        if age(born) < self.rotation {
            return Ok(());
        }

        let file_name = self.file_name();
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        fs::rename(&self.path, self.path.with_file_name(format!("{file_name}.{stamp}")))?;
        self.purge_expired(&file_name)
    }

    fn purge_expired(&self, file_name: &str) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = format!("{file_name}.");
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let is_rotated = name
                .strip_prefix(&prefix)
                .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()));
            if is_rotated && age(entry.metadata()?.modified()?) > self.retention {
                let _ = fs::remove_file(entry.path());
            }
        }
        Ok(())
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data_reader.log".to_string())
    }
}

impl ReadObserver for FileObserver {
    fn on_event(&self, event: &ReadEvent) {
        self.append_line(&format!("{} | {:?} | {event}", unix_ts(), event.severity()));
    }

    fn on_failure(&self, ctx: &FailureContext, severity: Severity, error: &IngestionError) {
        self.append_line(&format!(
            "{} | {severity:?} | {} failed for {}: {error}",
            unix_ts(),
            ctx.stage,
            ctx.subject
        ));
    }

    fn on_alert(&self, ctx: &FailureContext, severity: Severity, error: &IngestionError) {
        self.append_line(&format!(
            "{} | ALERT {severity:?} | {} failed for {}: {error}",
            unix_ts(),
            ctx.stage,
            ctx.subject
        ));
    }
}

/// Console logging, plus a rotating log file when `log_file` is set.
pub fn console_observer(log_file: Option<PathBuf>) -> Arc<dyn ReadObserver> {
    match log_file {
        None => Arc::new(StdErrObserver),
        Some(path) => Arc::new(CompositeObserver::new(vec![
            Arc::new(StdErrObserver),
            Arc::new(FileObserver::new(path)),
        ])),
    }
}

fn age(t: SystemTime) -> Duration {
    SystemTime::now().duration_since(t).unwrap_or_default()
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
