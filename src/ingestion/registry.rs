//! Format registry: file extension -> [`Decoder`].
//!
//! Each [`crate::reader::DataReader`] owns its own registry, so tests and callers can inject
//! decoders without touching process-wide state.
//!
//! ```no_run
//! use data_harvest_reader::ingestion::{FileHandle, FormatOptions, FormatRegistry};
//! use data_harvest_reader::types::{DataType, Field, Schema, Table, Value};
//! use data_harvest_reader::IngestionResult;
//!
//! # fn main() -> Result<(), data_harvest_reader::IngestionError> {
//! let mut registry = FormatRegistry::with_defaults();
//!
//! // Closures with the decoder signature are decoders too.
//! registry.register(".txt", |handle: &FileHandle, _opts: &FormatOptions| -> IngestionResult<Table> {
//!     let text = handle.read_to_string()?;
//!     let rows = text.lines().map(|l| vec![Value::Utf8(l.to_string())]).collect();
//!     Ok(Table::new(Schema::new(vec![Field::new("line", DataType::Utf8)]), rows))
//! });
//!
//! let decoder = registry.resolve(".txt")?;
//! # let _ = decoder;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{Schema, Table};

use super::source::FileHandle;

/// A per-format decode capability: "given a file handle, produce a table".
///
/// Implementations must be stateless; one instance is shared by every worker thread.
pub trait Decoder: Send + Sync {
    fn decode(&self, handle: &FileHandle, options: &FormatOptions) -> IngestionResult<Table>;
}

impl<F> Decoder for F
where
    F: Fn(&FileHandle, &FormatOptions) -> IngestionResult<Table> + Send + Sync,
{
    fn decode(&self, handle: &FileHandle, options: &FormatOptions) -> IngestionResult<Table> {
        self(handle, options)
    }
}

/// How to choose sheet(s) when decoding an Excel workbook.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExcelSheetSelection {
    /// Decode the first sheet (default).
    #[default]
    First,
    /// Decode a single named sheet.
    Sheet(String),
    /// Decode all sheets and concatenate rows.
    AllSheets,
    /// Decode only the listed sheets (in order) and concatenate rows.
    Sheets(Vec<String>),
}

/// Format-specific options forwarded unchanged to every decoder.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// If set, decoders parse against this schema and fail on missing columns or bad values.
    /// If `None`, each file's schema is inferred from its contents.
    pub schema: Option<Schema>,
    /// CSV field delimiter.
    pub csv_delimiter: u8,
    /// Upper bound on rows read per file (CSV, JSON, Parquet).
    pub row_limit: Option<usize>,
    /// Excel-specific sheet selection.
    pub excel_sheet_selection: ExcelSheetSelection,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            schema: None,
            csv_delimiter: b',',
            row_limit: None,
            excel_sheet_selection: ExcelSheetSelection::default(),
        }
    }
}

/// Extension-keyed decoder lookup.
///
/// Keys include the leading dot (`".csv"`) and are matched case-sensitively.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    decoders: HashMap<String, Arc<dyn Decoder>>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `.csv`, `.json`, `.parquet` and (feature `excel`) `.xlsx`
    /// decoders.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(".csv", super::csv::CsvDecoder);
        reg.register(".json", super::json::JsonDecoder);
        reg.register(".parquet", super::parquet::ParquetDecoder);
        #[cfg(feature = "excel")]
        reg.register(".xlsx", super::excel::ExcelDecoder);
        reg
    }

    /// Register (or replace) the decoder for `extension`.
    pub fn register<D>(&mut self, extension: impl Into<String>, decoder: D) -> &mut Self
    where
        D: Decoder + 'static,
    {
        self.decoders.insert(extension.into(), Arc::new(decoder));
        self
    }

    /// Look up the decoder for `extension`.
    pub fn resolve(&self, extension: &str) -> IngestionResult<Arc<dyn Decoder>> {
        self.decoders
            .get(extension)
            .cloned()
            .ok_or_else(|| IngestionError::UnsupportedFormat {
                extension: extension.to_string(),
            })
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.decoders.keys().map(|s| s.as_str()).collect();
        exts.sort_unstable();
        exts
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

/// Split a logical file name into `(stem, extension)` after dropping any directory part.
///
/// The extension keeps its leading dot. Leading dots of the file name are not extension
/// separators, so `".hidden"` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let leading_dots = base.len() - base.trim_start_matches('.').len();
    match base[leading_dots..].rfind('.') {
        Some(pos) => base.split_at(leading_dots + pos),
        None => (base, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Field, Value};

    #[test]
    fn split_extension_handles_paths_and_dots() {
        assert_eq!(split_extension("dir/sub/sales.csv"), ("sales", ".csv"));
        assert_eq!(split_extension("a.b.json"), ("a.b", ".json"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("x/.env.local"), (".env", ".local"));
        assert_eq!(split_extension(r"C:\data\sales_1.CSV"), ("sales_1", ".CSV"));
        assert_eq!(
            split_extension("sales_2023-01-01 00:00:00.csv"),
            ("sales_2023-01-01 00:00:00", ".csv")
        );
    }

    #[test]
    fn defaults_resolve_and_misses_report_extension() {
        let reg = FormatRegistry::with_defaults();
        for ext in [".csv", ".json", ".parquet"] {
            assert!(reg.resolve(ext).is_ok(), "{ext} should resolve");
        }
        let err = reg.resolve(".txt").err().unwrap();
        assert!(matches!(err, IngestionError::UnsupportedFormat { ref extension } if extension == ".txt"));
    }

    #[test]
    fn resolution_is_case_sensitive() {
        let reg = FormatRegistry::with_defaults();
        assert!(reg.resolve(".CSV").is_err());
        assert!(reg.resolve("csv").is_err());
    }

    #[test]
    fn closure_decoders_can_be_registered() {
        let mut reg = FormatRegistry::new();
        reg.register(".one", |_h: &FileHandle, _o: &FormatOptions| -> IngestionResult<Table> {
            Ok(Table::new(
                Schema::new(vec![Field::new("x", DataType::Int64)]),
                vec![vec![Value::Int64(1)]],
            ))
        });
        let handle = FileHandle::from_bytes("a.one", Vec::<u8>::new());
        let table = reg
            .resolve(".one")
            .unwrap()
            .decode(&handle, &FormatOptions::default())
            .unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(reg.extensions(), vec![".one"]);
    }
}
