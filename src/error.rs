use thiserror::Error;

/// Convenience result type for reader operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned across source enumeration, decoding, dedup, and filtering.
///
/// Every failure aborts the whole [`crate::reader::DataReader::read`] call; there is no
/// partial-result mode.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The source is neither an existing directory, an existing file, nor an in-memory buffer.
    #[error("unsupported source: {message}")]
    UnsupportedSource { message: String },

    /// No decoder is registered for a file's extension.
    #[error("unsupported file format: '{extension}'")]
    UnsupportedFormat { extension: String },

    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The archive could not be opened or an entry could not be read.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[cfg(feature = "excel")]
    /// Excel decoding error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV decoding error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parquet decoding error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// The input does not conform to the expected schema (missing columns, misaligned concat, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// A filter rule list is invalid or could not be evaluated against a table.
    #[error("error in filter configuration for {table}: {message}")]
    FilterConfiguration { table: String, message: String },

    /// A column referenced by a dedup subset does not exist.
    #[error("column not found: '{column}'")]
    ColumnNotFound { column: String },
}
