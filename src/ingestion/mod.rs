//! Source enumeration, format decoding, and observability.
//!
//! - [`source`]: classify a directory / archive path / archive bytes and list its files
//! - [`registry`]: extension → [`Decoder`] lookup and the shared [`FormatOptions`]
//! - [`observability`]: lifecycle events, failure reporting, and built-in observers
//!
//! Format-specific decoders live under:
//! - [`csv`]
//! - [`json`]
//! - [`parquet`]
//! - `excel` (feature `excel`)
//!
//! Every decoder is schema-first when [`FormatOptions::schema`] is set and infers column types
//! otherwise.

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub(crate) mod infer;
pub mod json;
pub mod observability;
pub mod parquet;
pub mod registry;
pub mod source;

pub use observability::{
    console_observer, CompositeObserver, FailureContext, FileObserver, LogObserver, ReadEvent, ReadObserver,
    Severity, Stage, StdErrObserver,
};
pub use registry::{split_extension, Decoder, ExcelSheetSelection, FormatOptions, FormatRegistry};
pub use source::{Contents, FileHandle, Source, SourceInput};
