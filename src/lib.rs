//! `data-harvest-reader` loads every file of a directory or zip archive into named in-memory
//! [`types::Table`]s, decoding files concurrently.
//!
//! The primary entrypoint is [`reader::DataReader::read`] (or the free function [`read`]):
//!
//! 1. the source is classified: directory, archive on disk, or archive bytes
//! 2. its files are decoded in parallel by extension through a [`ingestion::FormatRegistry`]
//! 3. each table is keyed `df_<file stem>`; with `join_similar`, files such as
//!    `sales_2023-01-01 00:00:00.csv` and `sales_2023-02-01 00:00:00.csv` merge into `df_sales`
//! 4. optional per-table deduplication and declarative row filters are applied
//!
//! ## Formats (selected by extension)
//!
//! - **CSV**: `.csv`
//! - **JSON**: `.json` (array of objects, single object, or newline-delimited objects)
//! - **Parquet**: `.parquet`
//! - **Excel** (Cargo feature `excel`, on by default): `.xlsx`
//!
//! Other extensions can be added with [`ingestion::FormatRegistry::register`].
//!
//! Cells are typed [`types::Value`]s of [`types::DataType::Int64`], [`types::DataType::Float64`],
//! [`types::DataType::Bool`] or [`types::DataType::Utf8`]. Without a schema in
//! [`ingestion::FormatOptions`], column types are inferred per file. Empty cells and JSON `null`
//! map to [`types::Value::Null`].
//!
//! ## Example
//!
//! ```no_run
//! use data_harvest_reader::processing::FilterRule;
//! use data_harvest_reader::reader::{DataReader, ReadOptions};
//!
//! # fn main() -> Result<(), data_harvest_reader::IngestionError> {
//! let options = ReadOptions {
//!     join_similar: true,
//!     duplicated_subset: Some([("people".to_string(), vec!["id".to_string()])].into()),
//!     filter_subset: Some(
//!         [(
//!             "people".to_string(),
//!             vec![FilterRule::new("age", ">=", 18), FilterRule::new("age", "<", 65)],
//!         )]
//!         .into(),
//!     ),
//!     ..ReadOptions::default()
//! };
//! let tables = DataReader::default().read("exports.zip", &options)?;
//! println!("adults={}", tables["df_people"].row_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`reader`]: the pipeline orchestrator and its options
//! - [`ingestion`]: sources, decoders, and observability
//! - [`execution`]: the parallel loader, throttling, and metrics
//! - [`processing`]: key grouping, dedup, and filters
//! - [`types`]: schema and table types
//! - [`error`]: the error type shared by every stage

pub mod error;
pub mod execution;
pub mod ingestion;
pub mod processing;
pub mod reader;
pub mod types;

pub use error::{IngestionError, IngestionResult};
pub use reader::{read, DataReader, ReadOptions, ReaderOptions};
