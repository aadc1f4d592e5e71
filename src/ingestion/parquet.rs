//! Parquet decoding.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use parquet::file::reader::{ChunkReader, FileReader};
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::{Field, Row};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{self, DataType, Schema, Table, Value};

use super::infer::TypeGuess;
use super::registry::{Decoder, FormatOptions};
use super::source::{Contents, FileHandle};

/// Built-in decoder for `.parquet`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetDecoder;

impl Decoder for ParquetDecoder {
    fn decode(&self, handle: &FileHandle, options: &FormatOptions) -> IngestionResult<Table> {
        match handle.contents()? {
            Contents::Path(p) => decode_parquet_reader(SerializedFileReader::try_from(p)?, options),
            Contents::Bytes(b) => decode_parquet_reader(SerializedFileReader::new(b)?, options),
        }
    }
}

/// Decode an opened Parquet file, schema-first if `options.schema` is set, inferred otherwise.
pub fn decode_parquet_reader<R: ChunkReader + 'static>(
    reader: SerializedFileReader<R>,
    options: &FormatOptions,
) -> IngestionResult<Table> {
    match &options.schema {
        Some(schema) => ingest_parquet_reader(reader, schema, options.row_limit),
        None => infer_parquet_reader(reader, options.row_limit),
    }
}

/// Ingest a Parquet file against a known schema.
///
/// Validates that all schema fields exist as Parquet leaf columns (by column path string).
pub fn ingest_parquet_from_path(path: impl AsRef<Path>, schema: &Schema) -> IngestionResult<Table> {
    let reader = SerializedFileReader::try_from(path.as_ref())?;
    ingest_parquet_reader(reader, schema, None)
}

fn ingest_parquet_reader<R: ChunkReader + 'static>(
    reader: SerializedFileReader<R>,
    schema: &Schema,
    row_limit: Option<usize>,
) -> IngestionResult<Table> {
    let available_columns = parquet_leaf_column_paths(&reader);
    for field in &schema.fields {
        if !available_columns.contains(field.name.as_str()) {
            return Err(IngestionError::SchemaMismatch {
                message: format!("missing required column '{}'", field.name),
            });
        }
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx0, row_res) in reader.get_row_iter(None)?.take(row_limit.unwrap_or(usize::MAX)).enumerate() {
        let row_num = idx0 + 1;
        let row = row_res?;

        let map: HashMap<&str, &Field> = row
            .get_column_iter()
            .map(|(name, field)| (name.as_str(), field))
            .collect();

        let mut out_row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for f in &schema.fields {
            let v = map.get(f.name.as_str()).ok_or_else(|| IngestionError::SchemaMismatch {
                message: format!("row {row_num} missing required column '{}'", f.name),
            })?;
            out_row.push(convert_parquet_field(row_num, &f.name, &f.data_type, v)?);
        }
        rows.push(out_row);
    }

    Ok(Table::new(schema.clone(), rows))
}

/// Columns are the root schema fields in order; types come from the decoded row values.
fn infer_parquet_reader<R: ChunkReader + 'static>(
    reader: SerializedFileReader<R>,
    row_limit: Option<usize>,
) -> IngestionResult<Table> {
    let names: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();

    let records: Vec<Row> = reader
        .get_row_iter(None)?
        .take(row_limit.unwrap_or(usize::MAX))
        .collect::<Result<_, _>>()?;

    let mut guesses = vec![TypeGuess::default(); names.len()];
    for record in &records {
        for (name, field) in record.get_column_iter() {
            if let (Some(pos), Some(t)) = (names.iter().position(|n| n == name), guess_field(field)) {
                guesses[pos] = guesses[pos].observe(t);
            }
        }
    }

    let schema = Schema::new(
        names
            .iter()
            .zip(&guesses)
            .map(|(name, g)| types::Field::new(name.as_str(), g.resolve()))
            .collect(),
    );

    let mut rows = Vec::with_capacity(records.len());
    for (idx0, record) in records.iter().enumerate() {
        let row_num = idx0 + 1;
        let map: HashMap<&str, &Field> = record
            .get_column_iter()
            .map(|(name, field)| (name.as_str(), field))
            .collect();
        let mut out_row = Vec::with_capacity(schema.fields.len());
        for f in &schema.fields {
            out_row.push(match map.get(f.name.as_str()) {
                None | Some(Field::Null) => Value::Null,
                Some(Field::Str(s)) if f.data_type == DataType::Utf8 => Value::Utf8(s.clone()),
                Some(v) if f.data_type == DataType::Utf8 => Value::Utf8(v.to_string()),
                Some(v) => convert_parquet_field(row_num, &f.name, &f.data_type, v)?,
            });
        }
        rows.push(out_row);
    }

    Ok(Table::new(schema, rows))
}

fn guess_field(f: &Field) -> Option<DataType> {
    match f {
        Field::Null => None,
        Field::Bool(_) => Some(DataType::Bool),
        Field::Byte(_)
        | Field::Short(_)
        | Field::Int(_)
        | Field::Long(_)
        | Field::UByte(_)
        | Field::UShort(_)
        | Field::UInt(_)
        | Field::ULong(_) => Some(DataType::Int64),
        Field::Float(_) | Field::Double(_) => Some(DataType::Float64),
        _ => Some(DataType::Utf8),
    }
}

fn parquet_leaf_column_paths<R: ChunkReader + 'static>(
    reader: &SerializedFileReader<R>,
) -> HashSet<String> {
    reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.path().string())
        .collect()
}

fn convert_parquet_field(
    row: usize,
    column: &str,
    data_type: &DataType,
    f: &Field,
) -> IngestionResult<Value> {
    if matches!(f, Field::Null) {
        return Ok(Value::Null);
    }

    let mismatch = |message: &str| IngestionError::ParseError {
        row,
        column: column.to_string(),
        raw: f.to_string(),
        message: message.to_string(),
    };

    match data_type {
        DataType::Utf8 => match f {
            Field::Str(s) => Ok(Value::Utf8(s.clone())),
            _ => Err(mismatch("expected string")),
        },
        DataType::Bool => match f {
            Field::Bool(b) => Ok(Value::Bool(*b)),
            _ => Err(mismatch("expected bool")),
        },
        DataType::Int64 => match f {
            Field::Byte(v) => Ok(Value::Int64(i64::from(*v))),
            Field::Short(v) => Ok(Value::Int64(i64::from(*v))),
            Field::Int(v) => Ok(Value::Int64(i64::from(*v))),
            Field::Long(v) => Ok(Value::Int64(*v)),
            Field::UByte(v) => Ok(Value::Int64(i64::from(*v))),
            Field::UShort(v) => Ok(Value::Int64(i64::from(*v))),
            Field::UInt(v) => Ok(Value::Int64(i64::from(*v))),
            Field::ULong(v) => i64::try_from(*v)
                .map(Value::Int64)
                .map_err(|_| mismatch("u64 out of range for i64")),
            _ => Err(mismatch("expected integer")),
        },
        DataType::Float64 => match f {
            Field::Float(v) => Ok(Value::Float64(f64::from(*v))),
            Field::Double(v) => Ok(Value::Float64(*v)),
            // Integer cells in a widened column.
            Field::Int(v) => Ok(Value::Float64(f64::from(*v))),
            Field::Long(v) => Ok(Value::Float64(*v as f64)),
            _ => Err(mismatch("expected number")),
        },
    }
}
