//! CSV decoding.

use std::io::Read;
use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataType, Field, Schema, Table, Value};

use super::infer::{guess_text, TypeGuess};
use super::registry::{Decoder, FormatOptions};
use super::source::{Contents, FileHandle};

/// Built-in decoder for `.csv`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDecoder;

impl Decoder for CsvDecoder {
    fn decode(&self, handle: &FileHandle, options: &FormatOptions) -> IngestionResult<Table> {
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(true).delimiter(options.csv_delimiter);
        match handle.contents()? {
            Contents::Path(p) => decode_csv_reader(&mut builder.from_path(p)?, options),
            Contents::Bytes(b) => decode_csv_reader(&mut builder.from_reader(b.as_ref()), options),
        }
    }
}

/// Decode CSV from a reader, schema-first if `options.schema` is set, inferred otherwise.
pub fn decode_csv_reader<R: Read>(
    rdr: &mut csv::Reader<R>,
    options: &FormatOptions,
) -> IngestionResult<Table> {
    match &options.schema {
        Some(schema) => ingest_csv_from_reader(rdr, schema, options.row_limit),
        None => infer_csv_from_reader(rdr, options.row_limit),
    }
}

/// Ingest a CSV file against a known schema.
///
/// Rules:
///
/// - CSV must have headers.
/// - Headers must contain all schema fields (order can differ).
/// - Each value is parsed according to the schema field type.
pub fn ingest_csv_from_path(path: impl AsRef<Path>, schema: &Schema) -> IngestionResult<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    ingest_csv_from_reader(&mut rdr, schema, None)
}

/// Ingest CSV data from an existing CSV reader against a known schema.
pub fn ingest_csv_from_reader<R: Read>(
    rdr: &mut csv::Reader<R>,
    schema: &Schema,
    row_limit: Option<usize>,
) -> IngestionResult<Table> {
    let headers = rdr.headers()?.clone();

    // Map schema fields -> CSV column indexes (allows re-ordered CSV columns).
    let mut col_idxs = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        match headers.iter().position(|h| h == field.name) {
            Some(idx) => col_idxs.push(idx),
            None => {
                return Err(IngestionError::SchemaMismatch {
                    message: format!(
                        "missing required column '{field}'. headers={:?}",
                        headers.iter().collect::<Vec<_>>(),
                        field = field.name
                    ),
                });
            }
        }
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (row_idx0, result) in rdr.records().take(row_limit.unwrap_or(usize::MAX)).enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;
        let record = result?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &csv_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let raw = record.get(csv_idx).unwrap_or("");
            row.push(parse_typed_value(user_row, &field.name, &field.data_type, raw)?);
        }
        rows.push(row);
    }

    Ok(Table::new(schema.clone(), rows))
}

/// Ingest CSV data, inferring one type per column from its non-empty cells.
pub fn infer_csv_from_reader<R: Read>(
    rdr: &mut csv::Reader<R>,
    row_limit: Option<usize>,
) -> IngestionResult<Table> {
    let headers = rdr.headers()?.clone();
    let records = rdr
        .records()
        .take(row_limit.unwrap_or(usize::MAX))
        .collect::<Result<Vec<_>, _>>()?;

    let mut guesses = vec![TypeGuess::default(); headers.len()];
    for record in &records {
        for (guess, raw) in guesses.iter_mut().zip(record.iter()) {
            if let Some(t) = guess_text(raw) {
                *guess = guess.observe(t);
            }
        }
    }

    let schema = Schema::new(
        headers
            .iter()
            .zip(&guesses)
            .map(|(name, g)| Field::new(name, g.resolve()))
            .collect(),
    );

    let mut rows = Vec::with_capacity(records.len());
    for (row_idx0, record) in records.iter().enumerate() {
        let user_row = row_idx0 + 2;
        let mut row = Vec::with_capacity(schema.fields.len());
        for (idx, field) in schema.fields.iter().enumerate() {
            let raw = record.get(idx).unwrap_or("");
            row.push(parse_typed_value(user_row, &field.name, &field.data_type, raw)?);
        }
        rows.push(row);
    }

    Ok(Table::new(schema, rows))
}

fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    raw: &str,
) -> IngestionResult<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed.parse::<i64>().map(Value::Int64).map_err(|e| {
            IngestionError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Float64 => trimmed.parse::<f64>().map(Value::Float64).map_err(|e| {
            IngestionError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Bool => parse_bool(trimmed).map(Value::Bool).map_err(|message| {
            IngestionError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message,
            }
        }),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(input: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(input.as_bytes())
    }

    #[test]
    fn inferred_types_follow_cell_contents() {
        let input = "id,name,score,active\n1,Ada,98.5,true\n2,Grace,,false\n";
        let t = infer_csv_from_reader(&mut reader(input), None).unwrap();
        let types: Vec<DataType> = t.schema.fields.iter().map(|f| f.data_type).collect();
        assert_eq!(
            types,
            vec![DataType::Int64, DataType::Utf8, DataType::Float64, DataType::Bool]
        );
        assert_eq!(t.rows[1][2], Value::Null);
        assert_eq!(t.rows[1][3], Value::Bool(false));
    }

    #[test]
    fn row_limit_caps_rows() {
        let input = "id\n1\n2\n3\n";
        let t = infer_csv_from_reader(&mut reader(input), Some(2)).unwrap();
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn decoder_reads_in_memory_handles_with_custom_delimiter() {
        let handle = FileHandle::from_bytes("a.csv", "id;v\n1;x\n");
        let opts = FormatOptions {
            csv_delimiter: b';',
            ..Default::default()
        };
        let t = CsvDecoder.decode(&handle, &opts).unwrap();
        assert_eq!(t.schema.field_names().collect::<Vec<_>>(), vec!["id", "v"]);
        assert_eq!(t.rows[0][0], Value::Int64(1));
    }
}
