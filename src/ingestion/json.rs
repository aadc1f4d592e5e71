//! JSON decoding.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single JSON object (one row)
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! With a caller schema, nested fields are addressed using dot paths in field names
//! (e.g. `user.name`). Without one, columns are the union of top-level keys in first-seen order.

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataType, Field, Schema, Table, Value};

use super::infer::{guess_json, TypeGuess};
use super::registry::{Decoder, FormatOptions};
use super::source::FileHandle;

/// Built-in decoder for `.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, handle: &FileHandle, options: &FormatOptions) -> IngestionResult<Table> {
        let text = handle.read_to_string()?;
        decode_json_str(&text, options)
    }
}

/// Decode JSON text, schema-first if `options.schema` is set, inferred otherwise.
pub fn decode_json_str(input: &str, options: &FormatOptions) -> IngestionResult<Table> {
    let mut values = parse_json_rows(input)?;
    if let Some(limit) = options.row_limit {
        values.truncate(limit);
    }
    match &options.schema {
        Some(schema) => ingest_json_values(&values, schema),
        None => infer_json_values(&values),
    }
}

/// Ingest JSON from an in-memory string against a known schema.
pub fn ingest_json_from_str(input: &str, schema: &Schema) -> IngestionResult<Table> {
    ingest_json_values(&parse_json_rows(input)?, schema)
}

fn parse_json_rows(input: &str) -> IngestionResult<Vec<serde_json::Value>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IngestionError::SchemaMismatch {
            message: "json input is empty".to_string(),
        });
    }

    // First try parsing as a single JSON value (array or object).
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match v {
            serde_json::Value::Array(items) => Ok(items),
            serde_json::Value::Object(_) => Ok(vec![v]),
            _ => Err(IngestionError::SchemaMismatch {
                message: "json must be an object, an array of objects, or NDJSON".to_string(),
            }),
        }
    } else {
        // Fall back to NDJSON.
        let mut values = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
                IngestionError::SchemaMismatch {
                    message: format!("invalid ndjson at line {}: {}", i + 1, e),
                }
            })?;
            values.push(v);
        }
        Ok(values)
    }
}

fn ingest_json_values(values: &[serde_json::Value], schema: &Schema) -> IngestionResult<Table> {
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(values.len());

    for (idx0, v) in values.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = as_row_object(row_num, v)?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let jv = get_by_dot_path(obj, &field.name).ok_or_else(|| IngestionError::SchemaMismatch {
                message: format!("row {row_num} missing required field '{}'", field.name),
            })?;
            row.push(convert_json_value(row_num, &field.name, &field.data_type, jv)?);
        }
        rows.push(row);
    }

    Ok(Table::new(schema.clone(), rows))
}

fn infer_json_values(values: &[serde_json::Value]) -> IngestionResult<Table> {
    let mut names: Vec<String> = Vec::new();
    let mut guesses: Vec<TypeGuess> = Vec::new();

    for (idx0, v) in values.iter().enumerate() {
        let obj = as_row_object(idx0 + 1, v)?;
        for (key, jv) in obj {
            let pos = match names.iter().position(|n| n == key) {
                Some(pos) => pos,
                None => {
                    names.push(key.clone());
                    guesses.push(TypeGuess::default());
                    names.len() - 1
                }
            };
            if let Some(t) = guess_json(jv) {
                guesses[pos] = guesses[pos].observe(t);
            }
        }
    }

    let schema = Schema::new(
        names
            .into_iter()
            .zip(guesses)
            .map(|(name, g)| Field::new(name, g.resolve()))
            .collect(),
    );

    let mut rows = Vec::with_capacity(values.len());
    for (idx0, v) in values.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = as_row_object(row_num, v)?;
        let mut row = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            row.push(match obj.get(&field.name) {
                None => Value::Null,
                Some(jv) if field.data_type == DataType::Utf8 => json_to_text(jv),
                Some(jv) => convert_json_value(row_num, &field.name, &field.data_type, jv)?,
            });
        }
        rows.push(row);
    }

    Ok(Table::new(schema, rows))
}

fn as_row_object(
    row_num: usize,
    v: &serde_json::Value,
) -> IngestionResult<&serde_json::Map<String, serde_json::Value>> {
    v.as_object().ok_or_else(|| IngestionError::SchemaMismatch {
        message: format!("row {row_num} is not a json object"),
    })
}

// Strings stay as-is; everything else in a text column keeps its JSON rendering.
fn json_to_text(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::String(s) => Value::Utf8(s.clone()),
        other => Value::Utf8(other.to_string()),
    }
}

fn get_by_dot_path<'a>(
    root: &'a serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Option<&'a serde_json::Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        match current {
            serde_json::Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn convert_json_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    v: &serde_json::Value,
) -> IngestionResult<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }

    let mismatch = |message: &str| IngestionError::ParseError {
        row,
        column: column.to_string(),
        raw: v.to_string(),
        message: message.to_string(),
    };

    match data_type {
        DataType::Utf8 => v
            .as_str()
            .map(|s| Value::Utf8(s.to_string()))
            .ok_or_else(|| mismatch("expected string")),
        DataType::Bool => v.as_bool().map(Value::Bool).ok_or_else(|| mismatch("expected bool")),
        DataType::Int64 => {
            if let Some(n) = v.as_i64() {
                Ok(Value::Int64(n))
            } else if v.as_u64().is_some() {
                Err(mismatch("u64 out of range for i64"))
            } else {
                Err(mismatch("expected integer number"))
            }
        }
        DataType::Float64 => v.as_f64().map(Value::Float64).ok_or_else(|| mismatch("expected number")),
    }
}
