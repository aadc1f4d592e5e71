#![cfg(feature = "excel")]

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataType, Field, Schema, Table, Value};

use super::infer::TypeGuess;
use super::registry::{Decoder, ExcelSheetSelection, FormatOptions};
use super::source::{Contents, FileHandle};

/// Built-in decoder for `.xlsx`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcelDecoder;

impl Decoder for ExcelDecoder {
    fn decode(&self, handle: &FileHandle, options: &FormatOptions) -> IngestionResult<Table> {
        match handle.contents()? {
            Contents::Path(p) => {
                let mut workbook = open_workbook_auto(p)?;
                decode_workbook(&mut workbook, options)
            }
            Contents::Bytes(b) => {
                let mut workbook = open_workbook_auto_from_rs(Cursor::new(b))?;
                decode_workbook(&mut workbook, options)
            }
        }
    }
}

/// Decode an Excel document (`.xlsx`, `.xls`, `.ods`, etc.) from disk.
///
/// Behavior:
/// - Sheets are picked by `options.excel_sheet_selection`
/// - The first non-empty row of each sheet is the header row
/// - With `options.schema`, all schema fields must exist as headers; otherwise column types are
///   inferred from the cells
/// - Rows of several sheets are concatenated in sheet order
pub fn decode_excel_from_path(path: impl AsRef<Path>, options: &FormatOptions) -> IngestionResult<Table> {
    let mut workbook = open_workbook_auto(path)?;
    decode_workbook(&mut workbook, options)
}

fn decode_workbook<RS: Read + Seek>(
    workbook: &mut Sheets<RS>,
    options: &FormatOptions,
) -> IngestionResult<Table> {
    let sheets: Vec<String> = match &options.excel_sheet_selection {
        ExcelSheetSelection::First => workbook.sheet_names().into_iter().take(1).collect(),
        ExcelSheetSelection::Sheet(name) => vec![name.clone()],
        ExcelSheetSelection::AllSheets => workbook.sheet_names().to_vec(),
        ExcelSheetSelection::Sheets(names) => names.clone(),
    };
    if sheets.is_empty() {
        return Err(IngestionError::SchemaMismatch {
            message: "workbook has no sheets".to_string(),
        });
    }

    let mut out: Option<Table> = None;
    for sheet in sheets {
        let range = workbook.worksheet_range(&sheet)?;
        let table = match &options.schema {
            Some(schema) => Table::new(schema.clone(), ingest_sheet_range(&sheet, &range, schema)?),
            None => infer_sheet_range(&sheet, &range)?,
        };
        out = Some(match out {
            None => table,
            Some(acc) => acc.concat(&table).map_err(|e| wrap_schema_err_with_sheet(&sheet, e))?,
        });
    }

    out.ok_or_else(|| IngestionError::SchemaMismatch {
        message: "workbook has no sheets".to_string(),
    })
}

fn ingest_sheet_range(
    sheet: &str,
    range: &calamine::Range<Data>,
    schema: &Schema,
) -> IngestionResult<Vec<Vec<Value>>> {
    let (header_row_idx, header_cells) =
        find_header_row(range).map_err(|e| wrap_schema_err_with_sheet(sheet, e))?;

    // Build a projection of schema field -> column index by searching header_cells.
    let mut col_idxs: Vec<usize> = Vec::with_capacity(schema.fields.len());
    for f in &schema.fields {
        match header_cells.iter().position(|h| h.trim() == f.name) {
            Some(idx) => col_idxs.push(idx),
            None => {
                return Err(wrap_schema_err_with_sheet(
                    sheet,
                    IngestionError::SchemaMismatch {
                        message: format!(
                            "missing required column '{}'. headers={:?}",
                            f.name, header_cells
                        ),
                    },
                ));
            }
        }
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx0, row) in range.rows().enumerate().skip(header_row_idx + 1) {
        // Report 1-based row number (Excel-like).
        let user_row = idx0 + 1;

        let mut out_row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &col_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let cell = row.get(col_idx).unwrap_or(&Data::Empty);
            let col_label = format!("{sheet}:{name}", name = field.name);
            out_row.push(convert_cell(user_row, &col_label, &field.data_type, cell)?);
        }
        rows.push(out_row);
    }

    Ok(rows)
}

fn infer_sheet_range(sheet: &str, range: &calamine::Range<Data>) -> IngestionResult<Table> {
    let (header_row_idx, header_cells) =
        find_header_row(range).map_err(|e| wrap_schema_err_with_sheet(sheet, e))?;

    let mut guesses = vec![TypeGuess::default(); header_cells.len()];
    for row in range.rows().skip(header_row_idx + 1) {
        for (guess, cell) in guesses.iter_mut().zip(row.iter()) {
            if let Some(t) = guess_cell(cell) {
                *guess = guess.observe(t);
            }
        }
    }

    let schema = Schema::new(
        header_cells
            .iter()
            .enumerate()
            .zip(&guesses)
            .map(|((idx, name), g)| {
                let name = name.trim();
                let name = if name.is_empty() {
                    format!("column_{idx}")
                } else {
                    name.to_string()
                };
                Field::new(name, g.resolve())
            })
            .collect(),
    );

    let mut rows = Vec::new();
    for (idx0, row) in range.rows().enumerate().skip(header_row_idx + 1) {
        let user_row = idx0 + 1;
        let mut out_row = Vec::with_capacity(schema.fields.len());
        for (col_idx, field) in schema.fields.iter().enumerate() {
            let cell = row.get(col_idx).unwrap_or(&Data::Empty);
            let col_label = format!("{sheet}:{name}", name = field.name);
            out_row.push(convert_cell(user_row, &col_label, &field.data_type, cell)?);
        }
        rows.push(out_row);
    }

    Ok(Table::new(schema, rows))
}

fn guess_cell(c: &Data) -> Option<DataType> {
    match c {
        Data::Empty => None,
        Data::Int(_) => Some(DataType::Int64),
        Data::Float(f) if f.fract() == 0.0 => Some(DataType::Int64),
        Data::Float(_) => Some(DataType::Float64),
        Data::Bool(_) => Some(DataType::Bool),
        _ => Some(DataType::Utf8),
    }
}

fn wrap_schema_err_with_sheet(sheet: &str, err: IngestionError) -> IngestionError {
    match err {
        IngestionError::SchemaMismatch { message } => IngestionError::SchemaMismatch {
            message: format!("sheet '{sheet}': {message}"),
        },
        other => other,
    }
}

fn find_header_row(range: &calamine::Range<Data>) -> IngestionResult<(usize, Vec<String>)> {
    range
        .rows()
        .enumerate()
        .find(|(_, row)| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|(idx0, row)| (idx0, row.iter().map(cell_to_header_string).collect()))
        .ok_or_else(|| IngestionError::SchemaMismatch {
            message: "sheet has no non-empty rows (no header row found)".to_string(),
        })
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => "".to_string(),
    }
}

fn convert_cell(row: usize, column: &str, data_type: &DataType, c: &Data) -> IngestionResult<Value> {
    if matches!(c, Data::Empty) {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(cell_to_string(c))),
        DataType::Bool => parse_bool_cell(row, column, c).map(Value::Bool),
        DataType::Int64 => parse_i64_cell(row, column, c).map(Value::Int64),
        DataType::Float64 => parse_f64_cell(row, column, c).map(Value::Float64),
    }
}

fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        _ => c.to_string(),
    }
}

fn cell_error(row: usize, column: &str, raw: String, message: impl Into<String>) -> IngestionError {
    IngestionError::ParseError {
        row,
        column: column.to_string(),
        raw,
        message: message.into(),
    }
}

fn parse_bool_cell(row: usize, column: &str, c: &Data) -> IngestionResult<bool> {
    match c {
        Data::Bool(b) => Ok(*b),
        Data::Int(i) => Ok(*i != 0),
        Data::Float(f) => Ok(*f != 0.0),
        Data::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "y" => Ok(true),
            "false" | "f" | "0" | "no" | "n" => Ok(false),
            _ => Err(cell_error(row, column, s.clone(), "expected bool (true/false/1/0/yes/no)")),
        },
        _ => Err(cell_error(row, column, c.to_string(), "expected bool")),
    }
}

fn parse_i64_cell(row: usize, column: &str, c: &Data) -> IngestionResult<i64> {
    match c {
        Data::Int(i) => Ok(*i),
        Data::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        Data::Float(_) => Err(cell_error(
            row,
            column,
            c.to_string(),
            "expected integer (got non-integer float)",
        )),
        Data::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| cell_error(row, column, s.clone(), e.to_string())),
        _ => Err(cell_error(row, column, c.to_string(), "expected integer")),
    }
}

fn parse_f64_cell(row: usize, column: &str, c: &Data) -> IngestionResult<f64> {
    match c {
        Data::Float(f) => Ok(*f),
        Data::Int(i) => Ok(*i as f64),
        Data::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| cell_error(row, column, s.clone(), e.to_string())),
        _ => Err(cell_error(row, column, c.to_string(), "expected number")),
    }
}
