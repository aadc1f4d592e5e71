//! Core data model types.
//!
//! Every decoder produces a [`Table`]: a [`Schema`] (a list of typed [`Field`]s) plus row-major
//! [`Value`] storage. A single `read` call returns a [`TableCollection`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};

/// Named output of one pipeline run: `"df_" + base name` to table.
pub type TableCollection = HashMap<String, Table>;

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// Whether values of `self` and `other` can be ordered against each other.
    ///
    /// Integers and floats compare numerically; every other type only compares with itself.
    pub fn is_comparable_with(self, other: DataType) -> bool {
        self == other || (self.is_numeric() && other.is_numeric())
    }

    /// `true` for [`DataType::Int64`] and [`DataType::Float64`].
    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the shape of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the field with the given name, if present.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single typed value in a [`Table`].
///
/// Serializes untagged, so JSON scalars (`null`, `1`, `1.5`, `true`, `"a"`) map directly onto
/// the matching variant. This is what filter rule `values` are parsed into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// The data type of a non-null value.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::Bool(_) => Some(DataType::Bool),
            Value::Utf8(_) => Some(DataType::Utf8),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn key(&self) -> ValueKey<'_> {
        match self {
            Value::Null => ValueKey::Null,
            Value::Int64(v) => ValueKey::Int64(*v),
            Value::Float64(v) => ValueKey::Float64(canonical_bits(*v)),
            Value::Bool(v) => ValueKey::Bool(*v),
            Value::Utf8(v) => ValueKey::Utf8(v.as_str()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Utf8(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Utf8(v)
    }
}

/// Hashable projection of a [`Value`], used for uniqueness checks.
#[derive(Debug, PartialEq, Eq, Hash)]
enum ValueKey<'a> {
    Null,
    Int64(i64),
    Float64(u64),
    Bool(bool),
    Utf8(&'a str),
}

// -0.0 == 0.0, and all NaNs are one group.
fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0_f64.to_bits()
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields. Transforms
/// never mutate in place; each returns a new table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create a table from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterate the values of one column, top to bottom. `None` if the column does not exist.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Create a new table containing only rows that match `predicate`.
    ///
    /// The returned table preserves the original schema.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Row-wise append of `other` onto `self`.
    ///
    /// Both tables must have identical schemas (same names, same types, same order).
    pub fn concat(&self, other: &Table) -> IngestionResult<Table> {
        if self.schema != other.schema {
            return Err(IngestionError::SchemaMismatch {
                message: format!(
                    "cannot concatenate tables with different columns: left={:?} right={:?}",
                    describe(&self.schema),
                    describe(&other.schema)
                ),
            });
        }
        let mut rows = Vec::with_capacity(self.rows.len() + other.rows.len());
        rows.extend(self.rows.iter().cloned());
        rows.extend(other.rows.iter().cloned());
        Ok(Table::new(self.schema.clone(), rows))
    }

    /// Drop duplicate rows, keeping the first occurrence of each unique combination of `subset`.
    ///
    /// An empty subset means "all columns". Unknown columns yield
    /// [`IngestionError::ColumnNotFound`].
    pub fn unique(&self, subset: &[String]) -> IngestionResult<Table> {
        let idxs: Vec<usize> = if subset.is_empty() {
            (0..self.schema.fields.len()).collect()
        } else {
            subset
                .iter()
                .map(|name| {
                    self.schema
                        .index_of(name)
                        .ok_or_else(|| IngestionError::ColumnNotFound { column: name.clone() })
                })
                .collect::<IngestionResult<_>>()?
        };

        let mut seen: HashSet<Vec<ValueKey<'_>>> = HashSet::with_capacity(self.rows.len());
        let mut keep = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let key: Vec<ValueKey<'_>> = idxs.iter().map(|&i| row[i].key()).collect();
            keep.push(seen.insert(key));
        }

        let rows = self
            .rows
            .iter()
            .zip(keep)
            .filter_map(|(row, keep)| keep.then(|| row.clone()))
            .collect();
        Ok(Table::new(self.schema.clone(), rows))
    }
}

fn describe(schema: &Schema) -> Vec<String> {
    schema
        .fields
        .iter()
        .map(|f| format!("{}:{:?}", f.name, f.data_type))
        .collect()
}
