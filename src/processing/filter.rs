//! Declarative row filtering for [`crate::types::Table`].
//!
//! A filter is a list of [`FilterRule`]s. Each rule yields one boolean per row. The rules are
//! folded left to right starting from `true`, each with its own [`LogicalOperator`], so
//! `[a, or b, c]` means `((true AND a) OR b) AND c`. An empty rule list keeps every row.
//!
//! ```rust
//! use data_harvest_reader::processing::{apply_filters, FilterRule};
//! use data_harvest_reader::types::{DataType, Field, Schema, Table, Value};
//!
//! let people = Table::new(
//!     Schema::new(vec![Field::new("age", DataType::Int64)]),
//!     [10, 18, 64, 65, 70].iter().map(|a| vec![Value::Int64(*a)]).collect(),
//! );
//! let rules = vec![
//!     FilterRule::new("age", ">=", 18),
//!     FilterRule::new("age", "<", 65),
//! ];
//! let adults = apply_filters(&people, &rules, "df_people").unwrap();
//! assert_eq!(adults.rows, vec![vec![Value::Int64(18)], vec![Value::Int64(64)]]);
//! ```
//!
//! Null cells never satisfy a rule, including `notin`. NaN compares unequal to everything, so a
//! NaN cell satisfies `!=` and `notin` but no ordering or equality rule.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataType, Table, TableCollection, Value};

use super::{apply_per_key, StepOutcome};

/// Rule lists keyed by table key suffix (the part after `df_`).
pub type FilterSubsets = HashMap<String, Vec<FilterRule>>;

/// Operation names accepted in [`FilterRule::operation`].
pub const ALLOWED_OPERATIONS: [&str; 8] = ["notin", "in", "==", ">", ">=", "<", "<=", "!="];

/// A parsed filter operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperation {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
}

impl FilterOperation {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "in" => Self::In,
            "notin" => Self::NotIn,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::In => "in",
            Self::NotIn => "notin",
        }
    }

    /// `in` / `notin`.
    pub fn is_membership(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

/// How a rule's condition combines with the result of the rules before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// Right-hand side of a rule: one value, or a list (only valid for `in` / `notin`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValues {
    List(Vec<Value>),
    Scalar(Value),
}

impl FilterValues {
    /// Build a list from anything convertible to [`Value`].
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        FilterValues::List(items.into_iter().map(Into::into).collect())
    }

    fn as_slice(&self) -> &[Value] {
        match self {
            FilterValues::List(v) => v,
            FilterValues::Scalar(v) => std::slice::from_ref(v),
        }
    }
}

impl From<Value> for FilterValues {
    fn from(v: Value) -> Self {
        FilterValues::Scalar(v)
    }
}

impl From<Vec<Value>> for FilterValues {
    fn from(v: Vec<Value>) -> Self {
        FilterValues::List(v)
    }
}

impl From<i64> for FilterValues {
    fn from(v: i64) -> Self {
        FilterValues::Scalar(v.into())
    }
}

impl From<i32> for FilterValues {
    fn from(v: i32) -> Self {
        FilterValues::Scalar(v.into())
    }
}

impl From<f64> for FilterValues {
    fn from(v: f64) -> Self {
        FilterValues::Scalar(v.into())
    }
}

impl From<bool> for FilterValues {
    fn from(v: bool) -> Self {
        FilterValues::Scalar(v.into())
    }
}

impl From<&str> for FilterValues {
    fn from(v: &str) -> Self {
        FilterValues::Scalar(v.into())
    }
}

impl From<String> for FilterValues {
    fn from(v: String) -> Self {
        FilterValues::Scalar(v.into())
    }
}

/// One clause of a declarative row filter.
///
/// Deserializes from `{"column": "age", "operation": ">=", "values": 18, "operator": "and"}`;
/// `operator` is optional and defaults to `and`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    pub column: String,
    /// Kept as written so unknown operations can be reported verbatim.
    pub operation: String,
    pub values: FilterValues,
    #[serde(default)]
    pub operator: LogicalOperator,
}

impl FilterRule {
    /// A rule combined with `and`.
    pub fn new(
        column: impl Into<String>,
        operation: impl Into<String>,
        values: impl Into<FilterValues>,
    ) -> Self {
        Self {
            column: column.into(),
            operation: operation.into(),
            values: values.into(),
            operator: LogicalOperator::And,
        }
    }

    /// Combine this rule with `or` instead of `and`.
    pub fn or(mut self) -> Self {
        self.operator = LogicalOperator::Or;
        self
    }
}

/// Check every rule's operation and value shape. Runs before any row is looked at.
pub fn validate_rules(rules: &[FilterRule], table_name: &str) -> IngestionResult<Vec<FilterOperation>> {
    rules
        .iter()
        .map(|rule| {
            let op = FilterOperation::parse(&rule.operation).ok_or_else(|| {
                config_error(
                    table_name,
                    format!(
                        "{} is not allowed, the only allowed operations are '{}'",
                        rule.operation,
                        ALLOWED_OPERATIONS.join(", ")
                    ),
                )
            })?;
            if !op.is_membership() && matches!(rule.values, FilterValues::List(_)) {
                return Err(config_error(
                    table_name,
                    format!(
                        "for list values, use 'notin' or 'in' operation (column '{}', operation '{}')",
                        rule.column, rule.operation
                    ),
                ));
            }
            Ok(op)
        })
        .collect()
}

/// Return a new table with the rows of `table` that satisfy `rules`.
///
/// All failures (bad operation, list value on a scalar operation, unknown column, incomparable
/// types) are [`IngestionError::FilterConfiguration`] naming `table_name`.
pub fn apply_filters(table: &Table, rules: &[FilterRule], table_name: &str) -> IngestionResult<Table> {
    let ops = validate_rules(rules, table_name)?;
    let compiled = rules
        .iter()
        .zip(ops)
        .map(|(rule, op)| compile(table, rule, op))
        .collect::<Result<Vec<_>, String>>()
        .map_err(|message| config_error(table_name, message))?;

    Ok(table.filter_rows(|row| {
        compiled.iter().fold(true, |acc, rule| match rule.operator {
            LogicalOperator::And => acc & rule.matches(row),
            LogicalOperator::Or => acc | rule.matches(row),
        })
    }))
}

/// Apply each `df_<suffix>` entry of `subsets` to the matching table. Unmatched tables pass
/// through unchanged; entries for missing tables are ignored.
pub fn apply_filters_all(
    tables: TableCollection,
    subsets: &FilterSubsets,
) -> IngestionResult<TableCollection> {
    apply_filters_all_with(tables, subsets, |_| {})
}

/// [`apply_filters_all`], reporting every entry's [`StepOutcome`] to `on_step`.
pub fn apply_filters_all_with(
    tables: TableCollection,
    subsets: &FilterSubsets,
    on_step: impl FnMut(StepOutcome<'_>),
) -> IngestionResult<TableCollection> {
    apply_per_key(tables, subsets, |table, rules, key| apply_filters(table, rules, key), on_step)
}

struct CompiledRule<'a> {
    idx: usize,
    op: FilterOperation,
    values: &'a [Value],
    operator: LogicalOperator,
}

impl CompiledRule<'_> {
    fn matches(&self, row: &[Value]) -> bool {
        let cell = &row[self.idx];
        if cell.is_null() {
            return false;
        }
        let equal = |v: &Value| compare(cell, v) == Some(Ordering::Equal);
        let ord = self.values.first().and_then(|v| compare(cell, v));
        match self.op {
            FilterOperation::In => self.values.iter().any(equal),
            FilterOperation::NotIn => !self.values.iter().any(equal),
            FilterOperation::Eq => ord == Some(Ordering::Equal),
            FilterOperation::Ne => match self.values.first() {
                Some(v) if !v.is_null() => ord != Some(Ordering::Equal),
                _ => false,
            },
            FilterOperation::Gt => ord == Some(Ordering::Greater),
            FilterOperation::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            FilterOperation::Lt => ord == Some(Ordering::Less),
            FilterOperation::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

fn compile<'a>(table: &Table, rule: &'a FilterRule, op: FilterOperation) -> Result<CompiledRule<'a>, String> {
    let idx = table
        .schema
        .index_of(&rule.column)
        .ok_or_else(|| format!("column '{}' not found", rule.column))?;
    let column_type: DataType = table.schema.fields[idx].data_type;

    // Scalars for in/notin are treated as one-element lists.
    let values = rule.values.as_slice();
    for v in values {
        if let Some(t) = v.data_type() {
            if !column_type.is_comparable_with(t) {
                return Err(format!(
                    "cannot apply '{}' to column '{}' of type {:?} with value {:?}",
                    op.as_str(),
                    rule.column,
                    column_type,
                    v
                ));
            }
        }
    }

    Ok(CompiledRule {
        idx,
        op,
        values,
        operator: rule.operator,
    })
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int64(x), Value::Int64(y)) => Some(x.cmp(y)),
        (Value::Int64(x), Value::Float64(y)) => (*x as f64).partial_cmp(y),
        (Value::Float64(x), Value::Int64(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Float64(x), Value::Float64(y)) => x.partial_cmp(y),
        (Value::Utf8(x), Value::Utf8(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn config_error(table_name: &str, message: String) -> IngestionError {
    IngestionError::FilterConfiguration {
        table: table_name.to_string(),
        message,
    }
}
