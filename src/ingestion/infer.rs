//! Schema inference for decoders running without a caller-provided [`crate::types::Schema`].

use crate::types::DataType;

/// Running type estimate for one column.
///
/// Starts as `Unknown` (no non-null value seen yet) and only ever widens:
/// `Int64 + Float64 -> Float64`, any other conflict -> `Utf8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum TypeGuess {
    #[default]
    Unknown,
    Known(DataType),
}

impl TypeGuess {
    pub(crate) fn observe(self, seen: DataType) -> Self {
        match self {
            TypeGuess::Unknown => TypeGuess::Known(seen),
            TypeGuess::Known(cur) => TypeGuess::Known(widen(cur, seen)),
        }
    }

    /// All-null columns fall back to strings.
    pub(crate) fn resolve(self) -> DataType {
        match self {
            TypeGuess::Unknown => DataType::Utf8,
            TypeGuess::Known(t) => t,
        }
    }
}

pub(crate) fn widen(a: DataType, b: DataType) -> DataType {
    match (a, b) {
        (x, y) if x == y => x,
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    }
}

/// Classify one non-empty text cell.
///
/// Only literal `true`/`false` count as booleans here; `1`/`yes` style spellings would be
/// ambiguous with integers and free text.
pub(crate) fn guess_text(raw: &str) -> Option<DataType> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if s.parse::<i64>().is_ok() {
        Some(DataType::Int64)
    } else if s.parse::<f64>().is_ok() {
        Some(DataType::Float64)
    } else if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
        Some(DataType::Bool)
    } else {
        Some(DataType::Utf8)
    }
}

pub(crate) fn guess_json(v: &serde_json::Value) -> Option<DataType> {
    match v {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(_) => Some(DataType::Bool),
        serde_json::Value::Number(n) => {
            if n.is_i64() {
                Some(DataType::Int64)
            } else {
                Some(DataType::Float64)
            }
        }
        _ => Some(DataType::Utf8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer<'a>(cells: impl IntoIterator<Item = &'a str>) -> DataType {
        cells
            .into_iter()
            .filter_map(guess_text)
            .fold(TypeGuess::default(), TypeGuess::observe)
            .resolve()
    }

    #[test]
    fn integers_stay_integers() {
        assert_eq!(infer(["1", "2", "-3"]), DataType::Int64);
    }

    #[test]
    fn mixed_int_and_float_widens_to_float() {
        assert_eq!(infer(["1", "2.5"]), DataType::Float64);
    }

    #[test]
    fn empties_are_ignored_and_all_empty_is_utf8() {
        assert_eq!(infer(["", "4", " "]), DataType::Int64);
        assert_eq!(infer(["", ""]), DataType::Utf8);
    }

    #[test]
    fn bool_only_for_literal_true_false() {
        assert_eq!(infer(["true", "FALSE"]), DataType::Bool);
        assert_eq!(infer(["yes", "no"]), DataType::Utf8);
        assert_eq!(infer(["true", "1"]), DataType::Utf8);
    }
}
