//! Re-typing of edited cell text.
//!
//! The editor only ever hands back strings. Before a value goes to the
//! database it is parsed back into the type of the value it replaces, so a
//! typo in an integer column is rejected instead of silently turning the
//! cell into text.

use crate::data::datatable::{DataType, DataValue};
use crate::error::{AppError, AppResult};

/// Text shown to the user when a cell is opened for editing.
/// `coerce_string_to_original_type(&string_representation(v), v) == v`.
pub fn string_representation(value: &DataValue) -> String {
    value.to_string()
}

/// Parse `edited` into the same variant as `original`.
///
/// The text `NULL` (any case) clears typed cells. In text and blob cells it
/// is stored as the word itself.
pub fn coerce_string_to_original_type(edited: &str, original: &DataValue) -> AppResult<DataValue> {
    let text_like = matches!(original, DataValue::String(_) | DataValue::Blob(_));
    if !text_like && edited.eq_ignore_ascii_case("null") {
        return Ok(DataValue::Null);
    }

    match original {
        DataValue::String(_) => Ok(DataValue::String(edited.to_string())),
        DataValue::Integer(_) => edited
            .trim()
            .parse::<i64>()
            .map(DataValue::Integer)
            .map_err(|_| malformed(edited, DataType::Integer)),
        DataValue::Float(_) => match edited.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(DataValue::Float(f)),
            _ => Err(malformed(edited, DataType::Float)),
        },
        DataValue::Boolean(_) => parse_bool(edited.trim())
            .map(DataValue::Boolean)
            .ok_or_else(|| malformed(edited, DataType::Boolean)),
        DataValue::DateTime(_) => Ok(DataValue::DateTime(edited.to_string())),
        DataValue::Blob(bytes) if std::str::from_utf8(bytes).is_err() => Err(
            AppError::MalformedEdit("binary blobs cannot be edited as text".to_string()),
        ),
        DataValue::Blob(_) => Ok(DataValue::Blob(edited.as_bytes().to_vec())),
        DataValue::Null => Ok(infer_from_string(edited)),
    }
}

/// Best guess for text that replaces a NULL cell, which carries no type
pub fn infer_from_string(value: &str) -> DataValue {
    if let Ok(i) = value.parse::<i64>() {
        return DataValue::Integer(i);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() => DataValue::Float(f),
        _ => DataValue::String(value.to_string()),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn malformed(input: &str, expected: DataType) -> AppError {
    AppError::MalformedEdit(format!("'{}' is not a valid {} value", input, expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_for_every_editable_type() {
        let values = vec![
            DataValue::Boolean(true),
            DataValue::Boolean(false),
            DataValue::Integer(0),
            DataValue::Integer(-42),
            DataValue::Integer(i64::MAX),
            DataValue::Float(3.25),
            DataValue::Float(-0.001),
            DataValue::Float(1.0),
            DataValue::Float(1e-300),
            DataValue::String("Bob".to_string()),
            DataValue::String("  padded  ".to_string()),
            DataValue::String(String::new()),
            DataValue::String("{\"a\":1}".to_string()),
            DataValue::String("NULL".to_string()),
            DataValue::String("null".to_string()),
            DataValue::Blob(b"hello".to_vec()),
            DataValue::Null,
        ];

        for value in values {
            let text = string_representation(&value);
            let back = coerce_string_to_original_type(&text, &value).unwrap();
            assert_eq!(back, value, "round trip failed for {:?}", value);
        }
    }

    #[test]
    fn test_unparseable_input_is_rejected() {
        let err = coerce_string_to_original_type("12a", &DataValue::Integer(1)).unwrap_err();
        assert!(matches!(err, AppError::MalformedEdit(_)));

        assert!(coerce_string_to_original_type("maybe", &DataValue::Boolean(true)).is_err());
        assert!(coerce_string_to_original_type("one point five", &DataValue::Float(1.5)).is_err());
        assert!(coerce_string_to_original_type("inf", &DataValue::Float(1.5)).is_err());
    }

    #[test]
    fn test_timestamp_passthrough() {
        let original = DataValue::DateTime("2024-01-01 10:00:00".to_string());
        let value = coerce_string_to_original_type("2024-02-02 11:30:00", &original).unwrap();
        assert_eq!(value, DataValue::DateTime("2024-02-02 11:30:00".to_string()));
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(
            coerce_string_to_original_type("NULL", &DataValue::Integer(5)).unwrap(),
            DataValue::Null
        );
        assert_eq!(
            coerce_string_to_original_type("17", &DataValue::Null).unwrap(),
            DataValue::Integer(17)
        );
        assert_eq!(
            coerce_string_to_original_type("hello", &DataValue::Null).unwrap(),
            DataValue::String("hello".to_string())
        );
    }

    #[test]
    fn test_null_text_in_text_cells_stays_text() {
        assert_eq!(
            coerce_string_to_original_type("Null", &DataValue::String("x".into())).unwrap(),
            DataValue::String("Null".to_string())
        );
        assert_eq!(
            coerce_string_to_original_type("null", &DataValue::Boolean(true)).unwrap(),
            DataValue::Null
        );
    }

    #[test]
    fn test_binary_blob_is_not_editable() {
        let original = DataValue::Blob(vec![0xff, 0x00, 0xfe]);
        let err = coerce_string_to_original_type("abc", &original).unwrap_err();
        assert!(matches!(err, AppError::MalformedEdit(_)));
    }

    #[test]
    fn test_whitespace_around_numbers_is_tolerated() {
        assert_eq!(
            coerce_string_to_original_type(" 7 ", &DataValue::Integer(1)).unwrap(),
            DataValue::Integer(7)
        );
    }
}
