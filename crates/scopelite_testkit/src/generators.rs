//! Property-based test generators using proptest.
//!
//! Provides strategies for generating bindable values together with what
//! the engine is expected to hand back for them.

use proptest::prelude::*;
use scopelite_core::{ColumnType, ColumnValue, Value};

/// An owned parameter value, as produced by [`sample_value_strategy`].
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    /// SQL NULL.
    Null,
    /// A 32-bit integer.
    Int(i32),
    /// A 64-bit integer.
    Int64(i64),
    /// A finite double.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// UTF-16 text.
    Utf16(Vec<u16>),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl SampleValue {
    /// Borrows the value for binding.
    pub fn as_value(&self) -> Value<'_> {
        match self {
            SampleValue::Null => Value::Null,
            SampleValue::Int(value) => Value::Int(*value),
            SampleValue::Int64(value) => Value::Int64(*value),
            SampleValue::Float(value) => Value::Float(*value),
            SampleValue::Text(value) => Value::Text(value),
            SampleValue::Utf16(value) => Value::Utf16(value),
            SampleValue::Blob(value) => Value::Blob(value),
        }
    }

    /// The value the engine stores for this parameter.
    ///
    /// Zero-length blobs come back as blobs, not NULL.
    pub fn expected(&self) -> ColumnValue {
        match self {
            SampleValue::Null => ColumnValue::Null,
            SampleValue::Int(value) => ColumnValue::Integer(i64::from(*value)),
            SampleValue::Int64(value) => ColumnValue::Integer(*value),
            SampleValue::Float(value) => ColumnValue::Float(*value),
            SampleValue::Text(value) => ColumnValue::Text(value.clone()),
            SampleValue::Utf16(value) => ColumnValue::Text(String::from_utf16_lossy(value)),
            SampleValue::Blob(value) => ColumnValue::Blob(value.clone()),
        }
    }

    /// The storage class the engine reports for this parameter.
    pub fn column_type(&self) -> ColumnType {
        self.expected().column_type()
    }
}

/// Strategy for text the engine stores unchanged (no NUL, no control characters).
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("\\PC{0,48}").expect("Invalid regex")
}

/// Strategy for UTF-16 text.
pub fn utf16_strategy() -> impl Strategy<Value = Vec<u16>> {
    text_strategy().prop_map(|text| text.encode_utf16().collect())
}

/// Strategy for finite doubles (the engine stores NaN as NULL).
pub fn float_strategy() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("Value must be finite", |value| value.is_finite())
}

/// Strategy for blobs.
pub fn blob_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for any bindable value.
pub fn sample_value_strategy() -> impl Strategy<Value = SampleValue> {
    prop_oneof![
        Just(SampleValue::Null),
        any::<i32>().prop_map(SampleValue::Int),
        any::<i64>().prop_map(SampleValue::Int64),
        float_strategy().prop_map(SampleValue::Float),
        text_strategy().prop_map(SampleValue::Text),
        utf16_strategy().prop_map(SampleValue::Utf16),
        blob_strategy().prop_map(SampleValue::Blob),
    ]
}

/// Strategy for a row of values.
pub fn sample_row_strategy(columns: usize) -> impl Strategy<Value = Vec<SampleValue>> {
    prop::collection::vec(sample_value_strategy(), columns)
}

/// Strategy for row counts in cursor tests.
pub fn row_count_strategy() -> impl Strategy<Value = usize> {
    0usize..200
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn text_has_no_nul(text in text_strategy()) {
            prop_assert!(!text.contains('\0'));
        }

        #[test]
        fn floats_are_finite(value in float_strategy()) {
            prop_assert!(value.is_finite());
        }

        #[test]
        fn expected_matches_bound_kind(sample in sample_value_strategy()) {
            let value = sample.as_value();
            prop_assert_eq!(value.is_null(), sample.column_type() == ColumnType::Null);
        }
    }

    #[test]
    fn utf16_expectation_is_text() {
        let sample = SampleValue::Utf16("Joe".encode_utf16().collect());
        assert_eq!(sample.expected(), ColumnValue::Text("Joe".to_string()));
        assert_eq!(sample.column_type(), ColumnType::Text);
    }
}
