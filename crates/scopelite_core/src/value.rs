//! Bindable parameter values.
//!
//! [`Value`] is the closed set of kinds a statement parameter can take. Each
//! variant maps to exactly one engine bind call; optional values fold into
//! the same set, with `None` becoming [`Value::Null`].
//!
//! Kinds with no faithful engine representation (`u64`, `usize`, `i128`)
//! deliberately have no conversion, so they are rejected at compile time
//! instead of being truncated.

use std::ffi::{CStr, CString};

/// Marker for an explicit SQL NULL parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Null;

/// A parameter value, borrowed from the caller for the duration of the bind.
///
/// The engine copies text and blob data during the bind call, so the borrow
/// does not need to outlive it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// SQL NULL, also produced by an absent optional.
    Null,
    /// Narrow, nul-terminated C text, passed to the engine byte for byte.
    Narrow(&'a CStr),
    /// UTF-8 text.
    Text(&'a str),
    /// UTF-16 text in native byte order; the engine transcodes as needed.
    Utf16(&'a [u16]),
    /// An integer that fits in 32 bits.
    Int(i32),
    /// A 64-bit integer.
    Int64(i64),
    /// A double.
    Float(f64),
    /// Raw bytes.
    Blob(&'a [u8]),
}

impl Value<'_> {
    /// Returns true for the null variant.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns a short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Narrow(_) => "narrow text",
            Value::Text(_) => "text",
            Value::Utf16(_) => "utf-16 text",
            Value::Int(_) => "int",
            Value::Int64(_) => "int64",
            Value::Float(_) => "float",
            Value::Blob(_) => "blob",
        }
    }
}

impl From<Null> for Value<'_> {
    fn from(_: Null) -> Self {
        Value::Null
    }
}

impl From<()> for Value<'_> {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

macro_rules! int_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value<'_> {
                fn from(value: $ty) -> Self {
                    Value::Int(i32::from(value))
                }
            }
        )*
    };
}

int_value!(i8, i16, i32, u8, u16);

impl From<u32> for Value<'_> {
    fn from(value: u32) -> Self {
        Value::Int64(i64::from(value))
    }
}

impl From<i64> for Value<'_> {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f32> for Value<'_> {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value<'_> {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value<'_> {
    fn from(value: bool) -> Self {
        Value::Int(i32::from(value))
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(value: &'a str) -> Self {
        Value::Text(value)
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(value: &'a String) -> Self {
        Value::Text(value.as_str())
    }
}

impl<'a> From<&'a CStr> for Value<'a> {
    fn from(value: &'a CStr) -> Self {
        Value::Narrow(value)
    }
}

impl<'a> From<&'a CString> for Value<'a> {
    fn from(value: &'a CString) -> Self {
        Value::Narrow(value.as_c_str())
    }
}

impl<'a> From<&'a [u16]> for Value<'a> {
    fn from(value: &'a [u16]) -> Self {
        Value::Utf16(value)
    }
}

impl<'a> From<&'a Vec<u16>> for Value<'a> {
    fn from(value: &'a Vec<u16>) -> Self {
        Value::Utf16(value.as_slice())
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(value: &'a [u8]) -> Self {
        Value::Blob(value)
    }
}

impl<'a> From<&'a Vec<u8>> for Value<'a> {
    fn from(value: &'a Vec<u8>) -> Self {
        Value::Blob(value.as_slice())
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Value<'a> {
    fn from(value: &'a [u8; N]) -> Self {
        Value::Blob(value.as_slice())
    }
}

impl<'a, T> From<Option<T>> for Value<'a>
where
    T: Into<Value<'a>>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

macro_rules! borrowed_option_value {
    ($($ty:ty),*) => {
        $(
            impl<'a> From<&'a Option<$ty>> for Value<'a> {
                fn from(value: &'a Option<$ty>) -> Self {
                    match value {
                        Some(inner) => Value::from(inner),
                        None => Value::Null,
                    }
                }
            }
        )*
    };
}

borrowed_option_value!(String, CString, Vec<u16>, Vec<u8>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_integers_bind_as_int() {
        assert_eq!(Value::from(7i8), Value::Int(7));
        assert_eq!(Value::from(-7i16), Value::Int(-7));
        assert_eq!(Value::from(65_535u16), Value::Int(65_535));
        assert_eq!(Value::from(true), Value::Int(1));
    }

    #[test]
    fn wide_integers_bind_as_int64() {
        assert_eq!(Value::from(u32::MAX), Value::Int64(4_294_967_295));
        assert_eq!(Value::from(i64::MIN), Value::Int64(i64::MIN));
    }

    #[test]
    fn text_kinds_are_distinct() {
        let owned = String::from("Joe");
        let narrow = CString::new("Joe").unwrap();
        let wide: Vec<u16> = "Joe".encode_utf16().collect();

        assert_eq!(Value::from(&owned), Value::Text("Joe"));
        assert!(matches!(Value::from(&narrow), Value::Narrow(_)));
        assert!(matches!(Value::from(&wide), Value::Utf16(_)));
        assert!(matches!(Value::from(b"Joe"), Value::Blob(_)));
    }

    #[test]
    fn absent_optional_is_null() {
        assert!(Value::from(None::<i32>).is_null());
        assert!(Value::from(None::<&str>).is_null());
        assert!(Value::from(&None::<String>).is_null());
        assert!(Value::from(Null).is_null());
        assert!(Value::from(()).is_null());
    }

    #[test]
    fn present_optional_uses_inner_kind() {
        assert_eq!(Value::from(Some(5)), Value::Int(5));
        assert_eq!(Value::from(Some(2.5)), Value::Float(2.5));
        let name = Some(String::from("Joe"));
        assert_eq!(Value::from(&name), Value::Text("Joe"));
        assert_eq!(Value::from(Some(Some(9i64))), Value::Int64(9));
    }

    #[test]
    fn mixed_parameter_list() {
        let photo: Option<Vec<u8>> = Some(vec![0xde, 0xad]);
        let nickname: Option<String> = None;
        let values = [
            Value::from("x"),
            Value::from(1),
            Value::from(&photo),
            Value::from(&nickname),
        ];
        assert_eq!(values[0], Value::Text("x"));
        assert_eq!(values[1], Value::Int(1));
        assert_eq!(values[2], Value::Blob(&[0xde, 0xad]));
        assert!(values[3].is_null());
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::Utf16(&[]).kind(), "utf-16 text");
        assert_eq!(Value::Float(0.0).kind(), "float");
    }
}
