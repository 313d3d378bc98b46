//! Materialised column values.
//!
//! A [`TagValue`] is a tag after encoding: the packed bytes plus the value
//! type needed to read them back. Array-typed tags keep one byte string per
//! element in `value_arr`. The `indexed` flag marks values that are also
//! covered by a block-skipping index, which column storage uses to skip
//! redundant filtering.

use bytes::Bytes;

use crate::convert::decode_i64;

/// The encoded form of a tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int64,
    Str,
    BinaryData,
    Int64Arr,
    StrArr,
}

/// One encoded tag value. A null value of scalar type has `value = None`;
/// a null array has `value_arr = None`.
#[derive(Debug, Clone, PartialEq)]
pub struct TagValue {
    pub tag: String,
    pub value_type: ValueType,
    pub value: Option<Bytes>,
    pub value_arr: Option<Vec<Bytes>>,
    pub indexed: bool,
}

impl TagValue {
    pub fn new(tag: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            tag: tag.into(),
            value_type,
            value: None,
            value_arr: None,
            indexed: false,
        }
    }

    /// True when the value carries no payload.
    pub fn is_null(&self) -> bool {
        self.value.is_none() && self.value_arr.is_none()
    }

    /// Reads the payload back as an integer, when the type and width allow.
    pub fn as_i64(&self) -> Option<i64> {
        match self.value_type {
            ValueType::Int64 => self.value.as_deref().and_then(decode_i64),
            _ => None,
        }
    }

    /// Reads the payload back as UTF-8 text.
    pub fn as_str(&self) -> Option<&str> {
        match self.value_type {
            ValueType::Str => self.value.as_deref().and_then(|b| std::str::from_utf8(b).ok()),
            _ => None,
        }
    }

    /// The raw payload bytes, whatever the type.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }
}

/// The encoded values of one tag family, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct TagFamily {
    pub name: String,
    pub values: Vec<TagValue>,
}

impl TagFamily {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::encode_i64;

    #[test]
    fn test_null_scalar() {
        let tv = TagValue::new("status", ValueType::Str);
        assert!(tv.is_null());
        assert_eq!(tv.as_str(), None);
    }

    #[test]
    fn test_int_readback() {
        let mut tv = TagValue::new("latency", ValueType::Int64);
        tv.value = Some(Bytes::copy_from_slice(&encode_i64(-9_000)));
        assert_eq!(tv.as_i64(), Some(-9_000));
        assert!(!tv.is_null());
    }

    #[test]
    fn test_str_readback() {
        let mut tv = TagValue::new("endpoint", ValueType::Str);
        tv.value = Some(Bytes::from_static(b"/api/v1"));
        assert_eq!(tv.as_str(), Some("/api/v1"));
        // Type-gated: the integer view of a string value is absent.
        assert_eq!(tv.as_i64(), None);
    }

    #[test]
    fn test_null_array_keeps_type() {
        let tv = TagValue::new("ids", ValueType::Int64Arr);
        assert!(tv.is_null());
        assert_eq!(tv.value_type, ValueType::Int64Arr);
    }
}
