//! Index documents and fields.
//!
//! The write path emits two document flavors through the same [`Document`]
//! shape:
//!
//! - **element documents**: `doc_id` = element ID, `fields` projected from
//!   inverted-indexed tags, `timestamp` set — written to the owning table's
//!   inverted index;
//! - **series documents**: `doc_id` = series ID, `entity_values` = the
//!   series' canonical bytes — written to the owning segment's series index,
//!   at most once per series per flush.

use bytes::Bytes;

/// Addresses a field inside the inverted index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub index_rule_id: u32,
    pub analyzer: String,
    pub series_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Str(String),
    Bytes(Bytes),
}

/// One indexable field. `no_sort` excludes the field from sorted-term
/// storage; it is copied verbatim from the index rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: FieldKey,
    pub value: FieldValue,
    pub no_sort: bool,
}

impl Field {
    pub fn int(key: FieldKey, value: i64) -> Self {
        Self {
            key,
            value: FieldValue::Int(value),
            no_sort: false,
        }
    }

    pub fn str(key: FieldKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: FieldValue::Str(value.into()),
            no_sort: false,
        }
    }

    pub fn bytes(key: FieldKey, value: impl Into<Bytes>) -> Self {
        Self {
            key,
            value: FieldValue::Bytes(value.into()),
            no_sort: false,
        }
    }
}

/// A document headed into an index writer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub doc_id: u64,
    pub fields: Vec<Field>,
    pub timestamp: i64,
    pub entity_values: Option<Bytes>,
}
