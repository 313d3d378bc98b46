//! Series identity.
//!
//! A series is the pair `(subject, entity values)`: the stream name plus the
//! tags that form the element's identity. Its canonical byte form is what the
//! series index stores, and the xxh3 hash of those bytes is the series ID
//! used across the engine.
//!
//! The byte form is deterministic and positional: the subject is
//! length-prefixed, then each entity value is written as a kind byte, an
//! 8-byte big-endian length, and the payload. Only scalar kinds participate
//! in identity; an array entity value is a routing bug and is rejected.

use bytes::{BufMut, Bytes, BytesMut};
use tidemark_proto::model::{tag_value, TagValue};

use crate::convert::{encode_i64, hash_bytes};
use crate::error::{Error, Result};

const KIND_NULL: u8 = 0;
const KIND_INT: u8 = 1;
const KIND_STR: u8 = 2;
const KIND_BINARY: u8 = 3;

/// A series identity before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub subject: String,
    pub entity_values: Vec<TagValue>,
}

/// The canonical byte form of a series plus its 64-bit ID.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSeries {
    pub id: u64,
    pub buffer: Bytes,
}

impl Series {
    pub fn new(subject: impl Into<String>, entity_values: Vec<TagValue>) -> Self {
        Self {
            subject: subject.into(),
            entity_values,
        }
    }

    /// Produces the canonical byte form and the series ID derived from it.
    pub fn marshal(&self) -> Result<EncodedSeries> {
        let mut buf = BytesMut::with_capacity(32 + 16 * self.entity_values.len());
        buf.put_u64(self.subject.len() as u64);
        buf.put_slice(self.subject.as_bytes());
        for value in &self.entity_values {
            marshal_entity_value(&mut buf, value)?;
        }
        let buffer = buf.freeze();
        Ok(EncodedSeries {
            id: hash_bytes(&buffer),
            buffer,
        })
    }
}

fn marshal_entity_value(buf: &mut BytesMut, value: &TagValue) -> Result<()> {
    match &value.value {
        None | Some(tag_value::Value::Null(_)) => {
            buf.put_u8(KIND_NULL);
            buf.put_u64(0);
        }
        Some(tag_value::Value::Int(v)) => {
            buf.put_u8(KIND_INT);
            buf.put_u64(8);
            buf.put_slice(&encode_i64(v.value));
        }
        Some(tag_value::Value::Str(v)) => {
            buf.put_u8(KIND_STR);
            buf.put_u64(v.value.len() as u64);
            buf.put_slice(v.value.as_bytes());
        }
        Some(tag_value::Value::BinaryData(v)) => {
            buf.put_u8(KIND_BINARY);
            buf.put_u64(v.len() as u64);
            buf.put_slice(v);
        }
        Some(tag_value::Value::IntArray(_)) => {
            return Err(Error::UnsupportedEntityValue("int array"));
        }
        Some(tag_value::Value::StrArray(_)) => {
            return Err(Error::UnsupportedEntityValue("string array"));
        }
    }
    Ok(())
}
