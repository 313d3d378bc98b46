//! Tidemark Wire Protocol
//!
//! Message types exchanged on the internal write path, from the routing tier
//! down to the storage nodes. The routing tier resolves the target shard and
//! the series identity before forwarding, so a storage node receives
//! [`stream::InternalWriteRequest`] — the client's write request wrapped with
//! `shard_id` and `entity_values`.
//!
//! ## Wire compatibility
//!
//! These structs derive [`prost::Message`] directly instead of being generated
//! from `.proto` files, so the crate builds without `protoc`. Field numbers
//! are part of the wire contract — treat every `tag = "..."` below as frozen.
//!
//! ## Usage
//!
//! ```ignore
//! use prost::Message;
//! use tidemark_proto::stream::InternalWriteRequest;
//!
//! let event = InternalWriteRequest::decode(buf)?;
//! let group = &event.request.as_ref().unwrap().metadata.as_ref().unwrap().group;
//! ```

/// Model-level value types shared by writes and queries.
pub mod model {
    /// Marker for an explicitly-null tag value.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum NullValue {
        NullValue = 0,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Int {
        #[prost(int64, tag = "1")]
        pub value: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Str {
        #[prost(string, tag = "1")]
        pub value: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct IntArray {
        #[prost(int64, repeated, tag = "1")]
        pub value: ::prost::alloc::vec::Vec<i64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StrArray {
        #[prost(string, repeated, tag = "1")]
        pub value: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    }

    /// A single typed tag value.
    ///
    /// An unset `value` and an explicit [`NullValue`] are both read as null.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TagValue {
        #[prost(oneof = "tag_value::Value", tags = "1, 2, 3, 4, 5, 6")]
        pub value: ::core::option::Option<tag_value::Value>,
    }

    /// Nested message and enum types in `TagValue`.
    pub mod tag_value {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Value {
            #[prost(enumeration = "super::NullValue", tag = "1")]
            Null(i32),
            #[prost(message, tag = "2")]
            Int(super::Int),
            #[prost(message, tag = "3")]
            Str(super::Str),
            #[prost(bytes = "vec", tag = "4")]
            BinaryData(::prost::alloc::vec::Vec<u8>),
            #[prost(message, tag = "5")]
            IntArray(super::IntArray),
            #[prost(message, tag = "6")]
            StrArray(super::StrArray),
        }
    }

    impl TagValue {
        /// A value carrying nothing at all.
        pub fn null() -> Self {
            Self {
                value: Some(tag_value::Value::Null(NullValue::NullValue as i32)),
            }
        }

        pub fn int(value: i64) -> Self {
            Self {
                value: Some(tag_value::Value::Int(Int { value })),
            }
        }

        pub fn str(value: impl Into<String>) -> Self {
            Self {
                value: Some(tag_value::Value::Str(Str {
                    value: value.into(),
                })),
            }
        }

        pub fn binary(value: impl Into<Vec<u8>>) -> Self {
            Self {
                value: Some(tag_value::Value::BinaryData(value.into())),
            }
        }

        pub fn int_array(value: impl Into<Vec<i64>>) -> Self {
            Self {
                value: Some(tag_value::Value::IntArray(IntArray {
                    value: value.into(),
                })),
            }
        }

        pub fn str_array(value: impl IntoIterator<Item = impl Into<String>>) -> Self {
            Self {
                value: Some(tag_value::Value::StrArray(StrArray {
                    value: value.into_iter().map(Into::into).collect(),
                })),
            }
        }

        /// True when the value is absent or an explicit null.
        pub fn is_null(&self) -> bool {
            matches!(self.value, None | Some(tag_value::Value::Null(_)))
        }

        /// The integer payload, or `None` when the variant does not match.
        ///
        /// Mismatched variants read as null, the same leniency the protobuf
        /// getters give callers.
        pub fn as_int(&self) -> Option<i64> {
            match &self.value {
                Some(tag_value::Value::Int(v)) => Some(v.value),
                _ => None,
            }
        }

        pub fn as_str(&self) -> Option<&str> {
            match &self.value {
                Some(tag_value::Value::Str(v)) => Some(&v.value),
                _ => None,
            }
        }

        pub fn as_binary(&self) -> Option<&[u8]> {
            match &self.value {
                Some(tag_value::Value::BinaryData(v)) => Some(v),
                _ => None,
            }
        }

        pub fn as_int_array(&self) -> Option<&[i64]> {
            match &self.value {
                Some(tag_value::Value::IntArray(v)) => Some(&v.value),
                _ => None,
            }
        }

        pub fn as_str_array(&self) -> Option<&[String]> {
            match &self.value {
                Some(tag_value::Value::StrArray(v)) => Some(&v.value),
                _ => None,
            }
        }
    }

    /// Tag values of one family, in schema order.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TagFamilyForWrite {
        #[prost(message, repeated, tag = "1")]
        pub tags: ::prost::alloc::vec::Vec<TagValue>,
    }
}

/// Stream write path messages.
pub mod stream {
    use super::model::{TagFamilyForWrite, TagValue};

    /// Identifies a stream inside a group.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Metadata {
        #[prost(string, tag = "1")]
        pub group: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub name: ::prost::alloc::string::String,
    }

    /// One stream element as submitted by a client.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ElementValue {
        #[prost(message, optional, tag = "1")]
        pub timestamp: ::core::option::Option<::prost_types::Timestamp>,
        /// Client-assigned element identity, unique within the stream.
        #[prost(string, tag = "2")]
        pub element_id: ::prost::alloc::string::String,
        /// Tag families in schema order; trailing families may be omitted.
        #[prost(message, repeated, tag = "3")]
        pub tag_families: ::prost::alloc::vec::Vec<TagFamilyForWrite>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct WriteRequest {
        #[prost(message, optional, tag = "1")]
        pub metadata: ::core::option::Option<Metadata>,
        #[prost(message, optional, tag = "2")]
        pub element: ::core::option::Option<ElementValue>,
    }

    /// A client write after shard routing and entity extraction.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct InternalWriteRequest {
        #[prost(uint32, tag = "1")]
        pub shard_id: u32,
        /// The tags forming the series identity, extracted by the router.
        #[prost(message, repeated, tag = "2")]
        pub entity_values: ::prost::alloc::vec::Vec<TagValue>,
        #[prost(message, optional, tag = "3")]
        pub request: ::core::option::Option<WriteRequest>,
    }
}

#[cfg(test)]
mod tests {
    use super::model::TagValue;
    use super::stream::*;
    use prost::Message;

    fn sample_request() -> InternalWriteRequest {
        InternalWriteRequest {
            shard_id: 3,
            entity_values: vec![TagValue::str("svc-a"), TagValue::int(7)],
            request: Some(WriteRequest {
                metadata: Some(Metadata {
                    group: "default".to_string(),
                    name: "sw".to_string(),
                }),
                element: Some(ElementValue {
                    timestamp: Some(prost_types::Timestamp {
                        seconds: 1_700_000_000,
                        nanos: 0,
                    }),
                    element_id: "e-1".to_string(),
                    tag_families: vec![],
                }),
            }),
        }
    }

    #[test]
    fn test_roundtrip_internal_write_request() {
        let event = sample_request();
        let buf = event.encode_to_vec();
        let decoded = InternalWriteRequest::decode(buf.as_slice()).expect("decode");
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_tag_value_accessors_match_variant() {
        assert_eq!(TagValue::int(42).as_int(), Some(42));
        assert_eq!(TagValue::str("x").as_str(), Some("x"));
        assert_eq!(TagValue::binary(vec![1, 2]).as_binary(), Some(&[1u8, 2][..]));
        assert_eq!(TagValue::int_array(vec![1, 2]).as_int_array(), Some(&[1i64, 2][..]));
        assert_eq!(
            TagValue::str_array(["a", "b"]).as_str_array().map(<[String]>::len),
            Some(2)
        );
    }

    #[test]
    fn test_mismatched_variant_reads_as_none() {
        // An int value read through the string accessor is simply absent.
        let v = TagValue::int(1);
        assert_eq!(v.as_str(), None);
        assert_eq!(v.as_binary(), None);
        assert!(!v.is_null());
    }

    #[test]
    fn test_null_detection() {
        assert!(TagValue::null().is_null());
        assert!(TagValue::default().is_null());
        assert!(!TagValue::int(0).is_null());
    }

    #[test]
    fn test_garbage_bytes_fail_decode() {
        assert!(InternalWriteRequest::decode(&b"\xff\xff\xff\xff"[..]).is_err());
    }
}
