//! Tidemark Core Data Model
//!
//! The storage-side shapes shared by the write pipeline and the engines below
//! it. Nothing here touches the network or the disk; this crate is the
//! vocabulary the rest of the system speaks.
//!
//! ## Main Components
//!
//! ### Column values ([`tag`])
//! A stream element's tags are materialised into packed byte form before they
//! reach column storage: [`TagValue`] carries the encoded payload plus its
//! [`ValueType`], grouped per [`TagFamily`].
//!
//! ### Index artifacts ([`index`])
//! Two document flavors flow out of the write path: element documents
//! (fields + timestamp, keyed by element ID) for the per-shard inverted
//! index, and series documents (entity bytes, keyed by series ID) for the
//! per-segment series index. Both are a [`Document`].
//!
//! ### Series identity ([`series`])
//! A series is `(subject, entity values)`. Its canonical byte form is stable
//! across processes, and its 64-bit xxh3 hash is the series ID used
//! everywhere else.
//!
//! ### Element batches ([`batch`])
//! Column-wise staging for rows headed into one table: four parallel arrays,
//! recycled through a pool to keep the hot path allocation-free.
//!
//! ### Stream schema ([`schema`])
//! The registry-distributed description of a stream: ordered tag families and
//! specs, plus the derived index-rule locators the batcher consults per tag.

pub mod batch;
pub mod convert;
pub mod error;
pub mod index;
pub mod schema;
pub mod series;
pub mod tag;

pub use batch::ElementBatch;
pub use convert::{decode_i64, encode_i64, hash_bytes, hash_str};
pub use error::{Error, Result};
pub use index::{Document, Field, FieldKey, FieldValue};
pub use schema::{
    IndexRule, IndexRuleLocators, IndexRuleType, IndexSchema, StreamSchema, TagFamilySpec,
    TagSpec, TagType,
};
pub use series::{EncodedSeries, Series};
pub use tag::{TagFamily, TagValue, ValueType};
