//! Tidemark Storage Layer
//!
//! This crate implements the stream write pipeline: it accepts batches of
//! routed write events, groups them by tenant group, time-range segment and
//! shard, materialises tag values into column form, and commits rows plus
//! index documents to the engines below.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────┐
//! │  Routing tier    │ batches of InternalWriteRequest
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  WriteCallback   │ ◄── You are here
//! │  - admission     │
//! │  - batching      │
//! │  - flushing      │
//! └────────┬─────────┘
//!          │ rows + documents
//!          ▼
//! ┌──────────────────┐
//! │ Tsdb / Segment / │ per-group engines (out of crate)
//! │ TsTable / Index  │
//! └──────────────────┘
//! ```
//!
//! ## Main Components
//!
//! ### Storage contracts
//! [`Tsdb`], [`Segment`], [`TsTable`] and [`IndexWriter`] are the interfaces
//! this crate *consumes*; the on-disk engines implement them. Segments are
//! reference-counted by the engine: every handle returned by
//! [`Tsdb::create_segment_if_not_exist`] must be balanced with exactly one
//! [`Segment::dec_ref`], because retention may race with in-flight writes.
//!
//! ### Write pipeline ([`write`])
//! [`write::WriteCallback`] accumulates a batch into per-group state and
//! flushes each group once: rows first, then element index documents, then
//! series documents, then segment releases, then the group's
//! [`Tsdb::tick`] hint.
//!
//! ### Admission ([`admission`])
//! Disk-pressure gate checked before a batch is accepted.
//!
//! ### Schema access ([`schema_repo`])
//! [`schema_repo::SchemaRepo`] resolves groups to their time-series DBs and
//! streams to their schemas; index configuration is read through an atomic
//! snapshot so a batch sees one consistent view.

pub mod admission;
pub mod config;
pub mod error;
pub mod schema_repo;
pub mod write;

pub use admission::{AdmissionController, DiskUsage, SystemDiskUsage};
pub use config::StorageConfig;
pub use error::{Error, Result};
pub use schema_repo::{MemorySchemaRepo, SchemaRepo, StreamHandle};
pub use write::{WriteCallback, WriteEvent};

use async_trait::async_trait;
use std::sync::Arc;
use tidemark_core::{Document, ElementBatch};

/// Identifies one horizontal partition inside a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(pub u32);

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

/// Half-open nanosecond interval `[start_ns, end_ns)` covered by a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ns: i64,
    pub end_ns: i64,
}

impl TimeRange {
    pub fn new(start_ns: i64, end_ns: i64) -> Self {
        Self { start_ns, end_ns }
    }

    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start_ns && ts < self.end_ns
    }
}

/// Sink for index documents. Backs both the per-shard element index and the
/// per-segment series index.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    async fn write(&self, docs: &[Document]) -> Result<()>;
}

/// Per-group time-series database handle.
#[async_trait]
pub trait Tsdb: Send + Sync {
    /// Returns the segment containing `ts`, creating it if needed. The
    /// returned handle carries a reference the caller must release with
    /// exactly one [`Segment::dec_ref`].
    async fn create_segment_if_not_exist(&self, ts: i64) -> Result<Arc<dyn Segment>>;

    /// Hints the engine's time-monotonic structures with the latest
    /// timestamp observed for this group.
    fn tick(&self, latest_ts: i64);
}

/// One time-range partition of a group.
#[async_trait]
pub trait Segment: Send + Sync {
    fn time_range(&self) -> TimeRange;

    async fn create_ts_table_if_not_exist(&self, shard: ShardId) -> Result<Arc<dyn TsTable>>;

    /// The segment-scoped series index.
    fn index_db(&self) -> Arc<dyn IndexWriter>;

    /// Releases the reference acquired when this handle was produced.
    fn dec_ref(&self);
}

/// Per-shard element store inside a segment.
#[async_trait]
pub trait TsTable: Send + Sync {
    /// Commits a batch of rows. Infallible by contract; a panic here is an
    /// engine bug, not an operational error.
    fn add_elements(&self, batch: &ElementBatch);

    /// The shard-scoped element inverted index.
    fn index(&self) -> Arc<dyn IndexWriter>;
}
