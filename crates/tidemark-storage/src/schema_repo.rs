//! Schema access for the write path.
//!
//! The registry distributes stream schemas and index rules out of band; this
//! module is the read side the batcher consumes. A [`StreamHandle`] pairs the
//! stream's (stable-per-batch) schema with its index configuration behind an
//! [`ArcSwap`]: republishing swaps the snapshot pointer, readers load a
//! consistent `Arc` without ever taking a lock.
//!
//! [`MemorySchemaRepo`] is a registry held entirely in memory, used by tests
//! and embedded setups.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tidemark_core::{IndexSchema, StreamSchema};

use crate::error::{Error, Result};
use crate::Tsdb;

/// A stream's schema plus its atomically republished index configuration.
#[derive(Debug)]
pub struct StreamHandle {
    schema: StreamSchema,
    index_schema: ArcSwap<IndexSchema>,
}

impl StreamHandle {
    pub fn new(schema: StreamSchema, index_schema: IndexSchema) -> Self {
        Self {
            schema,
            index_schema: ArcSwap::from_pointee(index_schema),
        }
    }

    pub fn schema(&self) -> &StreamSchema {
        &self.schema
    }

    /// The current index snapshot. The returned `Arc` stays consistent for
    /// the caller even while a new snapshot is published concurrently.
    pub fn index_schema(&self) -> Arc<IndexSchema> {
        self.index_schema.load_full()
    }

    /// Publishes a new index snapshot. In-flight readers keep the old one.
    pub fn update_index_schema(&self, index_schema: IndexSchema) {
        self.index_schema.store(Arc::new(index_schema));
    }
}

/// Resolves groups and streams for the write path.
#[async_trait]
pub trait SchemaRepo: Send + Sync {
    /// The group's time-series database, creating per-group state on first
    /// use where the backend supports it.
    async fn load_tsdb(&self, group: &str) -> Result<Arc<dyn Tsdb>>;

    /// The stream's handle, or `None` when the stream is not defined.
    fn load_stream(&self, group: &str, name: &str) -> Option<Arc<StreamHandle>>;

    /// Root directory of this node's stream data.
    fn path(&self) -> &Path;
}

/// In-memory [`SchemaRepo`].
pub struct MemorySchemaRepo {
    path: PathBuf,
    tsdbs: RwLock<HashMap<String, Arc<dyn Tsdb>>>,
    streams: RwLock<HashMap<(String, String), Arc<StreamHandle>>>,
}

impl MemorySchemaRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tsdbs: RwLock::new(HashMap::new()),
            streams: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_tsdb(&self, group: impl Into<String>, tsdb: Arc<dyn Tsdb>) {
        self.tsdbs.write().insert(group.into(), tsdb);
    }

    pub fn register_stream(&self, schema: StreamSchema, index_schema: IndexSchema) -> Arc<StreamHandle> {
        let key = (schema.group.clone(), schema.name.clone());
        let handle = Arc::new(StreamHandle::new(schema, index_schema));
        self.streams.write().insert(key, Arc::clone(&handle));
        handle
    }
}

#[async_trait]
impl SchemaRepo for MemorySchemaRepo {
    async fn load_tsdb(&self, group: &str) -> Result<Arc<dyn Tsdb>> {
        self.tsdbs
            .read()
            .get(group)
            .cloned()
            .ok_or_else(|| Error::GroupNotFound(group.to_string()))
    }

    fn load_stream(&self, group: &str, name: &str) -> Option<Arc<StreamHandle>> {
        self.streams
            .read()
            .get(&(group.to_string(), name.to_string()))
            .cloned()
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
