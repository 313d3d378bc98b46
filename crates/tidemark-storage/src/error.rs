//! Write-path error types.
//!
//! Batching errors (`InvalidTimestamp` through `MetadataCorrupted`) abort the
//! current event and make the committer drop the in-progress accumulator.
//! `Storage` wraps transient failures from the engines below; index-write
//! failures are logged at the call site instead of surfacing here. `DiskFull`
//! is the admission verdict returned to callers as a status.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] tidemark_time::TimeError),

    #[error("malformed write event: {0}")]
    MalformedEvent(&'static str),

    #[error("cannot load tsdb for group {0}")]
    GroupNotFound(String),

    #[error("cannot find stream definition: {group}/{name}")]
    UnknownStream { group: String, name: String },

    #[error("element of {stream} has no tag family")]
    NoTagFamilies { stream: String },

    #[error("element of {stream} has {provided} tag families, schema declares {declared}")]
    TooManyTagFamilies {
        stream: String,
        provided: usize,
        declared: usize,
    },

    #[error("metadata crashed: {rules} tag family rules, {families} tag families")]
    MetadataCorrupted { rules: usize, families: usize },

    #[error(transparent)]
    Series(#[from] tidemark_core::Error),

    #[error("storage operation failed: {0}")]
    Storage(String),

    #[error("disk is full: {0}")]
    DiskFull(String),
}
