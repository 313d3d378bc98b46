//! Storage configuration.
//!
//! ## StorageConfig
//!
//! - **path**: root directory of this node's stream data; admission probes
//!   the filesystem this path lives on
//! - **max_disk_usage_percent**: refuse writes once the path's filesystem is
//!   this full; `0` makes the node read-only, values above `100` behave as
//!   `100` (default: 95)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,

    #[serde(default = "default_max_disk_usage_percent")]
    pub max_disk_usage_percent: u32,
}

fn default_max_disk_usage_percent() -> u32 {
    95
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/stream"),
            max_disk_usage_percent: default_max_disk_usage_percent(),
        }
    }
}
