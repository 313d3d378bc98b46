//! Disk-pressure admission control.
//!
//! Before a write batch is accepted, the node checks how full the filesystem
//! under its data path is. Past the configured threshold it answers
//! `DiskFull` and the caller surfaces that as a status — better an explicit
//! rejection at the front door than an engine failing halfway through a
//! flush.
//!
//! The probe walks the path up to its mount point, the same resolution the
//! disk gauges use, so a data directory nested below the mount still reports
//! the right filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::{DiskExt, System, SystemExt};
use tracing::warn;

use crate::error::{Error, Result};

/// Reports how full the filesystem containing a path is.
pub trait DiskUsage: Send + Sync + std::fmt::Debug {
    /// Used space of the path's filesystem, in whole percent (0–100).
    fn used_percent(&self, path: &Path) -> u32;
}

/// [`DiskUsage`] backed by the operating system's mount table.
#[derive(Debug, Default)]
pub struct SystemDiskUsage;

impl DiskUsage for SystemDiskUsage {
    fn used_percent(&self, path: &Path) -> u32 {
        let mut system = System::new();
        system.refresh_disks_list();

        let mut probe = path.to_path_buf();
        let disk = loop {
            if let Some(disk) = system
                .disks()
                .iter()
                .find(|disk| disk.mount_point() == probe)
            {
                break Some(disk);
            }
            if !probe.pop() {
                break None;
            }
        };

        match disk {
            Some(disk) if disk.total_space() > 0 => {
                let used = disk.total_space() - disk.available_space();
                ((used * 100) / disk.total_space()) as u32
            }
            // An unknown mount reads as empty rather than blocking writes.
            _ => 0,
        }
    }
}

/// Gate that rejects writes when the data path's filesystem is too full.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    path: PathBuf,
    max_disk_usage_percent: u32,
    disk: Arc<dyn DiskUsage>,
}

impl AdmissionController {
    /// `max_disk_usage_percent` of `0` makes the node read-only; values above
    /// `100` are clamped to `100`.
    pub fn new(path: impl Into<PathBuf>, max_disk_usage_percent: u32, disk: Arc<dyn DiskUsage>) -> Self {
        Self {
            path: path.into(),
            max_disk_usage_percent: max_disk_usage_percent.min(100),
            disk,
        }
    }

    /// `Ok` when writes may proceed, `Error::DiskFull` otherwise.
    pub fn check_health(&self) -> Result<()> {
        if self.max_disk_usage_percent == 0 {
            return Err(Error::DiskFull(
                "stream is readonly because \"stream-max-disk-usage-percent\" is 0".to_string(),
            ));
        }
        let disk_percent = self.disk.used_percent(&self.path);
        if disk_percent < self.max_disk_usage_percent {
            return Ok(());
        }
        warn!(
            max_percent = self.max_disk_usage_percent,
            disk_percent, "disk usage is too high, stop writing"
        );
        Err(Error::DiskFull(
            "disk usage is too high, stop writing".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FixedUsage(u32);

    impl DiskUsage for FixedUsage {
        fn used_percent(&self, _path: &Path) -> u32 {
            self.0
        }
    }

    fn controller(threshold: u32, usage: u32) -> AdmissionController {
        AdmissionController::new("/data/stream", threshold, Arc::new(FixedUsage(usage)))
    }

    #[test]
    fn test_zero_threshold_is_readonly() {
        // Even an empty disk cannot be written to.
        assert!(matches!(
            controller(0, 0).check_health(),
            Err(Error::DiskFull(_))
        ));
    }

    #[test]
    fn test_rejects_at_threshold() {
        assert!(matches!(
            controller(80, 80).check_health(),
            Err(Error::DiskFull(_))
        ));
        assert!(matches!(
            controller(80, 99).check_health(),
            Err(Error::DiskFull(_))
        ));
    }

    #[test]
    fn test_accepts_below_threshold() {
        assert!(controller(80, 79).check_health().is_ok());
        assert!(controller(80, 0).check_health().is_ok());
    }

    #[test]
    fn test_over_hundred_clamps() {
        // 101 behaves exactly like 100.
        assert!(controller(101, 99).check_health().is_ok());
        assert!(matches!(
            controller(101, 100).check_health(),
            Err(Error::DiskFull(_))
        ));
    }

    #[test]
    fn test_system_probe_reports_something_sane() {
        let percent = SystemDiskUsage.used_percent(Path::new("/"));
        assert!(percent <= 100);
    }
}
