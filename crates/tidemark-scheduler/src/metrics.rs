//! Per-task execution counters.
//!
//! Plain atomics read in-process: a "job" is one task loop from registration
//! to exit, a "task" is one action invocation. Latency accumulates total
//! action wall time in nanoseconds.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct TaskMetrics {
    jobs_started: AtomicU64,
    jobs_finished: AtomicU64,
    tasks_started: AtomicU64,
    tasks_finished: AtomicU64,
    tasks_panic: AtomicU64,
    tasks_timeout: AtomicU64,
    task_latency_ns: AtomicI64,
}

impl TaskMetrics {
    pub fn jobs_started(&self) -> u64 {
        self.jobs_started.load(Ordering::Relaxed)
    }

    pub fn jobs_finished(&self) -> u64 {
        self.jobs_finished.load(Ordering::Relaxed)
    }

    pub fn tasks_started(&self) -> u64 {
        self.tasks_started.load(Ordering::Relaxed)
    }

    pub fn tasks_finished(&self) -> u64 {
        self.tasks_finished.load(Ordering::Relaxed)
    }

    pub fn tasks_panic(&self) -> u64 {
        self.tasks_panic.load(Ordering::Relaxed)
    }

    pub fn tasks_timeout(&self) -> u64 {
        self.tasks_timeout.load(Ordering::Relaxed)
    }

    /// Accumulated action wall time in nanoseconds.
    pub fn task_latency_ns(&self) -> i64 {
        self.task_latency_ns.load(Ordering::Relaxed)
    }

    pub(crate) fn record_job_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_job_finished(&self) {
        self.jobs_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_task_started(&self) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_task_finished(&self, elapsed: Duration) {
        self.tasks_finished.fetch_add(1, Ordering::Relaxed);
        self.task_latency_ns
            .fetch_add(elapsed.as_nanos() as i64, Ordering::Relaxed);
    }

    pub(crate) fn record_task_panic(&self) {
        self.tasks_panic.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_task_timeout(&self) {
        self.tasks_timeout.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = TaskMetrics::default();
        metrics.record_job_started();
        metrics.record_task_started();
        metrics.record_task_finished(Duration::from_nanos(150));
        metrics.record_task_finished(Duration::from_nanos(50));

        assert_eq!(metrics.jobs_started(), 1);
        assert_eq!(metrics.jobs_finished(), 0);
        assert_eq!(metrics.tasks_started(), 1);
        assert_eq!(metrics.tasks_finished(), 2);
        assert_eq!(metrics.task_latency_ns(), 200);
        assert_eq!(metrics.tasks_panic(), 0);
        assert_eq!(metrics.tasks_timeout(), 0);
    }
}
