//! Task registry and lifecycle.
//!
//! The scheduler owns a name-keyed registry of running tasks. Registration
//! parses the schedule, spawns the task loop, and records the entry; the
//! loop removes its own entry when it exits, so a stopped task's name becomes
//! reusable. `close` drains the registry first and only then waits for the
//! loops, which keeps task self-removal and shutdown from contending over the
//! same entries.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::error;

use tidemark_time::{Clock, MockClock, SystemClock, Time};

use crate::error::{Error, Result};
use crate::metrics::TaskMetrics;
use crate::task::{SchedulerAction, Task};

/// How a schedule expression is read.
///
/// The default is the conventional five-field form (minute, hour, day of
/// month, month, day of week), which fires at second zero. With
/// `with_seconds`, the expression carries a leading seconds field.
/// `@`-descriptors (`@hourly`, `@daily`, ...) parse either way.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub with_seconds: bool,
}

impl ParseOptions {
    pub fn seconds() -> Self {
        Self { with_seconds: true }
    }

    fn parse(&self, expr: &str) -> Result<cron::Schedule> {
        let expr = expr.trim();
        let schedule = if self.with_seconds || expr.starts_with('@') {
            cron::Schedule::from_str(expr)?
        } else {
            cron::Schedule::from_str(&format!("0 {expr}"))?
        };
        Ok(schedule)
    }
}

struct TaskEntry {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
    metrics: Arc<TaskMetrics>,
    schedule: cron::Schedule,
    clock: Arc<dyn Clock>,
    mock: Option<Arc<MockClock>>,
}

struct Registry {
    closed: bool,
    tasks: HashMap<String, TaskEntry>,
}

/// A registry of named, cron-scheduled housekeeping tasks.
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    mock: Option<Arc<MockClock>>,
    registry: Arc<Mutex<Registry>>,
}

impl Scheduler {
    /// A scheduler over the wall clock.
    pub fn new() -> Self {
        Self::build(Arc::new(SystemClock::new()), None)
    }

    /// A deterministic scheduler: every registered task gets a private mock
    /// clock seeded with this clock's current time, and [`Scheduler::trigger`]
    /// becomes available.
    pub fn with_mock_clock(mock: Arc<MockClock>) -> Self {
        Self::build(Arc::clone(&mock) as Arc<dyn Clock>, Some(mock))
    }

    fn build(clock: Arc<dyn Clock>, mock: Option<Arc<MockClock>>) -> Self {
        Self {
            clock,
            mock,
            registry: Arc::new(Mutex::new(Registry {
                closed: false,
                tasks: HashMap::new(),
            })),
        }
    }

    /// The scheduler's current time.
    pub fn now(&self) -> Time {
        self.clock.now()
    }

    /// Adds a task under `name` and starts its loop.
    pub fn register(
        &self,
        name: &str,
        options: ParseOptions,
        expr: &str,
        action: SchedulerAction,
    ) -> Result<()> {
        let schedule = options.parse(expr)?;
        let mut registry = self.registry.lock();
        if registry.closed {
            return Err(Error::Closed);
        }
        if registry.tasks.contains_key(name) {
            return Err(Error::Duplicate(name.to_string()));
        }

        let (task_clock, task_mock): (Arc<dyn Clock>, Option<Arc<MockClock>>) = match &self.mock {
            Some(scheduler_mock) => {
                let mock = Arc::new(MockClock::new(scheduler_mock.now()));
                (Arc::clone(&mock) as Arc<dyn Clock>, Some(mock))
            }
            None => (Arc::clone(&self.clock), None),
        };

        let metrics = Arc::new(TaskMetrics::default());
        let task = Task::new(
            name,
            Arc::clone(&task_clock),
            schedule.clone(),
            action,
            Arc::clone(&metrics),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let registry_handle = Arc::clone(&self.registry);
        let task_name = name.to_string();
        let own_metrics = Arc::clone(&metrics);
        let join = tokio::spawn(async move {
            task.run(shutdown_rx).await;
            let mut registry = registry_handle.lock();
            // Remove only our own entry; the name may have been re-registered
            // after a close drained us out.
            if let Some(entry) = registry.tasks.get(&task_name) {
                if Arc::ptr_eq(&entry.metrics, &own_metrics) {
                    registry.tasks.remove(&task_name);
                }
            }
        });

        registry.tasks.insert(
            name.to_string(),
            TaskEntry {
                shutdown: shutdown_tx,
                join,
                metrics,
                schedule,
                clock: task_clock,
                mock: task_mock,
            },
        );
        Ok(())
    }

    /// Fires a mock-scheduled task by resynchronizing its clock to the
    /// scheduler's current time. Returns `false` on a wall-clock scheduler or
    /// an unknown name.
    pub fn trigger(&self, name: &str) -> bool {
        let Some(scheduler_mock) = &self.mock else {
            return false;
        };
        let now = scheduler_mock.now();
        let task_mock = {
            let registry = self.registry.lock();
            registry.tasks.get(name).and_then(|entry| entry.mock.clone())
        };
        match task_mock {
            Some(mock) => {
                mock.set(now);
                true
            }
            None => false,
        }
    }

    /// The gap between the task's next two fires, and the next fire time.
    pub fn interval(&self, name: &str) -> Option<(Duration, Time)> {
        let (schedule, clock) = {
            let registry = self.registry.lock();
            let entry = registry.tasks.get(name)?;
            (entry.schedule.clone(), Arc::clone(&entry.clock))
        };
        let mut fires = schedule.after(&clock.now().date_time());
        let first = Time::from_datetime(fires.next()?);
        let second = Time::from_datetime(fires.next()?);
        Some((second.checked_duration_since(first).unwrap_or_default(), first))
    }

    /// Whether [`Scheduler::close`] has run.
    pub fn closed(&self) -> bool {
        self.registry.lock().closed
    }

    /// Metrics of every registered task.
    pub fn metrics(&self) -> HashMap<String, Arc<TaskMetrics>> {
        let registry = self.registry.lock();
        registry
            .tasks
            .iter()
            .map(|(name, entry)| (name.clone(), Arc::clone(&entry.metrics)))
            .collect()
    }

    /// Stops every task and waits for each loop to finish. Further
    /// registrations fail with [`Error::Closed`].
    pub async fn close(&self) {
        let entries: Vec<TaskEntry> = {
            let mut registry = self.registry.lock();
            registry.closed = true;
            registry.tasks.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            // The loop may already have exited on its own.
            let _ = entry.shutdown.send(());
            if let Err(err) = entry.join.await {
                if err.is_panic() {
                    error!("task loop panicked during close");
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_field_expression_gains_seconds() {
        let schedule = ParseOptions::default().parse("0 0 * * *").expect("parse");
        let after = chrono::DateTime::parse_from_rfc3339("2023-11-14T10:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let next = schedule.after(&after).next().unwrap();
        assert_eq!(next.to_rfc3339(), "2023-11-15T00:00:00+00:00");
    }

    #[test]
    fn test_seconds_mode_takes_the_expression_verbatim() {
        let schedule = ParseOptions::seconds().parse("*/10 * * * * *").expect("parse");
        let after = chrono::DateTime::parse_from_rfc3339("2023-11-14T10:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let next = schedule.after(&after).next().unwrap();
        assert_eq!(next.to_rfc3339(), "2023-11-14T10:00:10+00:00");
    }

    #[test]
    fn test_five_field_mode_rejects_bare_seconds() {
        // Five fields alone never reach the parser unprefixed.
        assert!(cron::Schedule::from_str("0 0 * * *").is_err());
    }

    #[test]
    fn test_descriptors_parse_in_both_modes() {
        assert!(ParseOptions::default().parse("@hourly").is_ok());
        assert!(ParseOptions::seconds().parse("@daily").is_ok());
    }

    #[test]
    fn test_garbage_expression_is_a_parse_error() {
        assert!(matches!(
            ParseOptions::default().parse("not a schedule"),
            Err(Error::Parse(_))
        ));
    }
}
