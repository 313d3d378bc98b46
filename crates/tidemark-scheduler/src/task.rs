//! The per-task loop.
//!
//! A task sleeps on its clock until the schedule's next fire, runs the action
//! on its own spawned future, and loops. The action decides continuation:
//! `true` keeps the schedule, `false` stops the task. Panics and timeouts are
//! counted and treated as continue, so one bad housekeeping run never silences
//! the schedule.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use tidemark_time::{Clock, Time};

use crate::metrics::TaskMetrics;

/// Hard per-invocation budget; an action still running after this is counted
/// as timed out and aborted.
pub const ACTION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// An executable fired on schedule. `now` is the trigger time as seen by the
/// task's clock. Return `false` to stop the task.
pub type SchedulerAction = Arc<dyn Fn(Time) -> BoxFuture<'static, bool> + Send + Sync>;

pub(crate) struct Task {
    name: String,
    clock: Arc<dyn Clock>,
    schedule: cron::Schedule,
    action: SchedulerAction,
    metrics: Arc<TaskMetrics>,
}

impl Task {
    pub(crate) fn new(
        name: impl Into<String>,
        clock: Arc<dyn Clock>,
        schedule: cron::Schedule,
        action: SchedulerAction,
        metrics: Arc<TaskMetrics>,
    ) -> Self {
        Self {
            name: name.into(),
            clock,
            schedule,
            action,
            metrics,
        }
    }

    /// Runs until the action stops the task, the schedule runs dry, or the
    /// shutdown channel fires.
    pub(crate) async fn run(&self, mut shutdown: oneshot::Receiver<()>) {
        let mut now = self.clock.now();
        info!(name = %self.name, %now, "start");
        self.metrics.record_job_started();
        loop {
            let next = match self.schedule.after(&now.date_time()).next() {
                Some(next) => Time::from_datetime(next),
                None => {
                    info!(name = %self.name, "schedule has no further fire times");
                    break;
                }
            };
            let wait = next.checked_duration_since(now).unwrap_or(Duration::ZERO);
            debug!(name = %self.name, %now, %next, ?wait, "schedule to");
            let timer = self.clock.timer(wait);
            tokio::select! {
                fired = timer.fired() => {
                    now = fired;
                    debug!(name = %self.name, %now, "wake");
                    if !self.fire(now).await {
                        info!(name = %self.name, "action stops the task");
                        break;
                    }
                }
                _ = &mut shutdown => {
                    info!(name = %self.name, "closed");
                    break;
                }
            }
        }
        self.metrics.record_job_finished();
    }

    /// One action invocation; `true` means keep the schedule.
    async fn fire(&self, now: Time) -> bool {
        self.metrics.record_task_started();
        let start = std::time::Instant::now();

        let handle = tokio::spawn((self.action)(now));
        let abort = handle.abort_handle();
        let timeout = self.clock.timer(ACTION_TIMEOUT);

        let proceed = tokio::select! {
            result = handle => match result {
                Ok(proceed) => proceed,
                Err(err) if err.is_panic() => {
                    error!(name = %self.name, panic = %panic_message(err.into_panic()), "action panicked");
                    self.metrics.record_task_panic();
                    true
                }
                Err(_) => true,
            },
            _ = timeout.fired() => {
                error!(name = %self.name, "action timed out");
                self.metrics.record_task_timeout();
                abort.abort();
                true
            }
        };
        self.metrics.record_task_finished(start.elapsed());
        proceed
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
