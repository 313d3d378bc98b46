//! Tidemark Task Scheduler
//!
//! Cron-driven housekeeping for the storage engine: segment rotation,
//! retention sweeps, compaction triggers. Each registered task runs its own
//! loop — sleep until the next scheduled fire, run the action, repeat — until
//! the action asks to stop or the scheduler shuts down.
//!
//! ## Why not a plain interval?
//!
//! Rotation and retention want calendar alignment ("at minute 0", "daily"),
//! not fixed gaps, and operators want to express that in cron. The schedule
//! grammar is the `cron` crate's; [`ParseOptions`] adds the conventional
//! five-field form on top.
//!
//! ## Determinism
//!
//! A scheduler built over a [`MockClock`] hands every task a private mock
//! clock seeded with the scheduler's current time. [`Scheduler::trigger`]
//! resynchronizes one task's clock to the scheduler's, firing whatever the
//! task has armed — tests drive days of housekeeping in microseconds.
//!
//! ## Failure containment
//!
//! An action that panics is counted and the task keeps its schedule. An
//! action that outlives [`task::ACTION_TIMEOUT`] is counted, aborted, and the
//! task keeps its schedule. Only an action returning `false` (or scheduler
//! close) ends a task.
//!
//! ## Usage
//!
//! ```ignore
//! use tidemark_scheduler::{ParseOptions, Scheduler};
//!
//! let scheduler = Scheduler::new();
//! scheduler.register("segment-rotation", ParseOptions::default(), "5 0 * * *", action)?;
//! // ...
//! scheduler.close().await;
//! ```

pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod task;

pub use error::{Error, Result};
pub use metrics::TaskMetrics;
pub use scheduler::{ParseOptions, Scheduler};
pub use task::{SchedulerAction, ACTION_TIMEOUT};

pub use tidemark_time::{Clock, MockClock, SystemClock, Time, Timer};
