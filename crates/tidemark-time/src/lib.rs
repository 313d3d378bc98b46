//! Time Primitives
//!
//! This crate defines the clock surface the rest of tidemark is written
//! against:
//!
//! - [`Time`]: an opaque UTC timestamp with nanosecond resolution
//! - [`Clock`]: a time source producing `now()` and one-shot [`Timer`]s
//! - [`SystemClock`]: the wall clock
//! - [`MockClock`]: a manually driven clock for deterministic tests
//!
//! ## Why a Clock Trait?
//!
//! Background housekeeping (segment rotation, retention, compaction triggers)
//! runs on cron schedules. Testing "fires once a day" against the wall clock
//! is hopeless; against a [`MockClock`] it is a single `advance()` call.
//! Every timer armed on a mock clock fires synchronously from `set`/`advance`
//! once its deadline is reached, yielding the new mock time.
//!
//! ## Timestamp validation
//!
//! The storage engine keys everything off i64 nanoseconds since the epoch.
//! [`check`] (and [`Time::from_timestamp_checked`]) reject timestamps that
//! fall outside the representable window, plus the zero timestamp that an
//! unset wire field decodes to.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::ops::{Add, Sub};
use std::time::Duration;
use tokio::sync::oneshot;

/// Earliest i64-nanosecond-representable instant: 1677-09-21T00:12:43.145224192Z.
pub const MIN_NANOS: i64 = i64::MIN;
/// Latest i64-nanosecond-representable instant: 2262-04-11T23:47:16.854775807Z.
pub const MAX_NANOS: i64 = i64::MAX;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("timestamp is unset")]
    Unset,

    #[error("timestamp {0}s {1}ns is outside the representable nanosecond range")]
    OutOfRange(i64, i32),
}

/// A UTC timestamp returned by a [`Clock`].
///
/// Construction helpers are meant for wire decoding and tests; production
/// code obtains `Time` from a clock.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Time(DateTime<Utc>);

impl Time {
    /// Makes a new `Time` from non-leap nanoseconds since the Unix epoch.
    pub fn from_timestamp_nanos(nanos: i64) -> Self {
        Self(Utc.timestamp_nanos(nanos))
    }

    /// Makes a new `Time` from epoch seconds plus subsecond nanoseconds,
    /// validating that the result is usable as a storage timestamp.
    ///
    /// Rejects the zero timestamp (an unset wire field) and anything outside
    /// the i64 nanosecond window.
    pub fn from_timestamp_checked(seconds: i64, nanos: i32) -> Result<Self, TimeError> {
        if seconds == 0 && nanos == 0 {
            return Err(TimeError::Unset);
        }
        let subsec = u32::try_from(nanos).map_err(|_| TimeError::OutOfRange(seconds, nanos))?;
        let dt = Utc
            .timestamp_opt(seconds, subsec)
            .single()
            .ok_or(TimeError::OutOfRange(seconds, nanos))?;
        let t = Self(dt);
        check(t).map_err(|_| TimeError::OutOfRange(seconds, nanos))?;
        Ok(t)
    }

    /// Makes a new `Time` from the provided [`DateTime<Utc>`].
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Non-leap nanoseconds since the Unix epoch.
    ///
    /// # Panics
    ///
    /// Panics if the instant is outside the representable window; values
    /// admitted through [`Time::from_timestamp_checked`] never are.
    pub fn timestamp_nanos(&self) -> i64 {
        self.0
            .timestamp_nanos_opt()
            .expect("instant outside the nanosecond-representable window")
    }

    /// Seconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }

    /// The underlying [`DateTime<Utc>`].
    pub fn date_time(&self) -> DateTime<Utc> {
        self.0
    }

    /// RFC 3339 rendering, e.g. `1996-12-19T16:39:57+00:00`.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// The duration since `other`, or `None` if it would be negative.
    pub fn checked_duration_since(&self, other: Self) -> Option<Duration> {
        self.0.signed_duration_since(other.0).to_std().ok()
    }
}

impl Add<Duration> for Time {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let duration = chrono::Duration::from_std(rhs).unwrap();
        Self(self.0 + duration)
    }
}

impl Sub<Duration> for Time {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self::Output {
        let duration = chrono::Duration::from_std(rhs).unwrap();
        Self(self.0 - duration)
    }
}

impl std::fmt::Debug for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

/// Validates that `t` is usable as a storage timestamp.
pub fn check(t: Time) -> Result<(), TimeError> {
    let nanos = t
        .0
        .timestamp_nanos_opt()
        .ok_or_else(|| TimeError::OutOfRange(t.0.timestamp(), 0))?;
    if nanos == 0 {
        return Err(TimeError::Unset);
    }
    Ok(())
}

/// A time source.
///
/// `timer` arms a one-shot [`Timer`]: on a [`SystemClock`] it completes after
/// the real duration elapses; on a [`MockClock`] it completes when the clock
/// is advanced past the deadline. Dropping a timer disarms it.
pub trait Clock: std::fmt::Debug + Send + Sync + 'static {
    /// The current time. No monotonicity guarantee is made.
    fn now(&self) -> Time;

    /// Arms a one-shot timer due after `duration`.
    fn timer(&self, duration: Duration) -> Timer;

    /// Downcast hook used by mock-aware callers; `None` for real clocks.
    fn as_mock(&self) -> Option<&MockClock> {
        None
    }
}

/// A one-shot wake produced by [`Clock::timer`].
#[derive(Debug)]
pub struct Timer {
    kind: TimerKind,
}

#[derive(Debug)]
enum TimerKind {
    System { duration: Duration },
    Mock { rx: oneshot::Receiver<Time> },
}

impl Timer {
    /// Resolves once the clock has advanced by the armed duration, yielding
    /// the clock's time at the moment of firing.
    ///
    /// A mock timer whose clock was dropped never resolves; select against a
    /// shutdown signal, as the task loop does.
    pub async fn fired(self) -> Time {
        match self.kind {
            TimerKind::System { duration } => {
                tokio::time::sleep(duration).await;
                Time::from_datetime(Utc::now())
            }
            TimerKind::Mock { rx } => match rx.await {
                Ok(t) => t,
                Err(_) => std::future::pending().await,
            },
        }
    }
}

/// A [`Clock`] backed by the wall clock.
#[derive(Debug, Default)]
pub struct SystemClock {}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Time {
        Time::from_datetime(Utc::now())
    }

    fn timer(&self, duration: Duration) -> Timer {
        Timer {
            kind: TimerKind::System { duration },
        }
    }
}

/// A [`Clock`] that only moves when told to.
///
/// `set` and `advance` fire every armed timer whose deadline has been
/// reached, delivering the new time.
#[derive(Debug)]
pub struct MockClock {
    state: Mutex<MockState>,
}

#[derive(Debug)]
struct MockState {
    now: Time,
    sleepers: Vec<Sleeper>,
}

#[derive(Debug)]
struct Sleeper {
    deadline: Time,
    tx: oneshot::Sender<Time>,
}

impl MockClock {
    pub fn new(start: Time) -> Self {
        Self {
            state: Mutex::new(MockState {
                now: start,
                sleepers: Vec::new(),
            }),
        }
    }

    /// Moves the clock to `t` and fires every matured timer.
    pub fn set(&self, t: Time) {
        let matured = {
            let mut state = self.state.lock();
            state.now = t;
            let mut matured = Vec::new();
            let mut i = 0;
            while i < state.sleepers.len() {
                if state.sleepers[i].deadline <= t || state.sleepers[i].tx.is_closed() {
                    matured.push(state.sleepers.swap_remove(i));
                } else {
                    i += 1;
                }
            }
            matured
        };
        for sleeper in matured {
            // A dropped receiver just means the timer was disarmed.
            let _ = sleeper.tx.send(t);
        }
    }

    /// Moves the clock forward by `duration` and returns the new time.
    pub fn advance(&self, duration: Duration) -> Time {
        let target = self.now() + duration;
        self.set(target);
        target
    }

    /// Number of currently armed timers. Test aid: poll this to know a task
    /// loop has parked on its schedule before driving the clock.
    pub fn sleeper_count(&self) -> usize {
        let mut state = self.state.lock();
        state.sleepers.retain(|s| !s.tx.is_closed());
        state.sleepers.len()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Time {
        self.state.lock().now
    }

    fn timer(&self, duration: Duration) -> Timer {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock();
            if duration.is_zero() {
                let now = state.now;
                let _ = tx.send(now);
            } else {
                let deadline = state.now + duration;
                state.sleepers.push(Sleeper { deadline, tx });
            }
        }
        Timer {
            kind: TimerKind::Mock { rx },
        }
    }

    fn as_mock(&self) -> Option<&MockClock> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_moves() {
        let clock = SystemClock::new();
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let b = clock.now();
        assert!(b.checked_duration_since(a).unwrap() >= Duration::from_millis(10));
    }

    #[test]
    fn test_mock_clock_is_frozen() {
        let clock = MockClock::new(Time::from_timestamp_nanos(1_000));
        assert_eq!(clock.now().timestamp_nanos(), 1_000);
        assert_eq!(clock.now().timestamp_nanos(), 1_000);

        clock.set(Time::from_timestamp_nanos(2_000));
        assert_eq!(clock.now().timestamp_nanos(), 2_000);
    }

    #[tokio::test]
    async fn test_mock_timer_fires_on_advance() {
        let clock = MockClock::new(Time::from_timestamp_nanos(0));
        let timer = clock.timer(Duration::from_secs(10));
        assert_eq!(clock.sleeper_count(), 1);

        clock.advance(Duration::from_secs(10));
        let fired = timer.fired().await;
        assert_eq!(fired.timestamp_nanos(), 10_000_000_000);
        assert_eq!(clock.sleeper_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_timer_does_not_fire_early() {
        let clock = MockClock::new(Time::from_timestamp_nanos(0));
        let _timer = clock.timer(Duration::from_secs(10));

        clock.advance(Duration::from_secs(9));
        assert_eq!(clock.sleeper_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_timer_zero_duration_fires_immediately() {
        let clock = MockClock::new(Time::from_timestamp_nanos(42));
        let fired = clock.timer(Duration::ZERO).fired().await;
        assert_eq!(fired.timestamp_nanos(), 42);
    }

    #[test]
    fn test_dropped_timer_is_disarmed() {
        let clock = MockClock::new(Time::from_timestamp_nanos(0));
        let timer = clock.timer(Duration::from_secs(1));
        drop(timer);
        assert_eq!(clock.sleeper_count(), 0);
    }

    #[tokio::test]
    async fn test_system_timer_fires() {
        let clock = SystemClock::new();
        let before = clock.now();
        let fired = clock.timer(Duration::from_millis(20)).fired().await;
        assert!(fired.checked_duration_since(before).unwrap() >= Duration::from_millis(20));
    }

    #[test]
    fn test_check_rejects_unset() {
        assert_eq!(
            Time::from_timestamp_checked(0, 0),
            Err(TimeError::Unset)
        );
    }

    #[test]
    fn test_check_rejects_negative_subsec() {
        assert!(matches!(
            Time::from_timestamp_checked(1, -1),
            Err(TimeError::OutOfRange(1, -1))
        ));
    }

    #[test]
    fn test_check_rejects_out_of_range() {
        // Far past the 2262 ceiling of the nanosecond window.
        assert!(matches!(
            Time::from_timestamp_checked(1 << 44, 0),
            Err(TimeError::OutOfRange(..))
        ));
    }

    #[test]
    fn test_checked_timestamp_roundtrip() {
        let t = Time::from_timestamp_checked(1_700_000_000, 123).unwrap();
        assert_eq!(t.timestamp_nanos(), 1_700_000_000_000_000_123);
        assert_eq!(t.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_time_arithmetic() {
        let t = Time::from_timestamp_nanos(1_000_000_000);
        assert_eq!(
            (t + Duration::from_secs(1)).timestamp_nanos(),
            2_000_000_000
        );
        assert_eq!((t - Duration::from_secs(1)).timestamp_nanos(), 0);
        assert_eq!(
            (t + Duration::from_secs(1)).checked_duration_since(t),
            Some(Duration::from_secs(1))
        );
        assert_eq!(t.checked_duration_since(t + Duration::from_secs(1)), None);
    }
}
