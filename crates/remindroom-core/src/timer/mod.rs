//! Clock and timer primitives.
//!
//! The scheduler never sleeps or spawns on its own. It asks a [`Timers`]
//! implementation to arm one-shot or periodic timers and later receives
//! the returned [`TimerHandle`] back as an `AppEvent::TimerFired` when the
//! timer elapses. Two implementations exist:
//!
//! - [`TokioTimers`]: real time, one tokio task per timer, fires are posted
//!   into the event loop channel.
//! - [`ManualTimers`]: virtual time for tests and previews; the caller
//!   advances the clock and pops due timers in order.

mod daily;
mod manual;
mod tokio_timers;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use daily::{delay_until, instant_after, next_daily_fire};
pub use manual::ManualTimers;
pub use tokio_timers::TokioTimers;

/// Opaque identifier of an armed timer. Never reused by the issuing
/// [`Timers`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    /// Self-rescheduling one-shot.
    Daily,
    /// Periodic.
    Interval,
}

/// Scheduling primitive: a wall clock plus cancelable one-shot and
/// periodic timers.
pub trait Timers {
    /// Current local wall-clock time.
    fn now(&self) -> DateTime<Local>;

    /// Fire once after `delay`.
    fn once(&mut self, delay: Duration) -> TimerHandle;

    /// Fire every `period`, first fire one period from now.
    fn every(&mut self, period: Duration) -> TimerHandle;

    /// Cancel a timer. Returns `false` if the handle is not live.
    fn cancel(&mut self, handle: TimerHandle) -> bool;

    /// Number of timers currently armed.
    fn live(&self) -> usize;
}
