//! Virtual-time timers.

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};
use std::time::Duration;

use super::daily::far_future;
use super::{instant_after, TimerHandle, Timers};

#[derive(Debug, Clone)]
struct PendingTimer {
    handle: TimerHandle,
    due: DateTime<Local>,
    period: Option<TimeDelta>,
}

/// Timers driven by an explicit virtual clock.
///
/// Nothing fires by itself: [`ManualTimers::pop_due`] hands out due timers
/// one at a time, earliest first, moving the clock to each fire instant so
/// that whatever the caller re-arms in response is computed from the right
/// "now".
#[derive(Debug, Clone)]
pub struct ManualTimers {
    now: DateTime<Local>,
    next_id: u64,
    pending: Vec<PendingTimer>,
}

impl ManualTimers {
    pub fn starting_at(now: DateTime<Local>) -> Self {
        Self {
            now,
            next_id: 1,
            pending: Vec::new(),
        }
    }

    /// Start at a local wall-clock time. `None` if that time does not exist
    /// in the local zone.
    pub fn at_local(naive: NaiveDateTime) -> Option<Self> {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(Self::starting_at)
    }

    /// Earliest pending fire instant.
    pub fn next_due(&self) -> Option<DateTime<Local>> {
        self.pending.iter().map(|t| t.due).min()
    }

    /// Fire the earliest timer due at or before `until`.
    ///
    /// Moves the clock to the fire instant. One-shots are removed, periodic
    /// timers are pushed one period forward.
    pub fn pop_due(&mut self, until: DateTime<Local>) -> Option<TimerHandle> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(_, t)| (t.due, t.handle))
            .map(|(i, _)| i)?;

        let timer = &mut self.pending[index];
        let handle = timer.handle;
        if timer.due > self.now {
            self.now = timer.due;
        }
        match timer.period.and_then(|period| timer.due.checked_add_signed(period)) {
            Some(next) => timer.due = next,
            None => {
                self.pending.remove(index);
            }
        }
        Some(handle)
    }

    /// Move the clock forward without firing anything. Never moves backwards.
    pub fn set_now(&mut self, now: DateTime<Local>) {
        if now > self.now {
            self.now = now;
        }
    }

    fn arm(&mut self, delay: Duration, period: Option<TimeDelta>) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.pending.push(PendingTimer {
            handle,
            due: instant_after(&self.now, delay),
            period,
        });
        handle
    }
}

impl Timers for ManualTimers {
    fn now(&self) -> DateTime<Local> {
        self.now
    }

    fn once(&mut self, delay: Duration) -> TimerHandle {
        self.arm(delay, None)
    }

    fn every(&mut self, period: Duration) -> TimerHandle {
        let step = TimeDelta::from_std(period).map_or_else(|_| far_future(), |d| d.min(far_future()));
        self.arm(period, Some(step))
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.handle != handle);
        self.pending.len() != before
    }

    fn live(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timers() -> ManualTimers {
        let naive = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        ManualTimers::at_local(naive).unwrap()
    }

    #[test]
    fn pops_in_due_order_and_moves_clock() {
        let mut t = timers();
        let start = t.now();
        let late = t.once(Duration::from_secs(20));
        let early = t.once(Duration::from_secs(10));

        let until = start + TimeDelta::seconds(30);
        assert_eq!(t.pop_due(until), Some(early));
        assert_eq!(t.now(), start + TimeDelta::seconds(10));
        assert_eq!(t.pop_due(until), Some(late));
        assert_eq!(t.pop_due(until), None);
        assert_eq!(t.live(), 0);
    }

    #[test]
    fn periodic_timer_stays_armed() {
        let mut t = timers();
        let start = t.now();
        let tick = t.every(Duration::from_secs(5));

        let until = start + TimeDelta::seconds(16);
        let mut fired = 0;
        while let Some(handle) = t.pop_due(until) {
            assert_eq!(handle, tick);
            fired += 1;
        }
        assert_eq!(fired, 3);
        assert_eq!(t.live(), 1);
        assert_eq!(t.next_due(), Some(start + TimeDelta::seconds(20)));
    }

    #[test]
    fn cancel_removes_and_reports() {
        let mut t = timers();
        let h = t.once(Duration::from_secs(1));
        assert!(t.cancel(h));
        assert!(!t.cancel(h));
        assert_eq!(t.live(), 0);
    }

    #[test]
    fn set_now_never_rewinds() {
        let mut t = timers();
        let start = t.now();
        t.set_now(start - TimeDelta::hours(1));
        assert_eq!(t.now(), start);
    }
}
