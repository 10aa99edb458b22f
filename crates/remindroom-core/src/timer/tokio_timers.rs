//! Real-time timers backed by tokio tasks.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{TimerHandle, Timers};
use crate::events::{AppEvent, EventSender};

/// One spawned task per armed timer; each fire is sent to the event loop
/// as [`AppEvent::TimerFired`]. Must be used inside a tokio runtime.
pub struct TokioTimers {
    events: EventSender,
    next_id: u64,
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
}

impl TokioTimers {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            next_id: 1,
            tasks: HashMap::new(),
        }
    }

    fn allocate(&mut self) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        handle
    }
}

impl Timers for TokioTimers {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn once(&mut self, delay: Duration) -> TimerHandle {
        let handle = self.allocate();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(AppEvent::TimerFired(handle));
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn every(&mut self, period: Duration) -> TimerHandle {
        let handle = self.allocate();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let Some(start) = Instant::now().checked_add(period) else {
                // beyond the clock's range, never due
                return std::future::pending().await;
            };
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(AppEvent::TimerFired(handle)).is_err() {
                    break;
                }
            }
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.tasks.remove(&handle) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Spent one-shots count until the scheduler cancels them on re-arm.
    fn live(&self) -> usize {
        self.tasks.len()
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
