//! Rule scheduler.
//!
//! Derives live timers from a [`RuleSet`] and owns them until the next
//! `start`/`stop`. Daily rules are self-rescheduling one-shots: each fire
//! cancels the spent handle and arms the next occurrence from the current
//! wall clock. Interval rules hold one periodic timer and a firing counter.
//!
//! ## Lifecycle
//!
//! ```text
//! start(rules) -> cancel all -> arm each enabled, well-formed rule
//! on_timer(h)  -> Firing (caller enqueues) [+ re-arm if daily]
//! stop()       -> cancel all
//! ```

use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ScheduleError;
use crate::rules::{Plan, Rule, RuleSet};
use crate::timer::{delay_until, instant_after, next_daily_fire, TimerHandle, TimerKind, Timers};

/// Runtime binding between a rule and a live timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub rule_id: String,
    pub kind: TimerKind,
    pub handle: TimerHandle,
    /// When the timer is expected to fire next.
    pub next_fire: DateTime<Local>,
    /// Fires so far in this arming cycle.
    pub fired: u64,
}

#[derive(Debug)]
struct Armed {
    timer: ScheduledTimer,
    rule: Rule,
    plan: Plan,
}

/// Outcome of [`Scheduler::start`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArmReport {
    pub armed: usize,
    pub disabled: usize,
    pub skipped: Vec<ScheduleError>,
    /// The built-in fallback rule was armed.
    pub fallback: bool,
}

/// A rule fired. The caller turns it into an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub rule_id: String,
    pub title: String,
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    armed: Vec<Armed>,
    running: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of live timers owned by the scheduler.
    pub fn live_count(&self) -> usize {
        self.armed.len()
    }

    pub fn scheduled(&self) -> impl Iterator<Item = &ScheduledTimer> {
        self.armed.iter().map(|a| &a.timer)
    }

    pub fn find(&self, rule_id: &str) -> Option<&ScheduledTimer> {
        self.scheduled().find(|t| t.rule_id == rule_id)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Cancel everything, then arm every enabled, well-formed rule.
    ///
    /// Malformed rules are skipped with a warning. When the set holds no
    /// usable rule at all (empty, or every entry malformed) the built-in
    /// fallback rule is armed instead, so the system never goes silent.
    pub fn start<T: Timers + ?Sized>(&mut self, rules: &RuleSet, timers: &mut T) -> ArmReport {
        self.stop(timers);

        let mut report = ArmReport::default();
        let mut seen = HashSet::new();

        for (index, rule) in rules.rules.iter().enumerate() {
            if !rule.enabled {
                report.disabled += 1;
                continue;
            }
            let checked = if rule.id.trim().is_empty() {
                Err(ScheduleError::MissingId { index })
            } else if !seen.insert(rule.id.as_str()) {
                Err(ScheduleError::DuplicateId {
                    rule_id: rule.id.clone(),
                })
            } else {
                rule.plan(&rules.settings)
            };

            match checked {
                Ok(plan) => {
                    if self.arm(rule.clone(), plan, timers) {
                        report.armed += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "skipping rule");
                    report.skipped.push(e);
                }
            }
        }

        if report.armed == 0 && report.disabled == 0 {
            let fallback = Rule::fallback();
            if let Ok(plan) = fallback.plan(&rules.settings) {
                warn!("no usable rules, arming built-in fallback reminder");
                report.fallback = self.arm(fallback, plan, timers);
                if report.fallback {
                    report.armed += 1;
                }
            }
        }

        self.running = true;
        info!(
            armed = report.armed,
            disabled = report.disabled,
            skipped = report.skipped.len(),
            fallback = report.fallback,
            "scheduler started"
        );
        report
    }

    /// Cancel every live timer. Safe to call with nothing armed.
    pub fn stop<T: Timers + ?Sized>(&mut self, timers: &mut T) -> usize {
        let cancelled = self.armed.len();
        for armed in self.armed.drain(..) {
            timers.cancel(armed.timer.handle);
        }
        if self.running {
            info!(cancelled, "scheduler stopped");
        }
        self.running = false;
        cancelled
    }

    /// Handle a fired timer.
    ///
    /// Returns `None` for handles this scheduler no longer owns, e.g. a fire
    /// that was already queued when a reload cancelled its timer.
    pub fn on_timer<T: Timers + ?Sized>(&mut self, handle: TimerHandle, timers: &mut T) -> Option<Firing> {
        let Some(index) = self.armed.iter().position(|a| a.timer.handle == handle) else {
            debug!(%handle, "ignoring fire from a timer that is no longer armed");
            return None;
        };
        let now = timers.now();
        let armed = &mut self.armed[index];
        armed.timer.fired += 1;

        let firing = Firing {
            rule_id: armed.rule.id.clone(),
            title: armed.rule.display_title().to_string(),
            message: match armed.plan {
                Plan::Daily { .. } => armed.rule.message.clone(),
                Plan::Interval { .. } => armed.rule.render_message(armed.timer.fired),
            },
            count: armed.timer.fired,
        };

        let mut drop_rule = false;
        match armed.plan {
            Plan::Daily { hour, minute } => {
                timers.cancel(armed.timer.handle);
                // A fire delivered slightly before the wall-clock instant must
                // not select the same occurrence again.
                let reference = now.max(armed.timer.next_fire);
                match next_daily_fire(&reference, hour, minute) {
                    Some(at) => {
                        armed.timer.handle = timers.once(delay_until(&now, &at));
                        armed.timer.next_fire = at;
                        debug!(rule = %armed.rule.id, next = %at, "daily rule re-armed");
                    }
                    None => drop_rule = true,
                }
            }
            Plan::Interval { seconds } => {
                armed.timer.next_fire = instant_after(&now, Duration::from_secs(seconds));
            }
        }

        if drop_rule {
            let armed = self.armed.remove(index);
            warn!(rule = %armed.rule.id, "could not compute next occurrence, rule dropped");
        }
        Some(firing)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn arm<T: Timers + ?Sized>(&mut self, rule: Rule, plan: Plan, timers: &mut T) -> bool {
        let now = timers.now();
        let (handle, next_fire, kind) = match plan {
            Plan::Daily { hour, minute } => {
                let Some(at) = next_daily_fire(&now, hour, minute) else {
                    warn!(rule = %rule.id, "could not compute next occurrence");
                    return false;
                };
                (timers.once(delay_until(&now, &at)), at, TimerKind::Daily)
            }
            Plan::Interval { seconds } => (
                timers.every(Duration::from_secs(seconds)),
                instant_after(&now, Duration::from_secs(seconds)),
                TimerKind::Interval,
            ),
        };
        debug!(rule = %rule.id, %handle, next = %next_fire, "rule armed");
        self.armed.push(Armed {
            timer: ScheduledTimer {
                rule_id: rule.id.clone(),
                kind,
                handle,
                next_fire,
                fired: 0,
            },
            rule,
            plan,
        });
        true
    }
}
