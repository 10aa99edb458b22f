//! Application context.
//!
//! [`App`] owns every piece of mutable state (timers, rule store,
//! scheduler, alert queue, presenter) and applies [`AppEvent`]s to them one
//! at a time. Nothing else mutates that state, so event order is the only
//! ordering that matters.

use chrono::{TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use crate::error::{AcknowledgeError, LoadError};
use crate::events::{AppEvent, ControlAction, Flow, LifecycleEvent};
use crate::presenter::{Presenter, Surface, SurfaceOptions};
use crate::queue::{Alert, AlertId, NotificationQueue};
use crate::rules::{LoadedRules, RuleStore, DEFAULT_TITLE};
use crate::scheduler::{ArmReport, Scheduler};
use crate::timer::{ManualTimers, TimerHandle, Timers};

pub struct App<T: Timers, S: Surface> {
    timers: T,
    rules: RuleStore,
    scheduler: Scheduler,
    queue: NotificationQueue,
    presenter: Presenter<S>,
    stay_resident: bool,
    shut_down: bool,
}

impl<T: Timers, S: Surface> App<T, S> {
    /// A stopped app holding the built-in rule set.
    pub fn new(timers: T, surface: S, options: SurfaceOptions) -> Self {
        Self {
            timers,
            rules: RuleStore::new(),
            scheduler: Scheduler::new(),
            queue: NotificationQueue::new(),
            presenter: Presenter::new(surface, options),
            stay_resident: false,
            shut_down: false,
        }
    }

    /// Keep running after the last surface closes.
    pub fn with_stay_resident(mut self, stay_resident: bool) -> Self {
        self.stay_resident = stay_resident;
        self
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    pub fn presenter(&self) -> &Presenter<S> {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut Presenter<S> {
        &mut self.presenter
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Apply one event.
    pub fn dispatch(&mut self, event: AppEvent) -> Flow {
        if self.shut_down {
            debug!(?event, "event after shutdown ignored");
            return Flow::Exit;
        }

        match event {
            AppEvent::TimerFired(handle) => self.on_timer(handle),
            AppEvent::SurfaceReady => self.presenter.on_ready(&self.queue),
            AppEvent::SurfaceClosed => self.presenter.on_surface_closed(&self.queue),
            AppEvent::CloseRequested => {
                self.presenter.on_close_requested(&self.queue);
            }
            AppEvent::Confirmed(id) => {
                // unknown ids are logged inside acknowledge
                let _ = self.acknowledge(id);
            }
            AppEvent::RulesLoaded(result) => {
                self.apply_rules(result);
            }
            AppEvent::Control(action) => return self.control(action),
            AppEvent::Lifecycle(event) => return self.lifecycle(event),
        }
        Flow::Continue
    }

    /// Install a load result and re-derive every timer from it.
    pub fn apply_rules(&mut self, result: Result<LoadedRules, LoadError>) -> ArmReport {
        let sound = self.rules.apply(result).settings.enable_sound;
        self.presenter.set_sound(sound);
        self.start()
    }

    /// (Re)arm timers for the current rule set.
    pub fn start(&mut self) -> ArmReport {
        self.scheduler.start(self.rules.current(), &mut self.timers)
    }

    /// Cancel every timer. Queued alerts stay queued.
    pub fn stop(&mut self) -> usize {
        self.scheduler.stop(&mut self.timers)
    }

    pub fn trigger_test_alert(&mut self) -> Alert {
        let now = self.timers.now();
        self.enqueue(
            DEFAULT_TITLE,
            format!("This is a test alert\nTime: {}", now.format("%Y-%m-%d %H:%M:%S")),
        )
    }

    /// Queue an alert and bring the surface up to date.
    pub fn enqueue(&mut self, title: impl Into<String>, message: impl Into<String>) -> Alert {
        let created_at = self.timers.now().with_timezone(&Utc);
        let alert = self.queue.enqueue(title, message, created_at);
        info!(id = %alert.id, title = %alert.title, pending = self.queue.len(), "alert queued");
        self.presenter.on_enqueued(&self.queue);
        alert
    }

    /// Remove one alert and bring the surface up to date.
    ///
    /// # Errors
    /// [`AcknowledgeError::UnknownAlert`]; nothing changes.
    pub fn acknowledge(&mut self, id: AlertId) -> Result<usize, AcknowledgeError> {
        match self.queue.acknowledge(id) {
            Ok(remaining) => {
                info!(%id, remaining, "alert acknowledged");
                self.presenter.on_acknowledged(&self.queue);
                Ok(remaining)
            }
            Err(e) => {
                warn!(error = %e, "acknowledgement ignored");
                Err(e)
            }
        }
    }

    /// Cancel timers, drop queued alerts and close the surface.
    ///
    /// Runs once; later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        let cancelled = self.scheduler.stop(&mut self.timers);
        let dropped = self.queue.len();
        self.queue.clear();
        self.presenter.shutdown();
        info!(cancelled, dropped, "shut down");
    }

    fn on_timer(&mut self, handle: TimerHandle) {
        if let Some(firing) = self.scheduler.on_timer(handle, &mut self.timers) {
            debug!(rule = %firing.rule_id, count = firing.count, "rule fired");
            self.enqueue(firing.title, firing.message);
        }
    }

    fn control(&mut self, action: ControlAction) -> Flow {
        info!(%action, "control action");
        match action {
            ControlAction::TestAlert => {
                self.trigger_test_alert();
            }
            ControlAction::Reload => return Flow::Reload,
            ControlAction::Start => {
                self.start();
            }
            ControlAction::Stop => {
                self.stop();
            }
            ControlAction::Quit => {
                self.shutdown();
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn lifecycle(&mut self, event: LifecycleEvent) -> Flow {
        match event {
            LifecycleEvent::AllSurfacesClosed if self.stay_resident => {
                info!("all surfaces closed, staying resident");
                Flow::Continue
            }
            LifecycleEvent::AllSurfacesClosed | LifecycleEvent::BeforeTerminate => {
                self.shutdown();
                Flow::Exit
            }
            LifecycleEvent::Fault(reason) => {
                error!(%reason, "fault, shutting down");
                self.shutdown();
                Flow::Exit
            }
        }
    }
}

impl<S: Surface> App<ManualTimers, S> {
    /// Move virtual time forward by `by`, dispatching every timer fire that
    /// falls due on the way. Returns the number of fires delivered.
    pub fn advance(&mut self, by: TimeDelta) -> usize {
        let until = self.timers.now() + by;
        let mut fired = 0;
        while let Some(handle) = self.timers.pop_due(until) {
            fired += 1;
            if self.dispatch(AppEvent::TimerFired(handle)) == Flow::Exit {
                break;
            }
        }
        self.timers.set_now(until);
        fired
    }
}

impl<T: Timers, S: Surface> Drop for App<T, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
