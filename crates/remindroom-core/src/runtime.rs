//! Event loop.
//!
//! Drives an [`App`] from a single task: every event (timer fires, surface
//! messages, control actions, finished loads, Ctrl-C) arrives through one
//! channel and is dispatched in arrival order. Rule loads run as spawned
//! tasks and report back with `AppEvent::RulesLoaded`; while one is in
//! flight the previous rule set keeps running and further reload requests
//! are coalesced into it.
//!
//! Meant for a `current_thread` tokio runtime.

use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::events::{AppEvent, EventReceiver, EventSender, Flow, LifecycleEvent};
use crate::presenter::Surface;
use crate::rules::RuleLoader;
use crate::timer::TokioTimers;

pub struct Runtime<S: Surface> {
    app: App<TokioTimers, S>,
    loader: RuleLoader,
    events: EventSender,
    receiver: EventReceiver,
    loading: bool,
}

impl<S: Surface> Runtime<S> {
    /// `events` must be the sending half of `receiver`; the app's timers
    /// and the surface post into it.
    pub fn new(app: App<TokioTimers, S>, loader: RuleLoader, events: EventSender, receiver: EventReceiver) -> Self {
        Self {
            app,
            loader,
            events,
            receiver,
            loading: false,
        }
    }

    pub fn app(&self) -> &App<TokioTimers, S> {
        &self.app
    }

    /// Load rules, arm them and process events until the app exits.
    ///
    /// A panic inside event handling shuts the app down before it
    /// propagates.
    pub async fn run(mut self) -> App<TokioTimers, S> {
        let initial = self.loader.load().await;
        self.dispatch_guarded(AppEvent::RulesLoaded(initial));

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut signal_armed = true;

        loop {
            let event = tokio::select! {
                event = self.receiver.recv() => match event {
                    Some(event) => event,
                    None => {
                        debug!("event channel closed");
                        break;
                    }
                },
                result = &mut ctrl_c, if signal_armed => {
                    signal_armed = false;
                    match result {
                        Ok(()) => {
                            info!("interrupt received");
                            AppEvent::Lifecycle(LifecycleEvent::BeforeTerminate)
                        }
                        Err(e) => {
                            warn!(error = %e, "could not listen for Ctrl-C");
                            continue;
                        }
                    }
                }
            };

            if matches!(event, AppEvent::RulesLoaded(_)) {
                self.loading = false;
            }
            match self.dispatch_guarded(event) {
                Flow::Continue => {}
                Flow::Reload => self.spawn_load(),
                Flow::Exit => break,
            }
        }

        self.app.shutdown();
        self.app
    }

    fn spawn_load(&mut self) {
        if self.loading {
            debug!("reload already in progress, coalescing");
            return;
        }
        self.loading = true;
        info!("reloading rules");

        let loader = self.loader.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = loader.load().await;
            if events.send(AppEvent::RulesLoaded(result)).is_err() {
                debug!("app gone before rule load finished");
            }
        });
    }

    fn dispatch_guarded(&mut self, event: AppEvent) -> Flow {
        let app = &mut self.app;
        match panic::catch_unwind(AssertUnwindSafe(|| app.dispatch(event))) {
            Ok(flow) => flow,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(%reason, "panic while handling event, shutting down");
                // best effort: shutdown itself may be what panicked
                let _ = panic::catch_unwind(AssertUnwindSafe(|| {
                    app.dispatch(AppEvent::Lifecycle(LifecycleEvent::Fault(reason)))
                }));
                panic::resume_unwind(payload)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurfaceError;
    use crate::events::{event_channel, ControlAction};
    use crate::presenter::SurfaceOptions;
    use crate::queue::Alert;
    use crate::rules::{starter_rules, RuleCache, RuleOrigin};
    use crate::timer::Timers;
    use std::sync::{Arc, Mutex};

    /// Records shown alerts and reports ready immediately.
    struct ChannelSurface {
        events: EventSender,
        shown: Arc<Mutex<Vec<usize>>>,
    }

    impl Surface for ChannelSurface {
        fn open(&mut self, _options: &SurfaceOptions) -> Result<(), SurfaceError> {
            self.events
                .send(AppEvent::SurfaceReady)
                .map_err(|e| SurfaceError::OpenFailed(e.to_string()))
        }
        fn show(&mut self, alerts: &[Alert]) -> Result<(), SurfaceError> {
            self.shown.lock().unwrap().push(alerts.len());
            Ok(())
        }
        fn close(&mut self) {}
    }

    fn runtime(dir: &std::path::Path) -> (Runtime<ChannelSurface>, EventSender, Arc<Mutex<Vec<usize>>>) {
        let (tx, rx) = event_channel();
        let shown = Arc::new(Mutex::new(Vec::new()));
        let surface = ChannelSurface {
            events: tx.clone(),
            shown: shown.clone(),
        };
        let app = App::new(TokioTimers::new(tx.clone()), surface, SurfaceOptions::default());
        let loader = RuleLoader::new(RuleCache::new(dir.join("rules.json")));
        (Runtime::new(app, loader, tx.clone(), rx), tx, shown)
    }

    #[tokio::test]
    async fn quit_stops_loop_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, tx, shown) = runtime(dir.path());

        tx.send(AppEvent::Control(ControlAction::TestAlert)).unwrap();
        tx.send(AppEvent::Control(ControlAction::Quit)).unwrap();
        let app = runtime.run().await;

        assert!(app.is_shut_down());
        assert_eq!(app.timers().live(), 0);
        assert!(app.queue().is_empty());
        // ready was queued behind quit, so nothing was pushed
        assert!(shown.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reload_picks_up_new_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, tx, _shown) = runtime(dir.path());
        let cache = RuleCache::new(dir.path().join("rules.json"));

        let handle = tokio::spawn(async move {
            let app = runtime.run().await;
            (app.rules().origin(), app.rules().current().rules.len())
        });
        tokio::task::yield_now().await;

        cache.write(&starter_rules()).unwrap();
        tx.send(AppEvent::Control(ControlAction::Reload)).unwrap();
        tx.send(AppEvent::Control(ControlAction::Reload)).unwrap();
        // give the spawned load a chance to complete
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        tx.send(AppEvent::Control(ControlAction::Quit)).unwrap();

        let (origin, rules) = handle.await.unwrap();
        assert_eq!(origin, RuleOrigin::Cache);
        assert_eq!(rules, 3);
    }
}
