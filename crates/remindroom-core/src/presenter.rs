//! Presentation coordinator.
//!
//! Owns the lifecycle of the single alert surface and keeps it in step with
//! the [`NotificationQueue`]. The surface itself is behind the [`Surface`]
//! trait; the coordinator only decides when to open, push and close.
//!
//! ```text
//!            enqueue               ready
//!   Absent ──────────▶ Opening ──────────▶ Showing
//!     ▲                   │ ready or ack         │ ack (queue empty)
//!     │                   │ (queue empty)        │
//!     └───────────────────┴──────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::SurfaceError;
use crate::queue::{Alert, NotificationQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceState {
    Absent,
    /// Created, waiting for the surface to report ready.
    Opening,
    Showing,
}

/// Capabilities requested when the surface is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceOptions {
    pub fullscreen: bool,
    pub always_on_top: bool,
    /// The surface must not close itself; only the coordinator closes it.
    pub dismissal_locked: bool,
    pub sound: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            fullscreen: true,
            always_on_top: true,
            dismissal_locked: true,
            sound: true,
        }
    }
}

/// A place alerts are shown.
///
/// `open` only starts creation. Every successful `open` must be followed by
/// either `AppEvent::SurfaceReady` or `AppEvent::SurfaceClosed`; until one
/// arrives the coordinator holds new alerts for the ready push.
pub trait Surface {
    fn open(&mut self, options: &SurfaceOptions) -> Result<(), SurfaceError>;
    /// Replace whatever is shown with `alerts`, oldest first.
    fn show(&mut self, alerts: &[Alert]) -> Result<(), SurfaceError>;
    fn close(&mut self);
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn open(&mut self, options: &SurfaceOptions) -> Result<(), SurfaceError> {
        (**self).open(options)
    }

    fn show(&mut self, alerts: &[Alert]) -> Result<(), SurfaceError> {
        (**self).show(alerts)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Debug)]
pub struct Presenter<S> {
    surface: S,
    state: SurfaceState,
    options: SurfaceOptions,
}

impl<S: Surface> Presenter<S> {
    pub fn new(surface: S, options: SurfaceOptions) -> Self {
        Self {
            surface,
            state: SurfaceState::Absent,
            options,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    /// Forwarded to the surface the next time it opens.
    pub fn set_sound(&mut self, sound: bool) {
        self.options.sound = sound;
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// An alert was appended to the queue.
    pub fn on_enqueued(&mut self, queue: &NotificationQueue) {
        match self.state {
            SurfaceState::Absent => self.open(),
            // the ready push carries the whole queue
            SurfaceState::Opening => {}
            SurfaceState::Showing => self.push(queue),
        }
    }

    /// The surface finished opening.
    pub fn on_ready(&mut self, queue: &NotificationQueue) {
        match self.state {
            SurfaceState::Opening | SurfaceState::Showing => {
                self.state = SurfaceState::Showing;
                if queue.is_empty() {
                    self.close();
                } else {
                    self.push(queue);
                }
            }
            SurfaceState::Absent => debug!("ready from a surface that is not open, ignoring"),
        }
    }

    /// An alert was removed from the queue.
    pub fn on_acknowledged(&mut self, queue: &NotificationQueue) {
        match self.state {
            SurfaceState::Absent => {}
            SurfaceState::Opening if queue.is_empty() => self.close(),
            SurfaceState::Opening => {}
            SurfaceState::Showing if queue.is_empty() => self.close(),
            SurfaceState::Showing => self.push(queue),
        }
    }

    /// The user asked to close the surface. Returns whether it was closed.
    pub fn on_close_requested(&mut self, queue: &NotificationQueue) -> bool {
        if self.state == SurfaceState::Absent {
            return false;
        }
        if self.options.dismissal_locked && !queue.is_empty() {
            warn!(pending = queue.len(), "close request ignored, alerts must be acknowledged");
            return false;
        }
        self.close();
        true
    }

    /// The surface went away without the coordinator closing it.
    pub fn on_surface_closed(&mut self, queue: &NotificationQueue) {
        if self.state == SurfaceState::Absent {
            return;
        }
        self.state = SurfaceState::Absent;
        if !queue.is_empty() {
            warn!(pending = queue.len(), "alert surface lost, reopening");
            self.open();
        }
    }

    /// Close the surface if it is up.
    pub fn shutdown(&mut self) {
        if self.state != SurfaceState::Absent {
            self.close();
        }
    }

    fn open(&mut self) {
        match self.surface.open(&self.options) {
            Ok(()) => {
                self.state = SurfaceState::Opening;
                info!("alert surface opening");
            }
            Err(e) => {
                self.state = SurfaceState::Absent;
                error!(error = %e, "alert surface could not be opened, alerts stay queued");
            }
        }
    }

    fn push(&mut self, queue: &NotificationQueue) {
        let snapshot = queue.peek_all();
        match self.surface.show(&snapshot) {
            Ok(()) => debug!(alerts = snapshot.len(), "snapshot pushed"),
            Err(e) => error!(error = %e, "failed to push alerts to surface"),
        }
    }

    fn close(&mut self) {
        self.surface.close();
        self.state = SurfaceState::Absent;
        info!("alert surface closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[derive(Debug, Default)]
    struct Recorder {
        opens: usize,
        closes: usize,
        pushes: Vec<Vec<String>>,
        fail_open: bool,
    }

    impl Surface for Recorder {
        fn open(&mut self, _options: &SurfaceOptions) -> Result<(), SurfaceError> {
            if self.fail_open {
                return Err(SurfaceError::OpenFailed("no display".into()));
            }
            self.opens += 1;
            Ok(())
        }

        fn show(&mut self, alerts: &[Alert]) -> Result<(), SurfaceError> {
            self.pushes.push(alerts.iter().map(|a| a.title.clone()).collect());
            Ok(())
        }

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    fn presenter() -> Presenter<Recorder> {
        Presenter::new(Recorder::default(), SurfaceOptions::default())
    }

    #[test]
    fn burst_during_opening_is_shown_in_one_push() {
        let mut p = presenter();
        let mut q = NotificationQueue::new();
        for title in ["a", "b", "c"] {
            q.enqueue(title, "", Utc::now());
            p.on_enqueued(&q);
        }
        assert_eq!(p.state(), SurfaceState::Opening);
        assert_eq!(p.surface().opens, 1);
        assert!(p.surface().pushes.is_empty());

        p.on_ready(&q);
        assert_eq!(p.state(), SurfaceState::Showing);
        assert_eq!(p.surface().pushes, vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn acknowledging_last_alert_closes() {
        let mut p = presenter();
        let mut q = NotificationQueue::new();
        let a = q.enqueue("a", "", Utc::now());
        let b = q.enqueue("b", "", Utc::now());
        p.on_enqueued(&q);
        p.on_ready(&q);

        q.acknowledge(a.id).unwrap();
        p.on_acknowledged(&q);
        assert_eq!(p.surface().pushes.last().unwrap(), &vec!["b".to_string()]);

        q.acknowledge(b.id).unwrap();
        p.on_acknowledged(&q);
        assert_eq!(p.state(), SurfaceState::Absent);
        assert_eq!(p.surface().closes, 1);
    }

    #[test]
    fn acknowledging_everything_while_opening_closes() {
        let mut p = presenter();
        let mut q = NotificationQueue::new();
        let a = q.enqueue("a", "", Utc::now());
        let b = q.enqueue("b", "", Utc::now());
        p.on_enqueued(&q);

        q.acknowledge(a.id).unwrap();
        p.on_acknowledged(&q);
        assert_eq!(p.state(), SurfaceState::Opening);
        assert_eq!(p.surface().closes, 0);

        q.acknowledge(b.id).unwrap();
        p.on_acknowledged(&q);
        assert_eq!(p.state(), SurfaceState::Absent);
        assert_eq!(p.surface().closes, 1);

        // a late ready from the discarded surface changes nothing
        p.on_ready(&q);
        assert_eq!(p.state(), SurfaceState::Absent);
        assert!(p.surface().pushes.is_empty());
    }

    #[test]
    fn ready_with_empty_queue_closes() {
        let mut p = presenter();
        let mut q = NotificationQueue::new();
        q.enqueue("a", "", Utc::now());
        p.on_enqueued(&q);
        q.clear();
        p.on_ready(&q);
        assert_eq!(p.state(), SurfaceState::Absent);
        assert!(p.surface().pushes.is_empty());
    }

    #[test]
    fn close_request_ignored_while_locked() {
        let mut p = presenter();
        let mut q = NotificationQueue::new();
        q.enqueue("a", "", Utc::now());
        p.on_enqueued(&q);
        p.on_ready(&q);

        assert!(!p.on_close_requested(&q));
        assert_eq!(p.state(), SurfaceState::Showing);
        assert_eq!(p.surface().closes, 0);
    }

    #[test]
    fn unlocked_close_is_honored_and_not_reopened() {
        let options = SurfaceOptions {
            dismissal_locked: false,
            ..SurfaceOptions::default()
        };
        let mut p = Presenter::new(Recorder::default(), options);
        let mut q = NotificationQueue::new();
        q.enqueue("a", "", Utc::now());
        p.on_enqueued(&q);
        p.on_ready(&q);

        assert!(p.on_close_requested(&q));
        p.on_surface_closed(&q);
        assert_eq!(p.state(), SurfaceState::Absent);
        assert_eq!(p.surface().opens, 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn lost_surface_reopens_when_alerts_pending() {
        let mut p = presenter();
        let mut q = NotificationQueue::new();
        q.enqueue("a", "", Utc::now());
        p.on_enqueued(&q);
        p.on_ready(&q);

        p.on_surface_closed(&q);
        assert_eq!(p.state(), SurfaceState::Opening);
        assert_eq!(p.surface().opens, 2);
    }

    #[test]
    fn open_failure_keeps_alerts_and_retries() {
        let mut p = Presenter::new(
            Recorder {
                fail_open: true,
                ..Recorder::default()
            },
            SurfaceOptions::default(),
        );
        let mut q = NotificationQueue::new();
        q.enqueue("a", "", Utc::now());
        p.on_enqueued(&q);
        assert_eq!(p.state(), SurfaceState::Absent);

        p.surface_mut().fail_open = false;
        q.enqueue("b", "", Utc::now());
        p.on_enqueued(&q);
        assert_eq!(p.state(), SurfaceState::Opening);
        p.on_ready(&q);
        assert_eq!(p.surface().pushes, vec![vec!["a", "b"]]);
    }
}
