use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;

use crate::error::LoadError;
use crate::queue::AlertId;
use crate::rules::LoadedRules;
use crate::timer::TimerHandle;

/// Everything that can happen to the app.
///
/// Events are delivered one at a time to `App::dispatch`, in the order they
/// were posted. Producers (timer tasks, the surface, the control surface,
/// load tasks, signal handlers) only ever send; they never touch state.
#[derive(Debug)]
pub enum AppEvent {
    /// An armed timer elapsed.
    TimerFired(TimerHandle),
    /// The surface finished opening and can receive snapshots.
    SurfaceReady,
    /// The surface went away without being asked to.
    SurfaceClosed,
    /// The user tried to close the surface.
    CloseRequested,
    /// The user acknowledged one alert.
    Confirmed(AlertId),
    /// A background rule load completed.
    RulesLoaded(Result<LoadedRules, LoadError>),
    Control(ControlAction),
    Lifecycle(LifecycleEvent),
}

/// Commands from the control surface (tray menu, terminal, scripts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlAction {
    TestAlert,
    Reload,
    Start,
    Stop,
    Quit,
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlAction::TestAlert => "test-alert",
            ControlAction::Reload => "reload",
            ControlAction::Start => "start",
            ControlAction::Stop => "stop",
            ControlAction::Quit => "quit",
        };
        f.write_str(name)
    }
}

impl FromStr for ControlAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" | "test-alert" => Ok(ControlAction::TestAlert),
            "reload" => Ok(ControlAction::Reload),
            "start" => Ok(ControlAction::Start),
            "stop" => Ok(ControlAction::Stop),
            "quit" | "exit" => Ok(ControlAction::Quit),
            other => Err(format!("unknown control action: {other}")),
        }
    }
}

/// Host application lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    AllSurfacesClosed,
    BeforeTerminate,
    /// Unrecoverable error somewhere in the host.
    Fault(String),
}

/// What the event loop should do after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Start a background rule load.
    Reload,
    Exit,
}

pub type EventSender = mpsc::UnboundedSender<AppEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<AppEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
