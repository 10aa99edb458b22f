//! # Remindroom Core Library
//!
//! This library provides the scheduling and notification-queue core of the
//! Remindroom desktop reminder. Every operation is available to the
//! standalone CLI binary; any graphical shell is a thin layer over the same
//! core.
//!
//! ## Architecture
//!
//! - **Rules**: rule model plus the cache → remote feed → bundled file →
//!   built-in fallback chain that resolves them
//! - **Scheduler**: turns rules into one-shot (daily) and periodic
//!   (interval) timers and re-arms them as they fire
//! - **Queue**: FIFO of alerts waiting for acknowledgement
//! - **Presenter**: owns the single alert surface and keeps it in step with
//!   the queue
//! - **App / Runtime**: the context object that owns all state, and the
//!   single-task event loop feeding it
//!
//! Time is abstracted behind [`Timers`]: [`TokioTimers`] in production,
//! [`ManualTimers`] for deterministic tests and previews.
//!
//! ## Key Components
//!
//! - [`App`]: event dispatch over all mutable state
//! - [`Scheduler`]: rule → timer lifecycle
//! - [`NotificationQueue`]: pending alerts
//! - [`Presenter`]: alert surface state machine
//! - [`RuleLoader`]: rule resolution
//! - [`Config`]: application configuration management

pub mod app;
pub mod channel;
pub mod error;
pub mod events;
pub mod presenter;
pub mod queue;
pub mod rules;
pub mod runtime;
pub mod scheduler;
pub mod storage;
pub mod timer;

pub use app::App;
pub use error::{AcknowledgeError, ConfigError, CoreError, FetchError, LoadError, ScheduleError, SurfaceError};
pub use events::{event_channel, AppEvent, ControlAction, EventReceiver, EventSender, Flow, LifecycleEvent};
pub use presenter::{Presenter, Surface, SurfaceOptions, SurfaceState};
pub use queue::{Alert, AlertId, NotificationQueue};
pub use rules::{LoadPolicy, LoadedRules, Rule, RuleLoader, RuleOrigin, RuleSet, RuleStore, Settings, Trigger};
pub use runtime::Runtime;
pub use scheduler::{ArmReport, Firing, ScheduledTimer, Scheduler};
pub use storage::{data_dir, Config};
pub use timer::{ManualTimers, TimerHandle, TimerKind, Timers, TokioTimers};
