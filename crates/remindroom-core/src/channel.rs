//! JSON-lines protocol between the coordinator and an out-of-process
//! surface. One message per line, tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::events::AppEvent;
use crate::queue::{Alert, AlertId};

/// Coordinator → surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Outbound {
    ShowNotifications { notifications: Vec<Alert> },
    CloseSurface,
}

/// Surface → coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Inbound {
    Ready,
    NotificationConfirmed { id: AlertId },
    CloseRequested,
    Closed,
}

impl From<Inbound> for AppEvent {
    fn from(message: Inbound) -> Self {
        match message {
            Inbound::Ready => AppEvent::SurfaceReady,
            Inbound::NotificationConfirmed { id } => AppEvent::Confirmed(id),
            Inbound::CloseRequested => AppEvent::CloseRequested,
            Inbound::Closed => AppEvent::SurfaceClosed,
        }
    }
}

/// Encode one message as a single line (no trailing newline).
pub fn encode(message: &Outbound) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

/// Decode one inbound line.
pub fn decode(line: &str) -> serde_json::Result<Inbound> {
    serde_json::from_str(line.trim())
}
