//! Terminal alert surface.
//!
//! Text mode prints each snapshot as a numbered list. JSON mode writes the
//! presentation protocol (`show-notifications` / `close-surface`) one
//! message per line so another process can render it.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use remindroom_core::channel::{self, Outbound};
use remindroom_core::{Alert, AppEvent, EventSender, Surface, SurfaceError, SurfaceOptions};

/// Alerts currently on screen, shared with the stdin reader so `ack` and
/// `list` work without an id.
pub type Shown = Arc<Mutex<Vec<Alert>>>;

pub struct TerminalSurface {
    events: EventSender,
    json: bool,
    shown: Shown,
}

impl TerminalSurface {
    pub fn new(events: EventSender, json: bool) -> Self {
        Self {
            events,
            json,
            shown: Shown::default(),
        }
    }

    pub fn shown(&self) -> Shown {
        Arc::clone(&self.shown)
    }

    fn remember(&self, alerts: &[Alert]) {
        if let Ok(mut shown) = self.shown.lock() {
            *shown = alerts.to_vec();
        }
    }

    fn emit(&self, message: &Outbound) -> Result<(), SurfaceError> {
        let line = channel::encode(message).map_err(|e| SurfaceError::PushFailed(e.to_string()))?;
        let mut out = io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

/// Render a snapshot for humans.
pub fn render(alerts: &[Alert]) -> String {
    let mut text = format!("=== {} pending alert(s) ===\n", alerts.len());
    for alert in alerts {
        let local = alert.created_at.with_timezone(&chrono::Local);
        text.push_str(&format!("#{} {} ({})\n", alert.id, alert.title, local.format("%H:%M:%S")));
        for line in alert.message.lines() {
            text.push_str(&format!("    {line}\n"));
        }
    }
    text.push_str("type `ack` to acknowledge the oldest, `ack <id>` for a specific one\n");
    text
}

impl Surface for TerminalSurface {
    fn open(&mut self, options: &SurfaceOptions) -> Result<(), SurfaceError> {
        if !self.json && options.sound {
            // terminal bell
            print!("\x07");
        }
        self.events
            .send(AppEvent::SurfaceReady)
            .map_err(|e| SurfaceError::OpenFailed(e.to_string()))
    }

    fn show(&mut self, alerts: &[Alert]) -> Result<(), SurfaceError> {
        self.remember(alerts);
        if self.json {
            return self.emit(&Outbound::ShowNotifications {
                notifications: alerts.to_vec(),
            });
        }
        let mut out = io::stdout().lock();
        write!(out, "{}", render(alerts))?;
        out.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        self.remember(&[]);
        let result = if self.json {
            self.emit(&Outbound::CloseSurface)
        } else {
            let mut out = io::stdout().lock();
            writeln!(out, "=== alert surface closed ===").map_err(SurfaceError::from)
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to write close notice");
        }
    }
}
