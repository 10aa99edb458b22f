//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use remindroom_core::{Alert, App, ManualTimers, Surface, SurfaceError, SurfaceOptions};

/// Surface that records what it was asked to do. Ready is delivered by the
/// test through `AppEvent::SurfaceReady`.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub opens: usize,
    pub closes: usize,
    pub snapshots: Vec<Vec<Alert>>,
    pub last_options: Option<SurfaceOptions>,
}

impl RecordingSurface {
    pub fn last_titles(&self) -> Vec<String> {
        self.snapshots
            .last()
            .map(|s| s.iter().map(|a| a.title.clone()).collect())
            .unwrap_or_default()
    }
}

impl Surface for RecordingSurface {
    fn open(&mut self, options: &SurfaceOptions) -> Result<(), SurfaceError> {
        self.opens += 1;
        self.last_options = Some(*options);
        Ok(())
    }

    fn show(&mut self, alerts: &[Alert]) -> Result<(), SurfaceError> {
        self.snapshots.push(alerts.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// Virtual clock at 2024-01-15 `hour:minute` local time.
pub fn timers_at(hour: u32, minute: u32) -> ManualTimers {
    let naive = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap();
    ManualTimers::at_local(naive).unwrap()
}

pub fn app_at(hour: u32, minute: u32) -> App<ManualTimers, RecordingSurface> {
    App::new(timers_at(hour, minute), RecordingSurface::default(), SurfaceOptions::default())
}
