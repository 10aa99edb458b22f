//! FIFO queue of alerts waiting for acknowledgement.
//!
//! The queue is the single source of truth for what the alert surface must
//! show. Alerts leave it only through [`NotificationQueue::acknowledge`]
//! (or [`NotificationQueue::clear`] at shutdown).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::error::AcknowledgeError;

/// Alert identifier, monotonic within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlertId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(AlertId)
    }
}

/// One queued, user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NotificationQueue {
    alerts: VecDeque<Alert>,
    next_id: u64,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self {
            alerts: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Append a new alert at the tail.
    pub fn enqueue(&mut self, title: impl Into<String>, message: impl Into<String>, created_at: DateTime<Utc>) -> Alert {
        let alert = Alert {
            id: AlertId(self.next_id),
            title: title.into(),
            message: message.into(),
            created_at,
        };
        self.next_id += 1;
        self.alerts.push_back(alert.clone());
        alert
    }

    /// Remove the alert with `id` and return the remaining length.
    ///
    /// # Errors
    /// [`AcknowledgeError::UnknownAlert`] if no queued alert has this id;
    /// the queue is left untouched.
    pub fn acknowledge(&mut self, id: AlertId) -> Result<usize, AcknowledgeError> {
        match self.alerts.iter().position(|a| a.id == id) {
            Some(index) => {
                self.alerts.remove(index);
                Ok(self.alerts.len())
            }
            None => Err(AcknowledgeError::UnknownAlert {
                id,
                remaining: self.alerts.len(),
            }),
        }
    }

    /// Ordered snapshot, oldest first.
    pub fn peek_all(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }

    pub fn get(&self, id: AlertId) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    pub fn front(&self) -> Option<&Alert> {
        self.alerts.front()
    }

    /// Drop every alert. Ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.alerts.clear();
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}
