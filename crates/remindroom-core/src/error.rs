//! Core error types for remindroom-core.
//!
//! Every failure class of the reminder core has its own thiserror enum.
//! None of them is fatal in normal operation: load failures fall back to
//! the next rule source, malformed rules are skipped, unknown
//! acknowledgements are ignored and surface failures leave alerts queued.

use std::path::PathBuf;
use thiserror::Error;

use crate::queue::AlertId;

/// Core error type for remindroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Rule loading errors
    #[error("Rule load error: {0}")]
    Load(#[from] LoadError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Presentation surface errors
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

}

/// Errors raised while resolving the rule set.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Cache file exists but could not be read
    #[error("Failed to read rule cache at {path}: {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache file is not a valid rule record
    #[error("Rule cache at {path} is malformed: {source}")]
    CacheMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Cache file could not be written
    #[error("Failed to write rule cache at {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bundled default rule file unusable
    #[error("Bundled rules at {path} unusable: {message}")]
    Bundled { path: PathBuf, message: String },

    /// Remote feed failed
    #[error("Remote fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Every source in the fallback chain failed
    #[error("No rule source available ({})", .attempts.join("; "))]
    Exhausted { attempts: Vec<String> },
}

/// Remote task feed errors.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Feed URL could not be parsed
    #[error("Invalid feed URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Transport failure or timeout
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed answered with a non-success status
    #[error("Feed returned HTTP {status}")]
    Status { status: u16 },

    /// Feed body is not a task list
    #[error("Feed payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors for individual rules. The scheduler skips the rule and keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Rule has no id
    #[error("Rule at position {index} has no id")]
    MissingId { index: usize },

    /// Another rule already uses this id
    #[error("Duplicate rule id '{rule_id}'")]
    DuplicateId { rule_id: String },

    /// Rule has no usable trigger
    #[error("Rule '{rule_id}' has no trigger")]
    MissingTrigger { rule_id: String },

    /// Daily trigger outside 00:00..=23:59
    #[error("Rule '{rule_id}' has invalid time {hour:02}:{minute:02}")]
    InvalidTime {
        rule_id: String,
        hour: u32,
        minute: u32,
    },

    /// Interval resolves to zero seconds or exceeds the longest period
    #[error("Rule '{rule_id}' has no usable interval")]
    InvalidInterval { rule_id: String },
}

/// Acknowledgement errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcknowledgeError {
    /// No queued alert carries this id (already acknowledged, or never existed)
    #[error("Unknown alert {id} ({remaining} alerts still queued)")]
    UnknownAlert { id: AlertId, remaining: usize },
}

/// Presentation surface errors.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// Surface could not be created
    #[error("Failed to open alert surface: {0}")]
    OpenFailed(String),

    /// Snapshot could not be delivered
    #[error("Failed to push alerts to surface: {0}")]
    PushFailed(String),

    /// Underlying IO failure
    #[error("Surface IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Data directory could not be determined or created
    #[error("Failed to prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
