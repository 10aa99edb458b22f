mod config;

pub use config::{Config, FeedConfig, LifecycleConfig, LoggingConfig, RulesConfig, SurfaceConfig};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `REMINDROOM_HOME` overrides the location entirely. Otherwise this is
/// `~/.config/remindroom[-dev]/`; set `REMINDROOM_ENV=dev` to use the
/// development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("REMINDROOM_HOME").filter(|v| !v.is_empty()) {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("REMINDROOM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("remindroom-dev")
            } else {
                base_dir.join("remindroom")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
