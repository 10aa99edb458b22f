//! TOML-based application configuration.
//!
//! Stores:
//! - Where rules come from (cache, bundled file, load policy)
//! - The remote task feed
//! - Alert surface capabilities
//! - Lifecycle and logging preferences
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::data_dir;
use crate::error::{ConfigError, CoreError};
use crate::presenter::SurfaceOptions;
use crate::rules::{parse_feed_url, HttpTaskFeed, LoadPolicy, RuleCache, RuleLoader};

/// Rule source configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Cache file; `<data_dir>/rules.json` when unset.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Default rule file tried when neither cache nor feed is usable.
    #[serde(default)]
    pub bundled_path: Option<PathBuf>,
    #[serde(default)]
    pub policy: LoadPolicy,
    /// Refresh the cache from the feed once it is older than this. 0 = never.
    #[serde(default)]
    pub stale_after_mins: u64,
}

/// Remote task feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Alert surface configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default = "default_true")]
    pub fullscreen: bool,
    #[serde(default = "default_true")]
    pub always_on_top: bool,
    #[serde(default = "default_true")]
    pub dismissal_locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Keep running after the last surface closes.
    #[serde(default)]
    pub stay_resident: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            fullscreen: true,
            always_on_top: true,
            dismissal_locked: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(ConfigError::UnknownKey(key.to_string()));
                    }
                    // optional values are cleared with an empty string
                    serde_json::Value::Null | serde_json::Value::String(_) if value.is_empty() => {
                        serde_json::Value::Null
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some(String::new()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    pub fn cache_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.rules.cache_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("rules.json")),
        }
    }

    pub fn stale_after(&self) -> Option<TimeDelta> {
        let mins = i64::try_from(self.rules.stale_after_mins).ok()?;
        (mins > 0).then(|| TimeDelta::minutes(mins))
    }

    /// Surface capabilities. Sound is enabled until rules say otherwise.
    pub fn surface_options(&self) -> SurfaceOptions {
        SurfaceOptions {
            fullscreen: self.surface.fullscreen,
            always_on_top: self.surface.always_on_top,
            dismissal_locked: self.surface.dismissal_locked,
            sound: true,
        }
    }

    /// Build the rule loader described by this config.
    ///
    /// # Errors
    /// Fails on an unparseable feed URL or when the HTTP client cannot be
    /// built.
    pub fn rule_loader(&self) -> Result<RuleLoader, CoreError> {
        let mut loader = RuleLoader::new(RuleCache::new(self.cache_path()?))
            .with_policy(self.rules.policy)
            .with_stale_after(self.stale_after());

        if let Some(bundled) = &self.rules.bundled_path {
            loader = loader.with_bundled(bundled);
        }
        if let Some(url) = self.feed.url.as_deref().filter(|u| !u.trim().is_empty()) {
            let source = parse_feed_url(url).map_err(crate::error::LoadError::from)?;
            let feed = HttpTaskFeed::new(Duration::from_secs(self.feed.timeout_secs.max(1)))
                .map_err(crate::error::LoadError::from)?;
            loader = loader.with_feed(Arc::new(feed), source);
        }
        Ok(loader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn empty_file_gets_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed.feed.timeout_secs, 10);
        assert!(parsed.surface.dismissal_locked);
        assert_eq!(parsed.logging.level, "info");
        assert_eq!(parsed.rules.policy, LoadPolicy::CacheFirst);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("surface.fullscreen").as_deref(), Some("true"));
        assert_eq!(cfg.get("feed.timeout_secs").as_deref(), Some("10"));
        assert_eq!(cfg.get("rules.policy").as_deref(), Some("cache-first"));
        assert_eq!(cfg.get("feed.url").as_deref(), Some(""));
        assert!(cfg.get("surface.missing_key").is_none());
    }

    #[test]
    fn apply_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.apply("surface.dismissal_locked", "false").unwrap();
        cfg.apply("feed.timeout_secs", "3").unwrap();
        cfg.apply("feed.url", "https://example.com/tasks").unwrap();
        cfg.apply("rules.policy", "always-refetch").unwrap();

        assert!(!cfg.surface.dismissal_locked);
        assert_eq!(cfg.feed.timeout_secs, 3);
        assert_eq!(cfg.feed.url.as_deref(), Some("https://example.com/tasks"));
        assert_eq!(cfg.rules.policy, LoadPolicy::AlwaysRefetch);

        cfg.apply("feed.url", "").unwrap();
        assert_eq!(cfg.feed.url, None);
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("surface.nonexistent_key", "value"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.apply("", "value"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(cfg.apply("surface", "value"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn apply_rejects_invalid_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("surface.fullscreen", "not_a_bool"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.apply("rules.policy", "sometimes"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.apply("lifecycle.stay_resident", "true").unwrap();
        changed.save_to(&path).unwrap();
        assert!(Config::load_from(&path).unwrap().lifecycle.stay_resident);
    }

    #[test]
    fn stale_after_zero_means_never() {
        let mut cfg = Config::default();
        assert_eq!(cfg.stale_after(), None);
        cfg.rules.stale_after_mins = 90;
        assert_eq!(cfg.stale_after(), Some(TimeDelta::minutes(90)));
    }

    #[test]
    fn rule_loader_rejects_bad_feed_url() {
        let mut cfg = Config::default();
        cfg.rules.cache_path = Some(PathBuf::from("rules.json"));
        cfg.feed.url = Some("not a url".into());
        assert!(matches!(
            cfg.rule_loader(),
            Err(CoreError::Load(crate::error::LoadError::Fetch(crate::error::FetchError::InvalidUrl { .. })))
        ));

        cfg.feed.url = Some("https://example.com/tasks.json".into());
        let loader = cfg.rule_loader().unwrap();
        assert_eq!(loader.feed_url().map(|u| u.as_str()), Some("https://example.com/tasks.json"));
    }
}
