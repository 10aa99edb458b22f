//! On-disk rule cache.
//!
//! A single pretty-printed JSON file holding `{ rules, settings, lastUpdate }`.
//! The older `{ notifications, settings }` layout is accepted on read and
//! rewritten in the current layout on the next write.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use super::model::{Rule, RuleSet, Settings};
use crate::error::LoadError;

/// Contents of the cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    #[serde(default, alias = "notifications")]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_update: Option<DateTime<Utc>>,
}

impl CacheRecord {
    pub fn new(rules: &RuleSet, last_update: DateTime<Utc>) -> Self {
        Self {
            rules: rules.rules.clone(),
            settings: rules.settings.clone(),
            last_update: Some(last_update),
        }
    }

    pub fn into_rule_set(self) -> RuleSet {
        RuleSet::new(self.rules, self.settings)
    }
}

/// Accepts RFC 3339 strings and epoch milliseconds; anything else reads as
/// "unknown" rather than invalidating the whole cache.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    })
}

#[derive(Debug, Clone)]
pub struct RuleCache {
    path: PathBuf,
}

impl RuleCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the cache.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// [`LoadError::CacheRead`] on IO failure, [`LoadError::CacheMalformed`]
    /// when the content is not a cache record.
    pub fn read(&self) -> Result<Option<CacheRecord>, LoadError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LoadError::CacheRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let record = serde_json::from_str(&content).map_err(|source| LoadError::CacheMalformed {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(record))
    }

    /// Persist `rules`, stamped with the current time.
    ///
    /// # Errors
    /// [`LoadError::CacheWrite`] if the directory or file cannot be written.
    pub fn write(&self, rules: &RuleSet) -> Result<CacheRecord, LoadError> {
        let record = CacheRecord::new(rules, Utc::now());
        self.write_record(&record)?;
        Ok(record)
    }

    /// Write a record verbatim. The file is replaced atomically.
    pub fn write_record(&self, record: &CacheRecord) -> Result<(), LoadError> {
        let write_err = |source: io::Error| LoadError::CacheWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(record).map_err(|e| write_err(io::Error::other(e)))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;

        info!(path = %self.path.display(), rules = record.rules.len(), "rule cache written");
        Ok(())
    }
}
