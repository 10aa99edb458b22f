//! Rule resolution: cache, remote feed, bundled file, built-in.
//!
//! ## Resolution order
//!
//! | policy           | order                                          |
//! |------------------|------------------------------------------------|
//! | `cache-first`    | cache → remote → bundled                       |
//! | `always-refetch` | remote → bundled → cache                       |
//!
//! A result from the remote feed or the bundled file is persisted to the
//! cache. When every source fails the loader returns
//! [`LoadError::Exhausted`] and the caller installs the built-in set; the
//! cache is never overwritten with it.

use chrono::{TimeDelta, Utc};
use indoc::indoc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use super::cache::{CacheRecord, RuleCache};
use super::feed::{tasks_into_rules, TaskFeed};
use super::model::{Rule, RuleSet, Settings};
use crate::error::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadPolicy {
    /// Use a readable cache as-is; only consult other sources without one.
    #[default]
    CacheFirst,
    /// Always try the remote feed first; the cache is the last resort.
    AlwaysRefetch,
}

impl fmt::Display for LoadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadPolicy::CacheFirst => "cache-first",
            LoadPolicy::AlwaysRefetch => "always-refetch",
        })
    }
}

impl FromStr for LoadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cache-first" => Ok(LoadPolicy::CacheFirst),
            "always-refetch" => Ok(LoadPolicy::AlwaysRefetch),
            other => Err(format!(
                "unknown load policy '{other}' (expected cache-first or always-refetch)"
            )),
        }
    }
}

/// Where the current rule set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleOrigin {
    Cache,
    /// Cache older than the staleness window, used because a refresh failed.
    StaleCache,
    Remote,
    Bundled,
    BuiltIn,
}

impl fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleOrigin::Cache => "cache",
            RuleOrigin::StaleCache => "stale-cache",
            RuleOrigin::Remote => "remote",
            RuleOrigin::Bundled => "bundled",
            RuleOrigin::BuiltIn => "built-in",
        })
    }
}

/// A successfully resolved rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRules {
    pub rules: RuleSet,
    pub origin: RuleOrigin,
}

/// Walks the configured sources until one yields a rule set.
///
/// Cheap to clone; clones share the feed client.
#[derive(Clone)]
pub struct RuleLoader {
    cache: RuleCache,
    feed: Option<(Arc<dyn TaskFeed>, Url)>,
    bundled: Option<PathBuf>,
    policy: LoadPolicy,
    stale_after: Option<TimeDelta>,
}

impl RuleLoader {
    pub fn new(cache: RuleCache) -> Self {
        Self {
            cache,
            feed: None,
            bundled: None,
            policy: LoadPolicy::default(),
            stale_after: None,
        }
    }

    pub fn with_feed(mut self, feed: Arc<dyn TaskFeed>, source: Url) -> Self {
        self.feed = Some((feed, source));
        self
    }

    pub fn with_bundled(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundled = Some(path.into());
        self
    }

    pub fn with_policy(mut self, policy: LoadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Treat a cache older than `window` as stale. `None` disables the check.
    pub fn with_stale_after(mut self, window: Option<TimeDelta>) -> Self {
        self.stale_after = window;
        self
    }

    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }

    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    pub fn feed_url(&self) -> Option<&Url> {
        self.feed.as_ref().map(|(_, url)| url)
    }

    /// Resolve the rule set.
    ///
    /// # Errors
    /// [`LoadError::Exhausted`] when no source produced a rule set.
    pub async fn load(&self) -> Result<LoadedRules, LoadError> {
        let mut attempts = Vec::new();

        let loaded = match self.policy {
            LoadPolicy::CacheFirst => self.load_cache_first(&mut attempts).await,
            LoadPolicy::AlwaysRefetch => self.load_always_refetch(&mut attempts).await,
        };

        match loaded {
            Some(loaded) => {
                info!(
                    origin = %loaded.origin,
                    rules = loaded.rules.rules.len(),
                    enabled = loaded.rules.enabled_count(),
                    "rules loaded"
                );
                Ok(loaded)
            }
            None => Err(LoadError::Exhausted { attempts }),
        }
    }

    /// Fetch from the remote feed only and persist the result.
    ///
    /// Settings are kept from the current cache when it is readable.
    ///
    /// # Errors
    /// Any fetch or cache write failure; a missing feed reports
    /// [`LoadError::Exhausted`].
    pub async fn refresh(&self) -> Result<LoadedRules, LoadError> {
        let settings = self.cache.read().ok().flatten().map(|r| r.settings);
        let rules = self.fetch_remote(settings).await?.ok_or_else(|| LoadError::Exhausted {
            attempts: vec!["remote: no feed configured".into()],
        })?;
        self.cache.write(&rules)?;
        Ok(LoadedRules {
            rules,
            origin: RuleOrigin::Remote,
        })
    }

    async fn load_cache_first(&self, attempts: &mut Vec<String>) -> Option<LoadedRules> {
        match self.cache.read() {
            Ok(Some(record)) if self.is_stale(&record) && self.feed.is_some() => {
                warn!(path = %self.cache.path().display(), "rule cache is stale, refreshing");
                let settings = record.settings.clone();
                match self.fetch_remote(Some(settings)).await {
                    Ok(Some(rules)) => return Some(self.persist(rules, RuleOrigin::Remote)),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "refresh failed, keeping stale cache"),
                }
                return Some(LoadedRules {
                    rules: record.into_rule_set(),
                    origin: RuleOrigin::StaleCache,
                });
            }
            Ok(Some(record)) => {
                return Some(LoadedRules {
                    rules: record.into_rule_set(),
                    origin: RuleOrigin::Cache,
                })
            }
            Ok(None) => attempts.push("cache: not found".into()),
            Err(e) => {
                warn!(error = %e, "ignoring unusable rule cache");
                attempts.push(format!("cache: {e}"));
            }
        }
        self.load_sources(attempts, None).await
    }

    async fn load_always_refetch(&self, attempts: &mut Vec<String>) -> Option<LoadedRules> {
        let cached = match self.cache.read() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "ignoring unusable rule cache");
                attempts.push(format!("cache: {e}"));
                None
            }
        };
        let settings = cached.as_ref().map(|r| r.settings.clone());

        if let Some(loaded) = self.load_sources(attempts, settings).await {
            return Some(loaded);
        }
        match cached {
            Some(record) => Some(LoadedRules {
                rules: record.into_rule_set(),
                origin: RuleOrigin::Cache,
            }),
            None => {
                attempts.push("cache: not found".into());
                None
            }
        }
    }

    /// Remote feed, then bundled file. Persists whichever succeeds.
    async fn load_sources(&self, attempts: &mut Vec<String>, settings: Option<Settings>) -> Option<LoadedRules> {
        match self.fetch_remote(settings).await {
            Ok(Some(rules)) => return Some(self.persist(rules, RuleOrigin::Remote)),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "remote rule source failed");
                attempts.push(format!("remote: {e}"));
            }
        }

        if let Some(path) = &self.bundled {
            match read_bundled(path) {
                Ok(rules) => return Some(self.persist(rules, RuleOrigin::Bundled)),
                Err(e) => {
                    warn!(error = %e, "bundled rule source failed");
                    attempts.push(format!("bundled: {e}"));
                }
            }
        }
        None
    }

    /// `Ok(None)` when no feed is configured.
    async fn fetch_remote(&self, settings: Option<Settings>) -> Result<Option<RuleSet>, LoadError> {
        let Some((feed, url)) = &self.feed else {
            return Ok(None);
        };
        let tasks = feed.fetch(url).await?;
        Ok(Some(RuleSet::new(tasks_into_rules(tasks), settings.unwrap_or_default())))
    }

    fn persist(&self, rules: RuleSet, origin: RuleOrigin) -> LoadedRules {
        if let Err(e) = self.cache.write(&rules) {
            warn!(error = %e, "rules loaded but cache could not be updated");
        }
        LoadedRules { rules, origin }
    }

    fn is_stale(&self, record: &CacheRecord) -> bool {
        match (self.stale_after, record.last_update) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(window), Some(at)) => Utc::now() - at > window,
        }
    }
}

fn read_bundled(path: &Path) -> Result<RuleSet, LoadError> {
    let bundled_err = |message: String| LoadError::Bundled {
        path: path.to_path_buf(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| bundled_err(e.to_string()))?;
    let record: CacheRecord = serde_json::from_str(&content).map_err(|e| bundled_err(e.to_string()))?;
    Ok(record.into_rule_set())
}

/// Starter rules written by `rules init`: three daily reminders.
pub fn starter_rules() -> RuleSet {
    RuleSet::new(
        vec![
            Rule::daily(
                "morning_reminder",
                "Morning reminder",
                indoc! {"
                    A new day has started!
                    Check today's work plan."},
                9,
                0,
            ),
            Rule::daily(
                "lunch_break",
                "Lunch break",
                indoc! {"
                    Time for a break!
                    Remember to have lunch on time and stay healthy."},
                12,
                0,
            ),
            Rule::daily(
                "afternoon_reminder",
                "Afternoon reminder",
                indoc! {"
                    Keep going this afternoon!
                    Drink some water and rest your eyes."},
                15,
                0,
            ),
        ],
        Settings::default(),
    )
}
