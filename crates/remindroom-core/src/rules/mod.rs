//! Notification rules: model, on-disk cache, remote feed and the loader
//! that walks the fallback chain between them.

mod cache;
mod feed;
mod loader;
mod model;
mod store;

pub use cache::{CacheRecord, RuleCache};
pub use feed::{parse_feed_url, tasks_into_rules, HttpTaskFeed, RemoteTask, TaskFeed};
pub use loader::{starter_rules, LoadPolicy, LoadedRules, RuleLoader, RuleOrigin};
pub use model::{Plan, Rule, RuleSet, Settings, Trigger, COUNT_PLACEHOLDER, DEFAULT_INTERVAL_SECS, DEFAULT_TITLE, MAX_INTERVAL_SECS};
pub use store::RuleStore;
