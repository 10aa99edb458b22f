//! Remote task feed.
//!
//! A feed is any HTTP endpoint answering `GET` with a JSON array of tasks,
//! or an object wrapping that array under `tasks`. Each task maps to zero
//! or more rules via [`RemoteTask::into_rules`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::model::{Rule, Trigger};
use crate::error::FetchError;

/// Source of remote tasks.
#[async_trait]
pub trait TaskFeed: Send + Sync {
    /// Retrieve the current task list from `source`.
    async fn fetch(&self, source: &Url) -> Result<Vec<RemoteTask>, FetchError>;
}

/// One task as published by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "description")]
    pub message: String,
    /// Daily wall-clock times, `HH:MM`.
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, alias = "interval", skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub completed: bool,
}

fn default_true() -> bool {
    true
}

impl RemoteTask {
    /// Rules for this task: one daily rule per time, one interval rule when
    /// an interval is set, nothing once the task is completed.
    ///
    /// Unparseable times still produce a rule (without trigger) so the
    /// scheduler reports them instead of silently dropping them.
    pub fn into_rules(self) -> Vec<Rule> {
        if self.completed {
            return Vec::new();
        }

        let mut times = self.times;
        if let Some(time) = self.time {
            times.push(time);
        }
        let single = times.len() == 1 && self.interval_seconds.is_none();

        let mut rules: Vec<Rule> = times
            .iter()
            .map(|time| {
                let trigger = Trigger::parse_daily(time);
                let id = match trigger {
                    _ if single => self.id.clone(),
                    Some(Trigger::Daily { hour, minute }) => format!("{}@{hour:02}:{minute:02}", self.id),
                    _ => format!("{}@{}", self.id, time.trim()),
                };
                Rule {
                    id,
                    title: self.title.clone(),
                    message: self.message.clone(),
                    enabled: self.enabled,
                    trigger,
                }
            })
            .collect();

        if let Some(seconds) = self.interval_seconds {
            rules.push(Rule {
                id: if rules.is_empty() {
                    self.id.clone()
                } else {
                    format!("{}#interval", self.id)
                },
                title: self.title.clone(),
                message: self.message.clone(),
                enabled: self.enabled,
                trigger: Some(Trigger::Interval { seconds: Some(seconds) }),
            });
        }
        rules
    }
}

/// Flatten a task list into rules, preserving feed order.
pub fn tasks_into_rules(tasks: Vec<RemoteTask>) -> Vec<Rule> {
    tasks.into_iter().flat_map(RemoteTask::into_rules).collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeedPayload {
    List(Vec<RemoteTask>),
    Wrapped { tasks: Vec<RemoteTask> },
}

impl FeedPayload {
    fn into_tasks(self) -> Vec<RemoteTask> {
        match self {
            FeedPayload::List(tasks) | FeedPayload::Wrapped { tasks } => tasks,
        }
    }
}

/// Plain HTTP `GET` feed.
#[derive(Debug, Clone)]
pub struct HttpTaskFeed {
    client: reqwest::Client,
}

impl HttpTaskFeed {
    /// # Errors
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("remindroom/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TaskFeed for HttpTaskFeed {
    async fn fetch(&self, source: &Url) -> Result<Vec<RemoteTask>, FetchError> {
        let response = self.client.get(source.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        let tasks = serde_json::from_str::<FeedPayload>(&body)?.into_tasks();
        debug!(url = %source, tasks = tasks.len(), "feed fetched");
        Ok(tasks)
    }
}

/// Parse a feed URL, mapping the error into [`FetchError::InvalidUrl`].
pub fn parse_feed_url(raw: &str) -> Result<Url, FetchError> {
    Url::parse(raw.trim()).map_err(|source| FetchError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(json: &str) -> RemoteTask {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn single_time_keeps_task_id() {
        let rules = task(r#"{"id":"standup","title":"Standup","times":["9:30"]}"#).into_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "standup");
        assert_eq!(rules[0].trigger, Some(Trigger::Daily { hour: 9, minute: 30 }));
        assert!(rules[0].enabled);
    }

    #[test]
    fn multiple_times_and_interval_get_suffixed_ids() {
        let rules = task(
            r#"{"id":"meds","message":"Take pills","times":["08:00","20:00"],"intervalSeconds":3600}"#,
        )
        .into_rules();
        let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["meds@08:00", "meds@20:00", "meds#interval"]);
        assert_eq!(rules[2].trigger, Some(Trigger::Interval { seconds: Some(3600) }));
    }

    #[test]
    fn interval_only_task_keeps_task_id() {
        let rules = task(r#"{"id":"water","interval":900}"#).into_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "water");
    }

    #[test]
    fn completed_task_yields_nothing() {
        let rules = task(r#"{"id":"done","times":["10:00"],"completed":true}"#).into_rules();
        assert!(rules.is_empty());
    }

    #[test]
    fn bad_time_is_kept_without_trigger() {
        let rules = task(r#"{"id":"x","times":["10:00","noon"]}"#).into_rules();
        assert_eq!(rules[1].id, "x@noon");
        assert_eq!(rules[1].trigger, None);
    }

    #[test]
    fn payload_accepts_array_and_wrapped_forms() {
        let list: FeedPayload = serde_json::from_str(r#"[{"id":"a"}]"#).unwrap();
        assert_eq!(list.into_tasks().len(), 1);
        let wrapped: FeedPayload = serde_json::from_str(r#"{"tasks":[{"id":"a"},{"id":"b"}]}"#).unwrap();
        assert_eq!(wrapped.into_tasks().len(), 2);
    }

    #[test]
    fn invalid_url_is_reported() {
        assert!(matches!(
            parse_feed_url("not a url"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(parse_feed_url("https://example.com/tasks.json").is_ok());
    }

    #[tokio::test]
    async fn http_feed_decodes_tasks() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tasks")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"tasks":[{"id":"a","times":["09:00"]}]}"#)
            .create_async()
            .await;

        let feed = HttpTaskFeed::new(Duration::from_secs(5)).unwrap();
        let url = parse_feed_url(&format!("{}/tasks", server.url())).unwrap();
        let tasks = feed.fetch(&url).await.unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "a");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_feed_reports_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/tasks").with_status(503).create_async().await;

        let feed = HttpTaskFeed::new(Duration::from_secs(5)).unwrap();
        let url = parse_feed_url(&format!("{}/tasks", server.url())).unwrap();
        let err = feed.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503 }));
    }

    #[tokio::test]
    async fn http_feed_reports_undecodable_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/tasks")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let feed = HttpTaskFeed::new(Duration::from_secs(5)).unwrap();
        let url = parse_feed_url(&format!("{}/tasks", server.url())).unwrap();
        let err = feed.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
