//! Rule, trigger and settings types.
//!
//! A rule with a missing or out-of-range trigger survives loading and is
//! written back as it was read. A trigger that cannot be parsed at all is
//! read as no trigger and is dropped on the next cache write. Validation
//! happens when the scheduler arms the rule, so one bad entry never takes
//! the rest of the file down with it.

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::timer::TimerKind;

/// Title used when a rule does not carry one.
pub const DEFAULT_TITLE: &str = "Reminder";

/// Token in a rule message replaced by the firing counter of interval rules.
pub const COUNT_PLACEHOLDER: &str = "{count}";

/// Interval used when neither the rule nor the settings provide one.
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// Longest accepted interval period, one hundred years.
pub const MAX_INTERVAL_SECS: u64 = 36_500 * 24 * 60 * 60;

/// When a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    /// Every day at `hour:minute` local wall-clock time.
    Daily { hour: u32, minute: u32 },
    /// Every `seconds`; unset or zero means `Settings::default_interval_seconds`.
    Interval {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seconds: Option<u64>,
    },
}

impl Trigger {
    /// Parse a `HH:MM` wall-clock time into a daily trigger.
    ///
    /// Range is not checked here; `Daily { hour: 25, .. }` is a valid parse
    /// that the scheduler later rejects.
    pub fn parse_daily(time: &str) -> Option<Self> {
        let (hour, minute) = time.trim().split_once(':')?;
        Some(Trigger::Daily {
            hour: hour.trim().parse().ok()?,
            minute: minute.trim().parse().ok()?,
        })
    }

    pub fn kind(&self) -> TimerKind {
        match self {
            Trigger::Daily { .. } => TimerKind::Daily,
            Trigger::Interval { .. } => TimerKind::Interval,
        }
    }
}

/// A validated trigger, ready to arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Daily { hour: u32, minute: u32 },
    Interval { seconds: u64 },
}

/// One configured notification source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RuleRecord", into = "RuleRecord")]
pub struct Rule {
    pub id: String,
    pub title: Option<String>,
    pub message: String,
    pub enabled: bool,
    pub trigger: Option<Trigger>,
}

impl Rule {
    pub fn daily(id: impl Into<String>, title: impl Into<String>, message: impl Into<String>, hour: u32, minute: u32) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            message: message.into(),
            enabled: true,
            trigger: Some(Trigger::Daily { hour, minute }),
        }
    }

    pub fn interval(id: impl Into<String>, title: impl Into<String>, message: impl Into<String>, seconds: Option<u64>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            message: message.into(),
            enabled: true,
            trigger: Some(Trigger::Interval { seconds }),
        }
    }

    /// The built-in periodic rule armed when no configured rule is usable.
    pub fn fallback() -> Self {
        Self {
            id: "builtin-fallback".into(),
            title: None,
            message: "Scheduled reminder #{count}\n\nPlease take care of pending items.".into(),
            enabled: true,
            trigger: Some(Trigger::Interval {
                seconds: Some(DEFAULT_INTERVAL_SECS),
            }),
        }
    }

    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TITLE)
    }

    /// Message with `{count}` replaced by the firing counter.
    pub fn render_message(&self, count: u64) -> String {
        self.message.replace(COUNT_PLACEHOLDER, &count.to_string())
    }

    /// Validate the trigger against the settings.
    ///
    /// # Errors
    /// Returns a [`ScheduleError`] when the trigger is missing, the daily
    /// time is out of range, or no interval between one second and
    /// [`MAX_INTERVAL_SECS`] can be resolved.
    pub fn plan(&self, settings: &Settings) -> Result<Plan, ScheduleError> {
        match self.trigger {
            None => Err(ScheduleError::MissingTrigger {
                rule_id: self.id.clone(),
            }),
            Some(Trigger::Daily { hour, minute }) => {
                if hour > 23 || minute > 59 {
                    return Err(ScheduleError::InvalidTime {
                        rule_id: self.id.clone(),
                        hour,
                        minute,
                    });
                }
                Ok(Plan::Daily { hour, minute })
            }
            Some(Trigger::Interval { seconds }) => {
                let seconds = seconds
                    .filter(|s| *s > 0)
                    .unwrap_or(settings.default_interval_seconds);
                if seconds == 0 || seconds > MAX_INTERVAL_SECS {
                    return Err(ScheduleError::InvalidInterval {
                        rule_id: self.id.clone(),
                    });
                }
                Ok(Plan::Interval { seconds })
            }
        }
    }
}

/// On-disk shape of a rule.
///
/// Accepts both the current `trigger` object and the older flat fields
/// (`time: "HH:MM"`, `repeat: "daily" | "interval"`, `interval`). An
/// unparseable trigger becomes `None` instead of failing the whole file.
#[derive(Serialize, Deserialize)]
struct RuleRecord {
    #[serde(default)]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trigger: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    time: Option<String>,
    #[serde(default, skip_serializing)]
    repeat: Option<String>,
    #[serde(default, skip_serializing)]
    interval: Option<u64>,
}

impl From<RuleRecord> for Rule {
    fn from(record: RuleRecord) -> Self {
        let trigger = match record.trigger {
            Some(value) => serde_json::from_value(value).ok(),
            None => match record.repeat.as_deref() {
                Some("interval") => Some(Trigger::Interval {
                    seconds: record.interval,
                }),
                Some("daily") | None => record.time.as_deref().and_then(Trigger::parse_daily),
                Some(_) => None,
            },
        };
        Self {
            id: record.id,
            title: record.title,
            message: record.message,
            enabled: record.enabled,
            trigger,
        }
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        Self {
            id: rule.id,
            title: rule.title,
            message: rule.message,
            enabled: rule.enabled,
            trigger: rule.trigger.and_then(|t| serde_json::to_value(t).ok()),
            time: None,
            repeat: None,
            interval: None,
        }
    }
}

/// Global defaults shared by all rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_interval_secs", alias = "defaultInterval")]
    pub default_interval_seconds: u64,
    /// Informational only; daily rules use the local clock.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_true")]
    pub enable_sound: bool,
    #[serde(default)]
    pub test_mode: bool,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_timezone() -> String {
    "Asia/Shanghai".into()
}
fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_interval_seconds: DEFAULT_INTERVAL_SECS,
            timezone: default_timezone(),
            enable_sound: true,
            test_mode: false,
        }
    }
}

impl Settings {
    /// Replace a zero default interval with [`DEFAULT_INTERVAL_SECS`].
    pub fn normalized(mut self) -> Self {
        if self.default_interval_seconds == 0 {
            self.default_interval_seconds = DEFAULT_INTERVAL_SECS;
        }
        self
    }
}

/// The complete set of rules plus global settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub settings: Settings,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, settings: Settings) -> Self {
        Self {
            rules,
            settings: settings.normalized(),
        }
    }

    /// Hard-coded set used when every source fails. Holds no rules, so the
    /// scheduler arms its fallback rule. Never written to the cache.
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn enabled_count(&self) -> usize {
        self.rules.iter().filter(|r| r.enabled).count()
    }
}
