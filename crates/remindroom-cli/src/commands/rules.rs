use chrono::{DateTime, Local};
use clap::Subcommand;
use remindroom_core::rules::{starter_rules, CacheRecord, Plan, RuleCache};
use remindroom_core::{Config, ManualTimers, Rule, RuleSet, Scheduler, Settings, TimerKind};
use serde::Serialize;

#[derive(Subcommand)]
pub enum RulesAction {
    /// List the cached rules
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Preview when each rule fires next
    Next {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the starter rules (three daily reminders) to the cache
    Init {
        /// Overwrite an existing cache
        #[arg(long)]
        force: bool,
    },
    /// Refresh the cache from the configured feed
    Fetch,
    /// Print the rule cache path
    Path,
}

#[derive(Serialize)]
struct NextFire {
    rule_id: String,
    kind: TimerKind,
    next_fire: DateTime<Local>,
}

pub fn run(config: &Config, action: RulesAction) -> Result<(), Box<dyn std::error::Error>> {
    let cache = RuleCache::new(config.cache_path()?);

    match action {
        RulesAction::List { json } => {
            let Some(rules) = read_cache(&cache)? else {
                eprintln!("no rule cache at {} (try `remindroom rules init`)", cache.path().display());
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
                return Ok(());
            }
            println!("{:<24} {:<16} {:<8} TITLE", "ID", "TRIGGER", "ENABLED");
            for rule in &rules.rules {
                println!(
                    "{:<24} {:<16} {:<8} {}",
                    rule.id,
                    describe_trigger(rule, &rules.settings),
                    rule.enabled,
                    rule.display_title()
                );
            }
        }
        RulesAction::Next { json } => {
            let rules = read_cache(&cache)?.unwrap_or_else(RuleSet::builtin);
            let mut timers = ManualTimers::starting_at(Local::now());
            let mut scheduler = Scheduler::new();
            let report = scheduler.start(&rules, &mut timers);
            for skipped in &report.skipped {
                eprintln!("skipped: {skipped}");
            }

            let mut upcoming: Vec<NextFire> = scheduler
                .scheduled()
                .map(|t| NextFire {
                    rule_id: t.rule_id.clone(),
                    kind: t.kind,
                    next_fire: t.next_fire,
                })
                .collect();
            upcoming.sort_by_key(|n| n.next_fire);

            if json {
                println!("{}", serde_json::to_string_pretty(&upcoming)?);
                return Ok(());
            }
            if report.fallback {
                println!("no usable rules, the built-in fallback reminder would run");
            }
            let now = Local::now();
            for next in &upcoming {
                println!(
                    "{}  in {:<8} {} ({})",
                    next.next_fire.format("%Y-%m-%d %H:%M:%S"),
                    format_wait(next.next_fire - now),
                    next.rule_id,
                    match next.kind {
                        TimerKind::Daily => "daily",
                        TimerKind::Interval => "interval",
                    }
                );
            }
        }
        RulesAction::Init { force } => {
            if cache.exists() && !force {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    cache.path().display()
                )
                .into());
            }
            let record = cache.write(&starter_rules())?;
            println!("wrote {} rules to {}", record.rules.len(), cache.path().display());
        }
        RulesAction::Fetch => {
            let loader = config.rule_loader()?;
            let Some(url) = loader.feed_url().cloned() else {
                return Err("no feed configured (set feed.url)".into());
            };
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            let loaded = runtime.block_on(loader.refresh())?;
            println!(
                "fetched {} rules from {url} into {}",
                loaded.rules.rules.len(),
                cache.path().display()
            );
        }
        RulesAction::Path => println!("{}", cache.path().display()),
    }
    Ok(())
}

fn read_cache(cache: &RuleCache) -> Result<Option<RuleSet>, Box<dyn std::error::Error>> {
    Ok(cache.read()?.map(CacheRecord::into_rule_set))
}

fn describe_trigger(rule: &Rule, settings: &Settings) -> String {
    match rule.plan(settings) {
        Ok(Plan::Daily { hour, minute }) => format!("daily {hour:02}:{minute:02}"),
        Ok(Plan::Interval { seconds }) => format!("every {seconds}s"),
        Err(_) => "invalid".into(),
    }
}

fn format_wait(wait: chrono::TimeDelta) -> String {
    let secs = wait.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}
