use tracing::{info, warn};

use super::loader::{LoadedRules, RuleOrigin};
use super::model::RuleSet;
use crate::error::LoadError;

/// Holds the rule set currently in force.
///
/// Replaced wholesale on every completed load; never merged.
#[derive(Debug, Clone)]
pub struct RuleStore {
    current: RuleSet,
    origin: RuleOrigin,
}

impl RuleStore {
    /// A store holding the built-in set until the first load completes.
    pub fn new() -> Self {
        Self {
            current: RuleSet::builtin(),
            origin: RuleOrigin::BuiltIn,
        }
    }

    pub fn current(&self) -> &RuleSet {
        &self.current
    }

    pub fn origin(&self) -> RuleOrigin {
        self.origin
    }

    pub fn replace(&mut self, loaded: LoadedRules) {
        self.current = loaded.rules;
        self.origin = loaded.origin;
    }

    /// Install a load result. A failed load installs the built-in set.
    pub fn apply(&mut self, result: Result<LoadedRules, LoadError>) -> &RuleSet {
        match result {
            Ok(loaded) => {
                info!(origin = %loaded.origin, rules = loaded.rules.rules.len(), "rule set replaced");
                self.replace(loaded);
            }
            Err(e) => {
                warn!(error = %e, "no rule source available, using built-in rules");
                self.replace(LoadedRules {
                    rules: RuleSet::builtin(),
                    origin: RuleOrigin::BuiltIn,
                });
            }
        }
        &self.current
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::starter_rules;

    #[test]
    fn starts_with_builtin() {
        let store = RuleStore::new();
        assert_eq!(store.origin(), RuleOrigin::BuiltIn);
        assert!(store.current().rules.is_empty());
    }

    #[test]
    fn failed_load_replaces_with_builtin() {
        let mut store = RuleStore::new();
        store.apply(Ok(LoadedRules {
            rules: starter_rules(),
            origin: RuleOrigin::Cache,
        }));
        assert_eq!(store.current().rules.len(), 3);

        store.apply(Err(LoadError::Exhausted { attempts: vec![] }));
        assert_eq!(store.origin(), RuleOrigin::BuiltIn);
        assert_eq!(store.current(), &RuleSet::builtin());
    }
}
