pub mod auto_watch;
pub mod version_propagation;

use async_trait::async_trait;

use crate::client::JiraApi;
use crate::config::Config;
use crate::error::Result;

pub use auto_watch::AutoWatch;
pub use version_propagation::VersionPropagation;

/// Outcome of one rule pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    /// Remote writes performed.
    pub applied: u64,
    /// Items examined and left alone.
    pub skipped: u64,
}

/// One idempotent formatting rule: a single read-then-conditionally-write
/// pass over the remote service. Rules depend only on the `JiraApi`
/// contract, never on the sync engine or the local store.
#[async_trait]
pub trait FormatRule: Send + Sync {
    fn key(&self) -> &'static str;

    async fn run(&self, api: &dyn JiraApi) -> Result<RuleOutcome>;
}

/// Build the rules enabled by the configuration. Version propagation is
/// always on (its config table only tunes it); auto-watch requires
/// configured watch rules.
pub fn configured_rules(config: &Config) -> Result<Vec<Box<dyn FormatRule>>> {
    let mut rules: Vec<Box<dyn FormatRule>> = vec![Box::new(VersionPropagation::from_table(
        config.rule_table(version_propagation::RULE_KEY),
    )?)];
    if let Some(table) = config.rule_table(auto_watch::RULE_KEY) {
        rules.push(Box::new(AutoWatch::from_table(table)?));
    }
    Ok(rules)
}

/// Run each rule in order, stopping at the first failure.
pub async fn run_rules(api: &dyn JiraApi, rules: &[Box<dyn FormatRule>]) -> Result<()> {
    for rule in rules {
        log::info!("Running formatter rule {}", rule.key());
        let outcome = rule.run(api).await?;
        log::info!(
            "Rule {} applied {} changes ({} items untouched)",
            rule.key(),
            outcome.applied,
            outcome.skipped
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_rules() {
        let config = Config::parse("company = \"acme\"").unwrap();
        let rules = configured_rules(&config).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].key(), "issues-001");

        let config = Config::parse(
            "company = \"acme\"\n\
             [issues-007-watch]\n\
             auto_watch_rules = [{ jira_user_id = \"u1\" }]\n",
        )
        .unwrap();
        let rules = configured_rules(&config).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].key(), "issues-007");
    }
}
