//! issues-007: auto-subscribe designated users to recently created issues
//! they are not yet watching.

use async_trait::async_trait;
use serde::Deserialize;

use crate::client::JiraApi;
use crate::error::{Error, Result};
use crate::rules::{FormatRule, RuleOutcome};

pub const RULE_KEY: &str = "issues-007";

#[derive(Debug, Clone, Deserialize)]
pub struct WatchRule {
    pub jira_user_id: String,
    /// Watch every issue instead of only recently created ones.
    #[serde(default)]
    pub watch_all: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RuleConfig {
    auto_watch_rules: Vec<WatchRule>,
}

pub struct AutoWatch {
    config: RuleConfig,
}

impl AutoWatch {
    pub fn from_table(table: &toml::Table) -> Result<Self> {
        let config = toml::Value::Table(table.clone())
            .try_into()
            .map_err(|e: toml::de::Error| Error::Rule {
                rule: RULE_KEY.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { config })
    }
}

#[async_trait]
impl FormatRule for AutoWatch {
    fn key(&self) -> &'static str {
        RULE_KEY
    }

    async fn run(&self, api: &dyn JiraApi) -> Result<RuleOutcome> {
        let mut outcome = RuleOutcome::default();
        for rule in &self.config.auto_watch_rules {
            let user = &rule.jira_user_id;
            let jql = if rule.watch_all {
                format!("watcher != '{user}'")
            } else {
                format!("created >= -180d and watcher != '{user}'")
            };
            for issue in api.search_issues(&jql, None).await? {
                let Some(key) = issue.get("key").and_then(|v| v.as_str()) else {
                    log::warn!("search result issue without a key: {issue}");
                    continue;
                };
                log::info!("auto watch issue {key} by {user}");
                api.add_watcher(key, user).await?;
                outcome.applied += 1;
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeJira;
    use serde_json::json;

    fn watcher(users: &[&str]) -> AutoWatch {
        let rules: Vec<WatchRule> = users
            .iter()
            .map(|u| WatchRule {
                jira_user_id: u.to_string(),
                watch_all: false,
            })
            .collect();
        AutoWatch {
            config: RuleConfig {
                auto_watch_rules: rules,
            },
        }
    }

    #[tokio::test]
    async fn test_adds_watchers_per_rule() {
        let mut fake = FakeJira::default();
        fake.search_results = vec![json!({ "key": "PROJ-1" }), json!({ "key": "PROJ-2" })];

        let outcome = watcher(&["u1", "u2"]).run(&fake).await.unwrap();
        assert_eq!(outcome.applied, 4);

        let added = fake.watchers_added.lock().unwrap();
        assert!(added.contains(&("PROJ-1".to_string(), "u1".to_string())));
        assert!(added.contains(&("PROJ-2".to_string(), "u2".to_string())));
    }

    #[tokio::test]
    async fn test_no_matching_issues_is_a_noop() {
        let fake = FakeJira::default();
        let outcome = watcher(&["u1"]).run(&fake).await.unwrap();
        assert_eq!(outcome, RuleOutcome::default());
        assert!(fake.watchers_added.lock().unwrap().is_empty());
    }

    #[test]
    fn test_from_table() {
        let table: toml::Table = toml::from_str(
            "auto_watch_rules = [\n\
               { jira_user_id = \"u1\" },\n\
               { jira_user_id = \"u2\", watch_all = true },\n\
             ]\n",
        )
        .unwrap();
        let rule = AutoWatch::from_table(&table).unwrap();
        assert_eq!(rule.config.auto_watch_rules.len(), 2);
        assert!(rule.config.auto_watch_rules[1].watch_all);
    }
}
