//! issues-001: propagate a parent issue's release version onto children
//! that have none.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::JiraApi;
use crate::error::{Error, Result};
use crate::rules::{FormatRule, RuleOutcome};

pub const RULE_KEY: &str = "issues-001";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RuleConfig {
    /// How far back in the updated history parents are considered.
    updated_history_depth: String,
    /// Whether the remote service notifies users about the edits.
    notify: bool,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            updated_history_depth: "-10d".to_string(),
            notify: false,
        }
    }
}

pub struct VersionPropagation {
    config: RuleConfig,
}

impl VersionPropagation {
    pub fn from_table(table: Option<&toml::Table>) -> Result<Self> {
        let config = match table {
            Some(table) => toml::Value::Table(table.clone())
                .try_into()
                .map_err(|e: toml::de::Error| Error::Rule {
                    rule: RULE_KEY.to_string(),
                    message: e.to_string(),
                })?,
            None => RuleConfig::default(),
        };
        Ok(Self { config })
    }
}

fn fix_versions(issue: &Value) -> &[Value] {
    issue
        .pointer("/fields/fixVersions")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn issue_key(issue: &Value) -> Option<&str> {
    issue.get("key").and_then(|v| v.as_str())
}

#[async_trait]
impl FormatRule for VersionPropagation {
    fn key(&self) -> &'static str {
        RULE_KEY
    }

    async fn run(&self, api: &dyn JiraApi) -> Result<RuleOutcome> {
        let jql = format!(
            "fixVersion != EMPTY and \
             issuetype in standardIssueTypes() and \
             updated >= {}",
            self.config.updated_history_depth
        );
        let parents = api.search_issues(&jql, None).await?;

        let mut outcome = RuleOutcome::default();
        for parent in &parents {
            let Some(parent_key) = issue_key(parent) else {
                log::warn!("search result issue without a key: {parent}");
                continue;
            };
            let versions = fix_versions(parent);
            let Some(version) = versions.first() else {
                // The query guarantees at least one; a parent without any is
                // a malformed payload, logged and skipped
                log::error!("issue {parent_key} matched fixVersion != EMPTY but has none");
                continue;
            };
            if versions.len() > 1 {
                log::warn!(
                    "issue {parent_key} has {} fix versions, propagating the first",
                    versions.len()
                );
            }
            let Some(version_id) = version.get("id").and_then(|v| v.as_str()) else {
                log::error!("issue {parent_key} fix version has no id: {version}");
                continue;
            };

            for child in api.issue_children(parent_key).await? {
                let Some(child_key) = issue_key(&child) else {
                    continue;
                };
                if !fix_versions(&child).is_empty() {
                    outcome.skipped += 1;
                    continue;
                }
                log::info!("Setting fix version of {child_key} to {version_id}");
                api.update_issue_fields(
                    child_key,
                    json!({ "fixVersions": [{ "id": version_id }] }),
                    self.config.notify,
                )
                .await?;
                outcome.applied += 1;
            }
        }
        Ok(outcome)
    }
}
