pub mod http;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;

pub use http::HttpJira;

/// One fetched remote item. The payload is stored verbatim; the sync engine
/// never interprets it beyond the existence checks the scan needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    pub id: u64,
    pub payload: Value,
}

/// Lightweight reference to an issue returned by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub id: u64,
    pub key: String,
}

/// An issue reported by the changed-since query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedIssue {
    pub id: u64,
    pub updated_at: DateTime<Utc>,
}

/// Capability contract for the remote Jira deployment.
///
/// The sync engine and the formatting rules depend only on this trait, never
/// on the concrete HTTP client, so an in-memory double can replace the live
/// service entirely. Authoritative absence (an id that does not exist) is
/// reported in-band — missing ids are absent from bulk results and single
/// fetches return `None` — while transport and auth failures are errors.
#[async_trait]
pub trait JiraApi: Send + Sync {
    /// Fetch worklog entries for an explicit id list. Ids with no entry are
    /// simply absent from the result.
    async fn worklogs_by_ids(&self, ids: &[u64]) -> Result<Vec<RemoteItem>>;

    /// Fetch one issue's full representation, or `None` when the id is not
    /// allocated (deleted or never created).
    async fn issue_by_id(&self, id: u64) -> Result<Option<RemoteItem>>;

    /// The single most recently created issue, if any.
    async fn most_recent_issue(&self) -> Result<Option<IssueRef>>;

    /// All issues modified after `since` (all issues when `None`), newest
    /// first. Entries whose modification timestamp cannot be read are
    /// logged and omitted.
    async fn issues_changed_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChangedIssue>>;

    /// Run a JQL search, returning full issue documents. `max_results` of
    /// `None` follows pagination to exhaustion.
    async fn search_issues(&self, jql: &str, max_results: Option<u32>) -> Result<Vec<Value>>;

    /// Direct children of the given issue.
    async fn issue_children(&self, key: &str) -> Result<Vec<Value>>;

    /// Update fields on an issue, optionally suppressing notifications.
    async fn update_issue_fields(&self, key: &str, fields: Value, notify: bool) -> Result<()>;

    /// Add a watcher to an issue.
    async fn add_watcher(&self, key: &str, account_id: &str) -> Result<()>;
}

/// Parse a Jira timestamp. Jira renders `2024-05-01T12:34:56.000+0200`;
/// RFC 3339 is accepted as well since some deployments emit it.
pub fn parse_jira_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.3f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

/// Parse an id field that Jira serializes as either a JSON string or number.
pub fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
