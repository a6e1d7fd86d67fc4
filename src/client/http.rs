use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::client::{parse_id, parse_jira_timestamp, ChangedIssue, IssueRef, JiraApi, RemoteItem};
use crate::error::{Error, Result};

/// Jira REST v2 client with basic auth.
pub struct HttpJira {
    http: reqwest::Client,
    base_url: String,
    user: String,
    token: String,
}

impl HttpJira {
    pub fn new(base_url: &str, user: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/2{path}", self.base_url)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .http
            .get(self.url(path))
            .basic_auth(&self.user, Some(&self.token))
            .query(query)
            .send()
            .await?;
        Self::check_status(&response)?;
        Ok(response.json().await?)
    }

    fn check_status(response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Error::Api(format!(
            "{} returned {status}",
            response.url().path()
        )))
    }

    /// Run a paginated JQL search. `max_results` of `None` keeps requesting
    /// pages until the reported total is reached.
    async fn search(&self, jql: &str, fields: &str, max_results: Option<u32>) -> Result<Vec<Value>> {
        const PAGE: u32 = 100;
        let mut issues: Vec<Value> = Vec::new();
        let mut start_at: u32 = 0;
        loop {
            let page_size = match max_results {
                Some(max) => (max - issues.len() as u32).min(PAGE),
                None => PAGE,
            };
            let body = self
                .get_json(
                    "/search",
                    &[
                        ("jql", jql.to_string()),
                        ("fields", fields.to_string()),
                        ("startAt", start_at.to_string()),
                        ("maxResults", page_size.to_string()),
                    ],
                )
                .await?;
            let page = body
                .get("issues")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            let total = body.get("total").and_then(|v| v.as_u64()).unwrap_or(0);
            let fetched = page.len() as u32;
            issues.extend(page);

            start_at += fetched;
            let done_total = u64::from(start_at) >= total || fetched == 0;
            let done_limit = max_results.is_some_and(|max| issues.len() as u32 >= max);
            if done_total || done_limit {
                return Ok(issues);
            }
        }
    }
}

#[async_trait]
impl JiraApi for HttpJira {
    async fn worklogs_by_ids(&self, ids: &[u64]) -> Result<Vec<RemoteItem>> {
        // POST because the id list does not fit in a query string.
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let response = self
            .http
            .post(self.url("/worklog/list"))
            .basic_auth(&self.user, Some(&self.token))
            .json(&json!({ "ids": ids }))
            .send()
            .await?;
        Self::check_status(&response)?;
        let body: Value = response.json().await?;
        let entries = body
            .as_array()
            .ok_or_else(|| Error::Api("worklog/list did not return an array".into()))?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.get("id").and_then(parse_id) {
                Some(id) => items.push(RemoteItem {
                    id,
                    payload: entry.clone(),
                }),
                None => log::warn!("worklog entry without a numeric id: {entry}"),
            }
        }
        Ok(items)
    }

    async fn issue_by_id(&self, id: u64) -> Result<Option<RemoteItem>> {
        let response = self
            .http
            .get(self.url(&format!("/issue/{id}")))
            .basic_auth(&self.user, Some(&self.token))
            .query(&[("fields", "*all"), ("properties", "*all")])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check_status(&response)?;
        let payload: Value = response.json().await?;
        Ok(Some(RemoteItem { id, payload }))
    }

    async fn most_recent_issue(&self) -> Result<Option<IssueRef>> {
        let issues = self
            .search("order by created DESC", "id,key", Some(1))
            .await?;
        let Some(issue) = issues.first() else {
            return Ok(None);
        };
        let id = issue
            .get("id")
            .and_then(parse_id)
            .ok_or_else(|| Error::Api("search result issue without a numeric id".into()))?;
        let key = issue
            .get("key")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(Some(IssueRef { id, key }))
    }

    async fn issues_changed_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChangedIssue>> {
        let jql = match since {
            Some(t) => format!(
                "updated > \"{}\" order by updated desc",
                t.format("%Y-%m-%d %H:%M")
            ),
            None => "order by updated desc".to_string(),
        };
        let issues = self.search(&jql, "id,updated", None).await?;

        let mut changed = Vec::with_capacity(issues.len());
        for issue in &issues {
            let id = issue.get("id").and_then(parse_id);
            let updated_at = issue
                .pointer("/fields/updated")
                .and_then(|v| v.as_str())
                .and_then(parse_jira_timestamp);
            match (id, updated_at) {
                (Some(id), Some(updated_at)) => changed.push(ChangedIssue { id, updated_at }),
                _ => log::warn!("changed-since issue with unreadable id/updated: {issue}"),
            }
        }
        Ok(changed)
    }

    async fn search_issues(&self, jql: &str, max_results: Option<u32>) -> Result<Vec<Value>> {
        self.search(jql, "*all", max_results).await
    }

    async fn issue_children(&self, key: &str) -> Result<Vec<Value>> {
        self.search_issues(&format!("parent = {key}"), None).await
    }

    async fn update_issue_fields(&self, key: &str, fields: Value, notify: bool) -> Result<()> {
        let response = self
            .http
            .put(self.url(&format!("/issue/{key}")))
            .basic_auth(&self.user, Some(&self.token))
            .query(&[("notifyUsers", if notify { "true" } else { "false" })])
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        Self::check_status(&response)
    }

    async fn add_watcher(&self, key: &str, account_id: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/issue/{key}/watchers")))
            .basic_auth(&self.user, Some(&self.token))
            .json(&json!(account_id))
            .send()
            .await?;
        Self::check_status(&response)
    }
}
