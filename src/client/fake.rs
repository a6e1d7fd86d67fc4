//! In-memory `JiraApi` double used by engine and rule tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::client::{ChangedIssue, IssueRef, JiraApi, RemoteItem};
use crate::error::{Error, Result};

#[derive(Default)]
pub(crate) struct FakeJira {
    pub worklogs: BTreeMap<u64, Value>,
    pub issues: BTreeMap<u64, Value>,
    /// Id reported by `most_recent_issue`; `None` simulates a deployment
    /// where the bootstrap query yields nothing.
    pub most_recent: Option<u64>,
    pub changed: Vec<ChangedIssue>,
    /// Issue ids whose fetch fails with a transport error.
    pub fail_issue_ids: HashSet<u64>,
    /// Canned result for `search_issues`, regardless of JQL.
    pub search_results: Vec<Value>,
    pub children: HashMap<String, Vec<Value>>,

    pub issue_fetches: Mutex<Vec<u64>>,
    pub worklog_windows: Mutex<Vec<(u64, u64)>>,
    pub changed_since_calls: Mutex<Vec<Option<DateTime<Utc>>>>,
    pub watchers_added: Mutex<Vec<(String, String)>>,
    pub field_updates: Mutex<Vec<(String, Value)>>,
}

impl FakeJira {
    pub fn with_worklogs(ids: &[u64]) -> Self {
        let mut fake = Self::default();
        for &id in ids {
            fake.worklogs
                .insert(id, json!({ "id": id.to_string(), "issueId": "1" }));
        }
        fake
    }

    pub fn add_issue(&mut self, id: u64) {
        self.issues
            .insert(id, json!({ "id": id.to_string(), "key": format!("PROJ-{id}") }));
    }
}

#[async_trait]
impl JiraApi for FakeJira {
    async fn worklogs_by_ids(&self, ids: &[u64]) -> Result<Vec<RemoteItem>> {
        let (first, last) = (ids.first().copied(), ids.last().copied());
        if let (Some(first), Some(last)) = (first, last) {
            self.worklog_windows.lock().unwrap().push((first, last));
        }
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.worklogs.get(id).map(|payload| RemoteItem {
                    id: *id,
                    payload: payload.clone(),
                })
            })
            .collect())
    }

    async fn issue_by_id(&self, id: u64) -> Result<Option<RemoteItem>> {
        self.issue_fetches.lock().unwrap().push(id);
        if self.fail_issue_ids.contains(&id) {
            return Err(Error::Api(format!("issue/{id} connection reset")));
        }
        Ok(self.issues.get(&id).map(|payload| RemoteItem {
            id,
            payload: payload.clone(),
        }))
    }

    async fn most_recent_issue(&self) -> Result<Option<IssueRef>> {
        Ok(self.most_recent.map(|id| IssueRef {
            id,
            key: format!("PROJ-{id}"),
        }))
    }

    async fn issues_changed_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChangedIssue>> {
        self.changed_since_calls.lock().unwrap().push(since);
        Ok(self.changed.clone())
    }

    async fn search_issues(&self, _jql: &str, _max_results: Option<u32>) -> Result<Vec<Value>> {
        Ok(self.search_results.clone())
    }

    async fn issue_children(&self, key: &str) -> Result<Vec<Value>> {
        Ok(self.children.get(key).cloned().unwrap_or_default())
    }

    async fn update_issue_fields(&self, key: &str, fields: Value, _notify: bool) -> Result<()> {
        self.field_updates
            .lock()
            .unwrap()
            .push((key.to_string(), fields));
        Ok(())
    }

    async fn add_watcher(&self, key: &str, account_id: &str) -> Result<()> {
        self.watchers_added
            .lock()
            .unwrap()
            .push((key.to_string(), account_id.to_string()));
        Ok(())
    }
}
