pub mod client;
pub mod config;
pub mod error;
pub mod rules;
pub mod store;
pub mod sync;

pub use client::{ChangedIssue, HttpJira, IssueRef, JiraApi, RemoteItem};
pub use config::{Config, SyncTuning};
pub use error::{Error, Result};
pub use store::{Checkpoint, Collection, Store};
pub use sync::{NoopProgress, SyncProgress, SyncReport, SyncStatus};

use sync::{delta, syncer};

/// Main entry point: one mirrored Jira deployment.
pub struct JiraMirror {
    config: Config,
    api: Box<dyn JiraApi>,
    store: Store,
}

impl JiraMirror {
    /// Wire up a mirror with an explicit client (tests inject a double here).
    pub fn new(config: Config, api: Box<dyn JiraApi>) -> Self {
        let store = Store::new(config.data_dir.clone(), &config.company);
        Self { config, api, store }
    }

    /// Build a mirror backed by the live HTTP client.
    pub fn from_config(config: Config) -> Result<Self> {
        let (url, user, token) = config.jira_credentials()?;
        let api = Box::new(HttpJira::new(url, user, token));
        Ok(Self::new(config, api))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run one full synchronization: the worklog batch walk, the new-issue
    /// scan, then the updated-issue delta scan. A failed phase is reported
    /// and does not prevent the later phases from running; each phase
    /// reloads the checkpoint at its start, so progress is kept across
    /// failures.
    pub async fn sync(&self, progress: &dyn SyncProgress) -> Result<Vec<SyncReport>> {
        log::info!("Starting sync for {}", self.config.company);
        let api = self.api.as_ref();
        let tuning = &self.config.sync;

        let phases = [
            syncer::sync_worklogs(api, &self.store, tuning, progress).await,
            syncer::sync_new_issues(api, &self.store, tuning, progress).await,
            delta::sync_updated_issues(api, &self.store, tuning, progress).await,
        ];

        let names = ["worklogs", "issues:new", "issues:updated"];
        let mut reports = Vec::with_capacity(phases.len());
        for (phase, result) in names.into_iter().zip(phases) {
            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    log::error!("Phase {phase} failed: {e}");
                    SyncReport::failed(phase, e.to_string())
                }
            };
            progress.on_phase_complete(&report);
            reports.push(report);
        }
        Ok(reports)
    }

    /// Verify that every locally stored worklog's issue has been downloaded.
    pub async fn check(&self, progress: &dyn SyncProgress) -> Result<SyncReport> {
        let report = syncer::check_downloads(self.api.as_ref(), &self.store, progress).await?;
        progress.on_phase_complete(&report);
        Ok(report)
    }

    /// Apply the configured formatting rules to the remote service.
    pub async fn format(&self) -> Result<()> {
        let rules = rules::configured_rules(&self.config)?;
        rules::run_rules(self.api.as_ref(), &rules).await
    }
}
