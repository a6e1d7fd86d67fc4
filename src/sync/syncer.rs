use crate::client::JiraApi;
use crate::config::SyncTuning;
use crate::error::Result;
use crate::store::{Collection, Store};
use crate::sync::rate_limit::retry_api;
use crate::sync::walker::{run_scan, IssueScan, IssueSource, WorklogScan, WorklogSource};
use crate::sync::{SyncProgress, SyncReport};

/// Walk the worklog id space in fixed-width batches from the checkpoint to
/// the frontier, persisting every entry.
pub async fn sync_worklogs(
    api: &dyn JiraApi,
    store: &Store,
    tuning: &SyncTuning,
    progress: &dyn SyncProgress,
) -> Result<SyncReport> {
    let phase = "worklogs";
    progress.on_phase_start(phase);

    let checkpoint = store.load_checkpoint()?;
    let start = checkpoint.last_downloaded_worklog_id;
    log::info!("Downloading worklogs starting from id {start}");

    let mut strategy = WorklogScan::new(tuning.worklog_batch_size, tuning.worklog_low_water_mark);
    let source = WorklogSource { api };
    let stats = run_scan(&source, &mut strategy, store, start, progress).await?;

    log::info!("Worklog walk complete: {} entries written", stats.written);
    Ok(SyncReport::from_counts(phase, stats.written, 0, stats.windows))
}

/// Scan forward from the checkpoint for newly created issues.
///
/// When the most-recently-created query yields an upper bound the scan runs
/// to the bound (and is skipped entirely if the checkpoint already reached
/// it); otherwise the gap-tolerant walk stops after the configured run of
/// consecutive misses.
pub async fn sync_new_issues(
    api: &dyn JiraApi,
    store: &Store,
    tuning: &SyncTuning,
    progress: &dyn SyncProgress,
) -> Result<SyncReport> {
    let phase = "issues:new";
    progress.on_phase_start(phase);

    let checkpoint = store.load_checkpoint()?;

    let bound = match retry_api!(api.most_recent_issue()) {
        Ok(Some(latest)) => {
            log::debug!("Most recent issue is {} (id {})", latest.key, latest.id);
            Some(latest.id)
        }
        Ok(None) => None,
        Err(e) => {
            log::warn!("Could not determine the most recent issue: {e}");
            None
        }
    };

    if let Some(bound) = bound {
        if checkpoint.last_downloaded_issue_id >= bound {
            log::info!("No new issues");
            return Ok(SyncReport::from_counts(phase, 0, 0, 0));
        }
    }

    let start = checkpoint.last_downloaded_issue_id + 1;
    log::info!("Downloading new issues starting from id {start}");

    let mut strategy = IssueScan::new(tuning.issue_max_miss_run, bound);
    let source = IssueSource { api };
    let stats = run_scan(&source, &mut strategy, store, start, progress).await?;

    log::info!("Issue scan complete: {} issues written", stats.written);
    Ok(SyncReport::from_counts(phase, stats.written, 0, stats.windows))
}

/// Verify that every issue referenced by a locally stored worklog entry has
/// been downloaded, fetching any that are missing. Per-issue failures are
/// counted, not fatal.
pub async fn check_downloads(
    api: &dyn JiraApi,
    store: &Store,
    progress: &dyn SyncProgress,
) -> Result<SyncReport> {
    let phase = "check";
    progress.on_phase_start(phase);

    let mut written: u64 = 0;
    let mut failed: u64 = 0;
    let referenced = store.worklog_issue_ids()?;
    let total = referenced.len() as u32;
    for id in referenced {
        if store.contains(Collection::Issues, id) {
            continue;
        }
        match retry_api!(api.issue_by_id(id)) {
            Ok(Some(issue)) => {
                store.write_item(Collection::Issues, id, &issue.payload)?;
                written += 1;
            }
            Ok(None) => log::warn!("issue {id} referenced by a worklog does not exist"),
            Err(e) => {
                log::warn!("failed to download referenced issue {id}: {e}");
                failed += 1;
            }
        }
    }

    Ok(SyncReport::from_counts(phase, written, failed, total))
}
