//! Changed-since scan: catches edits to issues outside the id walk's newly
//! discovered range.

use chrono::{DateTime, Duration, Utc};

use crate::client::JiraApi;
use crate::config::SyncTuning;
use crate::error::Result;
use crate::store::{Collection, Store};
use crate::sync::rate_limit::retry_api;
use crate::sync::{SyncProgress, SyncReport};

/// Re-fetch every issue modified since the checkpoint timestamp (minus a
/// safety margin for clock/indexing skew at the service) and overwrite the
/// local copy.
///
/// A single item's failure is logged and skipped, and freezes the timestamp
/// floor: the checkpoint advances only across the successes that precede the
/// first failure in modification order, so the failed item's window is
/// retried on the next run. The timestamp never regresses.
pub async fn sync_updated_issues(
    api: &dyn JiraApi,
    store: &Store,
    tuning: &SyncTuning,
    progress: &dyn SyncProgress,
) -> Result<SyncReport> {
    let phase = "issues:updated";
    progress.on_phase_start(phase);

    let checkpoint = store.load_checkpoint()?;
    let since = checkpoint
        .last_updated_issue_at
        .map(|t| t - Duration::seconds(tuning.delta_margin_secs));
    log::info!("Scanning for issues updated since {since:?}");

    let mut changed = retry_api!(api.issues_changed_since(since))?;
    // Oldest first, so the floor is a simple prefix over successes
    changed.sort_by_key(|c| c.updated_at);

    let mut written: u64 = 0;
    let mut failed: u64 = 0;
    let mut floor_frozen = false;
    let mut candidate: Option<DateTime<Utc>> = None;

    for item in &changed {
        match retry_api!(api.issue_by_id(item.id)) {
            Ok(Some(issue)) => {
                store.write_item(Collection::Issues, item.id, &issue.payload)?;
                written += 1;
                if !floor_frozen {
                    candidate = Some(candidate.map_or(item.updated_at, |c| c.max(item.updated_at)));
                }
            }
            Ok(None) => {
                // Deleted between the query and the fetch; nothing to retry
                log::warn!("updated issue {} no longer exists", item.id);
                if !floor_frozen {
                    candidate = Some(candidate.map_or(item.updated_at, |c| c.max(item.updated_at)));
                }
            }
            Err(e) => {
                log::warn!("failed to refresh issue {}: {e}", item.id);
                failed += 1;
                floor_frozen = true;
            }
        }
        progress.on_window(Collection::Issues, item.id, 1, 1);
    }

    if let Some(at) = candidate {
        let mut checkpoint = store.load_checkpoint()?;
        if checkpoint.advance_updated_at(at) {
            store.save_checkpoint(&checkpoint)?;
        }
    }

    Ok(SyncReport::from_counts(
        phase,
        written,
        failed,
        changed.len() as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    use crate::client::fake::FakeJira;
    use crate::client::ChangedIssue;
    use crate::sync::NoopProgress;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path(), "acme");
        (dir, store)
    }

    fn changed(fake: &mut FakeJira, entries: &[(u64, u32)]) {
        for &(id, hour) in entries {
            fake.add_issue(id);
            fake.changed.push(ChangedIssue {
                id,
                updated_at: at(hour),
            });
        }
    }

    #[tokio::test]
    async fn test_refetches_and_advances_timestamp() {
        let (_dir, store) = store();
        let mut fake = FakeJira::default();
        changed(&mut fake, &[(1, 10), (2, 12), (3, 11)]);

        let report =
            sync_updated_issues(&fake, &store, &SyncTuning::default(), &NoopProgress)
                .await
                .unwrap();
        assert_eq!(report.items_synced, 3);
        assert_eq!(report.items_failed, 0);
        assert!(store.contains(Collection::Issues, 2));

        let checkpoint = store.load_checkpoint().unwrap();
        assert_eq!(checkpoint.last_updated_issue_at, Some(at(12)));
    }

    #[tokio::test]
    async fn test_floor_frozen_at_first_failure() {
        let (_dir, store) = store();
        let mut fake = FakeJira::default();
        // Modification order t10 < t11 < t12; the t11 item fails
        changed(&mut fake, &[(1, 10), (2, 11), (3, 12)]);
        fake.fail_issue_ids.insert(2);

        let report =
            sync_updated_issues(&fake, &store, &SyncTuning::default(), &NoopProgress)
                .await
                .unwrap();
        // The newer item was still processed, but the checkpoint stops short
        // of the failed item's window
        assert_eq!(report.items_synced, 2);
        assert_eq!(report.items_failed, 1);
        assert!(store.contains(Collection::Issues, 3));

        let checkpoint = store.load_checkpoint().unwrap();
        assert_eq!(checkpoint.last_updated_issue_at, Some(at(10)));

        // Next run retries the failed window and catches up
        fake.fail_issue_ids.clear();
        sync_updated_issues(&fake, &store, &SyncTuning::default(), &NoopProgress)
            .await
            .unwrap();
        let checkpoint = store.load_checkpoint().unwrap();
        assert_eq!(checkpoint.last_updated_issue_at, Some(at(12)));
    }

    #[tokio::test]
    async fn test_timestamp_never_regresses() {
        let (_dir, store) = store();
        let mut checkpoint = store.load_checkpoint().unwrap();
        checkpoint.advance_updated_at(at(15));
        store.save_checkpoint(&checkpoint).unwrap();

        let mut fake = FakeJira::default();
        changed(&mut fake, &[(1, 10)]);
        sync_updated_issues(&fake, &store, &SyncTuning::default(), &NoopProgress)
            .await
            .unwrap();

        let checkpoint = store.load_checkpoint().unwrap();
        assert_eq!(checkpoint.last_updated_issue_at, Some(at(15)));
    }

    #[tokio::test]
    async fn test_margin_applied_to_query() {
        let (_dir, store) = store();
        let mut checkpoint = store.load_checkpoint().unwrap();
        checkpoint.advance_updated_at(at(15));
        store.save_checkpoint(&checkpoint).unwrap();

        let fake = FakeJira::default();
        sync_updated_issues(&fake, &store, &SyncTuning::default(), &NoopProgress)
            .await
            .unwrap();

        let calls = fake.changed_since_calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[Some(at(15) - Duration::seconds(60))]);
    }

    #[tokio::test]
    async fn test_overwrites_existing_record() {
        let (_dir, store) = store();
        store
            .write_item(Collection::Issues, 1, &json!({"key": "PROJ-1", "stale": true}))
            .unwrap();

        let mut fake = FakeJira::default();
        changed(&mut fake, &[(1, 10)]);
        sync_updated_issues(&fake, &store, &SyncTuning::default(), &NoopProgress)
            .await
            .unwrap();

        let refreshed = store.read_item(Collection::Issues, 1).unwrap().unwrap();
        assert!(refreshed.get("stale").is_none());
    }
}
