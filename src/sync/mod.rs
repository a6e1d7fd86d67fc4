pub mod delta;
pub mod rate_limit;
pub mod syncer;
pub mod walker;

use serde::Serialize;

use crate::store::Collection;

/// Report returned after one sync phase completes.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub phase: String,
    pub status: SyncStatus,
    pub items_synced: u64,
    pub items_failed: u64,
    pub windows_completed: u32,
    pub error: Option<String>,
}

impl SyncReport {
    /// Create a SyncReport with the status derived from counts.
    pub fn from_counts(
        phase: &str,
        items_synced: u64,
        items_failed: u64,
        windows_completed: u32,
    ) -> Self {
        let status = if items_failed == 0 {
            SyncStatus::Success
        } else if items_synced > 0 || windows_completed > 0 {
            SyncStatus::PartialFailure
        } else {
            SyncStatus::Failed
        };
        let error = if items_failed > 0 {
            Some(format!("{items_failed} items failed"))
        } else {
            None
        };
        Self {
            phase: phase.to_string(),
            status,
            items_synced,
            items_failed,
            windows_completed,
            error,
        }
    }

    pub fn failed(phase: &str, error: String) -> Self {
        Self {
            phase: phase.to_string(),
            status: SyncStatus::Failed,
            items_synced: 0,
            items_failed: 0,
            windows_completed: 0,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Success,
    PartialFailure,
    Failed,
}

/// Progress callbacks for long-running phases. The engine never writes to
/// stderr itself; the CLI supplies an implementation.
pub trait SyncProgress: Send + Sync {
    fn on_phase_start(&self, _phase: &str) {}
    fn on_window(&self, _collection: Collection, _start: u64, _width: u64, _found: usize) {}
    fn on_phase_complete(&self, _report: &SyncReport) {}
}

/// Progress reporter that reports nothing.
pub struct NoopProgress;

impl SyncProgress for NoopProgress {}
