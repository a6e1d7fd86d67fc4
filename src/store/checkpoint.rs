use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable cursor recording how far synchronization has progressed.
///
/// Both id fields are monotonically non-decreasing for the lifetime of the
/// checkpoint; the mutators below refuse to move backward. The worklog id is
/// the next id to attempt; the issue id is the highest id for which a
/// download attempt (successful or confirmed absent) has completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub last_downloaded_worklog_id: u64,
    #[serde(default)]
    pub last_downloaded_issue_id: u64,
    #[serde(default)]
    pub last_updated_issue_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Advance the worklog cursor, forward only. Returns whether it moved.
    pub fn advance_worklog_cursor(&mut self, id: u64) -> bool {
        if id > self.last_downloaded_worklog_id {
            self.last_downloaded_worklog_id = id;
            true
        } else {
            false
        }
    }

    /// Advance the issue cursor, forward only. Returns whether it moved.
    pub fn advance_issue_cursor(&mut self, id: u64) -> bool {
        if id > self.last_downloaded_issue_id {
            self.last_downloaded_issue_id = id;
            true
        } else {
            false
        }
    }

    /// Advance the delta timestamp, forward only. Absent orders before any
    /// concrete timestamp.
    pub fn advance_updated_at(&mut self, at: DateTime<Utc>) -> bool {
        match self.last_updated_issue_at {
            Some(current) if current >= at => false,
            _ => {
                self.last_updated_issue_at = Some(at);
                true
            }
        }
    }
}
