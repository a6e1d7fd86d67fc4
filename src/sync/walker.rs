//! Generic sequential-id scan.
//!
//! Both collections walk a monotonically-keyed id space in windows; they
//! differ only in how wide a window is and when the walk has reached the
//! frontier. That decision logic lives in a [`ScanStrategy`] state machine,
//! and the fetch shape (bulk id list for worklogs, one-at-a-time for issues)
//! behind a [`ScanSource`], so the driver is written once.

use async_trait::async_trait;

use crate::client::{JiraApi, RemoteItem};
use crate::error::Result;
use crate::store::{Collection, Store};
use crate::sync::rate_limit::retry_api;
use crate::sync::SyncProgress;

/// One step of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep scanning from `next`; `commit` becomes the durable cursor.
    Continue { next: u64, commit: u64 },
    /// The frontier has been reached; `commit` is the final cursor value.
    Done { commit: u64 },
}

/// Decides how a scan advances through the id space.
pub trait ScanStrategy {
    /// Width of the next id window to request.
    fn window_width(&self) -> u64;

    /// Inspect the ids that resolved within the window starting at `start`
    /// and decide how the scan proceeds. Ids requested but not resolved are
    /// authoritatively absent.
    fn advance(&mut self, start: u64, resolved: &[u64]) -> Step;
}

/// Fetch shape for one collection.
#[async_trait]
pub trait ScanSource: Send + Sync {
    fn collection(&self) -> Collection;

    /// Fetch the items that exist in `[start, start + width)`. Transport and
    /// auth failures are errors; absent ids are just missing from the result.
    async fn fetch_window(&self, start: u64, width: u64) -> Result<Vec<RemoteItem>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScanStats {
    pub written: u64,
    pub windows: u32,
}

/// Drive a scan to its frontier: fetch a window, persist every returned
/// item, commit the cursor, repeat. A fetch or write error propagates
/// without committing, so the next run retries the same window.
pub async fn run_scan(
    source: &dyn ScanSource,
    strategy: &mut dyn ScanStrategy,
    store: &Store,
    start: u64,
    progress: &dyn SyncProgress,
) -> Result<ScanStats> {
    let collection = source.collection();
    let mut cursor = start;
    let mut stats = ScanStats::default();
    loop {
        let width = strategy.window_width();
        let items = retry_api!(source.fetch_window(cursor, width))?;

        let mut resolved: Vec<u64> = Vec::with_capacity(items.len());
        for item in &items {
            store.write_item(collection, item.id, &item.payload)?;
            stats.written += 1;
            resolved.push(item.id);
        }
        stats.windows += 1;
        progress.on_window(collection, cursor, width, resolved.len());
        log::debug!(
            "{} window [{cursor}, {}): {} found",
            collection.name(),
            cursor + width,
            resolved.len()
        );

        match strategy.advance(cursor, &resolved) {
            Step::Continue { next, commit } => {
                store.commit_cursor(collection, commit)?;
                cursor = next;
            }
            Step::Done { commit } => {
                store.commit_cursor(collection, commit)?;
                return Ok(stats);
            }
        }
    }
}

/// Worklog walk: fixed-width batches over a sparse low range.
///
/// The worklog id space starts with a long dead zone before real entries
/// begin, so an empty window below the low-water mark means "not yet reached
/// data" and the walk skips forward a full batch. An empty window at or
/// above the mark is the end of the collection.
pub struct WorklogScan {
    batch: u64,
    low_water: u64,
}

impl WorklogScan {
    pub fn new(batch: u64, low_water: u64) -> Self {
        Self { batch, low_water }
    }
}

impl ScanStrategy for WorklogScan {
    fn window_width(&self) -> u64 {
        self.batch
    }

    fn advance(&mut self, start: u64, resolved: &[u64]) -> Step {
        match resolved.iter().max() {
            Some(&max_id) => {
                let frontier = max_id + 1;
                Step::Continue {
                    next: frontier,
                    commit: frontier,
                }
            }
            None if start < self.low_water => Step::Continue {
                next: start + self.batch,
                commit: start + self.batch,
            },
            None => Step::Done { commit: start },
        }
    }
}

/// Issue walk: one id at a time, tolerating gaps.
///
/// With a known upper bound (from the most-recently-created query) the scan
/// runs to the bound and gaps of any length below it are crossed. Without a
/// bound it stops once a run of consecutive misses reaches the configured
/// maximum, concluding the unallocated frontier has been reached.
pub struct IssueScan {
    max_miss_run: u64,
    upper_bound: Option<u64>,
    miss_run: u64,
}

impl IssueScan {
    pub fn new(max_miss_run: u64, upper_bound: Option<u64>) -> Self {
        Self {
            max_miss_run,
            upper_bound,
            miss_run: 0,
        }
    }
}

impl ScanStrategy for IssueScan {
    fn window_width(&self) -> u64 {
        1
    }

    fn advance(&mut self, start: u64, resolved: &[u64]) -> Step {
        if resolved.is_empty() {
            self.miss_run += 1;
        } else {
            self.miss_run = 0;
        }
        let done = match self.upper_bound {
            Some(bound) => start >= bound,
            None => self.miss_run >= self.max_miss_run,
        };
        if done {
            Step::Done { commit: start }
        } else {
            Step::Continue {
                next: start + 1,
                commit: start,
            }
        }
    }
}

/// Bulk fetch-by-id-list source for worklogs.
pub struct WorklogSource<'a> {
    pub api: &'a dyn JiraApi,
}

#[async_trait]
impl ScanSource for WorklogSource<'_> {
    fn collection(&self) -> Collection {
        Collection::Worklogs
    }

    async fn fetch_window(&self, start: u64, width: u64) -> Result<Vec<RemoteItem>> {
        let ids: Vec<u64> = (start..start + width).collect();
        self.api.worklogs_by_ids(&ids).await
    }
}

/// Single-fetch source for issues; the issue contract has no bulk primitive.
pub struct IssueSource<'a> {
    pub api: &'a dyn JiraApi,
}

#[async_trait]
impl ScanSource for IssueSource<'_> {
    fn collection(&self) -> Collection {
        Collection::Issues
    }

    async fn fetch_window(&self, start: u64, _width: u64) -> Result<Vec<RemoteItem>> {
        Ok(self.api.issue_by_id(start).await?.into_iter().collect())
    }
}
