pub mod checkpoint;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::client::parse_id;
use crate::error::{Error, Result};

pub use checkpoint::Checkpoint;

/// Width of one worklog shard directory.
const WORKLOG_SHARD: u64 = 1000;

/// The two locally mirrored collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Worklogs,
    Issues,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Worklogs => "worklogs",
            Collection::Issues => "issues",
        }
    }
}

/// Local JSON store: one file per fetched item plus the checkpoint.
///
/// Layout under the root directory:
/// `worklogs/<company>/<id / 1000>/<id>.json`,
/// `issues/<company>/<id>.json`, and `state.json` for the checkpoint.
/// Every write lands in a temp file first and is renamed into place, so a
/// reader never observes a truncated file.
pub struct Store {
    root: PathBuf,
    company: String,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>, company: &str) -> Self {
        Self {
            root: root.into(),
            company: company.to_string(),
        }
    }

    pub fn item_path(&self, collection: Collection, id: u64) -> PathBuf {
        let dir = self.root.join(collection.name()).join(&self.company);
        match collection {
            Collection::Worklogs => dir
                .join((id / WORKLOG_SHARD).to_string())
                .join(format!("{id}.json")),
            Collection::Issues => dir.join(format!("{id}.json")),
        }
    }

    /// Persist one item, replacing any existing file wholesale.
    pub fn write_item(&self, collection: Collection, id: u64, payload: &Value) -> Result<()> {
        let path = self.item_path(collection, id);
        let bytes = serde_json::to_vec(payload)?;
        atomic_write(&path, &bytes)
    }

    pub fn contains(&self, collection: Collection, id: u64) -> bool {
        self.item_path(collection, id).exists()
    }

    pub fn read_item(&self, collection: Collection, id: u64) -> Result<Option<Value>> {
        let path = self.item_path(collection, id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage(&path, e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Issue ids referenced by locally stored worklog entries. Entries whose
    /// `issueId` cannot be read are logged and skipped.
    pub fn worklog_issue_ids(&self) -> Result<Vec<u64>> {
        let company_dir = self
            .root
            .join(Collection::Worklogs.name())
            .join(&self.company);
        let mut ids = Vec::new();
        if !company_dir.exists() {
            return Ok(ids);
        }
        for shard in read_dir_sorted(&company_dir)? {
            if !shard.is_dir() {
                continue;
            }
            for file in read_dir_sorted(&shard)? {
                if file.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }
                let bytes = fs::read(&file).map_err(|e| Error::storage(&file, e))?;
                let issue_id = serde_json::from_slice::<Value>(&bytes)
                    .ok()
                    .as_ref()
                    .and_then(|v| v.get("issueId"))
                    .and_then(parse_id);
                match issue_id {
                    Some(id) => ids.push(id),
                    None => log::warn!("worklog file {} has no readable issueId", file.display()),
                }
            }
        }
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    // ── Checkpoint persistence ─────────────────────────────────────

    fn checkpoint_path(&self) -> PathBuf {
        self.root.join("state.json")
    }

    /// Load the checkpoint. On first use the default checkpoint is written
    /// out immediately so later readers see a consistent file.
    pub fn load_checkpoint(&self) -> Result<Checkpoint> {
        let path = self.checkpoint_path();
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::Checkpoint(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let checkpoint = Checkpoint::default();
                self.save_checkpoint(&checkpoint)?;
                Ok(checkpoint)
            }
            Err(e) => Err(Error::storage(&path, e)),
        }
    }

    /// Persist the checkpoint atomically. Failure here is fatal for the run;
    /// in-memory progress past the last durable save is discarded.
    pub fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        atomic_write(&self.checkpoint_path(), &bytes)
    }

    /// Advance one collection's durable cursor, forward only.
    pub fn commit_cursor(&self, collection: Collection, value: u64) -> Result<()> {
        let mut checkpoint = self.load_checkpoint()?;
        let moved = match collection {
            Collection::Worklogs => checkpoint.advance_worklog_cursor(value),
            Collection::Issues => checkpoint.advance_issue_cursor(value),
        };
        if moved {
            self.save_checkpoint(&checkpoint)?;
        }
        Ok(())
    }
}

/// All-or-nothing file write: temp file in the target directory, then rename.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Checkpoint(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent).map_err(|e| Error::storage(parent, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|e| Error::storage(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::storage(path, e))
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| Error::storage(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    Ok(entries)
}
