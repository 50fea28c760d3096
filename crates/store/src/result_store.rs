//! Filesystem-backed [`ResultStore`].

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use zimage_core::job::{is_artifact_name, is_sidecar_name, JobRecord};

use crate::error::StoreError;

/// Number of records returned by [`ResultStore::list`] without an explicit limit.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Stores job artifacts and their metadata sidecars in one flat directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
    max_history: usize,
}

impl ResultStore {
    /// Open a store rooted at `dir`, creating the directory if absent.
    pub fn open(dir: impl Into<PathBuf>, max_history: usize) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_history: max_history.max(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Write the artifact, then its sidecar.
    ///
    /// Both files are written to a temporary name, synced and renamed into
    /// place, so a sidecar only becomes visible after its artifact is
    /// complete on disk.
    pub fn persist(&self, record: &JobRecord, artifact: &[u8]) -> Result<(), StoreError> {
        if !is_plain_artifact_name(&record.filename) {
            return Err(StoreError::InvalidName(record.filename.clone()));
        }
        let sidecar = serde_json::to_vec_pretty(record)?;

        fs::create_dir_all(&self.dir)?;
        write_new(&self.dir.join(&record.filename), artifact)?;
        write_new(&self.dir.join(record.sidecar_name()), &sidecar)?;

        tracing::debug!(
            job_id = %record.id,
            filename = %record.filename,
            bytes = artifact.len(),
            "Persisted job result",
        );
        Ok(())
    }

    /// List the most recent records, newest first.
    ///
    /// `None` or `0` uses the configured history size. Sidecars that fail
    /// to parse or whose artifact is missing are skipped.
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<JobRecord>, StoreError> {
        let limit = match limit {
            Some(n) if n > 0 => n,
            _ => self.max_history,
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_sidecar_name(name))
            .collect();
        // Timestamp-prefixed names: descending order is newest first.
        names.sort_unstable_by(|a, b| b.cmp(a));
        names.truncate(limit);

        Ok(names
            .iter()
            .filter_map(|name| self.read_sidecar(name))
            .collect())
    }

    /// Map a caller-supplied filename to an existing artifact in the store.
    ///
    /// Only the final path component is considered, so traversal segments
    /// cannot reach outside the storage directory.
    pub fn resolve_artifact_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let not_found = || StoreError::NotFound(name.to_string());

        let base = Path::new(name)
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .last()
            .ok_or_else(not_found)?;

        if !is_plain_artifact_name(base) {
            return Err(not_found());
        }

        let path = self.dir.join(base);
        if path.is_file() {
            Ok(path)
        } else {
            Err(not_found())
        }
    }

    // ---- private helpers ----

    fn read_sidecar(&self, name: &str) -> Option<JobRecord> {
        let path = self.dir.join(name);
        let record = match fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice::<JobRecord>(&bytes).map_err(|e| e.to_string()))
        {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(sidecar = name, %error, "Skipping unreadable job sidecar");
                return None;
            }
        };

        if !is_plain_artifact_name(&record.filename) || !self.dir.join(&record.filename).is_file()
        {
            tracing::debug!(sidecar = name, filename = %record.filename, "Skipping orphaned job sidecar");
            return None;
        }
        Some(record)
    }
}

/// An artifact filename with no directory parts.
fn is_plain_artifact_name(name: &str) -> bool {
    is_artifact_name(name)
        && !name.contains(['/', '\\'])
        && !name.starts_with('.')
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

/// Write `contents` to a new file at `path` via a synced temporary file.
fn write_new(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if path.exists() {
        return Err(StoreError::AlreadyExists(path.display().to_string()));
    }

    let tmp = temp_path(path);
    let result = (|| -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Hidden sibling of `path`; never matches the artifact or sidecar patterns.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
