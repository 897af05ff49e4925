//! Local filesystem spool backend.
//!
//! Each spool is a single file inside the backend's directory, written and
//! read via `tokio::fs` for async I/O and deleted on release.

use crate::backend::{BoxAsyncBufRead, BoxAsyncWrite, SpoolBackend};
use crate::error::{ErrorKind, Result};
use crate::SpoolId;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use std::collections::HashSet;
use std::fs::{create_dir_all as sync_create_dir, remove_file as sync_remove_file};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::BufReader;

const PREFIX: &str = "spool-";
const EXTENSION: &str = "jsonl";

/// Local filesystem spool backend.
///
/// Spool files are named `spool-<random>.jsonl` and created exclusively, so
/// several backends (in this process or others) may share one configured
/// directory. Each backend only ever reads or releases the spools it created.
///
/// # Examples
///
/// ```no_run
/// use depinfo_spool::backend::LocalSpool;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Files under a configured directory...
/// let shared = LocalSpool::new("shared", "/var/tmp/depinfo")?;
/// // ...or under a private temporary directory removed on drop.
/// let private = LocalSpool::temporary("private")?;
/// # Ok(())
/// # }
/// ```
pub struct LocalSpool {
    name: String,
    root: PathBuf,
    live: Mutex<HashSet<SpoolId>>,
    // Held for its `Drop`, which removes the directory.
    _tempdir: Option<TempDir>,
}
impl LocalSpool {
    /// Create a spool backend writing into `root`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the path is not
    /// absolute or exists but is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once per backend; not worth an async constructor.
            sync_create_dir(&root).map_err(ErrorKind::Io)?;
        }
        Ok(Self::with_root(name, root, None))
    }

    /// Create a spool backend inside a fresh temporary directory, which is
    /// deleted (along with any spool still in it) when the backend is dropped.
    pub fn temporary(name: impl Into<String>) -> Result<Self> {
        let tempdir = tempfile::Builder::new().prefix("depinfo-spool-").tempdir().map_err(ErrorKind::Io)?;
        Ok(Self::with_root(name, tempdir.path().to_path_buf(), Some(tempdir)))
    }

    fn with_root(name: impl Into<String>, root: PathBuf, tempdir: Option<TempDir>) -> Self {
        Self {
            name: name.into(),
            root,
            live: Mutex::new(HashSet::new()),
            _tempdir: tempdir,
        }
    }

    /// Directory the spool files are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, id: &SpoolId) -> PathBuf {
        self.root.join(format!("{id}.{EXTENSION}"))
    }

    fn live(&self) -> MutexGuard<'_, HashSet<SpoolId>> {
        // The set is only ever inserted into or removed from; a panic while
        // holding the lock can't leave it half-updated.
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn map_io_error(e: std::io::Error, id: &SpoolId) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(id.clone()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl SpoolBackend for LocalSpool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self) -> Result<(SpoolId, BoxAsyncWrite)> {
        let root = self.root.clone();
        let suffix = format!(".{EXTENSION}");
        let created = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(PREFIX)
                .suffix(&suffix)
                .tempfile_in(&root)
                .and_then(|file| file.keep().map_err(|e| e.error))
        })
        .await
        .or_raise(|| ErrorKind::BackendError("spool file creation was interrupted".to_string()))?;
        let (file, path) = created
            .or_raise(|| ErrorKind::BackendError(format!("unable to create spool file in `{}`", self.root.display())))?;
        let id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(SpoolId::new)
            .ok_or_raise(|| ErrorKind::InvalidPath(path.clone()))?;
        self.live().insert(id.clone());
        tracing::trace!(backend = self.name.as_str(), spool = %id, path = %path.display(), "Spool file created");
        Ok((id, Box::pin(File::from_std(file))))
    }

    async fn reader(&self, id: &SpoolId) -> Result<BoxAsyncBufRead> {
        if !self.live().contains(id) {
            exn::bail!(ErrorKind::NotFound(id.clone()));
        }
        let file = File::open(self.path(id)).await.map_err(|e| Self::map_io_error(e, id))?;
        Ok(Box::pin(BufReader::new(file)))
    }

    fn release(&self, id: &SpoolId) -> Result<()> {
        if !self.live().remove(id) {
            exn::bail!(ErrorKind::NotFound(id.clone()));
        }
        Ok(sync_remove_file(self.path(id)).map_err(|e| Self::map_io_error(e, id))?)
    }

    fn outstanding(&self) -> usize {
        self.live().len()
    }
}
