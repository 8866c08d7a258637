// crates/ums-store-file/src/lib.rs
// ============================================================================
// Module: UMS File Snapshot Store
// Description: File-backed snapshot persistence with advisory locking.
// Purpose: Serialize shell invocations through one exclusive snapshot lock.
// Dependencies: fs2, serde_json, ums-core
// ============================================================================

//! ## Overview
//! Shells sharing an engine must serialize through the snapshot
//! protocol: acquire the exclusive advisory lock, load and import the
//! snapshot, execute the operation, export and save, release. This
//! crate implements that discipline: [`FileSnapshotStore`] persists the
//! snapshot atomically (temp file plus rename in the same directory)
//! and [`SnapshotLock`] holds an exclusive `flock` on a sidecar lock
//! file for the full read-modify-write. The store never interprets
//! snapshot contents beyond JSON well-formedness; legacy documents pass
//! through to the engine importer untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use fs2::FileExt;
use serde_json::Value;
use ums_core::SnapshotStore;
use ums_core::SnapshotStoreError;

// ============================================================================
// SECTION: Lock Guard
// ============================================================================

/// Exclusive advisory lock over a snapshot location.
///
/// # Invariants
/// - The lock is held from construction until drop; callers keep the
///   guard alive for the full read-modify-write of one operation.
#[derive(Debug)]
pub struct SnapshotLock {
    /// Open handle to the sidecar lock file; the advisory lock rides
    /// on this descriptor.
    handle: File,
    /// Lock file path, kept for diagnostics.
    path: PathBuf,
}

impl SnapshotLock {
    /// Returns the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        // Unlock errors at drop cannot be surfaced; the descriptor
        // close releases the advisory lock regardless.
        let _ = fs2::FileExt::unlock(&self.handle);
    }
}

// ============================================================================
// SECTION: File Store
// ============================================================================

/// File-backed snapshot store.
///
/// # Invariants
/// - Saves are atomic: a reader never observes a partially written
///   snapshot.
/// - A missing snapshot file loads as `None`.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    /// Snapshot file path.
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Creates a store over the given snapshot path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Returns the snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the sidecar lock file path (`<snapshot>.lock`).
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Acquires the exclusive advisory lock, blocking until available.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotStoreError::Lock`] when the lock file cannot
    /// be opened or locked.
    pub fn lock_exclusive(&self) -> Result<SnapshotLock, SnapshotStoreError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| SnapshotStoreError::Lock(format!("create lock dir: {err}")))?;
        }
        let handle = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|err| SnapshotStoreError::Lock(format!("open {}: {err}", lock_path.display())))?;
        handle
            .lock_exclusive()
            .map_err(|err| SnapshotStoreError::Lock(format!("lock {}: {err}", lock_path.display())))?;
        Ok(SnapshotLock {
            handle,
            path: lock_path,
        })
    }

    /// Attempts the exclusive lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotStoreError::Lock`] when the lock is already
    /// held or cannot be opened.
    pub fn try_lock_exclusive(&self) -> Result<SnapshotLock, SnapshotStoreError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| SnapshotStoreError::Lock(format!("create lock dir: {err}")))?;
        }
        let handle = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|err| SnapshotStoreError::Lock(format!("open {}: {err}", lock_path.display())))?;
        handle
            .try_lock_exclusive()
            .map_err(|err| SnapshotStoreError::Lock(format!("busy {}: {err}", lock_path.display())))?;
        Ok(SnapshotLock {
            handle,
            path: lock_path,
        })
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<Value>, SnapshotStoreError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(SnapshotStoreError::Io(format!(
                    "open {}: {err}",
                    self.path.display()
                )));
            }
        };
        let mut raw = String::new();
        file.read_to_string(&mut raw)
            .map_err(|err| SnapshotStoreError::Io(format!("read {}: {err}", self.path.display())))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let document: Value = serde_json::from_str(&raw).map_err(|err| {
            SnapshotStoreError::Corrupt(format!("parse {}: {err}", self.path.display()))
        })?;
        Ok(Some(document))
    }

    fn save(&self, snapshot: &Value) -> Result<(), SnapshotStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| SnapshotStoreError::Io(format!("create dir: {err}")))?;
        }
        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let rendered = serde_json::to_string(snapshot)
            .map_err(|err| SnapshotStoreError::Io(format!("serialize snapshot: {err}")))?;
        {
            let mut tmp = File::create(&tmp_path).map_err(|err| {
                SnapshotStoreError::Io(format!("create {}: {err}", tmp_path.display()))
            })?;
            tmp.write_all(rendered.as_bytes()).map_err(|err| {
                SnapshotStoreError::Io(format!("write {}: {err}", tmp_path.display()))
            })?;
            tmp.sync_all().map_err(|err| {
                SnapshotStoreError::Io(format!("sync {}: {err}", tmp_path.display()))
            })?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|err| {
            SnapshotStoreError::Io(format!(
                "rename {} -> {}: {err}",
                tmp_path.display(),
                self.path.display()
            ))
        })?;
        Ok(())
    }

    fn readiness(&self) -> Result<(), SnapshotStoreError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                if parent.exists() {
                    Ok(())
                } else {
                    Err(SnapshotStoreError::Io(format!(
                        "snapshot directory missing: {}",
                        parent.display()
                    )))
                }
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Snapshot store backed by process memory, for tests and ephemeral
/// sessions.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    /// Last saved document.
    slot: std::sync::Mutex<Option<Value>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Option<Value>, SnapshotStoreError> {
        self.slot
            .lock()
            .map(|slot| slot.clone())
            .map_err(|_| SnapshotStoreError::Io("snapshot slot poisoned".to_string()))
    }

    fn save(&self, snapshot: &Value) -> Result<(), SnapshotStoreError> {
        self.slot
            .lock()
            .map(|mut slot| *slot = Some(snapshot.clone()))
            .map_err(|_| SnapshotStoreError::Io("snapshot slot poisoned".to_string()))
    }
}
