// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ephemeral files for file-based print jobs.
//
// The OS print facilities only take documents from disk, so PDF jobs are
// written to the temp directory and removed again once the spooler has had
// time to pick them up.  Deletion runs on a tokio timer per file; the
// timers are tracked so shutdown can purge whatever is still waiting.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use printbridge_core::error::{PrintBridgeError, Result};

/// File name prefix for everything this manager creates.
const FILE_PREFIX: &str = "printbridge";

/// A deletion that has been scheduled but has not run yet.
struct PendingDelete {
    path: PathBuf,
    timer: AbortHandle,
}

type PendingMap = Arc<Mutex<HashMap<u64, PendingDelete>>>;

/// Creates uniquely named temp files and deletes them after a delay.
pub struct TempFileManager {
    dir: PathBuf,
    /// Disambiguates files created within the same clock tick.
    sequence: AtomicU64,
    next_timer: AtomicU64,
    pending: PendingMap,
}

impl TempFileManager {
    /// Manager rooted in the system temp directory.
    pub fn new() -> Self {
        Self::in_dir(std::env::temp_dir())
    }

    /// Manager rooted in `dir` (which must exist).
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
            next_timer: AtomicU64::new(0),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` to a new file named
    /// `printbridge_<unix-nanos>_<seq>.<extension>` and return its path.
    ///
    /// The file is opened with `create_new`, so an existing file is never
    /// overwritten.
    pub fn create_unique(&self, data: &[u8], extension: &str) -> Result<PathBuf> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = self
            .dir
            .join(format!("{FILE_PREFIX}_{nanos}_{seq}.{extension}"));

        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| PrintBridgeError::TempFile(format!("{}: {e}", path.display())))?;
        fill_or_discard(&path, file, data)?;

        debug!(path = %path.display(), bytes = data.len(), "created temp file");
        Ok(path)
    }

    /// Delete `path` once `delay` has elapsed.
    ///
    /// Returns immediately; the deletion runs on its own task and a failure
    /// is only logged.  The delay counts from this call.  Outside a tokio
    /// runtime there is no timer to run, so the file is deleted at once.
    pub fn schedule_delete(&self, path: PathBuf, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(path = %path.display(), "no runtime for delayed deletion, deleting now");
            remove_logged(&path);
            return;
        };
        let deadline = Instant::now() + delay;
        let id = self.next_timer.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let task_path = path.clone();

        // Held across the spawn so the task cannot finish (and try to
        // deregister) before it has been registered.
        let mut guard = lock(&self.pending);
        let timer = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            remove_logged(&task_path);
            lock(&pending).remove(&id);
        });
        guard.insert(
            id,
            PendingDelete {
                path: path.clone(),
                timer: timer.abort_handle(),
            },
        );
        drop(guard);

        debug!(path = %path.display(), delay_secs = delay.as_secs_f64(), "temp file deletion scheduled");
    }

    /// Paths whose deletion is still waiting on its timer.
    pub fn pending(&self) -> Vec<PathBuf> {
        lock(&self.pending)
            .values()
            .map(|p| p.path.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Abort every pending timer without deleting anything.
    ///
    /// Returns the number of timers cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingDelete> = lock(&self.pending).drain().map(|(_, p)| p).collect();
        for entry in &drained {
            entry.timer.abort();
        }
        drained.len()
    }

    /// Abort every pending timer and delete its file right away.
    ///
    /// Returns the number of files handled.
    pub fn purge_now(&self) -> usize {
        let drained: Vec<PendingDelete> = lock(&self.pending).drain().map(|(_, p)| p).collect();
        for entry in &drained {
            entry.timer.abort();
            remove_logged(&entry.path);
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "purged pending temp files");
        }
        drained.len()
    }
}

impl Default for TempFileManager {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write `data` through `file`; on failure close it and remove `path` so no
/// truncated document is left behind.
fn fill_or_discard(path: &Path, mut file: impl Write, data: &[u8]) -> Result<()> {
    match file.write_all(data).and_then(|()| file.flush()) {
        Ok(()) => Ok(()),
        Err(e) => {
            drop(file);
            remove_logged(path);
            Err(PrintBridgeError::TempFile(format!("{}: {e}", path.display())))
        }
    }
}

/// Remove `path`, logging instead of returning failures.
fn remove_logged(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "cleaned up temp file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "temp file already gone");
        }
        Err(e) => {
            let err = PrintBridgeError::Cleanup(format!("{}: {e}", path.display()));
            warn!(error = %err, "failed to clean up temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Let spawned timer tasks run after the clock moved.
    async fn settle(manager: &TempFileManager) {
        for _ in 0..100 {
            if manager.pending_count() == 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn created_file_holds_the_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::in_dir(dir.path());

        let path = manager.create_unique(b"%PDF-1.7 body", "pdf").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 body");
        assert_eq!(path.parent().unwrap(), dir.path());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("printbridge_"), "{name}");
        assert!(name.ends_with(".pdf"), "{name}");
    }

    #[test]
    fn concurrent_creations_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(TempFileManager::in_dir(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|j| manager.create_unique(format!("{i}-{j}").as_bytes(), "pdf").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let paths: Vec<PathBuf> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let unique: HashSet<&PathBuf> = paths.iter().collect();
        assert_eq!(unique.len(), 200);
    }

    #[test]
    fn missing_directory_is_a_temp_file_error() {
        let manager = TempFileManager::in_dir("/nonexistent/printbridge-temp");
        let err = manager.create_unique(b"x", "pdf").unwrap_err();
        assert!(matches!(err, PrintBridgeError::TempFile(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn file_is_deleted_only_after_the_delay() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::in_dir(dir.path());
        let path = manager.create_unique(b"doc", "pdf").unwrap();

        manager.schedule_delete(path.clone(), Duration::from_secs(20));
        assert_eq!(manager.pending(), vec![path.clone()]);

        tokio::time::advance(Duration::from_secs(19)).await;
        tokio::task::yield_now().await;
        assert!(path.exists());

        tokio::time::advance(Duration::from_secs(2)).await;
        settle(&manager).await;
        assert!(!path.exists());
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_counts_from_scheduling_not_first_poll() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::in_dir(dir.path());
        let path = manager.create_unique(b"doc", "pdf").unwrap();

        manager.schedule_delete(path.clone(), Duration::from_secs(20));
        // The timer task has not been polled yet when the clock jumps.
        tokio::time::advance(Duration::from_secs(21)).await;
        settle(&manager).await;

        assert!(!path.exists());
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn schedule_without_runtime_deletes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::in_dir(dir.path());
        let path = manager.create_unique(b"doc", "pdf").unwrap();

        manager.schedule_delete(path.clone(), Duration::from_secs(20));

        assert!(!path.exists());
        assert_eq!(manager.pending_count(), 0);
    }

    /// Accepts nothing; every write fails like a full disk.
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printbridge_partial.pdf");
        std::fs::write(&path, b"").unwrap();

        let err = fill_or_discard(&path, FullDisk, b"%PDF-1.4").unwrap_err();

        assert!(matches!(err, PrintBridgeError::TempFile(_)));
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::in_dir(dir.path());
        let path = manager.create_unique(b"doc", "pdf").unwrap();
        manager.schedule_delete(path.clone(), Duration::from_secs(20));

        assert_eq!(manager.cancel_all(), 1);
        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;

        assert!(path.exists());
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_deletes_without_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::in_dir(dir.path());
        let a = manager.create_unique(b"a", "pdf").unwrap();
        let b = manager.create_unique(b"b", "pdf").unwrap();
        manager.schedule_delete(a.clone(), Duration::from_secs(20));
        manager.schedule_delete(b.clone(), Duration::from_secs(20));

        assert_eq!(manager.purge_now(), 2);
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::in_dir(dir.path());
        let path = manager.create_unique(b"doc", "pdf").unwrap();
        std::fs::remove_file(&path).unwrap();

        manager.schedule_delete(path, Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        settle(&manager).await;

        assert_eq!(manager.pending_count(), 0);
    }
}
