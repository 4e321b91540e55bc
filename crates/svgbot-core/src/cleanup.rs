//! Deferred deletion of working files.
//!
//! Every scheduled path gets its own task that sleeps until the deadline and
//! unlinks the file once. Scheduling a path again replaces the earlier task, so a
//! path is never deleted twice by us. Deletion errors are logged and dropped.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Longest retention the scheduler honours; longer delays are clamped.
pub const MAX_CLEANUP_DELAY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug)]
struct PendingCleanup {
    id: u64,
    due_at: DateTime<Utc>,
    cancel: CancellationToken,
}

#[derive(Clone, Debug, Default)]
pub struct CleanupScheduler {
    inner: Arc<CleanupInner>,
}

#[derive(Debug, Default)]
struct CleanupInner {
    next_id: AtomicU64,
    pending: Mutex<HashMap<PathBuf, PendingCleanup>>,
}

impl CleanupScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete each of `paths` once `delay` has elapsed. Fire-and-forget.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, paths: impl IntoIterator<Item = PathBuf>, delay: Duration) {
        let delay = delay.min(MAX_CLEANUP_DELAY);
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now);
        let due_at = Utc::now() + TimeDelta::from_std(delay).unwrap_or_else(|_| TimeDelta::zero());

        for path in paths {
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            let cancel = CancellationToken::new();

            let replaced = self.inner.pending().insert(
                path.clone(),
                PendingCleanup {
                    id,
                    due_at,
                    cancel: cancel.clone(),
                },
            );
            if let Some(old) = replaced {
                old.cancel.cancel();
                tracing::debug!(path = %path.display(), "cleanup rescheduled");
            }

            tracing::debug!(path = %path.display(), %due_at, "cleanup scheduled");
            let inner = self.inner.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep_until(deadline) => {}
                }
                inner.finish(&path, id);
                remove_path(&path).await;
            });
        }
    }

    /// Drop the pending deletion of `path`. Returns false if nothing was pending.
    pub fn cancel(&self, path: &Path) -> bool {
        match self.inner.pending().remove(path) {
            Some(p) => {
                p.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, p) in self.inner.pending().drain() {
            p.cancel.cancel();
        }
    }

    /// Pending deletions, ordered by path.
    pub fn pending(&self) -> Vec<(PathBuf, DateTime<Utc>)> {
        let mut out: Vec<_> = self
            .inner
            .pending()
            .iter()
            .map(|(path, p)| (path.clone(), p.due_at))
            .collect();
        out.sort();
        out
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.inner.pending().contains_key(path)
    }
}

impl CleanupInner {
    fn pending(&self) -> MutexGuard<'_, HashMap<PathBuf, PendingCleanup>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget `path` unless it was rescheduled in the meantime.
    fn finish(&self, path: &Path, id: u64) {
        let mut pending = self.pending();
        if pending.get(path).is_some_and(|p| p.id == id) {
            pending.remove(path);
        }
    }
}

async fn remove_path(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::info!(path = %path.display(), "removed file"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "remove file failed"),
    }
}
