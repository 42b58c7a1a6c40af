//! Debounced Link Index Scheduling
//!
//! Edits arrive keystroke-fast; re-deriving a note's edges on every one
//! would thrash the store. The scheduler coalesces update requests per
//! note id: each request arms (or re-arms) a timer for that note, and
//! only the request that survives the quiet period runs.
//!
//! Coalescing is per key; different notes never delay each other. Once
//! an update has been claimed and its transaction started, it runs to
//! completion; a newer request for the same note waits behind it on a
//! per-key run lock.
//!
//! Failures are logged and the note is rescheduled once. The index is
//! derived state, so a persistently failing update degrades to a stale
//! backlink set that the next edit or a full rebuild repairs.

use crate::services::link_index::LinkIndexUpdater;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default quiet period between the last request and execution
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

struct PendingEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    updater: Arc<dyn LinkIndexUpdater>,
    quiet_period: Duration,
    /// Armed timers, one per note id. The generation identifies which
    /// request currently owns the key.
    pending: Mutex<HashMap<String, PendingEntry>>,
    /// Per-note execution locks; an update in flight blocks the next one
    /// for the same note, never for other notes.
    run_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    next_generation: AtomicU64,
}

/// Coalesces link index updates per note id
///
/// # Examples
///
/// ```no_run
/// use vaultops_core::db::DatabaseService;
/// use vaultops_core::services::link_index::LinkIndexService;
/// use vaultops_core::services::link_scheduler::LinkIndexScheduler;
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new(PathBuf::from("./data/vaultops.db")).await?;
///     let scheduler = LinkIndexScheduler::new(Arc::new(LinkIndexService::new(db)));
///     scheduler.schedule_update("some-note-id").await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct LinkIndexScheduler {
    inner: Arc<SchedulerInner>,
}

impl LinkIndexScheduler {
    /// Scheduler with the default quiet period
    pub fn new(updater: Arc<dyn LinkIndexUpdater>) -> Self {
        Self::with_quiet_period(updater, DEFAULT_QUIET_PERIOD)
    }

    /// Scheduler with an explicit quiet period
    pub fn with_quiet_period(updater: Arc<dyn LinkIndexUpdater>, quiet_period: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                updater,
                quiet_period,
                pending: Mutex::new(HashMap::new()),
                run_locks: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Request a link index update for a note
    ///
    /// Supersedes any still-waiting request for the same note; the timer
    /// restarts from now. Returns immediately, the update runs in the
    /// background after the quiet period.
    pub async fn schedule_update(&self, note_id: &str) {
        self.inner.arm(note_id, false).await;
    }

    /// Number of notes with an armed, not yet executed, update
    pub async fn pending_count(&self) -> usize {
        self.inner.pending.lock().await.len()
    }
}

impl SchedulerInner {
    async fn arm(self: &Arc<Self>, note_id: &str, is_retry: bool) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock().await;

        if is_retry && pending.contains_key(note_id) {
            // A fresh request already superseded the failed run
            return;
        }

        let handle = tokio::spawn(run_after_quiet(
            self.clone(),
            note_id.to_string(),
            generation,
            is_retry,
        ));

        if let Some(previous) = pending.insert(
            note_id.to_string(),
            PendingEntry { generation, handle },
        ) {
            // The superseded task is either still sleeping (abort is
            // clean) or has already claimed the key and removed its
            // entry, in which case it is not the one stored here.
            previous.handle.abort();
        }
    }

    /// Atomically take ownership of the key iff this request is still
    /// the latest one.
    async fn claim(&self, note_id: &str, generation: u64) -> bool {
        let mut pending = self.pending.lock().await;
        match pending.get(note_id) {
            Some(entry) if entry.generation == generation => {
                pending.remove(note_id);
                true
            }
            _ => false,
        }
    }

    async fn run_lock(&self, note_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.run_locks.lock().await;
        locks
            .entry(note_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the key's run lock once no task holds or awaits it, keeping
    /// the map bounded by in-flight notes instead of all notes ever seen.
    async fn release_run_lock(&self, note_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.run_locks.lock().await;
        if let Some(entry) = locks.get(note_id) {
            // Holding the map lock, no new clone can appear; a count of
            // one means only the map still references it.
            if Arc::strong_count(entry) == 1 {
                locks.remove(note_id);
            }
        }
    }
}

/// Boxed so the arm -> spawn -> retry -> arm cycle has a concrete,
/// provably `Send` future type.
fn run_after_quiet(
    inner: Arc<SchedulerInner>,
    note_id: String,
    generation: u64,
    is_retry: bool,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
    tokio::time::sleep(inner.quiet_period).await;

    if !inner.claim(&note_id, generation).await {
        // A newer request owns this key now
        return;
    }

    let run_lock = inner.run_lock(&note_id).await;
    let result = {
        let _guard = run_lock.lock().await;
        inner.updater.update_for_note(&note_id).await
    };
    inner.release_run_lock(&note_id, run_lock).await;

    match result {
        Ok(()) => debug!(note_id = %note_id, "debounced link index update ran"),
        Err(e) => {
            warn!(note_id = %note_id, error = %e, "link index update failed");
            if !is_retry {
                inner.arm(&note_id, true).await;
            }
        }
    }
    })
}
