//! Concurrent batch image acquisition
//!
//! Launches one fetch task per URL, all concurrent and unbounded (no
//! pool/cap; expected batch sizes are image sets, throttling is a
//! non-goal). Each task writes only its own indexed slot, so completions
//! cannot race on shared state. Failure of one task has no effect on the
//! others; the batch always settles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blob::{BlobStore, ScopeId};
use crate::fetch::Fetcher;
use crate::types::{AcquisitionItem, BatchSnapshot};

/// Acquires an ordered list of remote images into local blob handles
///
/// Cheaply cloneable; clones observe and drive the same batch.
///
/// # Examples
///
/// ```no_run
/// use mediaproc::{Config, MediaProcessor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = MediaProcessor::new(Config::default())?;
/// let acquirer = processor.batch_acquirer();
///
/// acquirer.start(vec![
///     "https://img.example.com/1.jpg".to_string(),
///     "https://img.example.com/2.jpg".to_string(),
/// ]);
///
/// let batch = acquirer.settled().await;
/// println!("{} ok, {} failed", batch.success_count(), batch.fail_count());
///
/// acquirer.dispose();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BatchAcquirer {
    fetcher: Fetcher,
    blobs: BlobStore,
    tx: watch::Sender<BatchSnapshot>,
    generations: Arc<AtomicU64>,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl BatchAcquirer {
    /// Create an acquirer bound to the given fetcher and blob store
    pub fn new(fetcher: Fetcher, blobs: BlobStore) -> Self {
        let (tx, _) = watch::channel(BatchSnapshot::default());
        Self {
            fetcher,
            blobs,
            tx,
            generations: Arc::new(AtomicU64::new(0)),
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Start acquiring `urls`, replacing any previous batch
    ///
    /// The previous batch's in-flight fetches are aborted best-effort and
    /// all its handles revoked; there is no incremental reuse. All N fetches
    /// launch immediately and complete in arbitrary order.
    pub fn start(&self, urls: Vec<String>) {
        let old_scope = self.cancel_in_flight();

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let scope = self.blobs.scope();
        let cancel = {
            let mut guard = self.lock_cancel();
            *guard = CancellationToken::new();
            guard.clone()
        };

        let snapshot = BatchSnapshot {
            items: (0..urls.len()).map(AcquisitionItem::pending).collect(),
            generation,
            scope: Some(scope),
        };
        // Publish before sweeping: once the fresh generation is visible,
        // a straggler from the old batch cannot commit its handle and will
        // self-revoke, so the sweep below cannot race a late create into
        // an orphaned handle
        self.tx.send_replace(snapshot);
        self.release_scope(old_scope);
        info!(count = urls.len(), generation, "batch acquisition started");

        for (index, url) in urls.into_iter().enumerate() {
            let this = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let fetched = tokio::select! {
                    result = this.fetcher.fetch_image(&url) => result,
                    () = cancel.cancelled() => {
                        debug!(index, "image fetch aborted by disposal");
                        return;
                    }
                };

                match fetched {
                    Ok(bytes) => {
                        let handle = this.blobs.create(scope, bytes);
                        let mut committed = false;
                        this.tx.send_if_modified(|snapshot| {
                            if snapshot.generation != generation {
                                return false;
                            }
                            // Each task writes only its own slot
                            let item = &mut snapshot.items[index];
                            item.loading = false;
                            item.handle = Some(handle);
                            committed = true;
                            true
                        });
                        if !committed {
                            // Superseded between fetch and write; no owner
                            // can see this handle, so release it here (the
                            // disposer's sweep may have beaten us to it)
                            this.blobs.revoke(handle);
                        }
                    }
                    Err(e) => {
                        // Recorded, never thrown: the batch always settles
                        warn!(index, url, %e, "image fetch failed");
                        this.tx.send_if_modified(|snapshot| {
                            if snapshot.generation != generation {
                                return false;
                            }
                            let item = &mut snapshot.items[index];
                            item.loading = false;
                            item.failed = true;
                            true
                        });
                    }
                }
            });
        }
    }

    /// Current batch snapshot
    pub fn snapshot(&self) -> BatchSnapshot {
        self.tx.borrow().clone()
    }

    /// Subscribe to batch updates; drop the receiver to unsubscribe
    pub fn subscribe(&self) -> watch::Receiver<BatchSnapshot> {
        self.tx.subscribe()
    }

    /// Wait until every item has reached a terminal outcome
    ///
    /// Settlement is derived by scanning the items; there is no aggregate
    /// callback. Returns immediately for an already-settled (or empty)
    /// batch.
    pub async fn settled(&self) -> BatchSnapshot {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(BatchSnapshot::is_settled).await {
            Ok(snapshot) => snapshot.clone(),
            // Unreachable while self holds the sender; fall back to the
            // current snapshot rather than panic
            Err(_) => self.snapshot(),
        }
    }

    /// Tear down the current batch: abort in-flight fetches best-effort and
    /// revoke every handle the batch created (including a packaged archive
    /// registered in its scope)
    pub fn dispose(&self) {
        let old_scope = self.cancel_in_flight();
        // Same ordering as start(): invalidate stale commits first, then sweep
        self.tx.send_replace(BatchSnapshot {
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
            ..Default::default()
        });
        self.release_scope(old_scope);
        debug!("batch disposed");
    }

    /// Cancel the current batch's fetches and return its scope for sweeping
    fn cancel_in_flight(&self) -> Option<ScopeId> {
        self.lock_cancel().cancel();
        self.tx.borrow().scope
    }

    fn release_scope(&self, scope: Option<ScopeId>) {
        if let Some(scope) = scope {
            let revoked = self.blobs.revoke_all(scope);
            if revoked > 0 {
                debug!(revoked, "revoked previous batch handles");
            }
        }
    }

    fn lock_cancel(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
