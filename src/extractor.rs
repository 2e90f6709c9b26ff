//! Remote-video-to-local-audio extraction pipeline
//!
//! One [`AudioExtractor`] owns a per-invocation state machine:
//! Idle → Loading → Downloading → Converting → Completed/Error. The two
//! work phases (download, convert) run strictly sequentially within a run,
//! and a run is not reentrant: `extract_audio` while active is rejected,
//! not queued. Observers subscribe to a watch channel and receive
//! latest-state-wins snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blob::{BlobStore, ScopeId};
use crate::config::TranscodeConfig;
use crate::error::{Error, ErrorDetail};
use crate::fetch::Fetcher;
use crate::transcode::Transcoder;
use crate::types::{AudioArtifact, ExtractionState, ExtractionStatus, ProgressInfo};
use crate::utils::sanitize_filename;

/// Cancellation token and blob scope of the run currently in flight
#[derive(Default)]
struct ActiveRun {
    cancel: CancellationToken,
    scope: Option<ScopeId>,
}

/// Orchestrates fetch → transcode → downloadable audio handle
///
/// Cheaply cloneable; clones observe and drive the same state machine.
///
/// # Examples
///
/// ```no_run
/// use mediaproc::{Config, MediaProcessor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = MediaProcessor::new(Config::default())?;
/// let extractor = processor.audio_extractor();
///
/// let mut states = extractor.subscribe();
/// assert!(extractor.extract_audio("https://example.com/v.mp4", "My Video"));
///
/// while states.changed().await.is_ok() {
///     let state = states.borrow().clone();
///     println!("{:?} {:?}", state.status, state.percent);
///     if state.status.is_terminal() {
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AudioExtractor {
    fetcher: Fetcher,
    engine: Arc<dyn Transcoder>,
    blobs: BlobStore,
    audio_format: String,
    tx: watch::Sender<ExtractionState>,
    runs: Arc<AtomicU64>,
    active: Arc<Mutex<ActiveRun>>,
}

impl AudioExtractor {
    /// Create an extractor bound to the given fetcher, engine, and blob store
    pub fn new(
        fetcher: Fetcher,
        engine: Arc<dyn Transcoder>,
        blobs: BlobStore,
        config: &TranscodeConfig,
    ) -> Self {
        let (tx, _) = watch::channel(ExtractionState::default());
        Self {
            fetcher,
            engine,
            blobs,
            audio_format: config.audio_format.clone(),
            tx,
            runs: Arc::new(AtomicU64::new(0)),
            active: Arc::new(Mutex::new(ActiveRun::default())),
        }
    }

    /// Start an extraction run
    ///
    /// Accepted only from Idle; returns `false` (no queueing, no restart)
    /// in any other state. Acceptance is atomic, so two racing calls admit
    /// exactly one run.
    pub fn extract_audio(&self, source_url: &str, label: &str) -> bool {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let mut accepted = false;
        self.tx.send_if_modified(|state| {
            if state.status != ExtractionStatus::Idle {
                return false;
            }
            *state = ExtractionState {
                status: ExtractionStatus::Loading,
                run,
                ..Default::default()
            };
            accepted = true;
            true
        });
        if !accepted {
            debug!(source_url, "extract_audio rejected: a run is already active");
            return false;
        }

        let cancel = CancellationToken::new();
        let scope = self.blobs.scope();
        {
            let mut active = self.lock_active();
            active.cancel = cancel.clone();
            active.scope = Some(scope);
        }

        info!(source_url, label, run, "extraction accepted");
        let this = self.clone();
        let source_url = source_url.to_string();
        let label = label.to_string();
        tokio::spawn(async move {
            this.run_pipeline(run, scope, cancel, source_url, label).await;
        });
        true
    }

    /// Return to Idle from a terminal state, releasing the held output
    ///
    /// A no-op returning `false` unless the current status is Completed or
    /// Error. A retried extraction restarts from the beginning; partial
    /// progress is never preserved.
    pub fn reset(&self) -> bool {
        let mut did_reset = false;
        self.tx.send_if_modified(|state| {
            if !state.status.is_terminal() {
                return false;
            }
            *state = ExtractionState {
                run: state.run,
                ..Default::default()
            };
            did_reset = true;
            true
        });
        if did_reset {
            if let Some(scope) = self.lock_active().scope.take() {
                self.blobs.revoke_all(scope);
            }
            debug!("extractor reset to idle");
        }
        did_reset
    }

    /// Best-effort teardown: abort any in-flight run, revoke its handles,
    /// and return to Idle
    ///
    /// Intended for the owner's replacement or shutdown path; safe to call
    /// in any state.
    pub fn dispose(&self) {
        // Bumping the run generation invalidates every pending write from
        // the superseded task
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let scope = {
            let mut active = self.lock_active();
            active.cancel.cancel();
            active.scope.take()
        };
        self.tx.send_modify(|state| {
            *state = ExtractionState {
                run,
                ..Default::default()
            };
        });
        if let Some(scope) = scope {
            self.blobs.revoke_all(scope);
        }
        debug!("extractor disposed");
    }

    /// Current state snapshot
    pub fn state(&self) -> ExtractionState {
        self.tx.borrow().clone()
    }

    /// Subscribe to state updates; drop the receiver to unsubscribe
    ///
    /// Delivery is latest-state-wins: a slow observer sees the newest
    /// snapshot, not every intermediate one.
    pub fn subscribe(&self) -> watch::Receiver<ExtractionState> {
        self.tx.subscribe()
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, ActiveRun> {
        self.active.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Apply `mutate` to the state if `run` is still current
    fn transition(&self, run: u64, mutate: impl FnOnce(&mut ExtractionState)) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|state| {
            if state.run != run {
                return false;
            }
            mutate(state);
            applied = true;
            true
        });
        applied
    }

    /// Halt the run in the Error state; requires an explicit `reset()`
    /// before retry
    fn fail(&self, run: u64, scope: ScopeId, error: &Error) {
        warn!(run, kind = error.kind(), %error, "extraction failed");
        self.transition(run, |state| {
            state.status = ExtractionStatus::Error;
            state.percent = None;
            state.progress = None;
            state.error = Some(ErrorDetail::from(error));
        });
        // Nothing useful survives a failed run
        self.blobs.revoke_all(scope);
    }

    async fn run_pipeline(
        &self,
        run: u64,
        scope: ScopeId,
        cancel: CancellationToken,
        source_url: String,
        label: String,
    ) {
        // Phase: Loading (engine initialization, no progress fraction)
        if let Err(e) = self.engine.load().await {
            self.fail(run, scope, &e);
            return;
        }

        // Phase: Downloading
        if !self.transition(run, |state| {
            state.status = ExtractionStatus::Downloading;
            state.percent = None;
            state.progress = Some(ProgressInfo::default());
        }) {
            return;
        }

        let tx = self.tx.clone();
        let fetched = self
            .fetcher
            .fetch_with_progress(&source_url, &cancel, move |loaded, total| {
                tx.send_if_modified(|state| {
                    if state.run != run || state.status != ExtractionStatus::Downloading {
                        return false;
                    }
                    let current = state.progress.map_or(0, |p| p.loaded_bytes);
                    if loaded < current {
                        return false;
                    }
                    state.progress = Some(ProgressInfo {
                        loaded_bytes: loaded,
                        total_bytes: total,
                    });
                    // floor(loaded/total*100) when the total is known,
                    // indeterminate otherwise
                    state.percent = total.map(|total| {
                        if total == 0 {
                            100
                        } else {
                            ((loaded * 100) / total).min(100) as u8
                        }
                    });
                    true
                });
            })
            .await;

        let video = match fetched {
            Ok(bytes) => bytes,
            // Disposal already reset the state; do not resurrect it
            Err(Error::Cancelled) => return,
            Err(e) => {
                self.fail(run, scope, &e);
                return;
            }
        };

        // Phase: Converting (engine-driven progress, scale independent of
        // the download phase)
        if !self.transition(run, |state| {
            state.status = ExtractionStatus::Converting;
            state.percent = Some(0);
            state.progress = None;
        }) {
            return;
        }

        let tx = self.tx.clone();
        let on_convert_progress = move |pct: u8| {
            tx.send_if_modified(|state| {
                if state.run != run || state.status != ExtractionStatus::Converting {
                    return false;
                }
                if state.percent.is_some_and(|current| pct <= current) {
                    return false;
                }
                state.percent = Some(pct);
                true
            });
        };

        let audio = match self.engine.extract_audio(video, &on_convert_progress).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.fail(run, scope, &e);
                return;
            }
        };

        // Phase: Completed
        let size_bytes = audio.len() as u64;
        let handle = self.blobs.create(scope, audio);
        let artifact = AudioArtifact {
            handle,
            filename: format!("{}.{}", sanitize_filename(&label), self.audio_format),
            size_bytes,
        };

        let committed = self.transition(run, |state| {
            state.status = ExtractionStatus::Completed;
            state.percent = Some(100);
            state.progress = None;
            state.artifact = Some(artifact.clone());
        });
        if committed {
            info!(run, size_bytes, "extraction completed");
        } else {
            // The run was superseded after the handle was created; the
            // disposing owner cannot see it, so release it here
            self.blobs.revoke(handle);
        }
    }
}
