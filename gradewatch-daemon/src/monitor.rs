//! The monitor loop — fetch, diff, persist, notify, sleep, forever.
//!
//! One iteration walks the phases Idle → Fetching → Evaluating → Notifying →
//! Sleeping. Iterations never overlap and never kill the loop: whatever a
//! phase raises becomes that iteration's failure outcome, and the next tick
//! starts clean with the persisted baseline.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use gradewatch_core::config::{MonitorConfig, RecoveryAction};
use gradewatch_core::diff;
use gradewatch_core::fetch::{Credentials, GradeFetcher};
use gradewatch_core::notify::Notifier;
use gradewatch_core::store::SnapshotStore;

use crate::watchdog::{self, Outcome};

/// How one iteration ended. Logged per tick; never aborts the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// New records were detected and the notifier was called.
    Alerted { added: usize },
    /// The fetch succeeded and nothing new appeared.
    NoChange,
    /// The fetch did not finish within the configured timeout.
    TimedOut,
    /// The fetch, the baseline load, or the baseline save failed.
    Failed(String),
}

pub struct Monitor {
    config: MonitorConfig,
    credentials: Credentials,
    term_id: i32,
    fetcher: Arc<dyn GradeFetcher>,
    notifier: Arc<dyn Notifier>,
    store: SnapshotStore,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        credentials: Credentials,
        term_id: i32,
        fetcher: Arc<dyn GradeFetcher>,
        notifier: Arc<dyn Notifier>,
        store: SnapshotStore,
    ) -> Self {
        Self {
            config,
            credentials,
            term_id,
            fetcher,
            notifier,
            store,
        }
    }

    /// Run iterations on the configured interval until `shutdown` fires.
    /// The first iteration runs immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.config.interval_secs,
            timeout_secs = self.config.timeout_secs,
            fetcher = self.fetcher.name(),
            notifier = self.notifier.name(),
            "Monitor loop started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_iteration().await {
                        IterationOutcome::Alerted { added } => {
                            tracing::info!(added, "Iteration complete: new grades reported");
                        }
                        IterationOutcome::NoChange => {
                            tracing::info!("Iteration complete: no new grades");
                        }
                        IterationOutcome::TimedOut => {
                            tracing::warn!(
                                timeout_secs = self.config.timeout_secs,
                                "Iteration abandoned: fetch timed out"
                            );
                        }
                        IterationOutcome::Failed(message) => {
                            tracing::error!(error = %message, "Iteration failed");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Monitor loop shutting down");
                    break;
                }
            }
        }
    }

    /// One full iteration: bounded fetch, diff against the baseline, persist
    /// the new snapshot, notify on additions.
    pub async fn run_iteration(&self) -> IterationOutcome {
        tracing::debug!(term_id = self.term_id, "Fetching");
        let outcome = watchdog::run_once(
            self.fetcher.clone(),
            self.credentials.clone(),
            self.term_id,
            self.config.timeout(),
        )
        .await;

        let snapshot = match outcome {
            Outcome::Success(snapshot) => snapshot,
            Outcome::TimedOut => {
                // The aborted unit may have left the login session half-built;
                // force the next fetch to authenticate from scratch.
                self.fetcher.reset_session().await;
                return IterationOutcome::TimedOut;
            }
            Outcome::Failure(message) => {
                if self.config.recovery == RecoveryAction::ResetSession {
                    self.fetcher.reset_session().await;
                }
                return IterationOutcome::Failed(message);
            }
        };

        tracing::debug!(records = snapshot.len(), "Evaluating");
        let baseline = match self.store.load() {
            Ok(baseline) => baseline,
            Err(e) => return IterationOutcome::Failed(format!("baseline load failed: {}", e)),
        };
        let added = diff::added(&baseline, &snapshot);

        // The baseline is replaced even when nothing changed. A failed save
        // skips notification: the stale baseline makes the next successful
        // iteration re-detect the same additions instead of losing them.
        if let Err(e) = self.store.save(&snapshot) {
            return IterationOutcome::Failed(format!("baseline save failed: {}", e));
        }

        if added.is_empty() {
            return IterationOutcome::NoChange;
        }

        tracing::debug!(added = added.len(), notifier = self.notifier.name(), "Notifying");
        if let Err(e) = self.notifier.notify(&added).await {
            tracing::warn!(error = %e, "Alert delivery failed; additions are already persisted");
        }
        IterationOutcome::Alerted { added: added.len() }
    }
}
