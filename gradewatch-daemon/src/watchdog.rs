//! Bounded execution of one probe.
//!
//! The fetch runs on a dedicated tokio task so a stalled network call can
//! never block the monitor loop past its deadline. The caller gets exactly
//! one of three outcomes; a stall and a failure are reported distinctly.

use std::sync::Arc;
use std::time::Duration;

use gradewatch_core::fetch::{Credentials, GradeFetcher};
use gradewatch_core::models::Snapshot;

/// What one bounded probe produced.
#[derive(Debug)]
pub enum Outcome {
    /// The fetch finished in time. The snapshot has not been diffed or
    /// persisted yet; that is the caller's job.
    Success(Snapshot),
    /// The fetch finished in time but failed; human-readable message.
    Failure(String),
    /// The fetch did not finish within the deadline.
    TimedOut,
}

/// Run one probe, waiting at most `timeout`.
///
/// On expiry the fetch task is aborted and `TimedOut` is returned right
/// away. Abort is cooperative: it lands at the task's next await point,
/// which drops an in-flight request together with its connection, but a
/// section that never yields keeps running until it does. A caller reusing
/// a login session must therefore reset it after a timeout; the fetcher's
/// generation guard turns any late writeback from the aborted unit into a
/// no-op.
///
/// A panic inside the fetch is contained by the task boundary and reported
/// as `Failure`.
pub async fn run_once(
    fetcher: Arc<dyn GradeFetcher>,
    credentials: Credentials,
    term_id: i32,
    timeout: Duration,
) -> Outcome {
    let mut fetch_unit =
        tokio::spawn(async move { fetcher.fetch(&credentials, term_id).await });

    match tokio::time::timeout(timeout, &mut fetch_unit).await {
        Ok(Ok(Ok(snapshot))) => Outcome::Success(snapshot),
        Ok(Ok(Err(e))) => Outcome::Failure(e.to_string()),
        Ok(Err(join_error)) => Outcome::Failure(format!("fetch unit panicked: {}", join_error)),
        Err(_) => {
            fetch_unit.abort();
            Outcome::TimedOut
        }
    }
}
