//! Waiting for the executor to converge after a command.
//!
//! A dispatched command only says the executor accepted the work. These
//! helpers keep polling until the job reports completion or an entity
//! reaches the expected state.

use std::time::Duration;

use striker_core::job::{Job, Observation, ProgressTracker};
use striker_core::routes;

use crate::fetch::{FetchError, Fetcher};
use crate::poller::{PollOptions, StatusPoller, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Gave up on {key} after {waited:?}")]
    Timeout { key: String, waited: Duration },

    #[error("Polling of {0} stopped before it converged")]
    Stopped(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Wait until the polled value of `sub` satisfies `predicate`.
///
/// Fetch errors are tolerated; the poller keeps retrying on its cadence.
pub async fn wait_until<T: Clone>(
    sub: &mut Subscription<T>,
    timeout: Option<Duration>,
    predicate: impl Fn(&T) -> bool,
) -> Result<T, WatchError> {
    let key = sub.key().to_string();
    let wait = sub.wait_until(predicate);
    let value = match timeout {
        Some(limit) => tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| WatchError::Timeout {
                key: key.clone(),
                waited: limit,
            })?,
        None => wait.await,
    };
    value.ok_or(WatchError::Stopped(key))
}

/// Poll `GET /job/<uuid>` until progress reaches 100.
///
/// `on_progress` is called for every completed fetch with the job and what
/// changed since the previous one. A failed poll is logged and skipped; only
/// the progress value ends the wait.
pub async fn wait_for_job<F>(
    poller: &StatusPoller<Job>,
    fetcher: F,
    job_uuid: &str,
    interval: Duration,
    timeout: Option<Duration>,
    mut on_progress: impl FnMut(&Job, &Observation),
) -> Result<Job, WatchError>
where
    F: Fetcher<Job>,
{
    let key = routes::job(job_uuid).map_err(FetchError::from)?;
    let mut sub = poller.subscribe(key.clone(), fetcher, PollOptions::new(interval));
    let mut tracker = ProgressTracker::new();

    let watch = async {
        let mut state = sub.snapshot();
        loop {
            if state.revision > 0 {
                match (&state.error, &state.value) {
                    (Some(e), _) => {
                        tracing::debug!(key = %key, error = %e, "Job poll failed, waiting for next tick");
                    }
                    (None, Some(job)) => {
                        let observation = tracker.observe_job(job);
                        on_progress(job, &observation);
                        if tracker.is_complete() {
                            return Ok(job.clone());
                        }
                    }
                    (None, None) => {}
                }
            }
            state = match sub.result_after(state.revision).await {
                Some(next) => next,
                None => return Err(WatchError::Stopped(key.clone())),
            };
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, watch)
            .await
            .map_err(|_| WatchError::Timeout {
                key: key.clone(),
                waited: limit,
            })?,
        None => watch.await,
    }
}
