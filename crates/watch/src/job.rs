//! Tail a single job until its progress reaches 100.

use std::time::Duration;

use striker_client::api::StrikerApi;
use striker_client::converge::{self, WatchError};
use striker_client::poller::StatusPoller;
use striker_core::job::{Job, Observation, ProgressEvent};

/// Poll `job_uuid` and log progress and status lines until it completes.
pub async fn run(api: StrikerApi, interval: Duration, job_uuid: &str) -> Result<Job, WatchError> {
    let poller = StatusPoller::<Job>::new();
    let job = converge::wait_for_job(&poller, api, job_uuid, interval, None, log_observation).await?;

    tracing::info!(
        job_uuid = %job.uuid,
        title = %job.title,
        elapsed_secs = job.modified.saturating_sub(job.started),
        "Job finished"
    );
    Ok(job)
}

fn log_observation(job: &Job, observation: &Observation) {
    match observation.event {
        ProgressEvent::Started(progress) => tracing::info!(
            job_uuid = %job.uuid,
            title = %job.title,
            host = %job.host.short_name,
            progress,
            "Job running"
        ),
        ProgressEvent::Advanced { from, to } => {
            tracing::info!(job_uuid = %job.uuid, from, to, "Job progressed")
        }
        ProgressEvent::Regressed { from, to } => {
            tracing::warn!(job_uuid = %job.uuid, from, to, "Job reported lower progress")
        }
        ProgressEvent::Completed => tracing::info!(job_uuid = %job.uuid, "Job complete"),
        ProgressEvent::Unchanged(_) | ProgressEvent::AlreadyComplete => {}
    }

    for line in &observation.new_status {
        tracing::info!(job_uuid = %job.uuid, status = %line, "Job status");
    }
}
