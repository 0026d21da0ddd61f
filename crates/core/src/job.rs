//! Job model and progress tracking.
//!
//! A job is created and advanced only by the external executor; the client
//! observes it by polling `GET /job/<uuid>`. `progress == 100` is the only
//! completion signal. A quiet status list means nothing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::{from_epoch, EpochSecs, Timestamp};

/// Progress value that marks a job as finished.
pub const PROGRESS_COMPLETE: u8 = 100;

// ---------------------------------------------------------------------------
// Wire model
// ---------------------------------------------------------------------------

/// Host the job runs on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHost {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDatum {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusLine {
    pub value: String,
}

/// Body of `GET /job/<uuid>`.
///
/// `data` and `status` keep the order the executor sent them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub uuid: String,
    #[serde(default)]
    pub host: JobHost,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub data: IndexMap<String, JobDatum>,
    #[serde(default)]
    pub status: IndexMap<String, JobStatusLine>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub started: EpochSecs,
    #[serde(default)]
    pub modified: EpochSecs,
}

impl Job {
    pub fn is_complete(&self) -> bool {
        self.progress >= PROGRESS_COMPLETE
    }

    /// Command arguments as ordered `(name, value)` pairs.
    pub fn arguments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data
            .values()
            .map(|d| (d.name.as_str(), d.value.as_str()))
    }

    pub fn status_lines(&self) -> impl Iterator<Item = &str> {
        self.status.values().map(|s| s.value.as_str())
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        from_epoch(self.started)
    }

    pub fn modified_at(&self) -> Option<Timestamp> {
        from_epoch(self.modified)
    }
}

/// Row of `GET /job`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOverview {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub started: Option<EpochSecs>,
}

impl JobOverview {
    pub fn is_complete(&self) -> bool {
        self.progress >= PROGRESS_COMPLETE
    }
}

/// Row of the legacy `GET /status/jobs.json` snapshot.
///
/// The older front end reads the same jobs through flatter, prefixed field
/// names; [`LegacyJob::into_overview`] maps them onto [`JobOverview`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyJob {
    #[serde(alias = "job_uuid")]
    pub uuid: String,
    #[serde(default, alias = "job_name")]
    pub name: String,
    #[serde(default, alias = "job_title")]
    pub title: String,
    #[serde(default, alias = "job_progress")]
    pub progress: u8,
    #[serde(default, alias = "job_status")]
    pub status: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default, alias = "job_started")]
    pub started: Option<EpochSecs>,
}

impl LegacyJob {
    pub fn into_overview(self) -> JobOverview {
        JobOverview {
            uuid: self.uuid,
            name: self.name,
            title: self.title,
            progress: self.progress,
            host_name: self.host_name,
            started: self.started,
        }
    }
}

/// Body of `GET /status/jobs.json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LegacyJobSnapshot {
    #[serde(default)]
    pub jobs: Vec<LegacyJob>,
}

impl LegacyJobSnapshot {
    pub fn into_overviews(self) -> Vec<JobOverview> {
        self.jobs.into_iter().map(LegacyJob::into_overview).collect()
    }
}

// ---------------------------------------------------------------------------
// Progress tracking
// ---------------------------------------------------------------------------

/// What a single progress observation meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// First observation of a running job.
    Started(u8),
    Advanced { from: u8, to: u8 },
    Unchanged(u8),
    /// The executor reported a lower value than before. The tracker keeps the
    /// high-water mark.
    Regressed { from: u8, to: u8 },
    /// First observation at or above 100.
    Completed,
    /// Any observation after completion.
    AlreadyComplete,
}

/// Result of feeding one polled [`Job`] to a [`ProgressTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub event: ProgressEvent,
    /// Status lines not seen in any earlier observation.
    pub new_status: Vec<String>,
}

/// Folds successive polls of one job into progress events.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    high_water: Option<u8>,
    completed: bool,
    status_seen: usize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn progress(&self) -> Option<u8> {
        self.high_water
    }

    pub fn observe(&mut self, progress: u8) -> ProgressEvent {
        if self.completed {
            return ProgressEvent::AlreadyComplete;
        }
        if progress >= PROGRESS_COMPLETE {
            self.completed = true;
            self.high_water = Some(PROGRESS_COMPLETE);
            return ProgressEvent::Completed;
        }
        let event = match self.high_water {
            None => ProgressEvent::Started(progress),
            Some(prev) if progress > prev => ProgressEvent::Advanced {
                from: prev,
                to: progress,
            },
            Some(prev) if progress == prev => ProgressEvent::Unchanged(prev),
            Some(prev) => ProgressEvent::Regressed {
                from: prev,
                to: progress,
            },
        };
        if !matches!(event, ProgressEvent::Regressed { .. }) {
            self.high_water = Some(progress);
        }
        event
    }

    pub fn observe_job(&mut self, job: &Job) -> Observation {
        let event = self.observe(job.progress);
        let new_status: Vec<String> = job
            .status_lines()
            .skip(self.status_seen)
            .map(str::to_string)
            .collect();
        self.status_seen = self.status_seen.max(job.status.len());
        Observation { event, new_status }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn job_json(progress: u8, status: &[&str]) -> serde_json::Value {
        let status: serde_json::Map<String, serde_json::Value> = status
            .iter()
            .enumerate()
            .map(|(i, line)| (format!("s{i}"), serde_json::json!({ "value": line })))
            .collect();
        serde_json::json!({
            "uuid": "7b3a3c1e-job",
            "host": { "name": "an-a01n01.example.com", "shortName": "an-a01n01", "uuid": "h-1" },
            "name": "set_power::server::off",
            "title": "Power off server",
            "description": "Shut down srv01-web",
            "command": "anvil-boot-server --server srv01-web",
            "data": {
                "z9": { "name": "server_uuid", "value": "s-1" },
                "a1": { "name": "force", "value": "0" },
            },
            "status": status,
            "progress": progress,
            "started": 1_700_000_000,
            "modified": 1_700_000_042,
        })
    }

    #[test]
    fn job_detail_keeps_server_order() {
        let job: Job = serde_json::from_value(job_json(40, &["one", "two"])).unwrap();
        let args: Vec<_> = job.arguments().collect();
        assert_eq!(args, [("server_uuid", "s-1"), ("force", "0")]);
        assert_eq!(job.host.short_name, "an-a01n01");
        assert_eq!(job.status_lines().collect::<Vec<_>>(), ["one", "two"]);
        assert!(!job.is_complete());
        assert_eq!(job.started_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn completes_on_first_hundred_despite_repeats() {
        let mut tracker = ProgressTracker::new();
        let events: Vec<_> = [0, 40, 40, 100, 100]
            .into_iter()
            .map(|p| tracker.observe(p))
            .collect();
        assert_eq!(
            events,
            [
                ProgressEvent::Started(0),
                ProgressEvent::Advanced { from: 0, to: 40 },
                ProgressEvent::Unchanged(40),
                ProgressEvent::Completed,
                ProgressEvent::AlreadyComplete,
            ]
        );
        assert!(tracker.is_complete());
    }

    #[test]
    fn regression_keeps_high_water_mark() {
        let mut tracker = ProgressTracker::new();
        tracker.observe(60);
        assert_eq!(
            tracker.observe(20),
            ProgressEvent::Regressed { from: 60, to: 20 }
        );
        assert_eq!(tracker.progress(), Some(60));
        assert_eq!(
            tracker.observe(70),
            ProgressEvent::Advanced { from: 60, to: 70 }
        );
    }

    #[test]
    fn silent_status_is_not_completion() {
        let mut tracker = ProgressTracker::new();
        let job: Job = serde_json::from_value(job_json(99, &[])).unwrap();
        for _ in 0..5 {
            tracker.observe_job(&job);
        }
        assert!(!tracker.is_complete());
    }

    #[test]
    fn observe_job_reports_only_new_status_lines() {
        let mut tracker = ProgressTracker::new();
        let first: Job = serde_json::from_value(job_json(10, &["queued"])).unwrap();
        let second: Job =
            serde_json::from_value(job_json(50, &["queued", "stopping", "stopped"])).unwrap();

        assert_eq!(tracker.observe_job(&first).new_status, ["queued"]);
        let obs = tracker.observe_job(&second);
        assert_eq!(obs.new_status, ["stopping", "stopped"]);
        assert_eq!(obs.event, ProgressEvent::Advanced { from: 10, to: 50 });
        assert!(tracker.observe_job(&second).new_status.is_empty());
    }

    #[test]
    fn legacy_snapshot_maps_onto_overviews() {
        let snapshot: LegacyJobSnapshot = serde_json::from_value(serde_json::json!({
            "jobs": [
                { "job_uuid": "j-1", "job_title": "Migrate srv01", "job_progress": 100, "host_name": "an-a01n02" },
                { "uuid": "j-2", "progress": 5 },
            ]
        }))
        .unwrap();
        let overviews = snapshot.into_overviews();
        assert_eq!(overviews.len(), 2);
        assert!(overviews[0].is_complete());
        assert_eq!(overviews[0].title, "Migrate srv01");
        assert!(!overviews[1].is_complete());
    }
}
