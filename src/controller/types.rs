//! Replication data types.
//!
//! Wire shapes for the two stores the controller joins, plus the outcome of
//! a drain.
//!
//! # Job Lifecycle
//!
//! States are owned by the server; the controller only observes them.
//!
//! ```text
//!            start_replication()
//! Absent ──────────────────────────→ Running
//!                                     │   ↑
//!                                     │   │ (scheduler, no controller
//!                                     │   │  involvement)
//!                                     │   │
//!                                     │ Rescheduled
//!                                     │
//!              stop_replication()     ↓
//!                                  Disabled
//! ```
//!
//! - **Running** jobs appear in `_scheduler/jobs` and have a `_replicator` document.
//! - **Rescheduled** jobs have a document but are missing from `_scheduler/jobs`.
//!   They can come back as running after other jobs stop.
//! - **Disabled** means the replicator document was deleted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle of a single replication job, as seen from outside the server.
///
/// See module docs for the transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// No replicator document.
    Absent,
    /// Listed by the scheduler.
    Running,
    /// Document present, not currently listed by the scheduler.
    Rescheduled,
    /// Document deleted by [`stop_replication`](super::ReplicationController::stop_replication).
    Disabled,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Absent => write!(f, "Absent"),
            JobState::Running => write!(f, "Running"),
            JobState::Rescheduled => write!(f, "Rescheduled"),
            JobState::Disabled => write!(f, "Disabled"),
        }
    }
}

/// A document in the `_replicator` database.
///
/// Known fields are typed; everything else the server stores is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicatorDocument {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "_rev")]
    pub rev: String,

    /// Source as written: a URL string or an object with `url` and `headers`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,

    #[serde(default)]
    pub continuous: bool,

    #[serde(default)]
    pub create_target: bool,

    /// Set by the replicator on documents it has processed.
    #[serde(
        rename = "_replication_state",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of `GET /_scheduler/jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerJob {
    /// Replicator document id. `None` for transient jobs started without a document.
    #[serde(default)]
    pub doc_id: Option<String>,

    /// Replicator database holding the document.
    #[serde(default)]
    pub database: Option<String>,

    /// Scheduler-assigned replication id.
    pub id: String,

    #[serde(default)]
    pub node: Option<String>,

    #[serde(default)]
    pub source: Option<Value>,

    #[serde(default)]
    pub target: Option<Value>,

    #[serde(default)]
    pub start_time: Option<String>,

    #[serde(default)]
    pub history: Vec<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `GET /_scheduler/jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerJobs {
    #[serde(default)]
    pub total_rows: u64,

    #[serde(default)]
    pub offset: u64,

    #[serde(default)]
    pub jobs: Vec<SchedulerJob>,
}

impl SchedulerJobs {
    /// Document ids in scheduler order, skipping transient jobs.
    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().filter_map(|job| job.doc_id.as_deref())
    }
}

/// Result of a completed drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Stop passes made. Zero when nothing was running.
    pub rounds: u32,
    /// Ids of the replicator documents deleted, in stop order.
    pub stopped: Vec<String>,
}
