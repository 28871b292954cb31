// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication controller.
//!
//! Starts, stops and enumerates replication jobs on one instance, using a
//! [`DatabaseGateway`] per instance.
//!
//! # Running Jobs
//!
//! `_replicator` keeps documents after their jobs finish or get rescheduled,
//! so it cannot answer "what is running". The scheduler can, but only by id.
//! [`running_replication_jobs`](ReplicationController::running_replication_jobs)
//! joins the two:
//!
//! ```text
//! GET /_scheduler/jobs ──→ [doc_id, doc_id, ...]
//!                               │ fan-out (bounded by fetch_concurrency)
//!                               ↓
//!              GET /_replicator/{doc_id} (each)
//!                               │ fan-in (all or nothing)
//!                               ↓
//!                    Vec<ReplicatorDocument>
//! ```
//!
//! The result is a snapshot of *running* jobs. Rescheduled jobs are not in
//! it and may show up on the next call once running ones stop; use
//! [`drain_replications`](ReplicationController::drain_replications) to stop
//! everything.
//!
//! # Errors
//!
//! Nothing here retries. Server errors come back as
//! [`OrchestratorError::Remote`] / [`OrchestratorError::Conflict`] with the
//! server body untouched.

mod drain;
mod types;

pub use types::{DrainReport, JobState, ReplicatorDocument, SchedulerJob, SchedulerJobs};

use crate::config::{GatewayConfig, OrchestratorConfig, ReconcileConfig};
use crate::error::{OrchestratorError, Result};
use crate::gateway::{DatabaseGateway, DocumentRef, ReplicationLink, REPLICATOR_DB};
use crate::http::HttpTransport;
use crate::instance::InstanceHandle;
use crate::metrics;
use crate::transport::Transport;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Replication lifecycle for one (target) instance.
pub struct ReplicationController<T: Transport = HttpTransport> {
    gateway: Arc<DatabaseGateway<T>>,

    /// Upper bound on in-flight replicator document fetches.
    fetch_concurrency: usize,
}

impl ReplicationController<HttpTransport> {
    /// Create a controller talking HTTP(S) to `instance`.
    pub fn connect(instance: InstanceHandle, config: &GatewayConfig) -> Result<Self> {
        let gateway = DatabaseGateway::connect(instance, config)?;
        Ok(Self::with_gateway(Arc::new(gateway), ReconcileConfig::default()))
    }

    /// Create a controller for the instance called `name` in `config`.
    pub fn from_config(config: &OrchestratorConfig, name: &str) -> Result<Self> {
        let instance = config
            .instance(name)
            .ok_or_else(|| OrchestratorError::Config(format!("unknown instance '{}'", name)))?;
        let gateway = DatabaseGateway::connect(instance, &config.gateway)?;
        Ok(Self::with_gateway(Arc::new(gateway), config.reconcile.clone()))
    }
}

impl<T: Transport> ReplicationController<T> {
    /// Create a controller over an existing transport.
    pub fn with_transport(instance: InstanceHandle, transport: Arc<T>) -> Self {
        Self::with_gateway(
            Arc::new(DatabaseGateway::new(instance, transport)),
            ReconcileConfig::default(),
        )
    }

    /// Create a controller sharing an existing gateway.
    pub fn with_gateway(gateway: Arc<DatabaseGateway<T>>, reconcile: ReconcileConfig) -> Self {
        Self {
            gateway,
            fetch_concurrency: reconcile.fetch_concurrency.max(1),
        }
    }

    pub fn instance(&self) -> &InstanceHandle {
        self.gateway.instance()
    }

    pub fn gateway(&self) -> &Arc<DatabaseGateway<T>> {
        &self.gateway
    }

    // =========================================================================
    // Start / Stop
    // =========================================================================

    /// Replicate `db_name` from `source`'s instance into this instance.
    ///
    /// The target database is created if missing. Fails with
    /// [`OrchestratorError::SelfReplication`] before any request when both
    /// controllers point at the same host and port.
    #[instrument(skip(self, source), fields(target = %self.instance(), source = %source.instance()))]
    pub async fn start_replication<S: Transport>(
        &self,
        source: &ReplicationController<S>,
        db_name: &str,
        continuous: bool,
    ) -> Result<DocumentRef> {
        let target = self.instance();
        if target.same_server(source.instance()) {
            metrics::record_self_replication_rejected(&target.to_string());
            warn!("Refusing to replicate an instance into itself");
            return Err(OrchestratorError::SelfReplication {
                host: target.host().to_string(),
                port: target.port(),
            });
        }

        let link = ReplicationLink {
            source_url: source.instance().database_url(db_name),
            target_database: db_name.to_string(),
            continuous,
            create_target: true,
        };

        let created = self.gateway.enable_replication(&link).await?;
        metrics::record_replication_started(&target.to_string(), continuous);
        info!(doc_id = %created.id, continuous, "Replication started");
        Ok(created)
    }

    /// Delete replicator document `id` at revision `rev`.
    ///
    /// A stale `rev` fails with [`OrchestratorError::Conflict`]; re-read the
    /// document and retry with its current revision.
    #[instrument(skip(self), fields(instance = %self.instance()))]
    pub async fn stop_replication(&self, id: &str, rev: &str) -> Result<DocumentRef> {
        let label = self.instance().to_string();
        match self.gateway.disable_replication(id, rev).await {
            Ok(deleted) => {
                metrics::record_replication_stopped(&label, true);
                info!("Replication stopped");
                Ok(deleted)
            }
            Err(e) => {
                metrics::record_replication_stopped(&label, false);
                Err(e)
            }
        }
    }

    // =========================================================================
    // Reconcile
    // =========================================================================

    /// Replicator documents of every job the scheduler currently runs.
    ///
    /// One document per scheduler entry, in scheduler order. If any document
    /// cannot be fetched the whole call fails. Transient jobs (no `doc_id`)
    /// are skipped.
    #[instrument(skip(self), fields(instance = %self.instance()))]
    pub async fn running_replication_jobs(&self) -> Result<Vec<ReplicatorDocument>> {
        let raw = self.gateway.scheduler_request("jobs").await?;
        let jobs: SchedulerJobs = serde_json::from_value(raw)
            .map_err(|e| OrchestratorError::decode("scheduler_jobs", e))?;

        let transient = jobs.jobs.iter().filter(|j| j.doc_id.is_none()).count();
        if transient > 0 {
            debug!(transient, "Skipping scheduler jobs without a replicator document");
        }

        let documents: Vec<ReplicatorDocument> = stream::iter(jobs.doc_ids())
            .map(|doc_id| self.fetch_replicator_document(doc_id))
            .buffered(self.fetch_concurrency)
            .try_collect()
            .await?;

        metrics::set_running_jobs(&self.instance().to_string(), documents.len());
        debug!(running = documents.len(), "Reconciled running jobs");
        Ok(documents)
    }

    async fn fetch_replicator_document(&self, doc_id: &str) -> Result<ReplicatorDocument> {
        let raw = self.gateway.get_document(REPLICATOR_DB, doc_id).await?;
        serde_json::from_value(raw).map_err(|e| OrchestratorError::decode("replicator_document", e))
    }

    /// Where replicator document `doc_id` is in its lifecycle.
    ///
    /// `Disabled` and `Absent` are told apart by the server's 404 reason
    /// (`deleted` vs `missing`).
    #[instrument(skip(self), fields(instance = %self.instance()))]
    pub async fn job_state(&self, doc_id: &str) -> Result<JobState> {
        let raw = self.gateway.scheduler_request("jobs").await?;
        let jobs: SchedulerJobs = serde_json::from_value(raw)
            .map_err(|e| OrchestratorError::decode("scheduler_jobs", e))?;
        if jobs.doc_ids().any(|id| id == doc_id) {
            return Ok(JobState::Running);
        }

        match self.gateway.get_document(REPLICATOR_DB, doc_id).await {
            Ok(_) => Ok(JobState::Rescheduled),
            Err(OrchestratorError::Remote {
                status: 404, body, ..
            }) => match body.get("reason").and_then(|r| r.as_str()) {
                Some("deleted") => Ok(JobState::Disabled),
                _ => Ok(JobState::Absent),
            },
            Err(e) => Err(e),
        }
    }
}
