// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Drain: stop every replication job on an instance.
//!
//! Stopping the running jobs is not enough on its own: the scheduler can
//! promote rescheduled jobs as soon as slots free up. So draining is a
//! bounded loop rather than a single call.
//!
//! # Algorithm
//!
//! 1. Read running jobs
//! 2. If none → done
//! 3. If `max_rounds` stop passes already made → fail with `DrainIncomplete`
//! 4. Stop each job by id + current revision
//! 5. Back off (`initial_delay * factor^(round-1)`, capped at `max_delay`), go to 1
//!
//! A failing stop (including a conflict from a concurrent writer) ends the
//! drain with that error.

use super::{DrainReport, ReplicationController};
use crate::config::DrainConfig;
use crate::error::{OrchestratorError, Result};
use crate::metrics;
use crate::transport::Transport;
use tracing::{debug, info, instrument, warn};

impl<T: Transport> ReplicationController<T> {
    /// Stop replication jobs until the scheduler reports none running.
    #[instrument(skip(self, config), fields(instance = %self.instance(), max_rounds = config.max_rounds))]
    pub async fn drain_replications(&self, config: &DrainConfig) -> Result<DrainReport> {
        let label = self.instance().to_string();
        let mut report = DrainReport::default();

        loop {
            let running = self.running_replication_jobs().await?;

            if running.is_empty() {
                metrics::record_drain(&label, report.rounds, report.stopped.len(), true);
                info!(
                    rounds = report.rounds,
                    stopped = report.stopped.len(),
                    "Drain complete"
                );
                return Ok(report);
            }

            if report.rounds >= config.max_rounds {
                metrics::record_drain(&label, report.rounds, report.stopped.len(), false);
                warn!(
                    rounds = report.rounds,
                    remaining = running.len(),
                    "Drain gave up with jobs still running"
                );
                return Err(OrchestratorError::DrainIncomplete {
                    rounds: report.rounds,
                    remaining: running.len(),
                });
            }

            report.rounds += 1;
            debug!(round = report.rounds, jobs = running.len(), "Stopping running jobs");

            for doc in running {
                self.stop_replication(&doc.id, &doc.rev).await?;
                report.stopped.push(doc.id);
            }

            let delay = config.delay_after_round(report.rounds);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
