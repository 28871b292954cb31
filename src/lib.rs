//! # Replication Orchestrator
//!
//! Starts, stops and enumerates replication jobs between document-database
//! instances, and works out which jobs are actually running.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                      replication-orchestrator                        │
//! │                                                                      │
//! │  ┌───────────────────────┐        ┌───────────────────────────────┐  │
//! │  │ ReplicationController │───────►│ DatabaseGateway (per instance)│  │
//! │  │ start / stop / drain  │        │ + database handle cache       │  │
//! │  │ running-job join      │        └───────────────┬───────────────┘  │
//! │  └───────────────────────┘                        │                  │
//! │                                                   ▼                  │
//! │                                     ┌───────────────────────────┐    │
//! │                                     │ Transport                 │    │
//! │                                     │ HttpTransport (reqwest)   │    │
//! │                                     │ MemoryTransport (tests)   │    │
//! │                                     └───────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Running Jobs
//!
//! `_replicator` documents outlive their jobs, so "running" comes from
//! `_scheduler/jobs` joined with `_replicator` by `doc_id`. See
//! [`controller`] for details and for the repeat-until-empty drain.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use replication_orchestrator::{GatewayConfig, InstanceHandle, ReplicationController};
//!
//! #[tokio::main]
//! async fn main() -> replication_orchestrator::Result<()> {
//!     let config = GatewayConfig::default();
//!     let target = ReplicationController::connect(
//!         InstanceHandle::new("db1.internal", 5984, "admin", "secret"),
//!         &config,
//!     )?;
//!     let source = ReplicationController::connect(
//!         InstanceHandle::new("db2.internal", 5984, "admin", "secret"),
//!         &config,
//!     )?;
//!
//!     let job = target.start_replication(&source, "orders", true).await?;
//!     for doc in target.running_replication_jobs().await? {
//!         println!("{} {:?}", doc.id, doc.state);
//!     }
//!     target.stop_replication(&job.id, &job.rev).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod http;
pub mod instance;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod metrics;
pub mod transport;

// Re-exports for convenience
pub use config::{DrainConfig, GatewayConfig, InstanceConfig, OrchestratorConfig, ReconcileConfig};
pub use controller::{DrainReport, JobState, ReplicationController, ReplicatorDocument, SchedulerJob};
pub use error::{OrchestratorError, Result};
pub use gateway::{DatabaseGateway, DatabaseInfo, DocumentRef, ReplicationLink};
pub use http::HttpTransport;
pub use instance::InstanceHandle;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryTransport;
pub use transport::{RemoteRequest, RemoteResponse, Transport, TransportError};
