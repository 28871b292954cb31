//! Controllers over [`MemoryTransport`] and helpers to seed scheduler state.

use replication_orchestrator::gateway::REPLICATOR_DB;
use replication_orchestrator::{InstanceHandle, MemoryTransport, ReplicationController};
use serde_json::json;
use std::sync::Arc;

/// Controller for `host:5984` over a fresh server with system databases.
pub fn memory_controller(host: &str) -> ReplicationController<MemoryTransport> {
    memory_controller_for(InstanceHandle::new(host, 5984, "admin", "secret"))
}

pub fn memory_controller_for(instance: InstanceHandle) -> ReplicationController<MemoryTransport> {
    ReplicationController::with_transport(instance, Arc::new(MemoryTransport::with_system_databases()))
}

/// Store a replicator document for `id` and mark it running.
pub async fn seed_running_job(server: &MemoryTransport, id: &str) -> String {
    let rev = seed_replicator_doc(server, id).await;
    server.schedule_job(id).await;
    rev
}

/// Store a replicator document for `id` and queue it as rescheduled.
pub async fn seed_deferred_job(server: &MemoryTransport, id: &str) -> String {
    let rev = seed_replicator_doc(server, id).await;
    server.defer_job(id).await;
    rev
}

pub async fn seed_replicator_doc(server: &MemoryTransport, id: &str) -> String {
    server
        .insert_document(
            REPLICATOR_DB,
            id,
            json!({
                "source": format!("http://src.local:5984/{}", id),
                "target": format!("http://dst.local:5984/{}", id),
                "continuous": true
            }),
        )
        .await
}
