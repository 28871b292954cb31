// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Testcontainers setup for CouchDB.
//!
//! Provides helpers to spin up single-node CouchDB containers for integration tests.

use replication_orchestrator::gateway::SYSTEM_DATABASES;
use replication_orchestrator::{GatewayConfig, InstanceHandle, ReplicationController};
use std::sync::atomic::{AtomicUsize, Ordering};
use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage, RunnableImage};

pub const COUCHDB_USER: &str = "admin";
pub const COUCHDB_PASSWORD: &str = "password";
pub const COUCHDB_PORT: u16 = 5984;

static CONTAINER_SEQ: AtomicUsize = AtomicUsize::new(0);

fn couchdb_image() -> GenericImage {
    GenericImage::new("couchdb", "3.3")
        .with_env_var("COUCHDB_USER", COUCHDB_USER)
        .with_env_var("COUCHDB_PASSWORD", COUCHDB_PASSWORD)
        .with_exposed_port(COUCHDB_PORT)
        .with_wait_for(WaitFor::message_on_stderr("Apache CouchDB has started"))
}

/// Create a single-node CouchDB container.
///
/// Uses official couchdb:3.3 image. Waits for the startup notice.
pub fn couchdb_container(docker: &Cli) -> Container<'_, GenericImage> {
    docker.run(couchdb_image())
}

/// Create a CouchDB container attached to `network` under a unique name.
///
/// Other containers on the same network reach it at `http://{name}:5984`.
pub fn couchdb_container_on<'a>(
    docker: &'a Cli,
    network: &str,
) -> (Container<'a, GenericImage>, String) {
    let name = format!(
        "couchdb-{}-{}",
        std::process::id(),
        CONTAINER_SEQ.fetch_add(1, Ordering::SeqCst)
    );
    let image = RunnableImage::from(couchdb_image())
        .with_network(network)
        .with_container_name(&name);
    (docker.run(image), name)
}

/// Network name unique to this test process.
pub fn test_network(label: &str) -> String {
    format!("replication-{}-{}", label, std::process::id())
}

/// Instance handle for a container, as seen from the test host.
pub fn couchdb_instance(container: &Container<'_, GenericImage>) -> InstanceHandle {
    let port = container.get_host_port_ipv4(COUCHDB_PORT);
    InstanceHandle::new("127.0.0.1", port, COUCHDB_USER, COUCHDB_PASSWORD)
}

/// A running CouchDB with its system databases created.
pub struct TestInstance<'a> {
    #[allow(dead_code)] // Kept alive for container lifetime
    container: Container<'a, GenericImage>,
    peer: InstanceHandle,
    pub controller: ReplicationController,
}

impl<'a> TestInstance<'a> {
    pub async fn new(docker: &'a Cli) -> Self {
        let container = couchdb_container(docker);
        let peer = couchdb_instance(&container);
        Self::ready(container, peer).await
    }

    /// Start on a shared network so other containers can replicate from it.
    pub async fn on_network(docker: &'a Cli, network: &str) -> Self {
        let (container, name) = couchdb_container_on(docker, network);
        let peer = InstanceHandle::new(name, COUCHDB_PORT, COUCHDB_USER, COUCHDB_PASSWORD);
        Self::ready(container, peer).await
    }

    /// Controller addressing this instance the way its network peers see it.
    ///
    /// Only its instance handle is meaningful as a replication source; the
    /// test host cannot resolve the container name.
    pub fn as_peer(&self) -> ReplicationController {
        ReplicationController::connect(self.peer.clone(), &GatewayConfig::default())
            .expect("HTTP client")
    }

    async fn ready(container: Container<'a, GenericImage>, peer: InstanceHandle) -> Self {
        let instance = couchdb_instance(&container);
        let controller = ReplicationController::connect(instance, &GatewayConfig::default())
            .expect("HTTP client");

        // Single-node setup does not create these on its own
        for name in SYSTEM_DATABASES {
            match controller.gateway().create_database(name).await {
                Ok(()) => {}
                Err(e) if e.status() == Some(412) => {}
                Err(e) => panic!("Failed to create {}: {}", name, e),
            }
        }

        Self {
            container,
            peer,
            controller,
        }
    }
}
