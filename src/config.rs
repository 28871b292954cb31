//! Configuration for the replication orchestrator.
//!
//! Configuration can be constructed programmatically or deserialized from JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use replication_orchestrator::config::{OrchestratorConfig, InstanceConfig};
//!
//! let config = OrchestratorConfig {
//!     instances: vec![
//!         InstanceConfig::for_testing("primary", "db1.internal"),
//!         InstanceConfig::for_testing("replica", "db2.internal"),
//!     ],
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! OrchestratorConfig
//! ├── instances: Vec<InstanceConfig>  # Servers this process may talk to
//! ├── gateway: GatewayConfig          # HTTP client timeouts
//! ├── reconcile: ReconcileConfig      # Running-job fan-out width
//! └── drain: DrainConfig              # Repeat-until-empty stop policy
//! ```
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "instances": [
//!     { "name": "primary", "host": "db1.internal", "user": "admin", "password": "secret" },
//!     { "name": "replica", "host": "db2.internal", "port": 6984, "tls": true,
//!       "user": "admin", "password": "secret" }
//!   ],
//!   "gateway": { "request_timeout": "30s", "connect_timeout": "5s" },
//!   "reconcile": { "fetch_concurrency": 16 },
//!   "drain": { "max_rounds": 10, "initial_delay": "500ms", "max_delay": "10s" }
//! }
//! ```

use crate::error::{OrchestratorError, Result};
use crate::instance::{InstanceHandle, Scheme};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Servers this process can start and stop replication between.
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,

    /// Remote call settings shared by every gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Running-job reconciliation settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Drain (cancel-all) policy.
    #[serde(default)]
    pub drain: DrainConfig,
}

impl OrchestratorConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| OrchestratorError::Config(e.to_string()))
    }

    /// Presence checks only: every instance has a name and a host, names are unique.
    ///
    /// Reachability and credentials are not checked; bad values surface as
    /// remote errors on first use.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for instance in &self.instances {
            if instance.name.trim().is_empty() {
                return Err(OrchestratorError::Config(
                    "instance with empty name".to_string(),
                ));
            }
            if instance.host.trim().is_empty() {
                return Err(OrchestratorError::Config(format!(
                    "instance '{}' has no host",
                    instance.name
                )));
            }
            if !seen.insert(instance.name.as_str()) {
                return Err(OrchestratorError::Config(format!(
                    "duplicate instance name '{}'",
                    instance.name
                )));
            }
        }
        if self.reconcile.fetch_concurrency == 0 {
            return Err(OrchestratorError::Config(
                "reconcile.fetch_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the handle for a named instance.
    pub fn instance(&self, name: &str) -> Option<InstanceHandle> {
        self.instances
            .iter()
            .find(|i| i.name == name)
            .map(InstanceConfig::handle)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// InstanceConfig: one entry per server
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for a single database server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Local name used to refer to this instance (logs, lookups).
    pub name: String,

    /// Hostname or IP.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub user: String,

    pub password: String,

    /// Use HTTPS instead of HTTP.
    #[serde(default)]
    pub tls: bool,
}

fn default_port() -> u16 {
    5984
}

impl InstanceConfig {
    /// Build the immutable handle for this instance.
    pub fn handle(&self) -> InstanceHandle {
        let scheme = if self.tls { Scheme::Https } else { Scheme::Http };
        InstanceHandle::with_scheme(
            scheme,
            self.host.clone(),
            self.port,
            self.user.clone(),
            self.password.clone(),
        )
    }

    /// Create an instance config for testing.
    pub fn for_testing(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port: 5984,
            user: "admin".to_string(),
            password: "admin".to_string(),
            tls: false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GatewayConfig: HTTP client settings
// ═══════════════════════════════════════════════════════════════════════════════

/// Remote call settings.
///
/// Timeouts belong to the transport; the gateway and controller add none of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Whole-request timeout as a duration string (e.g., "30s").
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,

    /// TCP connect timeout as a duration string (e.g., "5s").
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_connect_timeout() -> String {
    "5s".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: "30s".to_string(),
            connect_timeout: "5s".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Parse `request_timeout`, falling back to 30s.
    pub fn request_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.request_timeout).unwrap_or(Duration::from_secs(30))
    }

    /// Parse `connect_timeout`, falling back to 5s.
    pub fn connect_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.connect_timeout).unwrap_or(Duration::from_secs(5))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ReconcileConfig: running-job fan-out
// ═══════════════════════════════════════════════════════════════════════════════

/// Settings for joining scheduler jobs with replicator documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Maximum replicator-document fetches in flight at once.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

fn default_fetch_concurrency() -> usize {
    16
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 16,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DrainConfig: repeat-until-empty stop policy
// ═══════════════════════════════════════════════════════════════════════════════

/// Policy for stopping every running replication on an instance.
///
/// Stopping running jobs can surface previously rescheduled ones, so a drain
/// is a loop: read running jobs, stop them, back off, read again. It ends when
/// a read comes back empty or after `max_rounds` stop passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainConfig {
    /// Maximum stop passes before giving up.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Delay after the first stop pass (duration string).
    #[serde(default = "default_initial_delay")]
    pub initial_delay: String,

    /// Ceiling for the delay between passes (duration string).
    #[serde(default = "default_max_delay")]
    pub max_delay: String,

    /// Multiplier applied to the delay after each pass.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_rounds() -> u32 {
    10
}

fn default_initial_delay() -> String {
    "500ms".to_string()
}

fn default_max_delay() -> String {
    "10s".to_string()
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            initial_delay: "500ms".to_string(),
            max_delay: "10s".to_string(),
            backoff_factor: 2.0,
        }
    }
}

impl DrainConfig {
    /// Fast drain for tests.
    pub fn testing() -> Self {
        Self {
            max_rounds: 5,
            initial_delay: "1ms".to_string(),
            max_delay: "5ms".to_string(),
            backoff_factor: 2.0,
        }
    }

    /// Parse `initial_delay`, falling back to 500ms.
    pub fn initial_delay_duration(&self) -> Duration {
        humantime::parse_duration(&self.initial_delay).unwrap_or(Duration::from_millis(500))
    }

    /// Parse `max_delay`, falling back to 10s.
    pub fn max_delay_duration(&self) -> Duration {
        humantime::parse_duration(&self.max_delay).unwrap_or(Duration::from_secs(10))
    }

    /// Delay to wait after stop pass `round` (1-indexed).
    ///
    /// `initial_delay * backoff_factor^(round - 1)`, capped at `max_delay`.
    pub fn delay_after_round(&self, round: u32) -> Duration {
        let initial = self.initial_delay_duration();
        let max = self.max_delay_duration();
        if round <= 1 {
            return initial.min(max);
        }

        let exponent = (round - 1).min(i32::MAX as u32) as i32;
        let multiplier = self.backoff_factor.max(1.0).powi(exponent);
        // Overflow, infinity and NaN all mean "past the cap"
        Duration::try_from_secs_f64(initial.as_secs_f64() * multiplier)
            .map_or(max, |delay| delay.min(max))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
