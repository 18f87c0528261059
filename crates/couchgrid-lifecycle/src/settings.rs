//! Controller tunables, derived from the service configuration.

use std::time::Duration;

use couchgrid_core::{CouchgridConfig, MAX_REPLICAS, clamp_replicas};
use couchgrid_health::RetryPolicy;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub namespace: String,
    pub max_replicas: u32,
    pub default_databases: Vec<String>,
    /// Waiting for nodes to run after a create or scale.
    pub readiness: RetryPolicy,
    /// Sweeping leftover instances until none are listed.
    pub teardown: RetryPolicy,
    /// Pause between removing workloads and sweeping leftover instances.
    pub settle_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&CouchgridConfig::default())
    }
}

impl From<&CouchgridConfig> for ControllerSettings {
    fn from(config: &CouchgridConfig) -> Self {
        let cluster = &config.cluster;
        Self {
            namespace: config.platform.namespace.clone(),
            max_replicas: cluster.max_replicas.clamp(1, MAX_REPLICAS),
            default_databases: cluster.default_databases.clone(),
            readiness: RetryPolicy::new(
                cluster.readiness_attempts,
                Duration::from_millis(cluster.readiness_interval_ms),
            ),
            teardown: RetryPolicy::new(
                cluster.teardown_attempts,
                Duration::from_millis(cluster.teardown_interval_ms),
            ),
            settle_interval: Duration::from_millis(cluster.settle_interval_ms),
        }
    }
}

impl ControllerSettings {
    /// Clamp a requested replica count into `1..=max_replicas`.
    pub fn replicas(&self, requested: i64) -> u32 {
        clamp_replicas(requested).min(self.max_replicas)
    }
}
