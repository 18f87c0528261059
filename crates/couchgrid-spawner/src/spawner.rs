//! The node spawner contract and helpers shared by its implementations.

use async_trait::async_trait;
use couchgrid_core::{COUCHDB_PORT, ClusterDescriptor, NodeState, NodeUnit, SpawnerStrategy};
use couchgrid_core::addressing::{LABEL_REPLICA, node_address};
use couchgrid_platform::{Platform, PlatformObject, ResourceKind};

use crate::error::{SpawnError, SpawnResult};

/// Materializes the database nodes of a cluster as platform workloads.
#[async_trait]
pub trait NodeSpawner: Send + Sync {
    fn strategy(&self) -> SpawnerStrategy;

    /// Create workloads for `desc.desired_replicas` nodes.
    ///
    /// Fails on the first sub-resource the platform rejects. Siblings
    /// created before the failure are left in place.
    async fn create_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<()>;

    /// Node instances currently backing the cluster.
    async fn list_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<Vec<NodeUnit>>;

    /// Remove the cluster's workload objects and volumes.
    ///
    /// Instances orphaned by the removal are left for the caller to sweep.
    async fn delete_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<()>;

    /// Move from `observed` nodes to `desc.desired_replicas`.
    async fn scale_to(&self, desc: &ClusterDescriptor, observed: u32) -> SpawnResult<()>;

    /// Node count declared by the cluster's workload objects (0 when none exist).
    async fn declared_replicas(&self, desc: &ClusterDescriptor) -> SpawnResult<u32>;
}

/// List the cluster's pods as node units.
///
/// `ordinal_of` extracts the replica index of a pod, if the strategy has one.
pub(crate) async fn pod_nodes(
    platform: &dyn Platform,
    desc: &ClusterDescriptor,
    strategy: SpawnerStrategy,
    ordinal_of: impl Fn(&PlatformObject) -> Option<u32>,
    volume_of: impl Fn(&PlatformObject, Option<u32>) -> Option<String>,
) -> SpawnResult<Vec<NodeUnit>> {
    let address = desc.address();
    let pods = platform
        .list(&desc.namespace, ResourceKind::Pod, &desc.labels())
        .await
        .map_err(|e| SpawnError::from_platform(strategy, &desc.tag, e))?;

    Ok(pods
        .iter()
        .filter(|pod| address.owns_name(pod.name()))
        .map(|pod| {
            let ordinal = ordinal_of(pod);
            NodeUnit {
                name: pod.name().to_string(),
                ordinal,
                address: pod
                    .pod_ip()
                    .map(|ip| node_address(ip, COUCHDB_PORT))
                    .unwrap_or_default(),
                volume: volume_of(pod, ordinal),
                state: NodeState::from_phase(pod.pod_phase()),
            }
        })
        .collect())
}

/// Replica index carried in an object's labels.
pub(crate) fn replica_label(object: &PlatformObject) -> Option<u32> {
    object.labels().get(LABEL_REPLICA)?.parse().ok()
}
