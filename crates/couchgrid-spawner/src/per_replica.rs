//! Per-replica units: claim + single-instance controller + node service per index.
//!
//! ```text
//! index i ─┬─ PersistentVolumeClaim  cdb-cluster-<tag>-<i>-<generated>
//!          ├─ ReplicationController  cdb-cluster-<tag>-<i>   (replicas: 1, mounts the claim)
//!          └─ Service                cdb-cluster-<tag>-<i>   (selects replica=<i> only)
//! ```
//!
//! Claims use generated names, so a claim removed on shrink is never
//! re-attached when the index is reused by a later grow.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use couchgrid_core::{ClusterDescriptor, NodeUnit, SpawnerStrategy};
use couchgrid_platform::k8s_openapi::api::core::v1::{ReplicationController, ReplicationControllerSpec};
use couchgrid_platform::k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use couchgrid_platform::{Platform, PlatformError, ResourceKind};
use tracing::{debug, info};

use crate::error::{SpawnError, SpawnResult};
use crate::spawner::{NodeSpawner, pod_nodes, replica_label};
use crate::template::{DataVolume, database_service, named, pod_template, volume_claim};

const STRATEGY: SpawnerStrategy = SpawnerStrategy::PerReplica;

pub struct PerReplicaSpawner {
    platform: Arc<dyn Platform>,
    image: String,
    volume_size: String,
}

impl PerReplicaSpawner {
    pub fn new(platform: Arc<dyn Platform>, image: &str, volume_size: &str) -> Self {
        Self {
            platform,
            image: image.to_string(),
            volume_size: volume_size.to_string(),
        }
    }

    fn lift(desc: &ClusterDescriptor) -> impl Fn(PlatformError) -> SpawnError + '_ {
        move |e| SpawnError::from_platform(STRATEGY, &desc.tag, e)
    }

    /// Replica indices that currently have a controller.
    async fn indices(&self, desc: &ClusterDescriptor) -> SpawnResult<BTreeSet<u32>> {
        let address = desc.address();
        let controllers = self
            .platform
            .list(&desc.namespace, ResourceKind::ReplicationController, &desc.labels())
            .await
            .map_err(Self::lift(desc))?;
        Ok(controllers
            .iter()
            .filter(|rc| address.owns_name(rc.name()))
            .filter_map(replica_label)
            .collect())
    }

    /// Create the claim, controller, and node service of `index`.
    async fn create_replica(&self, desc: &ClusterDescriptor, index: u32) -> SpawnResult<()> {
        let address = desc.address();
        let labels = address.replica_labels(index);
        let ns = desc.namespace.as_str();

        let claim = volume_claim(
            ObjectMeta {
                generate_name: Some(address.claim_generate_name(index)),
                labels: Some(labels.to_map()),
                ..Default::default()
            },
            &self.volume_size,
        );
        let claim = self
            .platform
            .create(ns, claim.into())
            .await
            .map_err(Self::lift(desc))?;
        let claim_name = claim.name().to_string();
        debug!(tag = %desc.tag, index, claim = %claim_name, "claim created");

        let name = address.replica_name(index);
        let controller = ReplicationController {
            metadata: named(&name, &labels),
            spec: Some(ReplicationControllerSpec {
                replicas: Some(1),
                selector: Some(labels.to_map()),
                template: Some(pod_template(
                    desc,
                    &self.image,
                    &labels,
                    &DataVolume::Claim(claim_name),
                )),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.platform
            .create(ns, controller.into())
            .await
            .map_err(Self::lift(desc))?;
        debug!(tag = %desc.tag, index, controller = %name, "controller created");

        let service = database_service(&name, &address.node_service_labels(index), &labels);
        self.platform
            .create(ns, service.into())
            .await
            .map_err(Self::lift(desc))?;
        debug!(tag = %desc.tag, index, service = %name, "node service created");
        Ok(())
    }

    /// Remove `index` in order: controller, claim, instance, node service.
    async fn remove_replica(&self, desc: &ClusterDescriptor, index: u32) -> SpawnResult<()> {
        let address = desc.address();
        let selector = address.replica_labels(index);
        let ns = desc.namespace.as_str();

        for kind in [
            ResourceKind::ReplicationController,
            ResourceKind::PersistentVolumeClaim,
            ResourceKind::Pod,
        ] {
            let objects = self
                .platform
                .list(ns, kind, &selector)
                .await
                .map_err(Self::lift(desc))?;
            for obj in objects.iter().filter(|o| address.owns_name(o.name())) {
                self.platform
                    .delete_if_present(ns, kind, obj.name())
                    .await
                    .map_err(Self::lift(desc))?;
                debug!(tag = %desc.tag, index, %kind, name = obj.name(), "removed");
            }
        }

        self.platform
            .delete_if_present(ns, ResourceKind::Service, &address.replica_name(index))
            .await
            .map_err(Self::lift(desc))?;
        debug!(tag = %desc.tag, index, "node service removed");
        Ok(())
    }
}

#[async_trait]
impl NodeSpawner for PerReplicaSpawner {
    fn strategy(&self) -> SpawnerStrategy {
        STRATEGY
    }

    async fn create_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<()> {
        for index in 0..desc.desired_replicas {
            self.create_replica(desc, index).await?;
        }
        info!(tag = %desc.tag, replicas = desc.desired_replicas, "per-replica units created");
        Ok(())
    }

    async fn list_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<Vec<NodeUnit>> {
        pod_nodes(self.platform.as_ref(), desc, STRATEGY, replica_label, |pod, _| {
            pod.claim_names().into_iter().next()
        })
        .await
    }

    async fn delete_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<()> {
        let address = desc.address();
        let ns = desc.namespace.as_str();

        for kind in [ResourceKind::ReplicationController, ResourceKind::PersistentVolumeClaim] {
            let objects = self
                .platform
                .list(ns, kind, &desc.labels())
                .await
                .map_err(Self::lift(desc))?;
            for obj in objects.iter().filter(|o| address.owns_name(o.name())) {
                self.platform
                    .delete_if_present(ns, kind, obj.name())
                    .await
                    .map_err(Self::lift(desc))?;
                debug!(tag = %desc.tag, %kind, name = obj.name(), "removed");
            }
        }

        // Node services only; the cluster service belongs to the controller.
        let services = self
            .platform
            .list(ns, ResourceKind::Service, &desc.labels())
            .await
            .map_err(Self::lift(desc))?;
        for svc in services.iter().filter(|s| replica_label(s).is_some()) {
            self.platform
                .delete_if_present(ns, ResourceKind::Service, svc.name())
                .await
                .map_err(Self::lift(desc))?;
            debug!(tag = %desc.tag, service = svc.name(), "node service removed");
        }
        info!(tag = %desc.tag, "per-replica units removed");
        Ok(())
    }

    async fn scale_to(&self, desc: &ClusterDescriptor, observed: u32) -> SpawnResult<()> {
        let target = desc.desired_replicas;
        if observed == target {
            return Ok(());
        }
        let mut indices = self.indices(desc).await?;

        if target > observed {
            let mut next = 0;
            for _ in observed..target {
                while indices.contains(&next) {
                    next += 1;
                }
                self.create_replica(desc, next).await?;
                indices.insert(next);
            }
        } else {
            for _ in target..observed {
                let Some(highest) = indices.pop_last() else {
                    break;
                };
                self.remove_replica(desc, highest).await?;
            }
        }
        info!(tag = %desc.tag, from = observed, to = target, "per-replica units rescaled");
        Ok(())
    }

    async fn declared_replicas(&self, desc: &ClusterDescriptor) -> SpawnResult<u32> {
        Ok(self.indices(desc).await?.len() as u32)
    }
}
