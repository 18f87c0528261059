//! Stateless pool: one scalable Deployment, no durable storage.

use std::sync::Arc;

use async_trait::async_trait;
use couchgrid_core::{ClusterDescriptor, NodeUnit, SpawnerStrategy};
use couchgrid_platform::k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use couchgrid_platform::{Platform, PlatformError, PlatformObject, ResourceKind};
use tracing::{debug, info};

use crate::error::{SpawnError, SpawnResult};
use crate::spawner::{NodeSpawner, pod_nodes};
use crate::template::{DataVolume, label_selector, named, pod_template};

const STRATEGY: SpawnerStrategy = SpawnerStrategy::StatelessPool;

pub struct StatelessPoolSpawner {
    platform: Arc<dyn Platform>,
    image: String,
}

impl StatelessPoolSpawner {
    pub fn new(platform: Arc<dyn Platform>, image: &str) -> Self {
        Self {
            platform,
            image: image.to_string(),
        }
    }

    fn lift(desc: &ClusterDescriptor) -> impl Fn(PlatformError) -> SpawnError + '_ {
        move |e| SpawnError::from_platform(STRATEGY, &desc.tag, e)
    }

    async fn deployment(&self, desc: &ClusterDescriptor) -> SpawnResult<Option<PlatformObject>> {
        let address = desc.address();
        self.platform
            .find(&desc.namespace, ResourceKind::Deployment, &desc.labels(), address.prefix())
            .await
            .map_err(Self::lift(desc))
    }
}

#[async_trait]
impl NodeSpawner for StatelessPoolSpawner {
    fn strategy(&self) -> SpawnerStrategy {
        STRATEGY
    }

    async fn create_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<()> {
        let address = desc.address();
        let labels = desc.labels();
        let deployment = Deployment {
            metadata: named(address.prefix(), &labels),
            spec: Some(DeploymentSpec {
                replicas: Some(desc.desired_replicas as i32),
                selector: label_selector(&labels),
                template: pod_template(desc, &self.image, &labels, &DataVolume::Ephemeral),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.platform
            .create(&desc.namespace, deployment.into())
            .await
            .map_err(Self::lift(desc))?;
        info!(tag = %desc.tag, replicas = desc.desired_replicas, "stateless pool created");
        Ok(())
    }

    async fn list_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<Vec<NodeUnit>> {
        pod_nodes(self.platform.as_ref(), desc, STRATEGY, |_| None, |_, _| None).await
    }

    async fn delete_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<()> {
        let address = desc.address();
        let existed = self
            .platform
            .delete_if_present(&desc.namespace, ResourceKind::Deployment, address.prefix())
            .await
            .map_err(Self::lift(desc))?;
        debug!(tag = %desc.tag, existed, "deployment removed");

        // Sub-controllers outlive the deployment.
        let replica_sets = self
            .platform
            .list(&desc.namespace, ResourceKind::ReplicaSet, &desc.labels())
            .await
            .map_err(Self::lift(desc))?;
        for rs in replica_sets.iter().filter(|rs| address.owns_name(rs.name())) {
            self.platform
                .delete_if_present(&desc.namespace, ResourceKind::ReplicaSet, rs.name())
                .await
                .map_err(Self::lift(desc))?;
            debug!(tag = %desc.tag, replica_set = rs.name(), "replica set removed");
        }
        Ok(())
    }

    async fn scale_to(&self, desc: &ClusterDescriptor, observed: u32) -> SpawnResult<()> {
        if observed == desc.desired_replicas {
            return Ok(());
        }
        let mut deployment = self
            .deployment(desc)
            .await?
            .ok_or_else(|| SpawnError::WorkloadMissing {
                strategy: STRATEGY,
                tag: desc.tag.clone(),
            })?;
        deployment.set_replicas(desc.desired_replicas);
        self.platform
            .replace(&desc.namespace, deployment)
            .await
            .map_err(Self::lift(desc))?;
        info!(tag = %desc.tag, from = observed, to = desc.desired_replicas, "stateless pool rescaled");
        Ok(())
    }

    async fn declared_replicas(&self, desc: &ClusterDescriptor) -> SpawnResult<u32> {
        Ok(self
            .deployment(desc)
            .await?
            .and_then(|d| d.replicas())
            .unwrap_or(0))
    }
}
