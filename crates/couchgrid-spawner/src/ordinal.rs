//! Ordinal set: a StatefulSet with a volume-claim template.
//!
//! The platform creates pod `<prefix>-<n>` and claim `data-<prefix>-<n>`
//! for every ordinal. It never deletes those claims, so shrinking removes
//! the claims of dropped ordinals itself.

use std::sync::Arc;

use async_trait::async_trait;
use couchgrid_core::{ClusterDescriptor, NodeUnit, SpawnerStrategy};
use couchgrid_platform::k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use couchgrid_platform::k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use couchgrid_platform::{Platform, PlatformError, PlatformObject, ResourceKind};
use tracing::{debug, info};

use crate::error::{SpawnError, SpawnResult};
use crate::spawner::{NodeSpawner, pod_nodes};
use crate::template::{DATA_VOLUME, DataVolume, label_selector, named, pod_template, volume_claim};

const STRATEGY: SpawnerStrategy = SpawnerStrategy::OrdinalSet;

pub struct OrdinalSetSpawner {
    platform: Arc<dyn Platform>,
    image: String,
    volume_size: String,
}

impl OrdinalSetSpawner {
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

    async fn stateful_set(&self, desc: &ClusterDescriptor) -> SpawnResult<Option<PlatformObject>> {
        let address = desc.address();
        self.platform
            .find(&desc.namespace, ResourceKind::StatefulSet, &desc.labels(), address.prefix())
            .await
            .map_err(Self::lift(desc))
    }
}

/// Ordinal encoded in a pod name `<prefix>-<n>`.
fn ordinal_from_name(prefix: &str, name: &str) -> Option<u32> {
    name.strip_prefix(prefix)?.strip_prefix('-')?.parse().ok()
}

#[async_trait]
impl NodeSpawner for OrdinalSetSpawner {
    fn strategy(&self) -> SpawnerStrategy {
        STRATEGY
    }

    async fn create_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<()> {
        let address = desc.address();
        let labels = desc.labels();
        let set = StatefulSet {
            metadata: named(address.prefix(), &labels),
            spec: Some(StatefulSetSpec {
                replicas: Some(desc.desired_replicas as i32),
                selector: label_selector(&labels),
                service_name: address.prefix().to_string(),
                template: pod_template(desc, &self.image, &labels, &DataVolume::Template),
                volume_claim_templates: Some(vec![volume_claim(
                    ObjectMeta {
                        name: Some(DATA_VOLUME.to_string()),
                        labels: Some(labels.to_map()),
                        ..Default::default()
                    },
                    &self.volume_size,
                )]),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.platform
            .create(&desc.namespace, set.into())
            .await
            .map_err(Self::lift(desc))?;
        info!(tag = %desc.tag, replicas = desc.desired_replicas, "ordinal set created");
        Ok(())
    }

    async fn list_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<Vec<NodeUnit>> {
        let address = desc.address();
        let prefix = address.prefix().to_string();
        pod_nodes(
            self.platform.as_ref(),
            desc,
            STRATEGY,
            |pod| ordinal_from_name(&prefix, pod.name()),
            |_, ordinal| ordinal.map(|n| address.ordinal_claim_name(DATA_VOLUME, n)),
        )
        .await
    }

    async fn delete_nodes(&self, desc: &ClusterDescriptor) -> SpawnResult<()> {
        let address = desc.address();
        let ns = desc.namespace.as_str();
        let existed = self
            .platform
            .delete_if_present(ns, ResourceKind::StatefulSet, address.prefix())
            .await
            .map_err(Self::lift(desc))?;
        debug!(tag = %desc.tag, existed, "ordinal set removed");

        let claims = self
            .platform
            .list(ns, ResourceKind::PersistentVolumeClaim, &desc.labels())
            .await
            .map_err(Self::lift(desc))?;
        let template_prefix = format!("{DATA_VOLUME}-");
        for claim in claims.iter().filter(|c| {
            c.name()
                .strip_prefix(&template_prefix)
                .is_some_and(|rest| address.owns_name(rest))
        }) {
            self.platform
                .delete_if_present(ns, ResourceKind::PersistentVolumeClaim, claim.name())
                .await
                .map_err(Self::lift(desc))?;
            debug!(tag = %desc.tag, claim = claim.name(), "claim removed");
        }
        Ok(())
    }

    async fn scale_to(&self, desc: &ClusterDescriptor, observed: u32) -> SpawnResult<()> {
        let target = desc.desired_replicas;
        if observed == target {
            return Ok(());
        }
        let mut set = self
            .stateful_set(desc)
            .await?
            .ok_or_else(|| SpawnError::WorkloadMissing {
                strategy: STRATEGY,
                tag: desc.tag.clone(),
            })?;
        set.set_replicas(target);
        self.platform
            .replace(&desc.namespace, set)
            .await
            .map_err(Self::lift(desc))?;

        // A later grow must start the re-added ordinals from empty storage.
        let address = desc.address();
        for ordinal in target..observed {
            let claim = address.ordinal_claim_name(DATA_VOLUME, ordinal);
            let existed = self
                .platform
                .delete_if_present(&desc.namespace, ResourceKind::PersistentVolumeClaim, &claim)
                .await
                .map_err(Self::lift(desc))?;
            debug!(tag = %desc.tag, %claim, existed, "claim of removed ordinal deleted");
        }
        info!(tag = %desc.tag, from = observed, to = target, "ordinal set rescaled");
        Ok(())
    }

    async fn declared_replicas(&self, desc: &ClusterDescriptor) -> SpawnResult<u32> {
        Ok(self
            .stateful_set(desc)
            .await?
            .and_then(|s| s.replicas())
            .unwrap_or(0))
    }
}
