//! Cluster lifecycle controller.
//!
//! Drives the node spawner to the desired count, keeps the cluster-level
//! service and stored credentials in step, and rebuilds the replication
//! ring whenever membership changes.
//!
//! ```text
//! Absent ─create─▶ Creating ─▶ Ready ─scale─▶ Scaling ─▶ Ready
//!                                 │
//!                                 └─delete─▶ Deleting ─▶ Absent
//! ```
//!
//! A partially failed create or scale is not rolled back; the error is
//! returned and whatever was created stays in place.

use std::sync::Arc;

use couchgrid_core::addressing::LABEL_CLUSTER_TAG;
use couchgrid_core::{
    COUCHDB_PORT, ClusterAddress, ClusterDescriptor, ClusterPhase, NodeUnit, cluster_endpoint,
    generate_password, normalize_tag, ring_order,
};
use couchgrid_health::{Clock, await_condition};
use couchgrid_platform::{Platform, PlatformObject, ResourceKind};
use couchgrid_replication::{RingReport, TopologyEngine};
use couchgrid_spawner::{NodeSpawner, SpawnError};
use couchgrid_spawner::template::database_service;
use couchgrid_state::{ClusterSecret, StateStore, epoch_secs};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ClusterError, ClusterResult};
use crate::lease::LeaseTable;
use crate::settings::ControllerSettings;

// ── Requests and views ────────────────────────────────────────────

/// Parameters of a new cluster.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub owner: String,
    /// Caller-chosen tag; generated when missing or too short.
    pub tag: Option<String>,
    pub replicas: i64,
    /// Databases to replicate; the configured defaults when `None`.
    pub databases: Option<Vec<String>>,
}

/// One cluster as reported by `detail`.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterDetail {
    #[serde(flatten)]
    pub descriptor: ClusterDescriptor,
    pub phase: ClusterPhase,
    pub nodes: Vec<NodeUnit>,
    /// Databases the owner last asked to replicate.
    pub databases: Vec<String>,
}

// ── Controller ────────────────────────────────────────────────────

pub struct ClusterController {
    platform: Arc<dyn Platform>,
    spawner: Arc<dyn NodeSpawner>,
    topology: TopologyEngine,
    state: StateStore,
    clock: Arc<dyn Clock>,
    settings: ControllerSettings,
    leases: LeaseTable,
}

impl ClusterController {
    pub fn new(
        platform: Arc<dyn Platform>,
        spawner: Arc<dyn NodeSpawner>,
        topology: TopologyEngine,
        state: StateStore,
        clock: Arc<dyn Clock>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            platform,
            spawner,
            topology,
            state,
            clock,
            settings,
            leases: LeaseTable::new(),
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    fn namespace(&self) -> &str {
        &self.settings.namespace
    }

    /// Provision a new cluster and, with more than one node, its ring.
    pub async fn create(&self, request: CreateRequest) -> ClusterResult<ClusterDescriptor> {
        let owner = require_owner(&request.owner)?;
        let tag = normalize_tag(request.tag.as_deref())?;
        let replicas = self.settings.replicas(request.replicas);
        let databases = request
            .databases
            .filter(|dbs| dbs.iter().any(|d| !d.trim().is_empty()))
            .unwrap_or_else(|| self.settings.default_databases.clone());

        let _lease = self.leases.acquire(self.namespace(), &tag).await;
        let mut desc = ClusterDescriptor::new(owner, &tag, self.namespace())
            .with_replicas(replicas)
            .with_password(generate_password()?);
        info!(%tag, %owner, replicas, phase = %ClusterPhase::Creating, "creating cluster");

        if self.cluster_service(&desc).await?.is_some() {
            return Err(ClusterError::AlreadyExists { tag });
        }

        self.spawner.create_nodes(&desc).await?;

        let address = desc.address();
        let service = database_service(
            address.prefix(),
            &address.cluster_service_labels(),
            &desc.labels(),
        );
        let service = self
            .platform
            .create(&desc.namespace, service.into())
            .await
            .map_err(|e| ClusterError::platform(&tag, e))?;
        desc.endpoint = service_endpoint(&service);
        debug!(%tag, endpoint = %desc.endpoint, "cluster service created");

        self.state.put_cluster_secret(&ClusterSecret {
            namespace: desc.namespace.clone(),
            tag: tag.clone(),
            owner: owner.to_string(),
            admin_password: desc.admin_password.clone(),
            created_at: epoch_secs(),
        })?;
        self.state.put_owner_databases(owner, &databases)?;

        if replicas > 1 {
            let nodes = self.await_ready(&desc, replicas).await?;
            self.apply_ring(&desc, &nodes, &databases).await?;
        }

        info!(%tag, %owner, replicas, endpoint = %desc.endpoint, phase = %ClusterPhase::Ready, "cluster created");
        Ok(desc)
    }

    /// Grow or shrink a cluster and rebuild its ring.
    pub async fn scale(&self, owner: &str, tag: &str, replicas: i64) -> ClusterResult<ClusterDescriptor> {
        let owner = require_owner(owner)?;
        let _lease = self.leases.acquire(self.namespace(), tag).await;

        let service = self.require_cluster(owner, tag).await?;
        let target = self.settings.replicas(replicas);
        let mut desc = self.load(owner, tag)?.with_replicas(target);
        let observed = self.spawner.declared_replicas(&desc).await?;

        if observed == target {
            debug!(%tag, replicas = target, "replica count unchanged");
            desc.endpoint = service_endpoint(&service);
            return Ok(desc);
        }

        // New nodes get the admin password at creation and the ring needs
        // it afterwards; without it nothing may be touched.
        if target > 1 && desc.admin_password.is_empty() {
            return Err(ClusterError::MissingCredentials {
                tag: tag.to_string(),
            });
        }

        info!(%tag, %owner, from = observed, to = target, phase = %ClusterPhase::Scaling, "scaling cluster");
        self.spawner.scale_to(&desc, observed).await?;
        let nodes = self.await_ready(&desc, target).await?;

        if target > 1 {
            let databases = self.owner_databases(owner)?;
            self.apply_ring(&desc, &nodes, &databases).await?;
        }

        desc.endpoint = match self.cluster_service(&desc).await? {
            Some(service) => service_endpoint(&service),
            None => String::new(),
        };
        info!(%tag, replicas = target, endpoint = %desc.endpoint, phase = %ClusterPhase::Ready, "cluster scaled");
        Ok(desc)
    }

    /// Tear a cluster down and confirm nothing of it is left running.
    pub async fn delete(&self, owner: &str, tag: &str) -> ClusterResult<()> {
        let owner = require_owner(owner)?;
        let _lease = self.leases.acquire(self.namespace(), tag).await;

        let desc = ClusterDescriptor::new(owner, tag, self.namespace());
        let address = desc.address();
        let ns = desc.namespace.as_str();

        let service = self.cluster_service(&desc).await?;
        if service.is_none()
            && self.spawner.declared_replicas(&desc).await? == 0
            && self.owned_instances(&desc).await?.is_empty()
        {
            return Err(ClusterError::NotFound {
                tag: tag.to_string(),
            });
        }
        info!(%tag, %owner, phase = %ClusterPhase::Deleting, "deleting cluster");

        if service.is_some() {
            if let Err(e) = self.platform.delete(ns, ResourceKind::Service, address.prefix()).await {
                warn!(%tag, error = %e, "cluster service removal failed; continuing");
            }
        }

        self.spawner.delete_nodes(&desc).await?;
        self.clock.sleep(self.settings.settle_interval).await;

        // Sub-controllers are removed without cascading, so their instances
        // may still be around or be replaced while the sweep runs. Every
        // attempt deletes whatever is left until a listing comes back empty.
        let target = format!("cluster {tag} teardown");
        let this = self;
        let cluster = &desc;
        await_condition(&target, &self.settings.teardown, self.clock.as_ref(), || async move {
            this.sweep_instances(cluster).await.map(|left| left == 0)
        })
        .await
        .map_err(|source| ClusterError::Timeout {
            tag: tag.to_string(),
            source,
        })?;

        self.state.delete_cluster_secret(ns, tag)?;
        info!(%tag, %owner, phase = %ClusterPhase::Absent, "cluster deleted");
        Ok(())
    }

    /// Every cluster of `owner`. A cluster whose details cannot be read is
    /// still listed, with its replica count left at zero.
    pub async fn list(&self, owner: &str) -> ClusterResult<Vec<ClusterDescriptor>> {
        let owner = require_owner(owner)?;
        let services = self
            .platform
            .list(
                self.namespace(),
                ResourceKind::Service,
                &ClusterAddress::owner_clusters_selector(owner),
            )
            .await
            .map_err(|e| ClusterError::platform("*", e))?;

        let mut clusters = Vec::with_capacity(services.len());
        for service in &services {
            let labels = service.labels();
            let Some(tag) = labels
                .get(LABEL_CLUSTER_TAG)
                .map(String::as_str)
                .or_else(|| ClusterAddress::tag_from_name(service.name()))
            else {
                continue;
            };
            let mut desc = ClusterDescriptor::new(owner, tag, self.namespace());
            desc.endpoint = service_endpoint(service);
            match self.spawner.declared_replicas(&desc).await {
                Ok(replicas) => desc.desired_replicas = replicas,
                Err(e) => warn!(%tag, error = %e, "replica lookup failed"),
            }
            clusters.push(desc);
        }
        clusters.sort_by(|a, b| a.tag.cmp(&b.tag));
        debug!(%owner, clusters = clusters.len(), "listed clusters");
        Ok(clusters)
    }

    /// One cluster with its nodes.
    pub async fn detail(&self, owner: &str, tag: &str) -> ClusterResult<ClusterDetail> {
        let owner = require_owner(owner)?;
        let service = self.require_cluster(owner, tag).await?;
        let mut desc = ClusterDescriptor::new(owner, tag, self.namespace());
        desc.endpoint = service_endpoint(&service);
        desc.desired_replicas = self.spawner.declared_replicas(&desc).await?;

        let mut nodes = self.spawner.list_nodes(&desc).await?;
        ring_order(&mut nodes);
        let phase = ClusterPhase::observe(desc.desired_replicas, &nodes);

        Ok(ClusterDetail {
            phase,
            nodes,
            databases: self.owner_databases(owner)?,
            descriptor: desc,
        })
    }

    /// Rebuild the ring of an existing cluster for `databases` and remember
    /// them for the owner.
    pub async fn replicate(&self, owner: &str, tag: &str, databases: &[String]) -> ClusterResult<RingReport> {
        let owner = require_owner(owner)?;
        if databases.iter().all(|d| d.trim().is_empty()) {
            return Err(ClusterError::InvalidRequest(
                "at least one database is required".to_string(),
            ));
        }
        let _lease = self.leases.acquire(self.namespace(), tag).await;

        self.require_cluster(owner, tag).await?;
        let mut desc = self.load(owner, tag)?;
        desc.desired_replicas = self.spawner.declared_replicas(&desc).await?;

        let nodes = self.await_ready(&desc, desc.desired_replicas).await?;
        let report = self.apply_ring(&desc, &nodes, databases).await?;
        self.state.put_owner_databases(owner, databases)?;
        info!(%tag, %owner, databases = ?report.databases, "replication updated");
        Ok(report)
    }

    // ── Helpers ───────────────────────────────────────────────────

    async fn cluster_service(&self, desc: &ClusterDescriptor) -> ClusterResult<Option<PlatformObject>> {
        let address = desc.address();
        self.platform
            .find(
                &desc.namespace,
                ResourceKind::Service,
                &address.cluster_service_labels(),
                address.prefix(),
            )
            .await
            .map_err(|e| ClusterError::platform(&desc.tag, e))
    }

    /// The cluster-level service, which marks a cluster as existing.
    async fn require_cluster(&self, owner: &str, tag: &str) -> ClusterResult<PlatformObject> {
        let desc = ClusterDescriptor::new(owner, tag, self.namespace());
        self.cluster_service(&desc)
            .await?
            .ok_or_else(|| ClusterError::NotFound {
                tag: tag.to_string(),
            })
    }

    /// Rebuild a descriptor from its identity and stored credentials.
    fn load(&self, owner: &str, tag: &str) -> ClusterResult<ClusterDescriptor> {
        let desc = ClusterDescriptor::new(owner, tag, self.namespace());
        match self.state.get_cluster_secret(self.namespace(), tag)? {
            Some(secret) => Ok(desc.with_password(secret.admin_password)),
            None => {
                warn!(%tag, "no stored admin credentials");
                Ok(desc)
            }
        }
    }

    fn owner_databases(&self, owner: &str) -> ClusterResult<Vec<String>> {
        Ok(self
            .state
            .get_owner_databases(owner)?
            .unwrap_or_else(|| self.settings.default_databases.clone()))
    }

    /// Instances whose names carry the cluster prefix.
    async fn owned_instances(&self, desc: &ClusterDescriptor) -> ClusterResult<Vec<PlatformObject>> {
        let address = desc.address();
        let pods = self
            .platform
            .list(&desc.namespace, ResourceKind::Pod, &desc.labels())
            .await
            .map_err(|e| ClusterError::platform(&desc.tag, e))?;
        Ok(pods
            .into_iter()
            .filter(|pod| address.owns_name(pod.name()))
            .collect())
    }

    /// Delete every owned instance still listed. Returns how many were found.
    async fn sweep_instances(&self, desc: &ClusterDescriptor) -> ClusterResult<usize> {
        let pods = self.owned_instances(desc).await?;
        for pod in &pods {
            let existed = self
                .platform
                .delete_if_present(&desc.namespace, ResourceKind::Pod, pod.name())
                .await
                .map_err(|e| ClusterError::platform(&desc.tag, e))?;
            debug!(tag = %desc.tag, pod = pod.name(), existed, "leftover instance removed");
        }
        Ok(pods.len())
    }

    /// Wait until exactly `expected` nodes are running; returns them in
    /// ring order.
    async fn await_ready(&self, desc: &ClusterDescriptor, expected: u32) -> ClusterResult<Vec<NodeUnit>> {
        let target = format!("cluster {} readiness", desc.tag);
        let spawner = self.spawner.as_ref();
        let attempts = await_condition(&target, &self.settings.readiness, self.clock.as_ref(), || async move {
            let nodes = spawner.list_nodes(desc).await?;
            Ok::<_, SpawnError>(
                nodes.len() == expected as usize && nodes.iter().all(NodeUnit::is_running),
            )
        })
        .await
        .map_err(|source| ClusterError::Timeout {
            tag: desc.tag.clone(),
            source,
        })?;

        let mut nodes = self.spawner.list_nodes(desc).await?;
        ring_order(&mut nodes);
        debug!(tag = %desc.tag, nodes = nodes.len(), attempts, "nodes ready");
        Ok(nodes)
    }

    async fn apply_ring(
        &self,
        desc: &ClusterDescriptor,
        nodes: &[NodeUnit],
        databases: &[String],
    ) -> ClusterResult<RingReport> {
        if nodes.len() > 1 && desc.admin_password.is_empty() {
            return Err(ClusterError::MissingCredentials {
                tag: desc.tag.clone(),
            });
        }
        let addresses: Vec<String> = nodes.iter().map(|n| n.address.clone()).collect();
        self.topology
            .reconcile_ring(&addresses, databases, &desc.credentials())
            .await
            .map_err(|source| ClusterError::Topology {
                tag: desc.tag.clone(),
                source,
            })
    }
}

fn require_owner(owner: &str) -> ClusterResult<&str> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(ClusterError::InvalidRequest("owner is required".to_string()));
    }
    Ok(owner)
}

/// `http://<cluster-ip>:5984`, or empty while the service has no address.
fn service_endpoint(service: &PlatformObject) -> String {
    service
        .cluster_ip()
        .map(|ip| cluster_endpoint(ip, COUCHDB_PORT))
        .unwrap_or_default()
}
