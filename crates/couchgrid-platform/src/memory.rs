//! In-memory [`Platform`] with simulated controllers.
//!
//! Behaves like an orchestration API whose deletes never cascade:
//!
//! - `generateName` gets a unique suffix, services get a cluster address.
//! - Deployments keep one ReplicaSet at their replica count.
//! - ReplicaSets and ReplicationControllers keep their pod count, even after
//!   their own owner is gone.
//! - StatefulSets keep ordinal pods `<name>-<i>` and create one claim per
//!   template and ordinal, which they never delete.
//! - Pods are `Running` with an address as soon as they exist.
//! - A deleted pod can be set to come back under a new name, the way a
//!   controller that has not yet observed its own deletion replaces it.
//!
//! Every call is recorded for ordering assertions, and failures can be
//! injected per operation and kind.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use couchgrid_core::LabelSet;
use k8s_openapi::api::apps::v1::{ReplicaSet, ReplicaSetSpec};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, PodStatus, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use tracing::debug;

use crate::error::{PlatformError, PlatformResult};
use crate::object::{PlatformObject, ResourceKind};
use crate::platform::Platform;

/// Kind of platform call, for recording and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformOp {
    Create,
    List,
    Replace,
    Delete,
}

/// One recorded platform call. `name` is the selector for list calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCall {
    pub op: PlatformOp,
    pub kind: ResourceKind,
    pub name: String,
}

type ObjectKey = (String, ResourceKind, String);

#[derive(Default)]
struct World {
    objects: BTreeMap<ObjectKey, PlatformObject>,
    calls: Vec<PlatformCall>,
    failures: HashSet<(PlatformOp, ResourceKind)>,
    unsupported: HashSet<ResourceKind>,
    pending_pod_lists: u32,
    respawn_pod_deletes: u32,
    next_id: u64,
}

/// Shared in-memory platform. Clones see the same world.
#[derive(Clone, Default)]
pub struct InMemoryPlatform {
    world: Arc<Mutex<World>>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.world().calls.clone()
    }

    /// Recorded mutating calls (create, replace, delete).
    pub fn mutations(&self) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.op != PlatformOp::List)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.world().calls.clear();
    }

    /// Make every `op` on `kind` fail with a server error.
    pub fn fail_on(&self, op: PlatformOp, kind: ResourceKind) {
        self.world().failures.insert((op, kind));
    }

    pub fn clear_failures(&self) {
        self.world().failures.clear();
    }

    /// Pretend the API server does not serve `kind`.
    pub fn mark_unsupported(&self, kind: ResourceKind) {
        self.world().unsupported.insert(kind);
    }

    /// Report pods as `Pending` for the next `lists` pod list calls.
    pub fn hold_pods_pending(&self, lists: u32) {
        self.world().pending_pod_lists = lists;
    }

    /// Replace each of the next `deletes` deleted pods with a fresh copy.
    pub fn respawn_pod_deletes(&self, deletes: u32) {
        self.world().respawn_pod_deletes = deletes;
    }

    /// Objects of `kind` in `namespace`, ordered by name.
    pub fn objects(&self, namespace: &str, kind: ResourceKind) -> Vec<PlatformObject> {
        self.world()
            .objects
            .iter()
            .filter(|((ns, k, _), _)| ns == namespace && *k == kind)
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    /// Names of objects of `kind` in `namespace`, ordered.
    pub fn names(&self, namespace: &str, kind: ResourceKind) -> Vec<String> {
        self.objects(namespace, kind)
            .iter()
            .map(|o| o.name().to_string())
            .collect()
    }
}

impl World {
    fn record(&mut self, op: PlatformOp, kind: ResourceKind, name: &str) -> PlatformResult<()> {
        self.calls.push(PlatformCall {
            op,
            kind,
            name: name.to_string(),
        });
        if self.unsupported.contains(&kind) {
            return Err(PlatformError::Unsupported {
                kind,
                detail: "the server could not find the requested resource".to_string(),
            });
        }
        if self.failures.contains(&(op, kind)) {
            return Err(PlatformError::Api {
                kind,
                name: name.to_string(),
                code: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn suffix(&mut self) -> String {
        format!("{:05x}", self.next_id())
    }

    fn get(&self, namespace: &str, kind: ResourceKind, name: &str) -> Option<&PlatformObject> {
        self.objects
            .get(&(namespace.to_string(), kind, name.to_string()))
    }

    fn contains(&self, namespace: &str, kind: ResourceKind, name: &str) -> bool {
        self.get(namespace, kind, name).is_some()
    }

    fn of_kind(&self, namespace: &str, kind: ResourceKind) -> Vec<PlatformObject> {
        self.objects
            .iter()
            .filter(|((ns, k, _), _)| ns == namespace && *k == kind)
            .map(|(_, o)| o.clone())
            .collect()
    }

    /// Assign identity fields and store the object.
    fn admit(&mut self, namespace: &str, mut object: PlatformObject) -> PlatformResult<PlatformObject> {
        let kind = object.kind();
        if object.name().is_empty() {
            let generate = object.metadata().generate_name.clone().unwrap_or_default();
            if generate.is_empty() {
                return Err(PlatformError::Invalid {
                    kind,
                    reason: "name or generateName is required".to_string(),
                });
            }
            let name = format!("{generate}{}", self.suffix());
            object.metadata_mut().name = Some(name);
        }
        let name = object.name().to_string();
        if self.contains(namespace, kind, &name) {
            return Err(PlatformError::Conflict { kind, name });
        }

        let id = self.next_id();
        let meta = object.metadata_mut();
        meta.namespace = Some(namespace.to_string());
        meta.uid = Some(format!("uid-{id:08x}"));
        meta.resource_version = Some("1".to_string());

        if let PlatformObject::Service(svc) = &mut object {
            let spec = svc.spec.get_or_insert_with(Default::default);
            if spec.cluster_ip.is_none() {
                spec.cluster_ip = Some(format!("10.96.{}.{}", id / 250, id % 250 + 1));
            }
        }

        self.objects
            .insert((namespace.to_string(), kind, name), object.clone());
        Ok(object)
    }

    // ── Simulated controllers ──────────────────────────────────────

    fn reconcile(&mut self, namespace: &str) {
        self.reconcile_deployments(namespace);
        self.reconcile_pod_owners(namespace, ResourceKind::ReplicaSet);
        self.reconcile_pod_owners(namespace, ResourceKind::ReplicationController);
        self.reconcile_stateful_sets(namespace);
    }

    fn reconcile_deployments(&mut self, namespace: &str) {
        for deploy in self.of_kind(namespace, ResourceKind::Deployment) {
            let PlatformObject::Deployment(d) = &deploy else {
                continue;
            };
            let replicas = deploy.replicas().unwrap_or(1);
            let rs_name = format!("{}-{}", deploy.name(), template_hash(deploy.name()));
            let Some(spec) = d.spec.as_ref() else {
                continue;
            };

            if let Some(existing) = self.get(namespace, ResourceKind::ReplicaSet, &rs_name) {
                if existing.replicas() != Some(replicas) {
                    let mut updated = existing.clone();
                    updated.set_replicas(replicas);
                    self.objects.insert(
                        (namespace.to_string(), ResourceKind::ReplicaSet, rs_name),
                        updated,
                    );
                }
                continue;
            }

            let rs = ReplicaSet {
                metadata: ObjectMeta {
                    name: Some(rs_name),
                    labels: spec.template.metadata.as_ref().and_then(|m| m.labels.clone()),
                    owner_references: Some(vec![owner_ref(&deploy)]),
                    ..Default::default()
                },
                spec: Some(ReplicaSetSpec {
                    replicas: Some(replicas as i32),
                    selector: spec.selector.clone(),
                    template: Some(spec.template.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            };
            if let Err(e) = self.admit(namespace, rs.into()) {
                debug!(error = %e, "simulated replica set not admitted");
            }
        }
    }

    /// ReplicaSets and ReplicationControllers: keep `replicas` owned pods.
    fn reconcile_pod_owners(&mut self, namespace: &str, kind: ResourceKind) {
        for owner in self.of_kind(namespace, kind) {
            let template = match &owner {
                PlatformObject::ReplicaSet(r) => r.spec.as_ref().and_then(|s| s.template.clone()),
                PlatformObject::ReplicationController(r) => {
                    r.spec.as_ref().and_then(|s| s.template.clone())
                }
                _ => None,
            };
            let Some(template) = template else {
                continue;
            };
            let desired = owner.replicas().unwrap_or(1) as usize;
            let owned: Vec<String> = self
                .of_kind(namespace, ResourceKind::Pod)
                .iter()
                .filter(|p| p.owner_names().contains(&owner.name()))
                .map(|p| p.name().to_string())
                .collect();

            for _ in owned.len()..desired {
                let name = format!("{}-{}", owner.name(), self.suffix());
                self.spawn_pod(namespace, name, &template, &owner);
            }
            for name in owned.iter().skip(desired) {
                self.objects
                    .remove(&(namespace.to_string(), ResourceKind::Pod, name.clone()));
            }
        }
    }

    fn reconcile_stateful_sets(&mut self, namespace: &str) {
        for set in self.of_kind(namespace, ResourceKind::StatefulSet) {
            let PlatformObject::StatefulSet(s) = &set else {
                continue;
            };
            let Some(spec) = s.spec.as_ref() else {
                continue;
            };
            let desired = set.replicas().unwrap_or(1);
            let prefix = format!("{}-", set.name());

            for ordinal in 0..desired {
                for template in spec.volume_claim_templates.iter().flatten() {
                    let template_name = template.metadata.name.clone().unwrap_or_default();
                    let claim_name = format!("{template_name}-{}-{ordinal}", set.name());
                    if self.contains(namespace, ResourceKind::PersistentVolumeClaim, &claim_name) {
                        continue;
                    }
                    let claim = PersistentVolumeClaim {
                        metadata: ObjectMeta {
                            name: Some(claim_name),
                            labels: spec.selector.match_labels.clone(),
                            ..Default::default()
                        },
                        spec: template.spec.clone(),
                        ..Default::default()
                    };
                    if let Err(e) = self.admit(namespace, claim.into()) {
                        debug!(error = %e, "simulated claim not admitted");
                    }
                }

                let pod_name = format!("{prefix}{ordinal}");
                if !self.contains(namespace, ResourceKind::Pod, &pod_name) {
                    self.spawn_pod(namespace, pod_name, &spec.template, &set);
                }
            }

            let surplus: Vec<String> = self
                .of_kind(namespace, ResourceKind::Pod)
                .iter()
                .filter(|p| p.owner_names().contains(&set.name()))
                .filter_map(|p| {
                    let ordinal = p.name().strip_prefix(&prefix)?.parse::<u32>().ok()?;
                    (ordinal >= desired).then(|| p.name().to_string())
                })
                .collect();
            for name in surplus {
                self.objects
                    .remove(&(namespace.to_string(), ResourceKind::Pod, name));
            }
        }
    }

    /// Bring a deleted pod back under a fresh name, same labels and owners.
    fn respawn(&mut self, namespace: &str, mut pod: PlatformObject) {
        let name = format!("{}-{}", pod.name(), self.suffix());
        let meta = pod.metadata_mut();
        meta.name = Some(name);
        meta.uid = None;
        meta.resource_version = None;
        match self.admit(namespace, pod) {
            Ok(pod) => debug!(%namespace, name = pod.name(), "pod replaced"),
            Err(e) => debug!(error = %e, "replacement pod not admitted"),
        }
    }

    fn spawn_pod(&mut self, namespace: &str, name: String, template: &PodTemplateSpec, owner: &PlatformObject) {
        let id = self.next_id();
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(name),
                labels: template.metadata.as_ref().and_then(|m| m.labels.clone()),
                owner_references: Some(vec![owner_ref(owner)]),
                ..Default::default()
            },
            spec: template.spec.clone(),
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                pod_ip: Some(format!("10.244.{}.{}", id / 250, id % 250 + 1)),
                ..Default::default()
            }),
        };
        if let Err(e) = self.admit(namespace, pod.into()) {
            debug!(error = %e, "simulated pod not admitted");
        }
    }
}

fn owner_ref(owner: &PlatformObject) -> OwnerReference {
    OwnerReference {
        api_version: owner.kind().api_version().to_string(),
        kind: owner.kind().as_str().to_string(),
        name: owner.name().to_string(),
        uid: owner.metadata().uid.clone().unwrap_or_default(),
        controller: Some(true),
        ..Default::default()
    }
}

/// Stable short hash standing in for the pod-template hash.
fn template_hash(name: &str) -> String {
    let hash = name
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ b as u64).wrapping_mul(0x0100_0000_01b3));
    format!("{:010x}", hash)[..10].to_string()
}

#[async_trait]
impl Platform for InMemoryPlatform {
    async fn create(&self, namespace: &str, object: PlatformObject) -> PlatformResult<PlatformObject> {
        let mut world = self.world();
        world.record(PlatformOp::Create, object.kind(), object.display_name())?;
        let created = world.admit(namespace, object)?;
        world.reconcile(namespace);
        debug!(%namespace, kind = %created.kind(), name = created.name(), "created");
        Ok(created)
    }

    async fn list(
        &self,
        namespace: &str,
        kind: ResourceKind,
        selector: &LabelSet,
    ) -> PlatformResult<Vec<PlatformObject>> {
        let mut world = self.world();
        world.record(PlatformOp::List, kind, &selector.selector())?;
        let mut items: Vec<PlatformObject> = world
            .of_kind(namespace, kind)
            .into_iter()
            .filter(|o| selector.matches(&o.labels()))
            .collect();

        if kind == ResourceKind::Pod && world.pending_pod_lists > 0 {
            world.pending_pod_lists -= 1;
            for item in &mut items {
                if let PlatformObject::Pod(p) = item {
                    if let Some(status) = p.status.as_mut() {
                        status.phase = Some("Pending".to_string());
                    }
                }
            }
        }
        Ok(items)
    }

    async fn replace(&self, namespace: &str, mut object: PlatformObject) -> PlatformResult<PlatformObject> {
        let mut world = self.world();
        let kind = object.kind();
        let name = object.name().to_string();
        world.record(PlatformOp::Replace, kind, &name)?;

        let Some(current) = world.get(namespace, kind, &name).cloned() else {
            return Err(PlatformError::NotFound { kind, name });
        };
        let version = current
            .metadata()
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let meta = object.metadata_mut();
        meta.namespace = Some(namespace.to_string());
        meta.uid = current.metadata().uid.clone();
        meta.resource_version = Some((version + 1).to_string());
        if let (PlatformObject::Service(new), Some(old_ip)) = (&mut object, current.cluster_ip()) {
            let spec = new.spec.get_or_insert_with(Default::default);
            if spec.cluster_ip.is_none() {
                spec.cluster_ip = Some(old_ip.to_string());
            }
        }

        world
            .objects
            .insert((namespace.to_string(), kind, name.clone()), object.clone());
        world.reconcile(namespace);
        debug!(%namespace, %kind, %name, "replaced");
        Ok(object)
    }

    async fn delete(&self, namespace: &str, kind: ResourceKind, name: &str) -> PlatformResult<()> {
        let mut world = self.world();
        world.record(PlatformOp::Delete, kind, name)?;
        let Some(removed) = world
            .objects
            .remove(&(namespace.to_string(), kind, name.to_string()))
        else {
            return Err(PlatformError::NotFound {
                kind,
                name: name.to_string(),
            });
        };
        if kind == ResourceKind::Pod && world.respawn_pod_deletes > 0 {
            world.respawn_pod_deletes -= 1;
            world.respawn(namespace, removed);
        }
        world.reconcile(namespace);
        debug!(%namespace, %kind, %name, "deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
    use k8s_openapi::api::core::v1::{ReplicationController, ReplicationControllerSpec, Service};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

    const NS: &str = "default";

    fn labels() -> BTreeMap<String, String> {
        LabelSet::new()
            .with("user", "alice")
            .with("cluster_tag", "abcd")
            .to_map()
    }

    fn template() -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels()),
                ..Default::default()
            }),
            spec: None,
        }
    }

    fn deployment(replicas: i32) -> PlatformObject {
        Deployment {
            metadata: ObjectMeta {
                name: Some("cdb-cluster-abcd".to_string()),
                labels: Some(labels()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: LabelSelector {
                    match_labels: Some(labels()),
                    ..Default::default()
                },
                template: template(),
                ..Default::default()
            }),
            ..Default::default()
        }
        .into()
    }

    fn selector() -> LabelSet {
        LabelSet::from(labels())
    }

    #[tokio::test]
    async fn deployment_materializes_pods_through_replica_set() {
        let platform = InMemoryPlatform::new();
        platform.create(NS, deployment(3)).await.unwrap();

        assert_eq!(platform.names(NS, ResourceKind::ReplicaSet).len(), 1);
        let pods = platform.list(NS, ResourceKind::Pod, &selector()).await.unwrap();
        assert_eq!(pods.len(), 3);
        assert!(pods.iter().all(|p| p.pod_phase() == Some("Running")));
        assert!(pods.iter().all(|p| p.name().starts_with("cdb-cluster-abcd-")));
    }

    #[tokio::test]
    async fn replace_rescales_pods() {
        let platform = InMemoryPlatform::new();
        platform.create(NS, deployment(3)).await.unwrap();
        platform.replace(NS, deployment(1)).await.unwrap();
        assert_eq!(platform.names(NS, ResourceKind::Pod).len(), 1);
    }

    #[tokio::test]
    async fn deleting_owner_leaves_orphans() {
        let platform = InMemoryPlatform::new();
        platform.create(NS, deployment(2)).await.unwrap();
        platform
            .delete(NS, ResourceKind::Deployment, "cdb-cluster-abcd")
            .await
            .unwrap();

        assert_eq!(platform.names(NS, ResourceKind::ReplicaSet).len(), 1);
        assert_eq!(platform.names(NS, ResourceKind::Pod).len(), 2);
    }

    #[tokio::test]
    async fn generate_name_is_never_reused() {
        let platform = InMemoryPlatform::new();
        let claim = || {
            PlatformObject::from(PersistentVolumeClaim {
                metadata: ObjectMeta {
                    generate_name: Some("cdb-cluster-abcd-0-".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            })
        };
        let first = platform.create(NS, claim()).await.unwrap();
        platform
            .delete(NS, ResourceKind::PersistentVolumeClaim, first.name())
            .await
            .unwrap();
        let second = platform.create(NS, claim()).await.unwrap();

        assert!(first.name().starts_with("cdb-cluster-abcd-0-"));
        assert_ne!(first.name(), second.name());
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let platform = InMemoryPlatform::new();
        platform.create(NS, deployment(1)).await.unwrap();
        let err = platform.create(NS, deployment(1)).await.unwrap_err();
        assert!(matches!(err, PlatformError::Conflict { .. }));
    }

    #[tokio::test]
    async fn services_get_cluster_address() {
        let platform = InMemoryPlatform::new();
        let svc = Service {
            metadata: ObjectMeta {
                name: Some("cdb-cluster-abcd".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let created = platform.create(NS, svc.into()).await.unwrap();
        assert!(created.cluster_ip().is_some());
    }

    #[tokio::test]
    async fn replication_controller_keeps_one_pod() {
        let platform = InMemoryPlatform::new();
        let rc = ReplicationController {
            metadata: ObjectMeta {
                name: Some("cdb-cluster-abcd-0".to_string()),
                ..Default::default()
            },
            spec: Some(ReplicationControllerSpec {
                replicas: Some(1),
                template: Some(template()),
                ..Default::default()
            }),
            ..Default::default()
        };
        platform.create(NS, rc.into()).await.unwrap();
        let pods = platform.names(NS, ResourceKind::Pod);
        assert_eq!(pods.len(), 1);
        assert!(pods[0].starts_with("cdb-cluster-abcd-0-"));
    }

    #[tokio::test]
    async fn stateful_set_keeps_claims_on_shrink() {
        let platform = InMemoryPlatform::new();
        let set = |replicas: i32| -> PlatformObject {
            StatefulSet {
                metadata: ObjectMeta {
                    name: Some("cdb-cluster-abcd".to_string()),
                    ..Default::default()
                },
                spec: Some(StatefulSetSpec {
                    replicas: Some(replicas),
                    selector: LabelSelector {
                        match_labels: Some(labels()),
                        ..Default::default()
                    },
                    template: template(),
                    volume_claim_templates: Some(vec![PersistentVolumeClaim {
                        metadata: ObjectMeta {
                            name: Some("data".to_string()),
                            ..Default::default()
                        },
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            }
            .into()
        };
        platform.create(NS, set(3)).await.unwrap();
        assert_eq!(
            platform.names(NS, ResourceKind::Pod),
            ["cdb-cluster-abcd-0", "cdb-cluster-abcd-1", "cdb-cluster-abcd-2"]
        );

        platform.replace(NS, set(1)).await.unwrap();
        assert_eq!(platform.names(NS, ResourceKind::Pod), ["cdb-cluster-abcd-0"]);
        assert_eq!(platform.names(NS, ResourceKind::PersistentVolumeClaim).len(), 3);
    }

    #[tokio::test]
    async fn injected_failures_and_unsupported_kinds() {
        let platform = InMemoryPlatform::new();
        platform.fail_on(PlatformOp::Create, ResourceKind::Deployment);
        let err = platform.create(NS, deployment(1)).await.unwrap_err();
        assert!(matches!(err, PlatformError::Api { code: 500, .. }));

        platform.mark_unsupported(ResourceKind::StatefulSet);
        let err = platform
            .list(NS, ResourceKind::StatefulSet, &LabelSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn pending_pods_for_a_few_lists() {
        let platform = InMemoryPlatform::new();
        platform.create(NS, deployment(1)).await.unwrap();
        platform.hold_pods_pending(1);

        let first = platform.list(NS, ResourceKind::Pod, &selector()).await.unwrap();
        assert_eq!(first[0].pod_phase(), Some("Pending"));
        let second = platform.list(NS, ResourceKind::Pod, &selector()).await.unwrap();
        assert_eq!(second[0].pod_phase(), Some("Running"));
    }

    #[tokio::test]
    async fn deleted_pod_comes_back_once() {
        let platform = InMemoryPlatform::new();
        platform.create(NS, deployment(1)).await.unwrap();
        platform
            .delete(NS, ResourceKind::Deployment, "cdb-cluster-abcd")
            .await
            .unwrap();
        let rs = platform.names(NS, ResourceKind::ReplicaSet)[0].clone();
        platform.delete(NS, ResourceKind::ReplicaSet, &rs).await.unwrap();
        platform.respawn_pod_deletes(1);

        let first = platform.names(NS, ResourceKind::Pod)[0].clone();
        platform.delete(NS, ResourceKind::Pod, &first).await.unwrap();
        let replaced = platform.list(NS, ResourceKind::Pod, &selector()).await.unwrap();
        assert_eq!(replaced.len(), 1);
        assert!(replaced[0].name().starts_with(&format!("{first}-")));

        platform.delete(NS, ResourceKind::Pod, replaced[0].name()).await.unwrap();
        assert!(platform.names(NS, ResourceKind::Pod).is_empty());
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let platform = InMemoryPlatform::new();
        platform.create(NS, deployment(1)).await.unwrap();
        platform
            .delete(NS, ResourceKind::Deployment, "cdb-cluster-abcd")
            .await
            .unwrap();
        let missing = platform
            .delete_if_present(NS, ResourceKind::Deployment, "cdb-cluster-abcd")
            .await
            .unwrap();

        assert!(!missing);
        let ops: Vec<_> = platform.mutations().iter().map(|c| c.op).collect();
        assert_eq!(ops, [PlatformOp::Create, PlatformOp::Delete, PlatformOp::Delete]);
    }
}
