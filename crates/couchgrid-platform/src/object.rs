//! Typed wrapper over the orchestration objects couchgrid manages.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, ReplicationController, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Resource kinds the platform client can operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Deployment,
    ReplicaSet,
    ReplicationController,
    StatefulSet,
    Service,
    PersistentVolumeClaim,
    Pod,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Deployment,
        ResourceKind::ReplicaSet,
        ResourceKind::ReplicationController,
        ResourceKind::StatefulSet,
        ResourceKind::Service,
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::Pod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "Deployment",
            ResourceKind::ReplicaSet => "ReplicaSet",
            ResourceKind::ReplicationController => "ReplicationController",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::Service => "Service",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::Pod => "Pod",
        }
    }

    /// API group/version the kind is served under.
    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::Deployment | ResourceKind::ReplicaSet | ResourceKind::StatefulSet => {
                "apps/v1"
            }
            _ => "v1",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One platform object of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformObject {
    Deployment(Deployment),
    ReplicaSet(ReplicaSet),
    ReplicationController(ReplicationController),
    StatefulSet(StatefulSet),
    Service(Service),
    PersistentVolumeClaim(PersistentVolumeClaim),
    Pod(Pod),
}

/// Apply the same expression to whichever object is wrapped.
macro_rules! each_object {
    ($obj:expr, $inner:ident => $body:expr) => {
        match $obj {
            PlatformObject::Deployment($inner) => $body,
            PlatformObject::ReplicaSet($inner) => $body,
            PlatformObject::ReplicationController($inner) => $body,
            PlatformObject::StatefulSet($inner) => $body,
            PlatformObject::Service($inner) => $body,
            PlatformObject::PersistentVolumeClaim($inner) => $body,
            PlatformObject::Pod($inner) => $body,
        }
    };
}

impl PlatformObject {
    pub fn kind(&self) -> ResourceKind {
        match self {
            PlatformObject::Deployment(_) => ResourceKind::Deployment,
            PlatformObject::ReplicaSet(_) => ResourceKind::ReplicaSet,
            PlatformObject::ReplicationController(_) => ResourceKind::ReplicationController,
            PlatformObject::StatefulSet(_) => ResourceKind::StatefulSet,
            PlatformObject::Service(_) => ResourceKind::Service,
            PlatformObject::PersistentVolumeClaim(_) => ResourceKind::PersistentVolumeClaim,
            PlatformObject::Pod(_) => ResourceKind::Pod,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        each_object!(self, o => &o.metadata)
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        each_object!(self, o => &mut o.metadata)
    }

    /// Object name, or the empty string when only `generateName` is set.
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// Name if set, otherwise the `generateName` prefix. For logging.
    pub fn display_name(&self) -> &str {
        let meta = self.metadata();
        meta.name
            .as_deref()
            .or(meta.generate_name.as_deref())
            .unwrap_or_default()
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.metadata().labels.clone().unwrap_or_default()
    }

    /// Declared replica count of a workload object.
    pub fn replicas(&self) -> Option<u32> {
        let declared = match self {
            PlatformObject::Deployment(d) => d.spec.as_ref().and_then(|s| s.replicas),
            PlatformObject::ReplicaSet(r) => r.spec.as_ref().and_then(|s| s.replicas),
            PlatformObject::ReplicationController(r) => r.spec.as_ref().and_then(|s| s.replicas),
            PlatformObject::StatefulSet(s) => s.spec.as_ref().and_then(|s| s.replicas),
            _ => return None,
        };
        // An unset replica count defaults to one on the platform.
        Some(declared.unwrap_or(1).max(0) as u32)
    }

    /// Overwrite the declared replica count of a workload object.
    pub fn set_replicas(&mut self, replicas: u32) -> bool {
        let replicas = Some(replicas as i32);
        match self {
            PlatformObject::Deployment(d) => d.spec.get_or_insert_with(Default::default).replicas = replicas,
            PlatformObject::ReplicaSet(r) => r.spec.get_or_insert_with(Default::default).replicas = replicas,
            PlatformObject::ReplicationController(r) => {
                r.spec.get_or_insert_with(Default::default).replicas = replicas
            }
            PlatformObject::StatefulSet(s) => s.spec.get_or_insert_with(Default::default).replicas = replicas,
            _ => return false,
        }
        true
    }

    /// Names of the objects that own this one.
    pub fn owner_names(&self) -> Vec<&str> {
        self.metadata()
            .owner_references
            .iter()
            .flatten()
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Observed phase of a pod.
    pub fn pod_phase(&self) -> Option<&str> {
        match self {
            PlatformObject::Pod(p) => p.status.as_ref().and_then(|s| s.phase.as_deref()),
            _ => None,
        }
    }

    /// Network address assigned to a pod.
    pub fn pod_ip(&self) -> Option<&str> {
        match self {
            PlatformObject::Pod(p) => p
                .status
                .as_ref()
                .and_then(|s| s.pod_ip.as_deref())
                .filter(|ip| !ip.is_empty()),
            _ => None,
        }
    }

    /// Virtual address assigned to a service.
    pub fn cluster_ip(&self) -> Option<&str> {
        match self {
            PlatformObject::Service(s) => s
                .spec
                .as_ref()
                .and_then(|s| s.cluster_ip.as_deref())
                .filter(|ip| !ip.is_empty() && *ip != "None"),
            _ => None,
        }
    }

    /// Claims mounted by a pod (directly or through a workload template).
    pub fn claim_names(&self) -> Vec<String> {
        let spec = match self {
            PlatformObject::Pod(p) => p.spec.as_ref(),
            PlatformObject::ReplicationController(r) => r
                .spec
                .as_ref()
                .and_then(|s| s.template.as_ref())
                .and_then(|t| t.spec.as_ref()),
            _ => None,
        };
        spec.and_then(|s| s.volumes.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|v| v.persistent_volume_claim.as_ref())
            .map(|c| c.claim_name.clone())
            .collect()
    }
}

macro_rules! impl_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for PlatformObject {
                fn from(value: $variant) -> Self {
                    PlatformObject::$variant(value)
                }
            }
        )*
    };
}

impl_from!(
    Deployment,
    ReplicaSet,
    ReplicationController,
    StatefulSet,
    Service,
    PersistentVolumeClaim,
    Pod
);

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{PodStatus, ServiceSpec};

    #[test]
    fn kind_and_name() {
        let mut svc = Service::default();
        svc.metadata.name = Some("cdb-cluster-abcd".to_string());
        let obj = PlatformObject::from(svc);
        assert_eq!(obj.kind(), ResourceKind::Service);
        assert_eq!(obj.name(), "cdb-cluster-abcd");
    }

    #[test]
    fn display_name_falls_back_to_generate_name() {
        let mut pvc = PersistentVolumeClaim::default();
        pvc.metadata.generate_name = Some("cdb-cluster-abcd-0-".to_string());
        let obj = PlatformObject::from(pvc);
        assert_eq!(obj.name(), "");
        assert_eq!(obj.display_name(), "cdb-cluster-abcd-0-");
    }

    #[test]
    fn replicas_only_for_workloads() {
        let mut deploy = Deployment::default();
        deploy.spec = Some(DeploymentSpec {
            replicas: Some(3),
            ..Default::default()
        });
        let mut obj = PlatformObject::from(deploy);
        assert_eq!(obj.replicas(), Some(3));
        assert!(obj.set_replicas(5));
        assert_eq!(obj.replicas(), Some(5));

        let mut pod = PlatformObject::from(Pod::default());
        assert_eq!(pod.replicas(), None);
        assert!(!pod.set_replicas(2));
    }

    #[test]
    fn unset_replicas_defaults_to_one() {
        let obj = PlatformObject::from(StatefulSet::default());
        assert_eq!(obj.replicas(), Some(1));
    }

    #[test]
    fn addresses() {
        let mut pod = Pod::default();
        pod.status = Some(PodStatus {
            phase: Some("Running".to_string()),
            pod_ip: Some("10.244.0.5".to_string()),
            ..Default::default()
        });
        let pod = PlatformObject::from(pod);
        assert_eq!(pod.pod_phase(), Some("Running"));
        assert_eq!(pod.pod_ip(), Some("10.244.0.5"));

        let mut svc = Service::default();
        svc.spec = Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            ..Default::default()
        });
        assert_eq!(PlatformObject::from(svc).cluster_ip(), None);
    }
}
