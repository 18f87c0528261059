//! Pod template and claim builders shared by every spawner.

use std::collections::BTreeMap;

use couchgrid_core::{COUCHDB_PORT, ClusterDescriptor, LabelSet};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
    Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

/// Where the database keeps its files inside the container.
pub const DATA_MOUNT_PATH: &str = "/opt/couchdb/data";

/// Volume name used in pod specs and as the ordinal claim template name.
pub const DATA_VOLUME: &str = "data";

/// How the data directory of a node is backed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataVolume {
    /// Container filesystem only.
    Ephemeral,
    /// An existing claim, referenced by name.
    Claim(String),
    /// A claim the ordinal set creates from its template.
    Template,
}

/// Build the pod template every database node runs.
pub fn pod_template(
    desc: &ClusterDescriptor,
    image: &str,
    labels: &LabelSet,
    data: &DataVolume,
) -> PodTemplateSpec {
    let mount = VolumeMount {
        name: DATA_VOLUME.to_string(),
        mount_path: DATA_MOUNT_PATH.to_string(),
        ..Default::default()
    };
    let (volume_mounts, volumes) = match data {
        DataVolume::Ephemeral => (None, None),
        DataVolume::Template => (Some(vec![mount]), None),
        DataVolume::Claim(claim) => (
            Some(vec![mount]),
            Some(vec![Volume {
                name: DATA_VOLUME.to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: claim.clone(),
                    read_only: None,
                }),
                ..Default::default()
            }]),
        ),
    };

    let container = Container {
        name: format!("couchdb-{}", desc.tag),
        image: Some(image.to_string()),
        ports: Some(vec![ContainerPort {
            container_port: COUCHDB_PORT as i32,
            ..Default::default()
        }]),
        env: Some(vec![
            env("COUCHDB_USER", &desc.owner),
            env("COUCHDB_PASSWORD", &desc.admin_password),
        ]),
        volume_mounts,
        ..Default::default()
    };

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels.to_map()),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![container],
            volumes,
            ..Default::default()
        }),
    }
}

/// A `ReadWriteOnce` claim of `size`.
pub fn volume_claim(meta: ObjectMeta, size: &str) -> PersistentVolumeClaim {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(size.to_string()));
    PersistentVolumeClaim {
        metadata: meta,
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A service on the database port selecting `selector`.
pub fn database_service(name: &str, labels: &LabelSet, selector: &LabelSet) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels.to_map()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(selector.to_map()),
            ports: Some(vec![ServicePort {
                port: COUCHDB_PORT as i32,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn label_selector(labels: &LabelSet) -> LabelSelector {
    LabelSelector {
        match_labels: Some(labels.to_map()),
        ..Default::default()
    }
}

pub fn named(name: &str, labels: &LabelSet) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(labels.to_map()),
        ..Default::default()
    }
}

fn env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> ClusterDescriptor {
        ClusterDescriptor::new("alice", "abcd", "default")
            .with_replicas(2)
            .with_password("pw")
    }

    #[test]
    fn container_carries_port_and_credentials() {
        let desc = desc();
        let tpl = pod_template(&desc, "couchdb", &desc.labels(), &DataVolume::Ephemeral);
        let spec = tpl.spec.unwrap();
        let container = &spec.containers[0];

        assert_eq!(container.image.as_deref(), Some("couchdb"));
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 5984);
        let env: Vec<_> = container
            .env
            .iter()
            .flatten()
            .map(|e| (e.name.as_str(), e.value.as_deref().unwrap_or_default()))
            .collect();
        assert_eq!(env, [("COUCHDB_USER", "alice"), ("COUCHDB_PASSWORD", "pw")]);
        assert!(container.volume_mounts.is_none());
        assert!(spec.volumes.is_none());
    }

    #[test]
    fn claim_backed_template_mounts_data() {
        let desc = desc();
        let data = DataVolume::Claim("cdb-cluster-abcd-0-x1".to_string());
        let tpl = pod_template(&desc, "couchdb", &desc.address().replica_labels(0), &data);
        let spec = tpl.spec.unwrap();

        let mount = &spec.containers[0].volume_mounts.as_ref().unwrap()[0];
        assert_eq!(mount.mount_path, DATA_MOUNT_PATH);
        let volume = &spec.volumes.as_ref().unwrap()[0];
        assert_eq!(
            volume.persistent_volume_claim.as_ref().unwrap().claim_name,
            "cdb-cluster-abcd-0-x1"
        );
        let labels = tpl.metadata.unwrap().labels.unwrap();
        assert_eq!(labels.get("replica").map(String::as_str), Some("0"));
    }

    #[test]
    fn template_volume_has_mount_but_no_volume() {
        let desc = desc();
        let tpl = pod_template(&desc, "couchdb", &desc.labels(), &DataVolume::Template);
        let spec = tpl.spec.unwrap();
        assert!(spec.containers[0].volume_mounts.is_some());
        assert!(spec.volumes.is_none());
    }

    #[test]
    fn claim_requests_size() {
        let claim = volume_claim(ObjectMeta::default(), "5Gi");
        let spec = claim.spec.unwrap();
        let requests = spec.resources.unwrap().requests.unwrap();
        assert_eq!(requests["storage"], Quantity("5Gi".to_string()));
        assert_eq!(spec.access_modes.unwrap(), ["ReadWriteOnce"]);
    }
}
