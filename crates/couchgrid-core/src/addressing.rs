//! Cluster addressing: deterministic names and labels for platform resources.
//!
//! A cluster is identified by `(owner, tag)`. Every resource it owns is
//! named with the prefix `cdb-cluster-<tag>` and labeled with
//! `user=<owner>,cluster_tag=<tag>`. Because both are pure functions of the
//! identity, any process can rediscover a cluster after a restart without
//! persisting anything.
//!
//! ```text
//! cdb-cluster-abcd            Deployment / StatefulSet / cluster Service
//! cdb-cluster-abcd-0          ReplicationController + per-node Service (replica=0)
//! cdb-cluster-abcd-0-x7k2p    PersistentVolumeClaim (generated suffix)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CLUSTER_PREFIX;

/// Label carrying the owning tenant.
pub const LABEL_USER: &str = "user";

/// Label carrying the cluster tag.
pub const LABEL_CLUSTER_TAG: &str = "cluster_tag";

/// Label carrying a node's replica index.
pub const LABEL_REPLICA: &str = "replica";

/// Marker label separating the cluster-level address object from per-node ones.
pub const LABEL_ADDRESS_SCOPE: &str = "address_scope";

/// Which kind of address object a service is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressScope {
    /// One service fronting every node of the cluster.
    Cluster,
    /// A service selecting exactly one replica index.
    Node,
}

impl AddressScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressScope::Cluster => "cluster",
            AddressScope::Node => "node",
        }
    }
}

/// An ordered set of `key=value` labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with one more label set.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether every label of `self` is present with the same value in `labels`.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }

    /// Render as a platform label selector (`a=1,b=2`).
    pub fn selector(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for LabelSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector())
    }
}

/// The resolved addressing scheme of one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAddress {
    owner: String,
    tag: String,
    prefix: String,
}

impl ClusterAddress {
    pub fn new(owner: &str, tag: &str) -> Self {
        Self {
            owner: owner.to_string(),
            tag: tag.to_string(),
            prefix: format!("{CLUSTER_PREFIX}{tag}"),
        }
    }

    /// Name of the cluster-wide objects (workload, ordinal set, cluster service).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Labels shared by every resource of the cluster.
    pub fn labels(&self) -> LabelSet {
        LabelSet::new()
            .with(LABEL_USER, self.owner.as_str())
            .with(LABEL_CLUSTER_TAG, self.tag.as_str())
    }

    /// Labels of a single replica index.
    pub fn replica_labels(&self, index: u32) -> LabelSet {
        self.labels().with(LABEL_REPLICA, index.to_string())
    }

    /// Labels attached to the cluster-level service object.
    pub fn cluster_service_labels(&self) -> LabelSet {
        self.labels()
            .with(LABEL_ADDRESS_SCOPE, AddressScope::Cluster.as_str())
    }

    /// Labels attached to the per-node service object of `index`.
    pub fn node_service_labels(&self, index: u32) -> LabelSet {
        self.replica_labels(index)
            .with(LABEL_ADDRESS_SCOPE, AddressScope::Node.as_str())
    }

    /// Selector matching every cluster-level service of one owner.
    pub fn owner_clusters_selector(owner: &str) -> LabelSet {
        LabelSet::new()
            .with(LABEL_USER, owner)
            .with(LABEL_ADDRESS_SCOPE, AddressScope::Cluster.as_str())
    }

    /// Name of the per-replica controller and per-node service of `index`.
    pub fn replica_name(&self, index: u32) -> String {
        format!("{}-{index}", self.prefix)
    }

    /// `generateName` prefix for the volume claim of `index`.
    pub fn claim_generate_name(&self, index: u32) -> String {
        format!("{}-{index}-", self.prefix)
    }

    /// Name of the claim the ordinal set creates for `ordinal` from `template`.
    pub fn ordinal_claim_name(&self, template: &str, ordinal: u32) -> String {
        format!("{template}-{}-{ordinal}", self.prefix)
    }

    /// Whether a resource name belongs to this cluster.
    ///
    /// Exact prefix or prefix followed by `-`, so `cdb-cluster-abcd` does not
    /// claim `cdb-cluster-abcde-0`.
    pub fn owns_name(&self, name: &str) -> bool {
        match name.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('-'),
            None => false,
        }
    }

    /// Recover the tag from a cluster-level resource name.
    pub fn tag_from_name(name: &str) -> Option<&str> {
        name.strip_prefix(CLUSTER_PREFIX).filter(|t| !t.is_empty())
    }
}

/// `http://<ip>:<port>`, the access URL of a cluster service.
pub fn cluster_endpoint(cluster_ip: &str, port: u16) -> String {
    format!("http://{cluster_ip}:{port}")
}

/// `<ip>:<port>`, the control address of one node.
pub fn node_address(ip: &str, port: u16) -> String {
    format!("{ip}:{port}")
}
