//! couchgrid-core — shared types for managing replicated CouchDB clusters.
//!
//! Everything here is pure data: the cluster descriptor, node units,
//! replication links, the deterministic addressing scheme that maps
//! `(owner, tag)` onto platform resource names and labels, identity
//! generation, and the TOML configuration file.

pub mod addressing;
pub mod config;
pub mod ident;
pub mod types;

pub use addressing::{AddressScope, ClusterAddress, LabelSet, cluster_endpoint, node_address};
pub use config::{CouchgridConfig, SpawnerStrategy};
pub use ident::{IdentError, clamp_replicas, generate_password, normalize_tag};
pub use types::*;

/// Port the database listens on inside every node.
pub const COUCHDB_PORT: u16 = 5984;

/// Prefix of every platform resource name owned by a cluster.
pub const CLUSTER_PREFIX: &str = "cdb-cluster-";

/// Upper bound for the replica count of one cluster.
pub const MAX_REPLICAS: u32 = 10;

/// Shortest accepted caller-supplied cluster tag.
pub const MIN_CLUSTER_TAG: usize = 4;

/// Longest cluster tag; also the length of generated tags.
pub const MAX_CLUSTER_TAG: usize = 12;

/// Length of generated admin passwords.
pub const PASSWORD_LENGTH: usize = 16;

/// The database holding user documents. It cannot be replicated through
/// the durable `_replicator` store and is always left out of the ring.
pub const SYSTEM_USERS_DB: &str = "_users";

/// Databases replicated when the caller does not name any.
pub const DEFAULT_DATABASES: &[&str] = &["test", SYSTEM_USERS_DB];
