//! couchgrid-platform — the orchestration platform as couchgrid sees it.
//!
//! # Architecture
//!
//! ```text
//! Platform (trait)
//!   ├── KubePlatform       kube::Api<K> per kind, label selectors, orphaning deletes
//!   └── InMemoryPlatform   simulated controllers for tests
//!         ├── Deployment → ReplicaSet → Pods
//!         ├── ReplicationController → Pods
//!         ├── StatefulSet → ordinal Pods + template claims
//!         └── no cascade deletion: dependents outlive their owners
//! ```
//!
//! Objects travel as [`PlatformObject`], a closed enum over the k8s-openapi
//! types couchgrid creates, so spawners and the controller never touch the
//! API machinery directly.

pub mod error;
pub mod kubernetes;
pub mod memory;
pub mod object;
pub mod platform;

pub use error::{PlatformError, PlatformResult};
pub use kubernetes::KubePlatform;
pub use memory::{InMemoryPlatform, PlatformCall, PlatformOp};
pub use object::{PlatformObject, ResourceKind};
pub use platform::Platform;

// Re-exported so dependents build objects against the same API version.
pub use k8s_openapi;
