//! couchgrid-spawner — turns a cluster descriptor into running database nodes.
//!
//! Three strategies sit behind [`NodeSpawner`], chosen by configuration:
//!
//! ```text
//! deployment  StatelessPoolSpawner   Deployment(replicas=N), no storage
//! rc          PerReplicaSpawner      N × (claim, controller, node service)
//! petset      OrdinalSetSpawner      StatefulSet(replicas=N) + claim template
//! ```
//!
//! All of them share one pod template (see [`template`]) and report nodes
//! by listing the cluster's pods.

pub mod error;
pub mod factory;
pub mod ordinal;
pub mod per_replica;
pub mod spawner;
pub mod stateless;
pub mod template;

pub use error::{SpawnError, SpawnResult};
pub use factory::build_spawner;
pub use ordinal::OrdinalSetSpawner;
pub use per_replica::PerReplicaSpawner;
pub use spawner::NodeSpawner;
pub use stateless::StatelessPoolSpawner;
