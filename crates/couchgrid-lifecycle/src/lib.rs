//! couchgrid-lifecycle — the cluster lifecycle controller.
//!
//! # Architecture
//!
//! ```text
//! ClusterController
//!   ├── LeaseTable        one mutating call per (namespace, tag)
//!   ├── NodeSpawner       create / scale / delete nodes
//!   ├── Platform          cluster service, leftover instance sweep
//!   ├── await_condition   readiness and teardown confirmation
//!   ├── TopologyEngine    replication ring over ready nodes
//!   └── StateStore        admin credentials, owner databases
//! ```

pub mod controller;
pub mod error;
pub mod lease;
pub mod settings;

pub use controller::{ClusterController, ClusterDetail, CreateRequest};
pub use error::{ClusterError, ClusterResult, ErrorKind};
pub use lease::{Lease, LeaseTable};
pub use settings::ControllerSettings;
