//! couchgrid-replication — keeps every node of a cluster replicating to
//! its neighbour.
//!
//! # Architecture
//!
//! ```text
//! TopologyEngine::reconcile_ring
//!   ├── await_condition(ping)        every node, before any write
//!   └── for each edge i → i+1, each database
//!         ├── couch::ensure_database  source, target
//!         ├── couch::get_replication  + delete_replication(rev)
//!         └── couch::write_replication
//!                   │
//!                   ▼
//!             CouchControl  (HttpControl over hyper)
//! ```

pub mod control;
pub mod couch;
pub mod error;
pub mod memory;
pub mod topology;

pub use control::{ControlResponse, CouchControl, HttpControl, basic_auth};
pub use couch::{DatabaseOutcome, REPLICATOR_DB, ReplicatorDoc};
pub use error::{ControlError, ControlResult, TopologyError};
pub use memory::{ControlCall, MemoryCouch};
pub use topology::{EdgeFailure, RingReport, TopologyEngine, replicable_databases};
