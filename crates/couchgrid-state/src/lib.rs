//! couchgrid-state — embedded state store for couchgrid.
//!
//! Backed by [redb](https://docs.rs/redb). Holds the little state that cannot
//! be rediscovered from the orchestration platform:
//!
//! - the databases each owner last asked to replicate, reused when a
//!   cluster is scaled and its ring rebuilt
//! - the admin credentials generated when a cluster was created
//!
//! Cluster composition itself is never stored here; it is always read back
//! from the platform.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{StateStore, epoch_secs};
pub use types::*;
