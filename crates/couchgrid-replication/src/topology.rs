//! Ring reconciliation: node `i` replicates every database to node `i+1`.
//!
//! ```text
//!   node0 ──▶ node1 ──▶ node2
//!     ▲                   │
//!     └───────────────────┘
//! ```
//!
//! Each edge first makes sure the database exists on both ends, then
//! swaps the source's `replicate_<db>` document: the old revision is
//! deleted and a fresh continuous task is written.

use std::collections::BTreeSet;
use std::sync::Arc;

use couchgrid_core::{Credentials, ReplicationLink, SYSTEM_USERS_DB};
use couchgrid_health::{Clock, RetryPolicy, await_condition};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::control::CouchControl;
use crate::couch::{self, ReplicatorDoc};
use crate::error::{ControlError, TopologyError};

/// One `(edge, database)` pair that could not be configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeFailure {
    pub source: String,
    pub target: String,
    pub database: String,
    pub error: String,
}

/// What a reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RingReport {
    /// Node addresses in ring order.
    pub nodes: Vec<String>,
    /// Databases that were replicated, after filtering.
    pub databases: Vec<String>,
    /// Links written, each with its new revision.
    pub links: Vec<ReplicationLink>,
    pub failures: Vec<EdgeFailure>,
}

impl RingReport {
    /// Number of `(edge, database)` pairs tried.
    pub fn attempted(&self) -> usize {
        self.links.len() + self.failures.len()
    }
}

/// Databases the ring carries: trimmed, de-duplicated in first-seen order,
/// blanks and the users database left out.
pub fn replicable_databases<S: AsRef<str>>(databases: &[S]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    databases
        .iter()
        .map(|d| d.as_ref().trim())
        .filter(|d| !d.is_empty() && *d != SYSTEM_USERS_DB)
        .filter(|d| seen.insert(d.to_string()))
        .map(str::to_string)
        .collect()
}

/// Applies the replication ring across a set of node addresses.
#[derive(Clone)]
pub struct TopologyEngine {
    control: Arc<dyn CouchControl>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl TopologyEngine {
    pub fn new(control: Arc<dyn CouchControl>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            control,
            clock,
            policy,
        }
    }

    /// Rebuild the ring over `nodes` (already in ring order).
    ///
    /// Fewer than two nodes is a no-op. Every node must answer its control
    /// API before anything is written; the first that never does aborts the
    /// call. Edge failures are collected and reported together.
    pub async fn reconcile_ring<S: AsRef<str>>(
        &self,
        nodes: &[String],
        databases: &[S],
        credentials: &Credentials,
    ) -> Result<RingReport, TopologyError> {
        let mut report = RingReport {
            nodes: nodes.to_vec(),
            databases: replicable_databases(databases),
            ..Default::default()
        };
        if nodes.len() < 2 {
            debug!(nodes = nodes.len(), "ring needs at least two nodes; nothing to do");
            return Ok(report);
        }

        for address in nodes {
            self.await_node(address).await?;
        }

        let n = nodes.len();
        for i in 0..n {
            let source = &nodes[i];
            let target = &nodes[(i + 1) % n];
            for database in &report.databases {
                match self.link(source, target, database, credentials).await {
                    Ok(link) => {
                        debug!(%source, %target, %database, rev = %link.revision, "link written");
                        report.links.push(link);
                    }
                    Err(e) => {
                        warn!(%source, %target, %database, error = %e, "link failed");
                        report.failures.push(EdgeFailure {
                            source: source.clone(),
                            target: target.clone(),
                            database: database.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        if report.failures.is_empty() {
            info!(
                nodes = n,
                databases = report.databases.len(),
                links = report.links.len(),
                "replication ring applied"
            );
            Ok(report)
        } else {
            Err(TopologyError::PartialFailure {
                report: Box::new(report),
            })
        }
    }

    async fn await_node(&self, address: &str) -> Result<(), TopologyError> {
        let control = self.control.as_ref();
        await_condition(address, &self.policy, self.clock.as_ref(), || async move {
            couch::ping(control, address).await.map(|()| true)
        })
        .await
        .map(|attempts| debug!(node = %address, attempts, "node answering"))
        .map_err(|source| TopologyError::Unreachable {
            address: address.to_string(),
            source,
        })
    }

    /// Configure one edge for one database.
    async fn link(
        &self,
        source: &str,
        target: &str,
        database: &str,
        credentials: &Credentials,
    ) -> Result<ReplicationLink, ControlError> {
        let control = self.control.as_ref();
        couch::ensure_database(control, source, database, credentials).await?;
        couch::ensure_database(control, target, database, credentials).await?;

        let mut link = ReplicationLink::between(database, source, target, credentials);
        if let Some(previous) = couch::get_replication(control, source, &link.id, credentials).await? {
            if let Some(rev) = previous.rev.as_deref() {
                couch::delete_replication(control, source, &link.id, rev, credentials).await?;
            }
        }
        link.revision =
            couch::write_replication(control, source, &ReplicatorDoc::from(&link), credentials)
                .await?;
        Ok(link)
    }
}
