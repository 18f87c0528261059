//! Error types for the control client and the topology engine.

use couchgrid_health::PollError;
use thiserror::Error;

use crate::topology::RingReport;

/// Failure talking to one node's control API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("cannot connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("{method} {path} on {address} failed: {reason}")]
    Request {
        address: String,
        method: String,
        path: String,
        reason: String,
    },

    #[error("{method} {path} on {address} returned {status}: {body}")]
    Status {
        address: String,
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("document revision conflict at {path} on {address}")]
    Conflict { address: String, path: String },

    #[error("invalid response from {address}: {reason}")]
    Invalid { address: String, reason: String },
}

impl ControlError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ControlError::Connect { .. } | ControlError::Request { .. })
    }
}

/// Failure of a ring reconciliation.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A node's control API never answered; nothing was configured.
    #[error("node {address} unreachable: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: PollError,
    },

    /// Some edges failed; the others were applied.
    #[error(
        "{} of {} replication links failed",
        .report.failures.len(),
        .report.attempted()
    )]
    PartialFailure { report: Box<RingReport> },
}

impl TopologyError {
    /// The report of what was applied, when the call got that far.
    pub fn report(&self) -> Option<&RingReport> {
        match self {
            TopologyError::Unreachable { .. } => None,
            TopologyError::PartialFailure { report } => Some(report),
        }
    }
}

pub type ControlResult<T> = Result<T, ControlError>;
