//! Controller error types and the caller-facing error taxonomy.

use std::fmt;

use couchgrid_core::IdentError;
use couchgrid_health::PollError;
use couchgrid_platform::PlatformError;
use couchgrid_replication::TopologyError;
use couchgrid_spawner::SpawnError;
use couchgrid_state::StateError;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification every controller error maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connectivity,
    NotFound,
    Conflict,
    PartialFailure,
    Timeout,
    Unsupported,
    InvalidRequest,
    Platform,
    State,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PartialFailure => "partial_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Platform => "platform",
            ErrorKind::State => "state",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("cluster {tag} not found")]
    NotFound { tag: String },

    #[error("cluster {tag} already exists")]
    AlreadyExists { tag: String },

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("cluster {tag}: {source}")]
    Platform {
        tag: String,
        #[source]
        source: PlatformError,
    },

    #[error("cluster {tag}: {source}")]
    Timeout {
        tag: String,
        #[source]
        source: PollError,
    },

    #[error("cluster {tag}: {source}")]
    Topology {
        tag: String,
        #[source]
        source: TopologyError,
    },

    #[error("cluster {tag} has no stored admin credentials")]
    MissingCredentials { tag: String },

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("cluster identity: {0}")]
    Identity(#[from] IdentError),
}

impl ClusterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClusterError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ClusterError::NotFound { .. } => ErrorKind::NotFound,
            ClusterError::AlreadyExists { .. } => ErrorKind::Conflict,
            ClusterError::Spawn(e) => match e {
                SpawnError::Unsupported { .. } => ErrorKind::Unsupported,
                SpawnError::WorkloadMissing { .. } => ErrorKind::NotFound,
                SpawnError::Platform { source, .. } => platform_kind(source),
            },
            ClusterError::Platform { source, .. } => platform_kind(source),
            ClusterError::Timeout { .. } => ErrorKind::Timeout,
            ClusterError::Topology { source, .. } => match source {
                TopologyError::Unreachable { .. } => ErrorKind::Connectivity,
                TopologyError::PartialFailure { .. } => ErrorKind::PartialFailure,
            },
            ClusterError::Identity(IdentError::InvalidTag { .. }) => ErrorKind::InvalidRequest,
            ClusterError::MissingCredentials { .. }
            | ClusterError::State(_)
            | ClusterError::Identity(IdentError::Random(_)) => ErrorKind::State,
        }
    }

    pub(crate) fn platform(tag: &str, source: PlatformError) -> Self {
        ClusterError::Platform {
            tag: tag.to_string(),
            source,
        }
    }
}

fn platform_kind(err: &PlatformError) -> ErrorKind {
    match err {
        PlatformError::Connect(_) => ErrorKind::Connectivity,
        PlatformError::NotFound { .. } => ErrorKind::NotFound,
        PlatformError::Conflict { .. } => ErrorKind::Conflict,
        PlatformError::Unsupported { .. } => ErrorKind::Unsupported,
        PlatformError::Invalid { .. } => ErrorKind::InvalidRequest,
        PlatformError::Api { .. } => ErrorKind::Platform,
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use couchgrid_core::SpawnerStrategy;
    use couchgrid_platform::ResourceKind;

    #[test]
    fn spawn_errors_classify_by_cause() {
        let unsupported = ClusterError::from(SpawnError::Unsupported {
            strategy: SpawnerStrategy::OrdinalSet,
            detail: "no".to_string(),
        });
        assert_eq!(unsupported.kind(), ErrorKind::Unsupported);

        let offline = ClusterError::from(SpawnError::Platform {
            tag: "abcd".to_string(),
            source: PlatformError::Connect("refused".to_string()),
        });
        assert_eq!(offline.kind(), ErrorKind::Connectivity);

        let conflict = ClusterError::platform(
            "abcd",
            PlatformError::Conflict {
                kind: ResourceKind::Service,
                name: "cdb-cluster-abcd".to_string(),
            },
        );
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn bad_tag_is_an_invalid_request() {
        let err = ClusterError::from(IdentError::InvalidTag {
            tag: "AB_cd".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(ClusterError::MissingCredentials { tag: "abcd".to_string() }.kind(), ErrorKind::State);
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(ErrorKind::PartialFailure.to_string(), "partial_failure");
    }
}
