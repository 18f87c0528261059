//! Spawner error types.

use couchgrid_core::SpawnerStrategy;
use couchgrid_platform::PlatformError;
use thiserror::Error;

/// Errors that can occur while materializing or removing nodes.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("{strategy} spawner is not supported by the platform: {detail}")]
    Unsupported {
        strategy: SpawnerStrategy,
        detail: String,
    },

    #[error("cluster {tag} has no {strategy} workload")]
    WorkloadMissing {
        strategy: SpawnerStrategy,
        tag: String,
    },

    #[error("cluster {tag}: {source}")]
    Platform {
        tag: String,
        #[source]
        source: PlatformError,
    },
}

impl SpawnError {
    /// Attach cluster context to a platform error. An API that does not
    /// serve the strategy's resource becomes `Unsupported`.
    pub fn from_platform(strategy: SpawnerStrategy, tag: &str, err: PlatformError) -> Self {
        match err {
            PlatformError::Unsupported { detail, .. } => SpawnError::Unsupported { strategy, detail },
            other => SpawnError::Platform {
                tag: tag.to_string(),
                source: other,
            },
        }
    }
}

pub type SpawnResult<T> = Result<T, SpawnError>;
