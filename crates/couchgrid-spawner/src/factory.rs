//! Strategy selection.

use std::sync::Arc;

use couchgrid_core::SpawnerStrategy;
use couchgrid_core::config::SpawnerConfig;
use couchgrid_platform::Platform;

use crate::ordinal::OrdinalSetSpawner;
use crate::per_replica::PerReplicaSpawner;
use crate::spawner::NodeSpawner;
use crate::stateless::StatelessPoolSpawner;

/// Build the spawner named by `config.strategy`.
pub fn build_spawner(config: &SpawnerConfig, platform: Arc<dyn Platform>) -> Arc<dyn NodeSpawner> {
    match config.strategy {
        SpawnerStrategy::StatelessPool => Arc::new(StatelessPoolSpawner::new(platform, &config.image)),
        SpawnerStrategy::PerReplica => Arc::new(PerReplicaSpawner::new(
            platform,
            &config.image,
            &config.volume_size,
        )),
        SpawnerStrategy::OrdinalSet => Arc::new(OrdinalSetSpawner::new(
            platform,
            &config.image,
            &config.ordinal_volume_size,
        )),
    }
}
