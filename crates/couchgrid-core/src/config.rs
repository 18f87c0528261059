//! couchgrid.toml configuration parser.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_DATABASES, MAX_REPLICAS};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CouchgridConfig {
    pub platform: PlatformConfig,
    pub spawner: SpawnerConfig,
    pub cluster: ClusterConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Orchestration API URL. `None` uses the in-cluster / kubeconfig default.
    pub api_url: Option<String>,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    pub strategy: SpawnerStrategy,
    pub image: String,
    /// Claim size for per-replica volumes.
    pub volume_size: String,
    /// Claim size in the ordinal-set volume template.
    pub ordinal_volume_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub max_replicas: u32,
    pub default_databases: Vec<String>,
    pub readiness_attempts: u32,
    pub readiness_interval_ms: u64,
    pub settle_interval_ms: u64,
    /// Bound on sweeping leftover instances during teardown. The default
    /// outlasts the platform's termination grace period.
    pub teardown_attempts: u32,
    pub teardown_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            namespace: "default".to_string(),
        }
    }
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            strategy: SpawnerStrategy::default(),
            image: "couchdb".to_string(),
            volume_size: "1Gi".to_string(),
            ordinal_volume_size: "5Gi".to_string(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_replicas: MAX_REPLICAS,
            default_databases: DEFAULT_DATABASES.iter().map(|d| d.to_string()).collect(),
            readiness_attempts: 25,
            readiness_interval_ms: 700,
            settle_interval_ms: 600,
            teardown_attempts: 45,
            teardown_interval_ms: 1000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("/var/lib/couchgrid"),
        }
    }
}

impl CouchgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CouchgridConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Spawner strategy ───────────────────────────────────────────────

/// Which node spawner materializes database nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpawnerStrategy {
    /// One scalable Deployment, no durable storage.
    #[serde(rename = "deployment", alias = "stateless")]
    StatelessPool,
    /// One controller + claim + service per replica index.
    #[default]
    #[serde(rename = "rc", alias = "per-replica")]
    PerReplica,
    /// Platform-native ordinal set with a claim template.
    #[serde(rename = "petset", alias = "ordinal")]
    OrdinalSet,
}

impl SpawnerStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpawnerStrategy::StatelessPool => "deployment",
            SpawnerStrategy::PerReplica => "rc",
            SpawnerStrategy::OrdinalSet => "petset",
        }
    }
}

impl fmt::Display for SpawnerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpawnerStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deployment" | "stateless" => Ok(SpawnerStrategy::StatelessPool),
            "rc" | "per-replica" => Ok(SpawnerStrategy::PerReplica),
            "petset" | "statefulset" | "ordinal" => Ok(SpawnerStrategy::OrdinalSet),
            other => Err(format!(
                "unknown spawner strategy {other:?} (expected deployment, rc, or petset)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_constants() {
        let config = CouchgridConfig::default();
        assert_eq!(config.platform.namespace, "default");
        assert_eq!(config.spawner.strategy, SpawnerStrategy::PerReplica);
        assert_eq!(config.cluster.max_replicas, 10);
        assert_eq!(config.cluster.default_databases, ["test", "_users"]);
        assert_eq!(config.cluster.readiness_attempts, 25);
        assert_eq!(config.cluster.readiness_interval_ms, 700);
        assert_eq!(config.cluster.settle_interval_ms, 600);
        assert_eq!(config.cluster.teardown_attempts, 45);
        assert_eq!(config.cluster.teardown_interval_ms, 1000);
    }

    #[test]
    fn test_parse_minimal() {
        let toml_str = r#"
[platform]
api_url = "http://127.0.0.1:8080"

[spawner]
strategy = "deployment"
"#;
        let config: CouchgridConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.platform.api_url.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.platform.namespace, "default");
        assert_eq!(config.spawner.strategy, SpawnerStrategy::StatelessPool);
        assert_eq!(config.spawner.image, "couchdb");
    }

    #[test]
    fn test_parse_empty_is_default() {
        let config: CouchgridConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("couchgrid.toml");
        let mut config = CouchgridConfig::default();
        config.spawner.strategy = SpawnerStrategy::OrdinalSet;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = CouchgridConfig::from_file(&path).unwrap();
        assert_eq!(loaded.spawner.strategy, SpawnerStrategy::OrdinalSet);
    }

    #[test]
    fn strategy_parses_aliases() {
        assert_eq!("rc".parse::<SpawnerStrategy>(), Ok(SpawnerStrategy::PerReplica));
        assert_eq!("Deployment".parse::<SpawnerStrategy>(), Ok(SpawnerStrategy::StatelessPool));
        assert_eq!("petset".parse::<SpawnerStrategy>(), Ok(SpawnerStrategy::OrdinalSet));
        assert!("bogus".parse::<SpawnerStrategy>().is_err());
    }
}
