//! Effective configuration: TOML file, then environment, then flags.

use std::path::PathBuf;

use clap::Args;
use couchgrid_core::{CouchgridConfig, SpawnerStrategy};

#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Path to couchgrid.toml.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Orchestration API URL. Defaults to in-cluster or kubeconfig discovery.
    #[arg(long, env = "KUBERNETES_API_URL")]
    pub api_url: Option<String>,

    /// Node spawner: deployment, rc or petset.
    #[arg(long, env = "SPAWNER_TYPE")]
    pub spawner: Option<SpawnerStrategy>,

    /// Namespace holding every managed object.
    #[arg(long, env = "COUCHGRID_NAMESPACE")]
    pub namespace: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Data directory for persistent state.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl ConfigArgs {
    /// Load the file (if any) and layer the overrides on top.
    pub fn resolve(&self) -> anyhow::Result<CouchgridConfig> {
        let base = match &self.config {
            Some(path) => CouchgridConfig::from_file(path)
                .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?,
            None => CouchgridConfig::default(),
        };
        Ok(self.apply(base))
    }

    /// Overrides win over whatever `config` already holds. Clap has already
    /// given flags precedence over their environment variables.
    pub fn apply(&self, mut config: CouchgridConfig) -> CouchgridConfig {
        if let Some(url) = self.api_url.as_deref().filter(|u| !u.trim().is_empty()) {
            config.platform.api_url = Some(url.trim().to_string());
        }
        if let Some(namespace) = self.namespace.as_deref().filter(|n| !n.trim().is_empty()) {
            config.platform.namespace = namespace.trim().to_string();
        }
        if let Some(strategy) = self.spawner {
            config.spawner.strategy = strategy;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.data_dir {
            config.server.data_dir = dir.clone();
        }
        config
    }
}
