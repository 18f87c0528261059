//! StateStore: owner database lists and cluster secrets in redb.
//!
//! Two tables, each with its own typed accessors. Cluster secrets use a
//! `(namespace, tag)` tuple key and a tuple value, so only the ordered
//! database lists go through JSON.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::{CLUSTER_SECRETS, OWNER_DATABASES};
use crate::types::ClusterSecret;

/// Thread-safe handle; clones share one database.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) the store file at `path`.
    pub fn open(path: &Path) -> StateResult<Self> {
        let store = Self::with_tables(Database::create(path)?)?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// A store that lives only as long as the process, for tests.
    pub fn open_in_memory() -> StateResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::with_tables(db)
    }

    /// Both tables exist before the first read, so readers never see
    /// `TableDoesNotExist`.
    fn with_tables(db: Database) -> StateResult<Self> {
        let txn = db.begin_write()?;
        txn.open_table(OWNER_DATABASES)?;
        txn.open_table(CLUSTER_SECRETS)?;
        txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    // ── Owner databases ────────────────────────────────────────────

    /// Remember the databases an owner wants replicated, replacing any
    /// earlier list.
    pub fn put_owner_databases(&self, owner: &str, databases: &[String]) -> StateResult<()> {
        let encoded = serde_json::to_vec(databases).map_err(|source| StateError::Codec {
            owner: owner.to_string(),
            source,
        })?;
        let txn = self.db.begin_write()?;
        txn.open_table(OWNER_DATABASES)?
            .insert(owner, encoded.as_slice())?;
        txn.commit()?;
        debug!(%owner, count = databases.len(), "owner databases stored");
        Ok(())
    }

    /// Databases last configured for an owner, if any.
    pub fn get_owner_databases(&self, owner: &str) -> StateResult<Option<Vec<String>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(OWNER_DATABASES)?;
        let Some(raw) = table.get(owner)? else {
            return Ok(None);
        };
        serde_json::from_slice(raw.value())
            .map(Some)
            .map_err(|source| StateError::Codec {
                owner: owner.to_string(),
                source,
            })
    }

    // ── Cluster secrets ────────────────────────────────────────────

    pub fn put_cluster_secret(&self, secret: &ClusterSecret) -> StateResult<()> {
        let txn = self.db.begin_write()?;
        txn.open_table(CLUSTER_SECRETS)?.insert(
            (secret.namespace.as_str(), secret.tag.as_str()),
            (secret.owner.as_str(), secret.admin_password.as_str(), secret.created_at),
        )?;
        txn.commit()?;
        debug!(namespace = %secret.namespace, tag = %secret.tag, "cluster secret stored");
        Ok(())
    }

    pub fn get_cluster_secret(&self, namespace: &str, tag: &str) -> StateResult<Option<ClusterSecret>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CLUSTER_SECRETS)?;
        Ok(table.get((namespace, tag))?.map(|row| {
            let (owner, admin_password, created_at) = row.value();
            ClusterSecret {
                namespace: namespace.to_string(),
                tag: tag.to_string(),
                owner: owner.to_string(),
                admin_password: admin_password.to_string(),
                created_at,
            }
        }))
    }

    /// Forget a cluster's credentials. Returns true if they existed.
    pub fn delete_cluster_secret(&self, namespace: &str, tag: &str) -> StateResult<bool> {
        let txn = self.db.begin_write()?;
        let existed = txn.open_table(CLUSTER_SECRETS)?.remove((namespace, tag))?.is_some();
        txn.commit()?;
        debug!(%namespace, %tag, existed, "cluster secret deleted");
        Ok(existed)
    }
}

/// Current Unix epoch in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
