//! Records kept in the state store.

/// Admin credentials of one cluster, written once at creation.
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterSecret {
    pub namespace: String,
    pub tag: String,
    pub owner: String,
    pub admin_password: String,
    /// Unix timestamp (seconds) when the cluster was created.
    pub created_at: u64,
}

impl std::fmt::Debug for ClusterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSecret")
            .field("namespace", &self.namespace)
            .field("tag", &self.tag)
            .field("owner", &self.owner)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
