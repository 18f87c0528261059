//! redb table definitions.

use redb::TableDefinition;

/// owner → JSON list of database names, in the order given.
pub const OWNER_DATABASES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_databases");

/// (namespace, tag) → (owner, admin password, created at in epoch seconds).
pub const CLUSTER_SECRETS: TableDefinition<(&str, &str), (&str, &str, u64)> =
    TableDefinition::new("cluster_secrets");
