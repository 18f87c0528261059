//! In-memory [`CouchControl`] standing in for a set of database nodes.
//!
//! Any address answers unless marked unreachable, so nodes appear as soon
//! as something talks to them. Only the calls the topology engine makes are
//! understood; everything else is a 400.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use couchgrid_core::Credentials;
use serde_json::{Value, json};

use crate::control::{ControlResponse, CouchControl};
use crate::couch::{REPLICATOR_DB, ReplicatorDoc};
use crate::error::{ControlError, ControlResult};

/// One request seen by [`MemoryCouch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCall {
    pub method: http::Method,
    pub address: String,
    pub path: String,
    pub authenticated: bool,
    pub body: Option<String>,
}

#[derive(Debug, Default)]
struct Node {
    databases: BTreeSet<String>,
    replicator: BTreeMap<String, ReplicatorDoc>,
    /// Last revision generation per id, kept across deletes.
    generations: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<String, Node>,
    unreachable: HashSet<String>,
    failing_databases: HashSet<String>,
    calls: Vec<ControlCall>,
    counter: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCouch {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCouch {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Refuse every connection to `address`.
    pub fn set_unreachable(&self, address: &str) {
        self.lock().unreachable.insert(address.to_string());
    }

    /// Reject writes of replication documents for `database` with a 500.
    pub fn fail_database(&self, database: &str) {
        self.lock().failing_databases.insert(database.to_string());
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn databases(&self, address: &str) -> Vec<String> {
        self.lock()
            .nodes
            .get(address)
            .map(|n| n.databases.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored replication documents on `address`, with revisions.
    pub fn replications(&self, address: &str) -> Vec<ReplicatorDoc> {
        self.lock()
            .nodes
            .get(address)
            .map(|n| n.replicator.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every stored replication document across all nodes.
    pub fn all_replications(&self) -> Vec<ReplicatorDoc> {
        let inner = self.lock();
        let mut addresses: Vec<_> = inner.nodes.keys().collect();
        addresses.sort();
        addresses
            .into_iter()
            .flat_map(|a| inner.nodes[a].replicator.values().cloned())
            .collect()
    }
}

fn respond(status: u16, body: Value) -> ControlResult<ControlResponse> {
    Ok(ControlResponse::new(status, body))
}

fn not_found() -> ControlResult<ControlResponse> {
    respond(404, json!({"error": "not_found", "reason": "missing"}))
}

fn conflict() -> ControlResult<ControlResponse> {
    respond(409, json!({"error": "conflict", "reason": "Document update conflict."}))
}

impl Inner {
    fn next_rev(&mut self, address: &str, id: &str) -> String {
        self.counter += 1;
        let counter = self.counter;
        let node = self.nodes.entry(address.to_string()).or_default();
        let generation = node.generations.entry(id.to_string()).or_insert(0);
        *generation += 1;
        format!("{generation}-{counter:08x}")
    }

    fn handle(
        &mut self,
        method: &http::Method,
        address: &str,
        path: &str,
        body: Option<&Value>,
    ) -> ControlResult<ControlResponse> {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        match (method.as_str(), segments.as_slice()) {
            ("GET", [""]) => respond(200, json!({"couchdb": "Welcome", "version": "3.3.3"})),

            ("PUT", [db]) => {
                let node = self.nodes.entry(address.to_string()).or_default();
                if node.databases.insert(db.to_string()) {
                    respond(201, json!({"ok": true}))
                } else {
                    respond(412, json!({"error": "file_exists"}))
                }
            }

            ("GET", [REPLICATOR_DB, id]) => match self
                .nodes
                .get(address)
                .and_then(|n| n.replicator.get(*id))
            {
                Some(doc) => respond(200, json!(doc)),
                None => not_found(),
            },

            ("DELETE", [REPLICATOR_DB, id]) => {
                let rev = query.strip_prefix("rev=").unwrap_or_default();
                let Some(node) = self.nodes.get_mut(address) else {
                    return not_found();
                };
                let current = node.replicator.get(*id).map(|doc| doc.rev.clone());
                match current {
                    None => not_found(),
                    Some(stored) if stored.as_deref() != Some(rev) => conflict(),
                    Some(_) => {
                        node.replicator.remove(*id);
                        respond(200, json!({"ok": true, "id": id}))
                    }
                }
            }

            ("POST", [REPLICATOR_DB]) => {
                let Some(mut doc) = body
                    .cloned()
                    .and_then(|b| serde_json::from_value::<ReplicatorDoc>(b).ok())
                else {
                    return respond(400, json!({"error": "bad_request"}));
                };
                let database = doc.source.rsplit('/').next().unwrap_or_default();
                if self.failing_databases.contains(database) {
                    return respond(500, json!({"error": "internal"}));
                }
                let exists = self
                    .nodes
                    .get(address)
                    .is_some_and(|n| n.replicator.contains_key(&doc.id));
                if exists {
                    return conflict();
                }
                let rev = self.next_rev(address, &doc.id);
                doc.rev = Some(rev.clone());
                let id = doc.id.clone();
                self.nodes
                    .entry(address.to_string())
                    .or_default()
                    .replicator
                    .insert(id.clone(), doc);
                respond(201, json!({"ok": true, "id": id, "rev": rev}))
            }

            _ => respond(400, json!({"error": "bad_request", "reason": path})),
        }
    }
}

#[async_trait]
impl CouchControl for MemoryCouch {
    async fn request(
        &self,
        method: http::Method,
        address: &str,
        path: &str,
        credentials: Option<&Credentials>,
        body: Option<&Value>,
    ) -> ControlResult<ControlResponse> {
        let mut inner = self.lock();
        inner.calls.push(ControlCall {
            method: method.clone(),
            address: address.to_string(),
            path: path.to_string(),
            authenticated: credentials.is_some(),
            body: body.map(Value::to_string),
        });
        if inner.unreachable.contains(address) {
            return Err(ControlError::Connect {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        inner.handle(&method, address, path, body)
    }
}
