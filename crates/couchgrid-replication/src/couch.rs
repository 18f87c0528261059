//! Typed helpers over [`CouchControl`]: liveness, databases, replicator docs.

use couchgrid_core::{Credentials, ReplicationLink};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::control::{ControlResponse, CouchControl};
use crate::error::{ControlError, ControlResult};

/// Durable replication store on every node.
pub const REPLICATOR_DB: &str = "_replicator";

/// Body of a document in `_replicator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicatorDoc {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub continuous: bool,
}

impl From<&ReplicationLink> for ReplicatorDoc {
    fn from(link: &ReplicationLink) -> Self {
        Self {
            id: link.id.clone(),
            rev: None,
            source: link.source.clone(),
            target: link.target.clone(),
            continuous: link.continuous,
        }
    }
}

/// Outcome of an idempotent database create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseOutcome {
    Created,
    AlreadyExists,
}

fn unexpected(address: &str, method: &str, path: &str, resp: &ControlResponse) -> ControlError {
    ControlError::Status {
        address: address.to_string(),
        method: method.to_string(),
        path: path.to_string(),
        status: resp.status,
        body: resp.body.to_string(),
    }
}

/// `GET /`. Any 2xx answer counts as alive.
pub async fn ping(control: &dyn CouchControl, address: &str) -> ControlResult<()> {
    let resp = control
        .request(http::Method::GET, address, "/", None, None)
        .await?;
    if resp.is_success() {
        Ok(())
    } else {
        Err(unexpected(address, "GET", "/", &resp))
    }
}

/// `PUT /{db}`: 201/202 created, 412 already there.
pub async fn ensure_database(
    control: &dyn CouchControl,
    address: &str,
    database: &str,
    credentials: &Credentials,
) -> ControlResult<DatabaseOutcome> {
    let path = format!("/{database}");
    let resp = control
        .request(http::Method::PUT, address, &path, Some(credentials), None)
        .await?;
    match resp.status {
        201 | 202 => Ok(DatabaseOutcome::Created),
        412 => Ok(DatabaseOutcome::AlreadyExists),
        _ => Err(unexpected(address, "PUT", &path, &resp)),
    }
}

/// Fetch the replicator document `id`; `None` when there is none.
pub async fn get_replication(
    control: &dyn CouchControl,
    address: &str,
    id: &str,
    credentials: &Credentials,
) -> ControlResult<Option<ReplicatorDoc>> {
    let path = format!("/{REPLICATOR_DB}/{id}");
    let resp = control
        .request(http::Method::GET, address, &path, Some(credentials), None)
        .await?;
    match resp.status {
        404 => Ok(None),
        200 => serde_json::from_value(resp.body)
            .map(Some)
            .map_err(|e| ControlError::Invalid {
                address: address.to_string(),
                reason: format!("replicator document {id}: {e}"),
            }),
        _ => Err(unexpected(address, "GET", &path, &resp)),
    }
}

/// Delete the replicator document `id` at revision `rev`.
pub async fn delete_replication(
    control: &dyn CouchControl,
    address: &str,
    id: &str,
    rev: &str,
    credentials: &Credentials,
) -> ControlResult<()> {
    let path = format!("/{REPLICATOR_DB}/{id}?rev={rev}");
    let resp = control
        .request(http::Method::DELETE, address, &path, Some(credentials), None)
        .await?;
    match resp.status {
        200 | 202 => Ok(()),
        409 => Err(ControlError::Conflict {
            address: address.to_string(),
            path,
        }),
        _ => Err(unexpected(address, "DELETE", &path, &resp)),
    }
}

/// `POST /_replicator`; returns the revision of the stored document.
pub async fn write_replication(
    control: &dyn CouchControl,
    address: &str,
    doc: &ReplicatorDoc,
    credentials: &Credentials,
) -> ControlResult<String> {
    let path = format!("/{REPLICATOR_DB}");
    let body = serde_json::to_value(doc).map_err(|e| ControlError::Invalid {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    let resp = control
        .request(http::Method::POST, address, &path, Some(credentials), Some(&body))
        .await?;
    match resp.status {
        201 | 202 => Ok(resp
            .body
            .get("rev")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()),
        409 => Err(ControlError::Conflict {
            address: address.to_string(),
            path,
        }),
        _ => Err(unexpected(address, "POST", &path, &resp)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replicator_doc_wire_shape() {
        let creds = Credentials::new("alice", "pw");
        let link = ReplicationLink::between("orders", "10.0.0.1:5984", "10.0.0.2:5984", &creds);
        let doc = ReplicatorDoc::from(&link);
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "_id": "replicate_orders",
                "source": "http://10.0.0.1:5984/orders",
                "target": "http://alice:pw@10.0.0.2:5984/orders",
                "continuous": true,
            })
        );
    }

    #[test]
    fn replicator_doc_reads_revision() {
        let doc: ReplicatorDoc = serde_json::from_value(json!({
            "_id": "replicate_orders",
            "_rev": "3-abc",
            "source": "s",
            "target": "t",
            "continuous": true,
            "owner": "alice",
        }))
        .unwrap();
        assert_eq!(doc.rev.as_deref(), Some("3-abc"));
    }
}
