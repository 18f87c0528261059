//! HTTP handlers.
//!
//! Each handler checks the caller, runs one controller operation, and
//! wraps the outcome in the JSON envelope.

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, FromRequest, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use couchgrid_core::ClusterDescriptor;
use couchgrid_lifecycle::{ClusterError, CreateRequest, ErrorKind};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ApiState;

// ── Envelope ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Error,
    Unauthorized,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub detail: String,
}

/// Response wrapper for consistent API format.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: Outcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn ok<T: Serialize>(message: impl Into<String>, data: Option<T>) -> Response {
    let body = Envelope {
        status: Outcome::Ok,
        message: message.into(),
        error: None,
        data,
    };
    (StatusCode::OK, Json(body)).into_response()
}

fn unauthorized() -> Response {
    let body = Envelope::<()> {
        status: Outcome::Unauthorized,
        message: "missing or invalid credentials".to_string(),
        error: None,
        data: None,
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Connectivity
        | ErrorKind::PartialFailure
        | ErrorKind::Unsupported
        | ErrorKind::Platform => StatusCode::BAD_GATEWAY,
        ErrorKind::State => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(operation: &str, err: ClusterError) -> Response {
    let kind = err.kind();
    warn!(%operation, %kind, error = %err, "operation failed");
    let body = Envelope::<()> {
        status: Outcome::Error,
        message: format!("{operation} failed"),
        error: Some(ErrorDetail {
            kind,
            detail: err.to_string(),
        }),
        data: None,
    };
    (status_for(kind), Json(body)).into_response()
}

/// A body that is not a readable form still gets the envelope.
fn malformed(rejection: FormRejection) -> Response {
    warn!(status = %rejection.status(), error = %rejection.body_text(), "request form rejected");
    let body = Envelope::<()> {
        status: Outcome::Error,
        message: "request form could not be read".to_string(),
        error: Some(ErrorDetail {
            kind: ErrorKind::InvalidRequest,
            detail: rejection.body_text(),
        }),
        data: None,
    };
    (rejection.status(), Json(body)).into_response()
}

// ── Request forms ──────────────────────────────────────────────

/// Fields accepted by every operation; each uses the ones it needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterForm {
    pub username: String,
    pub token: String,
    pub cluster_tag: String,
    pub replicas: String,
    /// Comma separated.
    pub databases: String,
}

impl ClusterForm {
    /// Credential check. Only presence of a username is verified.
    fn caller(&self) -> Option<&str> {
        let name = self.username.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Unparseable or missing counts become 0, which clamps to 1.
    fn replicas(&self) -> i64 {
        self.replicas.trim().parse().unwrap_or(0)
    }

    fn databases(&self) -> Vec<String> {
        self.databases
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn tag(&self) -> &str {
        self.cluster_tag.trim()
    }
}

impl<S: Send + Sync> FromRequest<S> for ClusterForm {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Form::<ClusterForm>::from_request(req, state)
            .await
            .map(|Form(form)| form)
            .map_err(malformed)
    }
}

/// Summary of a replication rebuild; link targets carry credentials and are
/// not echoed back.
#[derive(Debug, Serialize)]
pub struct ReplicationSummary {
    pub nodes: usize,
    pub databases: Vec<String>,
    pub links: usize,
}

// ── Handlers ───────────────────────────────────────────────────

/// POST /v0/database/list
pub async fn list_clusters(State(state): State<ApiState>, form: ClusterForm) -> Response {
    let Some(owner) = form.caller() else {
        return unauthorized();
    };
    match state.controller.list(owner).await {
        Ok(clusters) => ok(format!("{} cluster(s)", clusters.len()), Some(clusters)),
        Err(e) => failure("list", e),
    }
}

/// POST /v0/database/detail
pub async fn detail_cluster(State(state): State<ApiState>, form: ClusterForm) -> Response {
    let Some(owner) = form.caller() else {
        return unauthorized();
    };
    match state.controller.detail(owner, form.tag()).await {
        Ok(detail) => ok(format!("cluster {}", form.tag()), Some(detail)),
        Err(e) => failure("detail", e),
    }
}

/// POST /v0/database/create
pub async fn create_cluster(State(state): State<ApiState>, form: ClusterForm) -> Response {
    let Some(owner) = form.caller() else {
        return unauthorized();
    };
    let databases = form.databases();
    let request = CreateRequest {
        owner: owner.to_string(),
        tag: Some(form.tag().to_string()).filter(|t| !t.is_empty()),
        replicas: form.replicas(),
        databases: (!databases.is_empty()).then_some(databases),
    };
    match state.controller.create(request).await {
        Ok(desc) => {
            info!(tag = %desc.tag, %owner, "cluster created via API");
            ok(format!("cluster {} created", desc.tag), Some(desc))
        }
        Err(e) => failure("create", e),
    }
}

/// POST /v0/database/drop
pub async fn drop_cluster(State(state): State<ApiState>, form: ClusterForm) -> Response {
    let Some(owner) = form.caller() else {
        return unauthorized();
    };
    match state.controller.delete(owner, form.tag()).await {
        Ok(()) => ok::<()>(format!("cluster {} deleted", form.tag()), None),
        Err(e) => failure("drop", e),
    }
}

/// POST /v0/database/scale
pub async fn scale_cluster(State(state): State<ApiState>, form: ClusterForm) -> Response {
    let Some(owner) = form.caller() else {
        return unauthorized();
    };
    match state.controller.scale(owner, form.tag(), form.replicas()).await {
        Ok(desc) => {
            let desc = ClusterDescriptor {
                admin_password: String::new(),
                ..desc
            };
            ok(
                format!("cluster {} scaled to {}", desc.tag, desc.desired_replicas),
                Some(desc),
            )
        }
        Err(e) => failure("scale", e),
    }
}

/// POST /v0/database/replicate
pub async fn replicate_cluster(
    State(state): State<ApiState>,
    form: ClusterForm,
) -> Response {
    let Some(owner) = form.caller() else {
        return unauthorized();
    };
    match state
        .controller
        .replicate(owner, form.tag(), &form.databases())
        .await
    {
        Ok(report) => ok(
            format!("replication configured for cluster {}", form.tag()),
            Some(ReplicationSummary {
                nodes: report.nodes.len(),
                links: report.links.len(),
                databases: report.databases,
            }),
        ),
        Err(e) => failure("replicate", e),
    }
}

/// GET / and anything unrouted.
pub async fn help() -> &'static str {
    "couchgrid v0\n\
     supported operations (POST, form-encoded, with username and token):\n \
     - create     /v0/database/create     cluster_tag?, replicas, databases?\n \
     - drop       /v0/database/drop       cluster_tag\n \
     - detail     /v0/database/detail     cluster_tag\n \
     - list       /v0/database/list\n \
     - scale      /v0/database/scale      cluster_tag, replicas\n \
     - replicate  /v0/database/replicate  cluster_tag, databases\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> ClusterForm {
        let mut form = ClusterForm::default();
        for (key, value) in pairs {
            let value = value.to_string();
            match *key {
                "username" => form.username = value,
                "cluster_tag" => form.cluster_tag = value,
                "replicas" => form.replicas = value,
                "databases" => form.databases = value,
                _ => {}
            }
        }
        form
    }

    #[test]
    fn empty_username_is_not_a_caller() {
        assert_eq!(form(&[]).caller(), None);
        assert_eq!(form(&[("username", "  ")]).caller(), None);
        assert_eq!(form(&[("username", "alice")]).caller(), Some("alice"));
    }

    #[test]
    fn replicas_parse_like_the_wire() {
        assert_eq!(form(&[("replicas", "3")]).replicas(), 3);
        assert_eq!(form(&[("replicas", "three")]).replicas(), 0);
        assert_eq!(form(&[]).replicas(), 0);
        assert_eq!(form(&[("replicas", "-2")]).replicas(), -2);
    }

    #[test]
    fn databases_split_on_commas() {
        let dbs = form(&[("databases", "orders, items,,_users ")]).databases();
        assert_eq!(dbs, ["orders", "items", "_users"]);
        assert!(form(&[]).databases().is_empty());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Timeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(ErrorKind::PartialFailure), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::State), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn envelope_omits_empty_fields() {
        let body = serde_json::to_value(Envelope::<()> {
            status: Outcome::Unauthorized,
            message: "no".to_string(),
            error: None,
            data: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"status": "unauthorized", "message": "no"}));
    }

    #[tokio::test]
    async fn unreadable_form_is_enveloped() {
        let req = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{}"))
            .unwrap();

        let resp = ClusterForm::from_request(req, &()).await.unwrap_err();

        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn help_lists_every_operation() {
        let text = help().await;
        for op in ["create", "drop", "detail", "list", "scale", "replicate"] {
            assert!(text.contains(&format!("/v0/database/{op}")));
        }
    }
}
