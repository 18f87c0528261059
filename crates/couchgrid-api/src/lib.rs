//! couchgrid-api — caller-facing HTTP surface.
//!
//! Form-encoded POST bodies carry `username` and `token` plus the
//! operation's fields (`cluster_tag`, `replicas`, `databases`).
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/v0/database/list` | List the caller's clusters |
//! | POST | `/v0/database/detail` | One cluster with its nodes |
//! | POST | `/v0/database/create` | Create a cluster |
//! | POST | `/v0/database/drop` | Delete a cluster |
//! | POST | `/v0/database/scale` | Change the replica count |
//! | POST | `/v0/database/replicate` | Rebuild replication for given databases |
//! | GET | `/` | Help text |
//!
//! Every JSON answer is an envelope `{status, message, error?, data?}`
//! where `status` is `ok`, `error`, or `unauthorized`.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use couchgrid_lifecycle::ClusterController;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<ClusterController>,
}

/// Build the complete API router.
pub fn build_router(controller: Arc<ClusterController>) -> Router {
    let state = ApiState { controller };

    let database_routes = Router::new()
        .route("/list", post(handlers::list_clusters))
        .route("/detail", post(handlers::detail_cluster))
        .route("/create", post(handlers::create_cluster))
        .route("/drop", post(handlers::drop_cluster))
        .route("/scale", post(handlers::scale_cluster))
        .route("/replicate", post(handlers::replicate_cluster))
        .with_state(state);

    Router::new()
        .nest("/v0/database", database_routes)
        .route("/", get(handlers::help))
        .fallback(handlers::help)
}
