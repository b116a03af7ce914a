//! Read-only HTTP views of the cluster state.

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::node::{NodeId, NodeInfo};
use super::state::ClusterStateMachine;
use crate::journal::types::JournaledCommand;

pub const ROUTE_STATUS: &str = "/api/v1/cluster/status";
pub const ROUTE_NODES: &str = "/api/v1/cluster/nodes";
pub const ROUTE_NODE: &str = "/api/v1/cluster/nodes/:id";
pub const ROUTE_BUCKET_NODES: &str = "/api/v1/cluster/buckets/:bucket/nodes";
pub const ROUTE_JOURNAL: &str = "/api/v1/cluster/journal";

#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterStatusResponse {
    pub self_id: NodeId,
    pub leader_id: NodeId,
    pub node_count: usize,
    pub last_applied_serial: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct JournalQuery {
    #[serde(default)]
    pub from: u64,
}

pub fn router(machine: Arc<ClusterStateMachine>) -> Router {
    Router::new()
        .route(ROUTE_STATUS, get(handle_status))
        .route(ROUTE_NODES, get(handle_nodes))
        .route(ROUTE_NODE, get(handle_node))
        .route(ROUTE_BUCKET_NODES, get(handle_bucket_nodes))
        .route(ROUTE_JOURNAL, get(handle_journal))
        .layer(Extension(machine))
}

pub async fn handle_status(
    Extension(machine): Extension<Arc<ClusterStateMachine>>,
) -> Json<ClusterStatusResponse> {
    let snapshot = machine.snapshot();
    Json(ClusterStatusResponse {
        self_id: snapshot.self_id(),
        leader_id: snapshot.leader_id(),
        node_count: snapshot.nodes().len(),
        last_applied_serial: snapshot.last_applied_serial(),
    })
}

pub async fn handle_nodes(
    Extension(machine): Extension<Arc<ClusterStateMachine>>,
) -> Json<Vec<NodeInfo>> {
    Json(machine.nodes())
}

pub async fn handle_node(
    Extension(machine): Extension<Arc<ClusterStateMachine>>,
    Path(id): Path<String>,
) -> Response {
    let id: NodeId = match id.parse() {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!("Rejecting node id {:?}: {}", id, e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match machine.node(&id) {
        Some(node) => (StatusCode::OK, Json(node)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn handle_bucket_nodes(
    Extension(machine): Extension<Arc<ClusterStateMachine>>,
    Path(bucket): Path<u32>,
) -> Json<Vec<NodeInfo>> {
    Json(machine.nodes_for_bucket(bucket))
}

pub async fn handle_journal(
    Extension(machine): Extension<Arc<ClusterStateMachine>>,
    Query(query): Query<JournalQuery>,
) -> Json<Vec<JournaledCommand>> {
    Json(machine.journal_entries(query.from))
}
