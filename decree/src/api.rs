//! HTTP request surface.
//!
//! All protocol parameters are path-encoded; bodies are JSON replies only.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use crate::ballot::Ballot;
use crate::error::NodeError;
use crate::messages::{Accepted, AlivePeers, Promise};
use crate::node::Node;
use crate::proposer;
use crate::quorum::probe_alive;
use crate::role::Role;

pub(crate) fn router(node: Node) -> Router {
    Router::new()
        .route("/propose/{value}", post(propose))
        .route("/prepare/{round}/{node}", post(prepare))
        .route("/accept/{round}/{node}/{value}", post(accept))
        .route("/accepted", get(accepted))
        .route("/accepters", get(accepters))
        .route("/learners", get(learners))
        .route("/alive", get(alive))
        .with_state(node)
}

/// Submit a candidate value; replies once the proposer has committed.
async fn propose(
    State(node): State<Node>,
    Path(value): Path<String>,
) -> Result<Response, ApiError> {
    require_role(&node, Role::Proposer, "propose")?;
    let chosen = proposer::run(&node, value).await?;
    Ok((StatusCode::CREATED, axum::Json(chosen)).into_response())
}

/// Phase 1: promise not to accept below the given ballot.
async fn prepare(
    State(node): State<Node>,
    Path((round, node_id)): Path<(u64, u64)>,
) -> Result<axum::Json<Promise>, ApiError> {
    if node.role() != Role::Acceptor {
        return Err(wrong_role(&node, "prepare"));
    }
    let state = node.state().prepare(Ballot::new(round, node_id)).await?;
    Ok(axum::Json(Promise::from_state(node.addr(), &state)))
}

/// Phase 2: install the value if the ballot honors the standing promise.
async fn accept(
    State(node): State<Node>,
    Path((round, node_id, value)): Path<(u64, u64, String)>,
) -> Result<axum::Json<Promise>, ApiError> {
    if !node.role().accepts() {
        return Err(wrong_role(&node, "accept"));
    }
    let state = node
        .state()
        .accept(Ballot::new(round, node_id), value)
        .await?;
    Ok(axum::Json(Promise::from_state(node.addr(), &state)))
}

async fn accepted(State(node): State<Node>) -> Result<axum::Json<Accepted>, ApiError> {
    Ok(axum::Json(node.accepted().await?))
}

async fn accepters(State(node): State<Node>) -> axum::Json<AlivePeers> {
    let addrs = probe_alive(node.peers(), &node.members_of(Role::Acceptor)).await;
    axum::Json(AlivePeers { addrs })
}

async fn learners(State(node): State<Node>) -> axum::Json<AlivePeers> {
    let addrs = probe_alive(node.peers(), &node.members_of(Role::Learner)).await;
    axum::Json(AlivePeers { addrs })
}

async fn alive() -> StatusCode {
    StatusCode::OK
}

fn require_role(node: &Node, role: Role, op: &'static str) -> Result<(), ApiError> {
    if node.role() == role {
        Ok(())
    } else {
        Err(wrong_role(node, op))
    }
}

fn wrong_role(node: &Node, op: &'static str) -> ApiError {
    ApiError(NodeError::WrongRole {
        role: node.role(),
        op,
    })
}

/// Adapter translating [`NodeError`] into response statuses. Handlers never
/// panic; every failure kind has a status.
struct ApiError(NodeError);

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            NodeError::WrongRole { .. } => StatusCode::BAD_REQUEST,
            NodeError::RetryExhausted { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}
