//! Axum-based HTTP server.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::Stream;
use pact_network::Outbound;
use pact_node::PactNode;
use pact_types::{NodeId, VoteId};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use crate::handlers::{
    CreateApprovalRequest, CreateApprovalResponse, InviteView, PendingInvitesResponse,
    QueueDepthView, QueueHeadView, QueueOverviewResponse, QueueStatusResponse, ReplyRequest,
    ReplyResponse, SyncAckRequest, SyncEntry, SyncPushRequest, SyncPushResponse,
    VoteStatusResponse,
};
use crate::RpcError;

pub struct RpcServer {
    pub port: u16,
}

impl RpcServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Bind and serve until the shutdown signal fires.
    pub async fn start(
        &self,
        node: Arc<PactNode>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), RpcError> {
        let app = router(node);
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| RpcError::Server(format!("failed to bind {addr}: {e}")))?;
        tracing::info!(%addr, "rpc server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                tracing::info!("rpc server shutting down");
            })
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}

/// The full API surface over one node.
pub fn router(node: Arc<PactNode>) -> Router {
    Router::new()
        .route("/api/approval", post(create_approval))
        .route("/api/approval/reply", post(reply))
        .route("/api/approval/:vote_id", get(vote_status))
        .route("/api/approval/pending/:node_id", get(pending_invites))
        .route("/api/sync/push", post(sync_push))
        .route("/api/sync/ack", post(sync_ack))
        .route("/api/sync/subscribe/:node_id", get(sync_subscribe))
        .route("/api/queue", get(queue_overview))
        .route("/api/queue/:node_id", get(queue_status))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(node)
}

fn parse_node_id(raw: &str) -> Result<NodeId, RpcError> {
    NodeId::new(raw).map_err(|e| RpcError::InvalidRequest(e.to_string()))
}

async fn create_approval(
    State(node): State<Arc<PactNode>>,
    Json(body): Json<CreateApprovalRequest>,
) -> Result<Json<CreateApprovalResponse>, RpcError> {
    let initiator = parse_node_id(&body.initiator)?;
    let vote_id = node.create_approval(&initiator, body.config).await?;
    Ok(Json(CreateApprovalResponse {
        vote_id: vote_id.to_string(),
    }))
}

async fn reply(
    State(node): State<Arc<PactNode>>,
    Json(body): Json<ReplyRequest>,
) -> Result<Json<ReplyResponse>, RpcError> {
    let voter = parse_node_id(&body.voter)?;
    let vote_id = VoteId::new(body.vote_id.clone());
    let request = node.reply(&voter, &vote_id, body.action, body.reason).await?;
    Ok(Json(ReplyResponse {
        vote_id: body.vote_id,
        status: format!("{:?}", request.status),
    }))
}

async fn vote_status(
    State(node): State<Arc<PactNode>>,
    Path(vote_id): Path<String>,
) -> Result<Json<VoteStatusResponse>, RpcError> {
    let request = node.vote_status(&VoteId::new(vote_id))?;
    Ok(Json(VoteStatusResponse::from_request(&request)))
}

async fn pending_invites(
    State(node): State<Arc<PactNode>>,
    Path(node_id): Path<String>,
) -> Result<Json<PendingInvitesResponse>, RpcError> {
    let voter = parse_node_id(&node_id)?;
    // Each node only has authority over its own invites.
    if &voter != node.node_id() {
        return Err(RpcError::InvalidRequest(format!(
            "this node serves invites for {}, not {voter}",
            node.node_id()
        )));
    }
    let invites = node
        .pending_invites()?
        .iter()
        .map(InviteView::from_invite)
        .collect();
    Ok(Json(PendingInvitesResponse { invites }))
}

async fn sync_push(
    State(node): State<Arc<PactNode>>,
    Json(body): Json<SyncPushRequest>,
) -> Result<Json<SyncPushResponse>, RpcError> {
    let from = parse_node_id(&body.node_id)?;
    let records = body
        .entries
        .into_iter()
        .map(SyncEntry::into_record)
        .collect::<Result<Vec<_>, _>>()?;
    let applied = node.apply_sync(&from, &records)?;
    Ok(Json(SyncPushResponse { applied }))
}

async fn sync_ack(
    State(node): State<Arc<PactNode>>,
    Json(body): Json<SyncAckRequest>,
) -> Result<Json<SyncPushResponse>, RpcError> {
    let from = parse_node_id(&body.node_id)?;
    let records = body
        .entries
        .into_iter()
        .map(SyncEntry::into_record)
        .collect::<Result<Vec<_>, _>>()?;
    let applied = records.len();
    node.ack_sync(&from, &records)?;
    Ok(Json(SyncPushResponse { applied }))
}

/// Long-lived event stream of queued changes for one peer.
///
/// Flushes the peer's backlog on connect; afterwards, batches arrive as the
/// dispatcher queues them, interleaved with keepalive pings.
async fn sync_subscribe(
    State(node): State<Arc<PactNode>>,
    Path(node_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, RpcError> {
    let peer = parse_node_id(&node_id)?;
    let rx = node.subscribe(&peer).await?;

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let outbound = rx.recv().await?;
        let event = match outbound {
            Outbound::Events(events) => {
                let entries: Vec<SyncEntry> = events.iter().map(SyncEntry::from_event).collect();
                match Event::default().event("sync").json_data(&entries) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode sync batch");
                        Event::default().event("error").data("encoding failed")
                    }
                }
            }
            Outbound::Ping => Event::default().event("ping").data("{}"),
        };
        Some((Ok(event), rx))
    });

    Ok(Sse::new(stream))
}

async fn queue_overview(State(node): State<Arc<PactNode>>) -> Json<QueueOverviewResponse> {
    let mut queues: Vec<QueueDepthView> = node
        .queue_depths()
        .into_iter()
        .map(|(node_id, depth)| QueueDepthView {
            node_id: node_id.to_string(),
            depth,
        })
        .collect();
    queues.sort_by(|a, b| a.node_id.cmp(&b.node_id));
    Json(QueueOverviewResponse { queues })
}

async fn queue_status(
    State(node): State<Arc<PactNode>>,
    Path(node_id): Path<String>,
) -> Result<Json<QueueStatusResponse>, RpcError> {
    let peer = parse_node_id(&node_id)?;
    let pending = node.queue_pending(&peer);
    Ok(Json(QueueStatusResponse {
        node_id,
        depth: pending.len(),
        head: pending.first().map(|e| QueueHeadView {
            data_type: e.data_type,
            action: e.action,
            source_id: e.source_id.clone(),
        }),
    }))
}

async fn metrics(State(node): State<Arc<PactNode>>) -> impl IntoResponse {
    node.metrics().encode()
}
