//! Request/response bodies for the HTTP API.

use pact_sync::ChangeEvent;
use pact_types::{SyncAction, SyncDataType, VoteAction};
use pact_vote::{SyncRecord, VoteConfig, VoteInvite, VoteRequest};
use serde::{Deserialize, Serialize};

use crate::RpcError;

// ── Approvals ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateApprovalRequest {
    /// Must name this node; a control plane only initiates as itself.
    pub initiator: String,
    pub config: VoteConfig,
}

#[derive(Serialize)]
pub struct CreateApprovalResponse {
    pub vote_id: String,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub vote_id: String,
    pub voter: String,
    pub action: VoteAction,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct ReplyResponse {
    pub vote_id: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct PartyVoteView {
    pub party_id: String,
    pub action: String,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct VoteStatusResponse {
    pub vote_id: String,
    pub vote_type: String,
    pub initiator: String,
    pub status: String,
    pub execute_status: String,
    pub approved_threshold: u32,
    pub party_votes: Vec<PartyVoteView>,
}

impl VoteStatusResponse {
    pub fn from_request(request: &VoteRequest) -> Self {
        Self {
            vote_id: request.vote_id.to_string(),
            vote_type: request.vote_type.to_string(),
            initiator: request.initiator.to_string(),
            status: format!("{:?}", request.status),
            execute_status: format!("{:?}", request.execute_status),
            approved_threshold: request.approved_threshold,
            party_votes: request
                .party_votes
                .iter()
                .map(|p| PartyVoteView {
                    party_id: p.party_id.to_string(),
                    action: p.action.to_string(),
                    reason: p.reason.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct InviteView {
    pub vote_id: String,
    pub vote_type: String,
    pub initiator: String,
    pub created_at: u64,
}

#[derive(Serialize)]
pub struct PendingInvitesResponse {
    pub invites: Vec<InviteView>,
}

impl InviteView {
    pub fn from_invite(invite: &VoteInvite) -> Self {
        Self {
            vote_id: invite.vote_id.to_string(),
            vote_type: invite.vote_type.to_string(),
            initiator: invite.initiator.to_string(),
            created_at: invite.created_at.as_secs(),
        }
    }
}

// ── Change sync ──────────────────────────────────────────────────────────

/// One change entry on the wire. The payload travels hex-encoded inside
/// JSON.
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncEntry {
    pub data_type: SyncDataType,
    pub action: SyncAction,
    pub source_id: String,
    pub payload: String,
}

impl SyncEntry {
    pub fn from_event(event: &ChangeEvent) -> Self {
        Self {
            data_type: event.data_type,
            action: event.action,
            source_id: event.source_id.clone(),
            payload: hex::encode(&event.payload),
        }
    }

    pub fn into_record(self) -> Result<SyncRecord, RpcError> {
        let payload = hex::decode(&self.payload)
            .map_err(|e| RpcError::InvalidRequest(format!("payload is not hex: {e}")))?;
        Ok(SyncRecord {
            data_type: self.data_type,
            action: self.action,
            source_id: self.source_id,
            payload,
        })
    }
}

#[derive(Deserialize)]
pub struct SyncPushRequest {
    /// The sending peer.
    pub node_id: String,
    pub entries: Vec<SyncEntry>,
}

#[derive(Serialize)]
pub struct SyncPushResponse {
    pub applied: usize,
}

#[derive(Deserialize)]
pub struct SyncAckRequest {
    /// The acknowledging peer.
    pub node_id: String,
    pub entries: Vec<SyncEntry>,
}

// ── Queue status ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct QueueHeadView {
    pub data_type: SyncDataType,
    pub action: SyncAction,
    pub source_id: String,
}

#[derive(Serialize)]
pub struct QueueStatusResponse {
    pub node_id: String,
    pub depth: usize,
    pub head: Option<QueueHeadView>,
}

#[derive(Serialize)]
pub struct QueueDepthView {
    pub node_id: String,
    pub depth: usize,
}

#[derive(Serialize)]
pub struct QueueOverviewResponse {
    pub queues: Vec<QueueDepthView>,
}
