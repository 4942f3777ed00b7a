//! The vote protocol engine.
//!
//! Drives the full lifecycle of an approval: creation on the initiator,
//! replies on each voter, resolution (threshold or first rejection), and
//! the idempotent execution of the pre-computed resolution action on every
//! executor node. The engine also applies vote state arriving from peers —
//! the receive side of the change-sync channel — as idempotent upserts.

use pact_crypto::{sign_message, verify_signature};
use pact_store::{
    NodeDirectoryStore, Project, ProjectInstitution, ProjectNode, ProjectStatus, ProjectStore,
    VoteStore,
};
use pact_types::{
    ExecuteStatus, KeyPair, NodeId, SyncAction, SyncDataType, Timestamp, VoteAction, VoteId,
    VoteStatus, VoteType,
};

use crate::request::{PartyVote, SignedBody};
use crate::strategy::{distinct, StrategyRegistry, VoteContext};
use crate::{
    Propagation, ResolutionAction, SyncRecord, VoteConfig, VoteError, VoteInvite, VoteRequest,
};

/// One node's instance of the approval protocol.
pub struct VoteEngine {
    registry: StrategyRegistry,
    /// The deployment's fixed tally-keeper.
    vote_counter: NodeId,
    /// This node's signing identity.
    keypair: KeyPair,
}

impl VoteEngine {
    pub fn new(registry: StrategyRegistry, vote_counter: NodeId, keypair: KeyPair) -> Self {
        Self {
            registry,
            vote_counter,
            keypair,
        }
    }

    /// Open a new approval on behalf of `ctx.node_id`.
    ///
    /// Runs the strategy's pre-check (nothing is persisted on failure),
    /// computes voters and executors, seals both resolution actions into
    /// the signed request body, persists the config/request/invites, and
    /// returns the propagation addressed to every involved node.
    pub fn create_approval(
        &self,
        ctx: &VoteContext,
        config: VoteConfig,
        now: Timestamp,
    ) -> Result<(VoteId, Propagation), VoteError> {
        let vote_type = vote_type_of(&config);
        let strategy = self.registry.get(vote_type)?;
        let initiator = ctx.node_id.clone();

        strategy.pre_check(ctx, &config)?;

        let voters = strategy.compute_voters(ctx, &initiator, &config)?;
        if voters.contains(&initiator) {
            return Err(VoteError::Validation(
                "the initiator cannot appear among the invitees".into(),
            ));
        }
        if voters.is_empty() {
            return Err(VoteError::NoCounterpart);
        }
        let executors = strategy.compute_executors(ctx, &initiator, &config)?;

        let config_bytes = config.to_bytes()?;
        let vote_id = mint_vote_id(&initiator, vote_type, &config_bytes, now);

        // Resolution actions are computed now and sealed into the body;
        // resolution later replays these bytes verbatim.
        let approved_action = strategy.approved_action(ctx, &config)?.to_bytes()?;
        let rejected_action = strategy.rejected_action(ctx, &config)?.to_bytes()?;

        let mut body = SignedBody {
            vote_id: vote_id.clone(),
            vote_type,
            initiator: initiator.clone(),
            approved_action,
            rejected_action,
            signature: None,
        };
        if vote_type.requires_signature() {
            let digest = body.signing_digest();
            body.signature = Some(sign_message(&digest, &self.keypair.private));
        }

        let mut party_votes = vec![PartyVote {
            party_id: initiator.clone(),
            action: VoteAction::Approved,
            reason: None,
        }];
        party_votes.extend(voters.iter().map(|voter| PartyVote {
            party_id: voter.clone(),
            action: VoteAction::Reviewing,
            reason: None,
        }));

        let request = VoteRequest {
            vote_id: vote_id.clone(),
            initiator: initiator.clone(),
            vote_type,
            voters: voters.clone(),
            vote_counter: self.vote_counter.clone(),
            executors: executors.clone(),
            approved_threshold: strategy.approved_threshold(&voters),
            status: VoteStatus::Reviewing,
            execute_status: ExecuteStatus::Committed,
            party_votes,
            body,
            created_at: now,
        };

        // Persist config first, then any carried aggregates, then the vote
        // state itself.
        ctx.store.put_config(&vote_id, &config_bytes)?;
        let mut records = vec![SyncRecord {
            data_type: SyncDataType::VoteConfig,
            action: SyncAction::Create,
            source_id: vote_id.to_string(),
            payload: config_bytes,
        }];
        records.extend(strategy.build_config(ctx, &vote_id, &config)?);

        for voter in &voters {
            let invite = VoteInvite {
                vote_id: vote_id.clone(),
                voter: voter.clone(),
                initiator: initiator.clone(),
                vote_type,
                action: VoteAction::Reviewing,
                reason: None,
                created_at: now,
            };
            ctx.store
                .put_invite(&vote_id, voter, &invite.to_bytes()?)?;
            records.push(invite_record(&invite, SyncAction::Create)?);
        }

        ctx.store.put_request(&vote_id, &request.to_bytes()?)?;
        records.push(request_record(&request, SyncAction::Create)?);

        let destinations = distinct(
            voters
                .iter()
                .chain(executors.iter())
                .chain(std::iter::once(&self.vote_counter))
                .filter(|n| **n != initiator)
                .cloned()
                .collect(),
        );

        tracing::info!(
            vote = %vote_id,
            vote_type = %vote_type,
            voters = voters.len(),
            executors = executors.len(),
            "approval created"
        );

        Ok((
            vote_id,
            Propagation {
                records,
                destinations,
            },
        ))
    }

    /// Record one voter's reply.
    ///
    /// Only the node named in the invite may reply, and only while the
    /// invite is still reviewing — a duplicate reply or a reply to a
    /// resolved vote is a conflict the caller logs and drops.
    pub fn reply(
        &self,
        ctx: &VoteContext,
        vote_id: &VoteId,
        voter: &NodeId,
        action: VoteAction,
        reason: Option<String>,
    ) -> Result<(VoteRequest, Propagation), VoteError> {
        if action == VoteAction::Reviewing {
            return Err(VoteError::Validation(
                "a reply must approve or reject".into(),
            ));
        }
        if &ctx.node_id != voter {
            return Err(VoteError::Authorization(format!(
                "{} cannot reply on behalf of {}",
                ctx.node_id, voter
            )));
        }

        let mut request = self.request(ctx, vote_id)?;
        if request.status.is_resolved() {
            return Err(VoteError::Conflict(format!(
                "vote {vote_id} is already resolved ({:?})",
                request.status
            )));
        }

        let invite_blob = ctx
            .store
            .get_invite(vote_id, voter)
            .map_err(|_| VoteError::Authorization(format!("{voter} holds no invite for {vote_id}")))?;
        let mut invite = VoteInvite::from_bytes(&invite_blob)?;
        if invite.action != VoteAction::Reviewing {
            return Err(VoteError::Conflict(format!(
                "voter {voter} already replied to {vote_id}"
            )));
        }

        invite.action = action;
        invite.reason = reason.clone();

        let entry = request
            .party_votes
            .iter_mut()
            .find(|p| &p.party_id == voter)
            .ok_or_else(|| {
                VoteError::Authorization(format!("{voter} is not a party of vote {vote_id}"))
            })?;
        entry.action = action;
        entry.reason = reason;
        request.refresh_status();

        ctx.store.put_invite(vote_id, voter, &invite.to_bytes()?)?;
        ctx.store.put_request(vote_id, &request.to_bytes()?)?;

        let destinations = distinct(
            request
                .executors
                .iter()
                .chain(std::iter::once(&request.vote_counter))
                .chain(std::iter::once(&request.initiator))
                .filter(|n| **n != ctx.node_id)
                .cloned()
                .collect(),
        );

        tracing::info!(
            vote = %vote_id,
            voter = %voter,
            %action,
            status = ?request.status,
            "vote reply recorded"
        );

        let propagation = Propagation {
            records: vec![
                request_record(&request, SyncAction::Update)?,
                invite_record(&invite, SyncAction::Update)?,
            ],
            destinations,
        };
        Ok((request, propagation))
    }

    /// Run the resolution callback for a resolved vote, exactly once.
    ///
    /// Safe to call any number of times and after a crash at any point:
    /// a vote that is still reviewing or whose callback already settled is
    /// left untouched, non-executors only mark themselves observers, and
    /// the callbacks themselves re-check their preconditions before
    /// mutating anything.
    pub fn try_execute(&self, ctx: &VoteContext, vote_id: &VoteId) -> Result<ExecuteStatus, VoteError> {
        let mut request = self.request(ctx, vote_id)?;

        if !request.status.is_resolved() {
            return Ok(request.execute_status);
        }
        if request.execute_status.is_terminal() {
            return Ok(request.execute_status);
        }

        if !request.is_executor(&ctx.node_id) {
            request.execute_status = ExecuteStatus::Observer;
            ctx.store.put_request(vote_id, &request.to_bytes()?)?;
            return Ok(ExecuteStatus::Observer);
        }

        let strategy = self.registry.get(request.vote_type)?;
        let (action_bytes, approved) = match request.status {
            VoteStatus::Approved => (&request.body.approved_action, true),
            VoteStatus::Rejected => (&request.body.rejected_action, false),
            VoteStatus::Reviewing => unreachable!("resolved status checked above"),
        };
        let action = ResolutionAction::from_bytes(action_bytes)?;

        let outcome = if approved {
            strategy.on_approved(ctx, &action)
        } else {
            strategy.on_rejected(ctx, &action)
        };

        request.execute_status = match outcome {
            Ok(()) => ExecuteStatus::Success,
            Err(e) => {
                tracing::warn!(vote = %vote_id, error = %e, "resolution callback failed");
                ExecuteStatus::Failed
            }
        };
        ctx.store.put_request(vote_id, &request.to_bytes()?)?;

        tracing::info!(
            vote = %vote_id,
            status = ?request.status,
            execute = ?request.execute_status,
            "vote resolution executed"
        );
        Ok(request.execute_status)
    }

    /// Apply one change event received from a peer.
    ///
    /// Every branch is an idempotent upsert keyed by the aggregate's
    /// natural key, so redelivered events are harmless. Vote requests are
    /// verified against the initiator's registered public key before any
    /// state changes; a bad signature rejects the event outright.
    pub fn apply_remote(
        &self,
        ctx: &VoteContext,
        data_type: SyncDataType,
        action: SyncAction,
        source_id: &str,
        payload: &[u8],
    ) -> Result<(), VoteError> {
        match (data_type, action) {
            (SyncDataType::VoteRequest, SyncAction::Create | SyncAction::Update) => {
                let incoming = VoteRequest::from_bytes(payload)?;
                self.verify_inbound(ctx, &incoming)?;
                let merged = match ctx.store.get_request(&incoming.vote_id) {
                    Ok(local_blob) => {
                        let mut local = VoteRequest::from_bytes(&local_blob)?;
                        local.merge_party_votes(&incoming.party_votes);
                        local
                    }
                    Err(_) => {
                        let mut fresh = incoming;
                        // Execute status tracks *this* node's callback, not
                        // the sender's.
                        fresh.execute_status = ExecuteStatus::Committed;
                        fresh.refresh_status();
                        fresh
                    }
                };
                let vote_id = merged.vote_id.clone();
                let resolved = merged.status.is_resolved();
                let settled = merged.execute_status.is_terminal();
                ctx.store.put_request(&vote_id, &merged.to_bytes()?)?;

                if resolved && !settled {
                    if let Err(e) = self.try_execute(ctx, &vote_id) {
                        tracing::warn!(vote = %vote_id, error = %e, "deferred resolution execution failed");
                    }
                }
            }
            (SyncDataType::VoteInvite, SyncAction::Create | SyncAction::Update) => {
                let incoming = VoteInvite::from_bytes(payload)?;
                let merged = match ctx.store.get_invite(&incoming.vote_id, &incoming.voter) {
                    // The named voter's recorded reply wins over anything
                    // arriving later.
                    Ok(blob) => {
                        let local = VoteInvite::from_bytes(&blob)?;
                        if local.action != VoteAction::Reviewing {
                            local
                        } else {
                            incoming
                        }
                    }
                    Err(_) => incoming,
                };
                let blob = merged.to_bytes()?;
                ctx.store.put_invite(&merged.vote_id, &merged.voter, &blob)?;
            }
            (SyncDataType::VoteConfig, SyncAction::Create | SyncAction::Update) => {
                ctx.store.put_config(&VoteId::new(source_id), payload)?;
            }
            (SyncDataType::Project, SyncAction::Create | SyncAction::Update) => {
                let incoming: Project = bincode::deserialize(payload)
                    .map_err(|e| VoteError::Serialization(e.to_string()))?;
                // A stale reviewing copy must not roll back a project this
                // node already resolved.
                let stale = matches!(
                    ctx.store.get_project(&incoming.id),
                    Ok(local) if incoming.status == ProjectStatus::Reviewing
                        && local.status != ProjectStatus::Reviewing
                );
                if !stale {
                    ctx.store.put_project(&incoming)?;
                }
            }
            (SyncDataType::ProjectNode, SyncAction::Create | SyncAction::Update) => {
                let member: ProjectNode = bincode::deserialize(payload)
                    .map_err(|e| VoteError::Serialization(e.to_string()))?;
                ctx.store.put_project_node(&member)?;
            }
            (SyncDataType::ProjectInstitution, SyncAction::Create | SyncAction::Update) => {
                let member: ProjectInstitution = bincode::deserialize(payload)
                    .map_err(|e| VoteError::Serialization(e.to_string()))?;
                ctx.store.put_project_institution(&member)?;
            }
            (SyncDataType::ProjectNode, SyncAction::Delete) => {
                let member: ProjectNode = bincode::deserialize(payload)
                    .map_err(|e| VoteError::Serialization(e.to_string()))?;
                ctx.store.delete_project_node(&member)?;
            }
            (SyncDataType::ProjectInstitution, SyncAction::Delete) => {
                let member: ProjectInstitution = bincode::deserialize(payload)
                    .map_err(|e| VoteError::Serialization(e.to_string()))?;
                ctx.store.delete_project_institution(&member)?;
            }
            (other, SyncAction::Delete) => {
                // Vote state and projects are never deleted, only superseded.
                tracing::warn!(data_type = %other, source = %source_id, "ignoring delete for non-deletable aggregate");
            }
        }
        Ok(())
    }

    /// The invites still awaiting a reply from `ctx.node_id`.
    pub fn pending_invites(&self, ctx: &VoteContext) -> Result<Vec<VoteInvite>, VoteError> {
        let mut pending = Vec::new();
        for blob in ctx.store.invites_for_voter(&ctx.node_id)? {
            let invite = VoteInvite::from_bytes(&blob)?;
            if invite.action == VoteAction::Reviewing {
                pending.push(invite);
            }
        }
        pending.sort_by_key(|i| i.created_at);
        Ok(pending)
    }

    /// Load a vote request by id.
    pub fn request(&self, ctx: &VoteContext, vote_id: &VoteId) -> Result<VoteRequest, VoteError> {
        let blob = ctx
            .store
            .get_request(vote_id)
            .map_err(|_| VoteError::NotFound(vote_id.to_string()))?;
        VoteRequest::from_bytes(&blob)
    }

    /// Verify an inbound request's signature against the initiator's
    /// registered public key. Only cross-institution vote types sign.
    fn verify_inbound(&self, ctx: &VoteContext, request: &VoteRequest) -> Result<(), VoteError> {
        if !request.vote_type.requires_signature() {
            return Ok(());
        }
        let Some(signature) = &request.body.signature else {
            return Err(VoteError::BadSignature(format!(
                "vote {} carries no signature",
                request.vote_id
            )));
        };
        let initiator = ctx.store.get_node(&request.initiator).map_err(|_| {
            VoteError::BadSignature(format!(
                "initiator {} is not in the node directory",
                request.initiator
            ))
        })?;
        let digest = request.body.signing_digest();
        if !verify_signature(&digest, signature, &initiator.public_key) {
            return Err(VoteError::BadSignature(format!(
                "vote {} signature does not verify against {}",
                request.vote_id, request.initiator
            )));
        }
        Ok(())
    }
}

fn vote_type_of(config: &VoteConfig) -> VoteType {
    match config {
        VoteConfig::ProjectCreate(_) => VoteType::ProjectCreate,
        VoteConfig::ProjectArchive(_) => VoteType::ProjectArchive,
        VoteConfig::NodeRoute(_) => VoteType::NodeRoute,
        VoteConfig::TeeDownload(_) => VoteType::TeeDownload,
    }
}

/// Mint an opaque vote id from the request's identifying inputs.
fn mint_vote_id(
    initiator: &NodeId,
    vote_type: VoteType,
    config_bytes: &[u8],
    now: Timestamp,
) -> VoteId {
    let digest = pact_crypto::blake2b_256_multi(&[
        initiator.as_str().as_bytes(),
        vote_type.as_str().as_bytes(),
        config_bytes,
        &now.as_secs().to_be_bytes(),
    ]);
    VoteId::from_digest(&digest)
}

fn request_record(request: &VoteRequest, action: SyncAction) -> Result<SyncRecord, VoteError> {
    Ok(SyncRecord {
        data_type: SyncDataType::VoteRequest,
        action,
        source_id: request.vote_id.to_string(),
        payload: request.to_bytes()?,
    })
}

fn invite_record(invite: &VoteInvite, action: SyncAction) -> Result<SyncRecord, VoteError> {
    Ok(SyncRecord {
        data_type: SyncDataType::VoteInvite,
        action,
        source_id: invite.source_id(),
        payload: invite.to_bytes()?,
    })
}
