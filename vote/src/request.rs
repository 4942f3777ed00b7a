//! Vote request and invite aggregates.

use pact_types::{
    ExecuteStatus, NodeId, Signature, Timestamp, VoteAction, VoteId, VoteStatus, VoteType,
};
use serde::{Deserialize, Serialize};

use crate::VoteError;

/// One party's stance on a vote.
///
/// Only the node named in `party_id` may move `action` out of `Reviewing`
/// (self-authority); once moved it never changes again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyVote {
    pub party_id: NodeId,
    pub action: VoteAction,
    pub reason: Option<String>,
}

/// The signed, serialized body of a vote request.
///
/// The resolution actions are fully-formed payloads computed when the vote
/// is created — resolution replays them verbatim instead of re-deriving
/// anything from live data, so it stays correct even if the source
/// aggregates change while the vote is open.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedBody {
    pub vote_id: VoteId,
    pub vote_type: VoteType,
    pub initiator: NodeId,
    /// Serialized [`crate::ResolutionAction`] to run if approved.
    pub approved_action: Vec<u8>,
    /// Serialized [`crate::ResolutionAction`] to run if rejected.
    pub rejected_action: Vec<u8>,
    /// Ed25519 signature over [`SignedBody::signing_digest`], present for
    /// vote types that cross an institution boundary.
    pub signature: Option<Signature>,
}

impl SignedBody {
    /// The digest the initiator signs: a Blake2b-256 hash over the
    /// identifying fields and both action payloads.
    pub fn signing_digest(&self) -> [u8; 32] {
        pact_crypto::blake2b_256_multi(&[
            self.vote_id.as_str().as_bytes(),
            self.vote_type.as_str().as_bytes(),
            self.initiator.as_str().as_bytes(),
            &self.approved_action,
            &self.rejected_action,
        ])
    }
}

/// One approval instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub vote_id: VoteId,
    pub initiator: NodeId,
    pub vote_type: VoteType,
    /// Nodes asked to approve; never contains the initiator.
    pub voters: Vec<NodeId>,
    /// The node authoritative for recomputing `status` (fixed per
    /// deployment, not elected).
    pub vote_counter: NodeId,
    /// Nodes that must run the resolution callback.
    pub executors: Vec<NodeId>,
    /// The vote resolves approved once this many distinct voters approved.
    pub approved_threshold: u32,
    pub status: VoteStatus,
    /// Whether *this* node ran the resolution callback. Local-only: never
    /// overwritten by state arriving from peers.
    pub execute_status: ExecuteStatus,
    /// One entry per voter, plus the initiator pre-seeded as approved.
    pub party_votes: Vec<PartyVote>,
    pub body: SignedBody,
    pub created_at: Timestamp,
}

impl VoteRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, VoteError> {
        bincode::serialize(self).map_err(|e| VoteError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VoteError> {
        bincode::deserialize(bytes).map_err(|e| VoteError::Serialization(e.to_string()))
    }

    /// The party-vote entry for one node, if it participates.
    pub fn party_vote(&self, node: &NodeId) -> Option<&PartyVote> {
        self.party_votes.iter().find(|p| &p.party_id == node)
    }

    pub fn is_executor(&self, node: &NodeId) -> bool {
        self.executors.contains(node)
    }

    /// Recompute `status` from the party votes.
    pub fn refresh_status(&mut self) {
        self.status = derive_status(&self.party_votes, &self.initiator, self.approved_threshold);
    }

    /// Merge party votes received from a peer into this request.
    ///
    /// Each entry has exactly one legitimate writer (its named node), and
    /// entries move monotonically out of `Reviewing` exactly once — so the
    /// merge takes whichever side has the resolved value. Local entries
    /// that already resolved are kept even if the incoming copy is stale.
    pub fn merge_party_votes(&mut self, remote: &[PartyVote]) {
        for local in &mut self.party_votes {
            if local.action != VoteAction::Reviewing {
                continue;
            }
            if let Some(theirs) = remote.iter().find(|p| p.party_id == local.party_id) {
                if theirs.action != VoteAction::Reviewing {
                    local.action = theirs.action;
                    local.reason = theirs.reason.clone();
                }
            }
        }
        self.refresh_status();
    }
}

/// Derive the aggregate status from the individual party votes.
///
/// - any rejection resolves the vote rejected immediately;
/// - otherwise the vote is approved once `threshold` distinct *voters*
///   (the initiator's pre-seeded approval does not count) have approved;
/// - otherwise it is still reviewing.
///
/// Pure and monotonic: replies only ever move entries out of `Reviewing`,
/// so once this function returns a resolved status no further legitimate
/// reply can change it.
pub fn derive_status(party_votes: &[PartyVote], initiator: &NodeId, threshold: u32) -> VoteStatus {
    if party_votes
        .iter()
        .any(|p| p.action == VoteAction::Rejected)
    {
        return VoteStatus::Rejected;
    }
    let approved_voters = party_votes
        .iter()
        .filter(|p| &p.party_id != initiator && p.action == VoteAction::Approved)
        .count() as u32;
    if approved_voters >= threshold {
        VoteStatus::Approved
    } else {
        VoteStatus::Reviewing
    }
}

/// Per-(vote, voter) delivery record mirroring one party-vote entry.
///
/// Lets a voter node discover its pending work without scanning every vote
/// request. Created alongside the request; mutated only by the named voter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoteInvite {
    pub vote_id: VoteId,
    pub voter: NodeId,
    pub initiator: NodeId,
    pub vote_type: VoteType,
    pub action: VoteAction,
    pub reason: Option<String>,
    pub created_at: Timestamp,
}

impl VoteInvite {
    pub fn to_bytes(&self) -> Result<Vec<u8>, VoteError> {
        bincode::serialize(self).map_err(|e| VoteError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VoteError> {
        bincode::deserialize(bytes).map_err(|e| VoteError::Serialization(e.to_string()))
    }

    /// Natural key used for invite change events.
    pub fn source_id(&self) -> String {
        format!("{}/{}", self.vote_id, self.voter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn node(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn votes(entries: &[(&str, VoteAction)]) -> Vec<PartyVote> {
        entries
            .iter()
            .map(|(id, action)| PartyVote {
                party_id: node(id),
                action: *action,
                reason: None,
            })
            .collect()
    }

    #[test]
    fn all_reviewing_is_reviewing() {
        let pv = votes(&[
            ("a", VoteAction::Approved), // initiator
            ("b", VoteAction::Reviewing),
            ("c", VoteAction::Reviewing),
        ]);
        assert_eq!(derive_status(&pv, &node("a"), 2), VoteStatus::Reviewing);
    }

    #[test]
    fn initiator_approval_does_not_count_toward_threshold() {
        let pv = votes(&[
            ("a", VoteAction::Approved),
            ("b", VoteAction::Approved),
            ("c", VoteAction::Reviewing),
        ]);
        // Threshold 2 needs two *voters*; only b has approved.
        assert_eq!(derive_status(&pv, &node("a"), 2), VoteStatus::Reviewing);
    }

    #[test]
    fn unanimous_approval_resolves() {
        let pv = votes(&[
            ("a", VoteAction::Approved),
            ("b", VoteAction::Approved),
            ("c", VoteAction::Approved),
        ]);
        assert_eq!(derive_status(&pv, &node("a"), 2), VoteStatus::Approved);
    }

    #[test]
    fn single_rejection_short_circuits() {
        let pv = votes(&[
            ("a", VoteAction::Approved),
            ("b", VoteAction::Rejected),
            ("c", VoteAction::Approved),
        ]);
        assert_eq!(derive_status(&pv, &node("a"), 2), VoteStatus::Rejected);
    }

    #[test]
    fn partial_quorum_resolves_at_threshold() {
        let pv = votes(&[
            ("a", VoteAction::Approved),
            ("b", VoteAction::Approved),
            ("c", VoteAction::Reviewing),
            ("d", VoteAction::Approved),
        ]);
        assert_eq!(derive_status(&pv, &node("a"), 2), VoteStatus::Approved);
    }

    #[test]
    fn merge_takes_resolved_remote_entries() {
        let mut request = sample_request();
        let remote = votes(&[
            ("a", VoteAction::Approved),
            ("b", VoteAction::Approved),
            ("c", VoteAction::Reviewing),
        ]);
        request.merge_party_votes(&remote);
        assert_eq!(
            request.party_vote(&node("b")).unwrap().action,
            VoteAction::Approved
        );
        assert_eq!(request.status, VoteStatus::Reviewing);
    }

    #[test]
    fn merge_keeps_local_resolution_over_stale_remote() {
        let mut request = sample_request();
        request.party_votes[1].action = VoteAction::Rejected;
        request.refresh_status();

        let stale = votes(&[
            ("a", VoteAction::Approved),
            ("b", VoteAction::Reviewing),
            ("c", VoteAction::Reviewing),
        ]);
        request.merge_party_votes(&stale);
        assert_eq!(
            request.party_vote(&node("b")).unwrap().action,
            VoteAction::Rejected
        );
        assert_eq!(request.status, VoteStatus::Rejected);
    }

    fn sample_request() -> VoteRequest {
        VoteRequest {
            vote_id: VoteId::new("v1"),
            initiator: node("a"),
            vote_type: VoteType::ProjectCreate,
            voters: vec![node("b"), node("c")],
            vote_counter: node("a"),
            executors: vec![node("a"), node("b"), node("c")],
            approved_threshold: 2,
            status: VoteStatus::Reviewing,
            execute_status: ExecuteStatus::Committed,
            party_votes: votes(&[
                ("a", VoteAction::Approved),
                ("b", VoteAction::Reviewing),
                ("c", VoteAction::Reviewing),
            ]),
            body: SignedBody {
                vote_id: VoteId::new("v1"),
                vote_type: VoteType::ProjectCreate,
                initiator: node("a"),
                approved_action: vec![],
                rejected_action: vec![],
                signature: None,
            },
            created_at: Timestamp::new(1),
        }
    }

    #[test]
    fn request_round_trips_through_bytes() {
        let request = sample_request();
        let bytes = request.to_bytes().unwrap();
        let back = VoteRequest::from_bytes(&bytes).unwrap();
        assert_eq!(request, back);
    }

    proptest! {
        /// Once resolved, no further reply can change the derived status:
        /// flipping any still-reviewing entry never un-resolves a vote
        /// (rejections stay rejected; approvals can only be broken by a
        /// rejection, which self-authority rules out after resolution).
        #[test]
        fn status_is_monotonic(
            replies in proptest::collection::vec(0u8..3, 4),
            extra in 0u8..3,
            slot in 0usize..4,
        ) {
            let initiator = node("init");
            let to_action = |r: u8| match r {
                0 => VoteAction::Reviewing,
                1 => VoteAction::Approved,
                _ => VoteAction::Rejected,
            };
            let mut pv: Vec<PartyVote> = vec![PartyVote {
                party_id: initiator.clone(),
                action: VoteAction::Approved,
                reason: None,
            }];
            for (i, r) in replies.iter().enumerate() {
                pv.push(PartyVote {
                    party_id: node(&format!("voter-{i}")),
                    action: to_action(*r),
                    reason: None,
                });
            }
            let threshold = replies.len() as u32;
            let before = derive_status(&pv, &initiator, threshold);

            // Apply one more legitimate reply (only reviewing entries may move).
            let idx = slot + 1;
            if pv[idx].action == VoteAction::Reviewing && extra != 0 {
                pv[idx].action = to_action(extra);
            }
            let after = derive_status(&pv, &initiator, threshold);

            if before != VoteStatus::Reviewing {
                prop_assert_eq!(before, after);
            }
        }
    }
}
