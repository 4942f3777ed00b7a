//! State enums for the multi-party approval protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of operations that require multi-party approval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteType {
    /// Create a shared project spanning several institutions.
    ProjectCreate,
    /// Archive an existing shared project.
    ProjectArchive,
    /// Establish a network route between two otherwise-untrusting nodes.
    NodeRoute,
    /// Export a result out of a trusted execution environment.
    TeeDownload,
}

impl VoteType {
    /// Stable wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreate => "project-create",
            Self::ProjectArchive => "project-archive",
            Self::NodeRoute => "node-route",
            Self::TeeDownload => "tee-download",
        }
    }

    /// Parse a stable wire/storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project-create" => Some(Self::ProjectCreate),
            "project-archive" => Some(Self::ProjectArchive),
            "node-route" => Some(Self::NodeRoute),
            "tee-download" => Some(Self::TeeDownload),
            _ => None,
        }
    }

    /// Whether request bodies for this vote type cross an institution
    /// boundary and must therefore carry a verifiable signature.
    pub fn requires_signature(&self) -> bool {
        matches!(self, Self::ProjectCreate | Self::NodeRoute)
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate status of one approval instance.
///
/// Derived from the individual party votes; `Approved` and `Rejected` are
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteStatus {
    /// Waiting for replies from one or more voters.
    Reviewing,
    /// Enough voters approved; the resolution callback may run.
    Approved,
    /// At least one voter rejected.
    Rejected,
}

impl VoteStatus {
    /// Whether the vote can still change.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Reviewing)
    }
}

/// Whether *this* node has run the resolution callback for a vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecuteStatus {
    /// Not yet executed (initial state).
    Committed,
    /// Callback ran and applied its local mutation.
    Success,
    /// Callback ran and failed; the failure is recorded, not retried.
    Failed,
    /// This node is not in the executor set; no mutation performed.
    Observer,
}

impl ExecuteStatus {
    /// Whether the callback outcome is settled for this node.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Committed)
    }
}

/// One party's stance on a vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteAction {
    /// No reply yet.
    Reviewing,
    Approved,
    Rejected,
}

impl fmt::Display for VoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reviewing => "reviewing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_type_names_round_trip() {
        for vt in [
            VoteType::ProjectCreate,
            VoteType::ProjectArchive,
            VoteType::NodeRoute,
            VoteType::TeeDownload,
        ] {
            assert_eq!(VoteType::parse(vt.as_str()), Some(vt));
        }
        assert_eq!(VoteType::parse("model-export"), None);
    }

    #[test]
    fn reviewing_is_not_resolved() {
        assert!(!VoteStatus::Reviewing.is_resolved());
        assert!(VoteStatus::Approved.is_resolved());
        assert!(VoteStatus::Rejected.is_resolved());
    }

    #[test]
    fn committed_is_not_terminal() {
        assert!(!ExecuteStatus::Committed.is_terminal());
        assert!(ExecuteStatus::Success.is_terminal());
        assert!(ExecuteStatus::Failed.is_terminal());
        assert!(ExecuteStatus::Observer.is_terminal());
    }
}
