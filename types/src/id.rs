//! Identifier types for nodes, institutions, projects, and votes.
//!
//! Node, institution, and project ids are short operator-assigned strings
//! (they appear in config files, URLs, and checkpoint file names). Vote ids
//! are opaque hex digests minted by the vote engine.

use crate::error::IdError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of an operator-assigned identifier.
const MAX_ID_LEN: usize = 64;

/// Whether a string is acceptable as an operator-assigned identifier.
///
/// Ids end up in checkpoint file names and URL path segments, so only
/// alphanumerics, `-` and `_` are allowed.
fn is_well_formed(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_ID_LEN
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Create a new id, validating its shape.
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let s = raw.into();
                if is_well_formed(&s) {
                    Ok(Self(s))
                } else {
                    Err(IdError::Malformed(s))
                }
            }

            /// Return the raw id string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

string_id! {
    /// Identifies one compute node in the collaboration network.
    NodeId
}

string_id! {
    /// Identifies the organization/institution a node belongs to.
    InstitutionId
}

string_id! {
    /// Identifies a cross-party project.
    ProjectId
}

/// Opaque unique id of one approval instance.
///
/// Minted by the vote engine as a hex-encoded digest; never parsed back
/// into its inputs.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoteId(String);

impl VoteId {
    /// Wrap an already-minted vote id (e.g. read back from storage or
    /// received from a peer).
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build a vote id from digest bytes (hex-encoded).
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let mut s = String::with_capacity(64);
        for b in digest {
            s.push_str(&format!("{b:02x}"));
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for VoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full vote ids are 64 hex chars; show a prefix for readability.
        write!(f, "VoteId({})", &self.0[..self.0.len().min(12)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids_accepted() {
        assert!(NodeId::new("alice-node-1").is_ok());
        assert!(InstitutionId::new("acme_corp").is_ok());
        assert!(ProjectId::new("proj42").is_ok());
    }

    #[test]
    fn empty_id_rejected() {
        assert!(NodeId::new("").is_err());
    }

    #[test]
    fn path_characters_rejected() {
        assert!(NodeId::new("../etc/passwd").is_err());
        assert!(NodeId::new("a/b").is_err());
        assert!(NodeId::new("a b").is_err());
    }

    #[test]
    fn overlong_id_rejected() {
        let long = "x".repeat(65);
        assert!(NodeId::new(long).is_err());
    }

    #[test]
    fn vote_id_from_digest_is_hex() {
        let id = VoteId::from_digest(&[0xAB; 32]);
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn node_id_round_trips_through_serde() {
        let id = NodeId::new("node-b").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
