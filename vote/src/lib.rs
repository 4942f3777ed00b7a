//! Multi-party approval (vote) protocol engine.
//!
//! Before a cross-party operation proceeds — creating a shared project,
//! opening a network route, archiving a project, exporting data out of a
//! TEE — a fixed set of peer nodes must explicitly sign off. This crate
//! implements that protocol:
//!
//! - [`VoteRequest`]/[`VoteInvite`] aggregates with their status-derivation
//!   law (aggregate status is a pure function of the individual party votes),
//! - a [`VoteStrategy`] registry mapping each [`pact_types::VoteType`] to
//!   its capability set (pre-check, voter/executor computation, pre-built
//!   resolution actions, resolution callbacks),
//! - the [`VoteEngine`] driving creation, replies, idempotent resolution,
//!   and the application of vote state received from peers.
//!
//! The engine never talks to the network itself: every mutation returns a
//! [`Propagation`] naming the sync records and destination nodes, and the
//! node layer hands those to the sync dispatcher.

pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod propagate;
pub mod request;
pub mod strategy;

pub use action::ResolutionAction;
pub use config::{
    NodeRouteConfig, ProjectCreateConfig, ProjectParty, ProjectArchiveConfig, TeeDownloadConfig,
    VoteConfig,
};
pub use engine::VoteEngine;
pub use error::VoteError;
pub use propagate::{Propagation, SyncRecord};
pub use request::{derive_status, PartyVote, SignedBody, VoteInvite, VoteRequest};
pub use strategy::{default_registry, StrategyRegistry, VoteContext, VoteStrategy};
