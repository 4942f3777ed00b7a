//! Cryptographic primitives for the DataPact control plane.
//!
//! - **Ed25519** for signing vote request bodies and verifying them on the
//!   receiving node (cross-institution vote types)
//! - **Blake2b** for digests (vote ids, signed-body digests)

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
