//! Cryptographic primitives for the miner tracker.
//!
//! - **Ed25519** signing and verification of relay challenges
//! - Random challenge generation and credential encoding
//! - Normalization of chain public keys (network prefix stripping)

pub mod challenge;
pub mod error;
pub mod keys;
pub mod normalize;
pub mod sign;

pub use challenge::{random_challenge, sign_challenge, CHALLENGE_LEN};
pub use error::CryptoError;
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use normalize::{normalize_public_key, KEY_PREFIXES};
pub use sign::{parse_public_key, sign_message, verify_signature, verify_signed_message};
