//! Relay login challenges.
//!
//! A client proves control of its account key by signing a fresh random
//! string; the encoded [`SignMessage`] is the credential sent on connect.

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracker_types::{PrivateKey, SignMessage};

use crate::sign::sign_message;
use crate::CryptoError;

pub const CHALLENGE_LEN: usize = 8;

/// Random alphanumeric challenge of [`CHALLENGE_LEN`] characters.
pub fn random_challenge() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CHALLENGE_LEN)
        .map(char::from)
        .collect()
}

/// Sign a fresh challenge for `account` and encode it as a credential blob.
pub fn sign_challenge(account: &str, private_key: &PrivateKey) -> Result<Vec<u8>, CryptoError> {
    let data = random_challenge().into_bytes();
    let signature = sign_message(&data, private_key);
    SignMessage {
        account_name: account.to_string(),
        data,
        signature: signature.0.to_vec(),
    }
    .encode()
    .map_err(|e| CryptoError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair_from_seed;
    use crate::sign::verify_signed_message;

    #[test]
    fn challenge_is_alphanumeric() {
        let c = random_challenge();
        assert_eq!(c.len(), CHALLENGE_LEN);
        assert!(c.chars().all(|ch| ch.is_ascii_alphanumeric()));
    }

    #[test]
    fn credential_verifies_against_account_key() {
        let kp = keypair_from_seed(&[9u8; 32]);
        let blob = sign_challenge("supernode1", &kp.private).unwrap();
        let msg = SignMessage::decode(&blob).unwrap();
        assert_eq!(msg.account_name, "supernode1");
        assert!(verify_signed_message(&msg, &kp.public.to_hex()));
    }
}
