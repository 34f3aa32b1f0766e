//! Ed25519 message signing and verification.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use tracker_types::{PrivateKey, PublicKey, SignMessage, Signature};

use crate::CryptoError;

/// Sign a message with a private key, returning the signature.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

/// Parse a stored hex public key, requiring a valid Ed25519 point.
pub fn parse_public_key(public_key_hex: &str) -> Result<PublicKey, CryptoError> {
    let key = PublicKey::from_hex(public_key_hex)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    VerifyingKey::from_bytes(&key.0).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    Ok(key)
}

/// Verify a presented challenge against a stored hex public key.
///
/// Malformed keys or signatures verify as `false`.
pub fn verify_signed_message(msg: &SignMessage, public_key_hex: &str) -> bool {
    let Ok(public_key) = parse_public_key(public_key_hex) else {
        return false;
    };
    let Some(signature) = Signature::from_slice(&msg.signature) else {
        return false;
    };
    verify_signature(&msg.data, &signature, &public_key)
}
