//! Signature recovery for challenge authentication
//!
//! Recovers the signing public key and its canonical address from an
//! Ethereum-style (message, signature) pair: 65-byte r||s||v hex signature
//! over the keccak256 digest of the `personal_sign`-prefixed message.
//!
//! Both entry points are pure functions of their inputs and safe to call
//! concurrently without synchronization.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::types::IdpError;

/// Length of an encoded recoverable signature: 32 (r) + 32 (s) + 1 (v)
const SIGNATURE_LEN: usize = 65;

/// Recover the uncompressed SEC1 public key (hex, `0x04...`) that produced
/// the signature over the message.
pub fn recover_public_key(message: &str, signature: &str) -> Result<String, IdpError> {
    let key = recover_verifying_key(message, signature)?;
    let point = key.to_encoded_point(false);
    Ok(format!("0x{}", hex::encode(point.as_bytes())))
}

/// Recover the canonical address (`0x` + last 20 bytes of the keccak256 of
/// the public key, lower-case hex) that produced the signature.
///
/// Consistent with [`recover_public_key`]: both derive from the same
/// recovered key.
pub fn recover_address(message: &str, signature: &str) -> Result<String, IdpError> {
    let key = recover_verifying_key(message, signature)?;
    Ok(address_from_verifying_key(&key))
}

/// Normalize an address-like identifier for comparison.
///
/// Address equality is case-insensitive everywhere in the decision engine;
/// every comparison goes through this.
pub fn normalize_address(addr: &str) -> String {
    addr.trim().to_lowercase()
}

/// Derive the canonical address from a verifying key
pub fn address_from_verifying_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag byte; address is the tail of the keccak digest
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Keccak256 digest of the `personal_sign`-prefixed message
pub fn hash_personal_message(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()));
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

fn recover_verifying_key(message: &str, signature: &str) -> Result<VerifyingKey, IdpError> {
    let (sig, recovery_id) = parse_signature(signature)?;
    let digest = hash_personal_message(message);

    VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| IdpError::InvalidSignature(format!("Recovery failed: {}", e)))
}

/// Parse a hex-encoded 65-byte recoverable signature
///
/// Accepts an optional `0x` prefix and both recovery id conventions
/// (raw 0/1 and Ethereum 27/28).
fn parse_signature(signature: &str) -> Result<(Signature, RecoveryId), IdpError> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes = hex::decode(hex_part)
        .map_err(|e| IdpError::InvalidSignature(format!("Invalid hex encoding: {}", e)))?;

    if bytes.len() != SIGNATURE_LEN {
        return Err(IdpError::InvalidSignature(format!(
            "Expected {} bytes, got {}",
            SIGNATURE_LEN,
            bytes.len()
        )));
    }

    let sig = Signature::from_slice(&bytes[..64])
        .map_err(|e| IdpError::InvalidSignature(format!("Invalid r/s values: {}", e)))?;

    let v = bytes[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::try_from(recovery_byte)
        .map_err(|_| IdpError::InvalidSignature(format!("Invalid recovery id: {}", v)))?;

    Ok((sig, recovery_id))
}
