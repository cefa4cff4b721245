//! Cryptographic primitives for PuddleCoin.
//!
//! Wraps `secp256k1` key generation and ECDSA sign/verify, plus the
//! SHA-256 and hex/binary helpers the rest of the node builds on. Nothing
//! here knows about transactions or blocks; it is the lowest layer.

use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub mod keyfile;

/// An uncompressed secp256k1 public key, hex-encoded: `04` prefix, 130 hex
/// characters total. This is the node's notion of an "address" — there is
/// no separate hashing step, unlike Bitcoin's pay-to-pubkey-hash.
pub const ADDRESS_LEN: usize = 130;
pub const ADDRESS_PREFIX: &str = "04";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid private key hex: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key / address: {0}")]
    InvalidAddress(String),

    #[error("invalid signature hex: {0}")]
    InvalidSignature(String),

    #[error("invalid message digest: {0}")]
    InvalidMessage(String),

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Generate a new random secp256k1 private key, returned as lowercase hex.
pub fn gen_priv_key() -> String {
    let secp = Secp256k1::new();
    let (secret_key, _) = secp.generate_keypair(&mut OsRng);
    hex::encode(secret_key.secret_bytes())
}

/// Derive the uncompressed-public-key address from a hex private key.
pub fn pub_from_priv(priv_key_hex: &str) -> Result<String, CryptoError> {
    let secret_key = secret_key_from_hex(priv_key_hex)?;
    let secp = Secp256k1::new();
    let public_key = PublicKey::from_secret_key(&secp, &secret_key);
    Ok(hex::encode(public_key.serialize_uncompressed()))
}

/// Sign a hex-encoded 32-byte digest (typically a transaction id) with a
/// hex private key, returning a hex-encoded DER signature.
pub fn sign(priv_key_hex: &str, message_hex: &str) -> Result<String, CryptoError> {
    let secret_key = secret_key_from_hex(priv_key_hex)?;
    let message = message_from_hex(message_hex)?;
    let secp = Secp256k1::new();
    let sig = secp.sign_ecdsa(&message, &secret_key);
    Ok(hex::encode(sig.serialize_der()))
}

/// Verify a hex DER signature over a hex-encoded 32-byte digest against an
/// address (uncompressed public key). Returns `false` for any malformed
/// input rather than propagating an error — callers treat "does not verify"
/// and "could not even be parsed" identically.
pub fn verify(address: &str, message_hex: &str, signature_hex: &str) -> bool {
    let Ok(public_key) = public_key_from_address(address) else {
        return false;
    };
    let Ok(message) = message_from_hex(message_hex) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(&sig_bytes) else {
        return false;
    };
    let secp = Secp256k1::new();
    secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
}

/// SHA-256 over arbitrary bytes, hex-encoded.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// Expand a hex string into its binary digit representation, four bits per
/// hex character, preserving leading zeros — used to count leading
/// zero *bits* of a hash for difficulty checks.
pub fn hex_to_binary(hex_str: &str) -> Result<String, CryptoError> {
    let mut out = String::with_capacity(hex_str.len() * 4);
    for c in hex_str.chars() {
        let digit = c
            .to_digit(16)
            .ok_or_else(|| CryptoError::InvalidMessage(format!("not hex: {c}")))?;
        out.push_str(match digit {
            0 => "0000",
            1 => "0001",
            2 => "0010",
            3 => "0011",
            4 => "0100",
            5 => "0101",
            6 => "0110",
            7 => "0111",
            8 => "1000",
            9 => "1001",
            10 => "1010",
            11 => "1011",
            12 => "1100",
            13 => "1101",
            14 => "1110",
            _ => "1111",
        });
    }
    Ok(out)
}

/// Structural check for the address predicate described in the data model:
/// `04` prefix, 130 hex characters, nothing else.
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ADDRESS_LEN
        && address.starts_with(ADDRESS_PREFIX)
        && address.chars().all(|c| c.is_ascii_hexdigit())
}

fn secret_key_from_hex(priv_key_hex: &str) -> Result<SecretKey, CryptoError> {
    let bytes = hex::decode(priv_key_hex)?;
    SecretKey::from_slice(&bytes)
        .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
}

fn public_key_from_address(address: &str) -> Result<PublicKey, CryptoError> {
    if !is_valid_address(address) {
        return Err(CryptoError::InvalidAddress(address.to_string()));
    }
    let bytes = hex::decode(address)?;
    PublicKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidAddress(e.to_string()))
}

fn message_from_hex(message_hex: &str) -> Result<Message, CryptoError> {
    let bytes = hex::decode(message_hex)?;
    Message::from_slice(&bytes).map_err(|e| CryptoError::InvalidMessage(e.to_string()))
}
