//! Address and hash derivations used by the fetch workers.

use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::error::{DecodeError, DecodeResult};

/// Uppercase hex hash of a base64 transaction from a block body.
pub fn tx_hash_from_base64(raw: &str) -> DecodeResult<String> {
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|e| DecodeError::InvalidTxEncoding(e.to_string()))?;
    Ok(hex::encode_upper(Sha256::digest(&bytes)))
}

/// Consensus address of an ed25519 validator key.
///
/// The address is the first 20 bytes of the SHA-256 of the 32-byte key,
/// in uppercase hex.
pub fn consensus_address(pub_key_b64: &str) -> DecodeResult<String> {
    let key = STANDARD
        .decode(pub_key_b64.trim())
        .map_err(|e| DecodeError::InvalidValidatorKey(format!("invalid base64: {e}")))?;
    if key.len() != 32 {
        return Err(DecodeError::InvalidValidatorKey(format!(
            "wrong key length: {}",
            key.len()
        )));
    }
    let digest = Sha256::digest(&key);
    Ok(hex::encode_upper(&digest[..20]))
}

/// Normalize a precommit signer address to uppercase hex.
///
/// Legacy endpoints report hex, the gRPC gateway reports base64. Returns
/// `None` for absent signatures.
pub fn normalize_signer(address: &str) -> Option<String> {
    let address = address.trim();
    if address.is_empty() {
        return None;
    }
    if address.len() == 40 && address.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(address.to_ascii_uppercase());
    }
    match STANDARD.decode(address) {
        Ok(bytes) if !bytes.is_empty() => Some(hex::encode_upper(bytes)),
        _ => Some(address.to_ascii_uppercase()),
    }
}

/// Collects address-shaped strings from raw message JSON.
#[derive(Debug, Clone)]
pub struct AddressScanner {
    prefix: String,
    length: usize,
}

impl AddressScanner {
    pub fn new(prefix: impl Into<String>, length: usize) -> Self {
        Self {
            prefix: prefix.into(),
            length,
        }
    }

    /// Walk objects and arrays, adding every matching string to `out`.
    pub fn scan(&self, value: &serde_json::Value, out: &mut BTreeSet<String>) {
        match value {
            serde_json::Value::String(s) => {
                if s.len() == self.length && s.starts_with(&self.prefix) {
                    out.insert(s.clone());
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    self.scan(item, out);
                }
            }
            serde_json::Value::Object(map) => {
                for item in map.values() {
                    self.scan(item, out);
                }
            }
            _ => {}
        }
    }
}
