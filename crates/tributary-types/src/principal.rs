use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrincipalParseError {
    #[error("Invalid principal length: expected 20 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),
}

/// A 20-byte account address, wire-compatible with external typed-data
/// signers. Contributors, asset owners, component instances, and the
/// treasury sink are all identified by a `Principal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal([u8; 20]);

impl Principal {
    /// The zero address. Never a valid payee or treasury sink.
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Parse a `0x`-prefixed (or bare) 40-char hex address.
    pub fn from_hex(s: &str) -> Result<Self, PrincipalParseError> {
        let stripped = s.trim_start_matches("0x");
        let bytes = hex::decode(stripped)
            .map_err(|e| PrincipalParseError::InvalidHex(e.to_string()))?;
        if bytes.len() != 20 {
            return Err(PrincipalParseError::InvalidLength(bytes.len()));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    /// Deterministic instance address derived from a domain tag and salt.
    /// Used to give in-process components (splitters, escrow, verifier)
    /// distinct token-ledger accounts.
    pub fn derived(tag: &str, salt: &[u8]) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(tag.as_bytes());
        hasher.update(salt);
        let digest = hasher.finalize();
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..32]);
        Self(out)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
