use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Stable 32-byte role identifier, derived by hashing the role's ASCII
/// name. External signers reference roles by these values, so the
/// derivation is part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId([u8; 32]);

impl RoleId {
    pub fn named(name: &str) -> Self {
        let digest = Keccak256::digest(name.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn default_admin() -> Self {
        Self::named("DEFAULT_ADMIN")
    }

    pub fn pauser() -> Self {
        Self::named("PAUSER")
    }

    pub fn arbiter() -> Self {
        Self::named("ARBITER")
    }

    pub fn verifier() -> Self {
        Self::named("VERIFIER")
    }

    pub fn minter() -> Self {
        Self::named("MINTER")
    }

    pub fn uri_setter() -> Self {
        Self::named("URI_SETTER")
    }

    pub fn role_admin() -> Self {
        Self::named("ROLE_ADMIN")
    }

    pub fn contributor() -> Self {
        Self::named("CONTRIBUTOR")
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Roles appear in logs constantly; the leading bytes are enough.
        write!(f, "role:{}", hex::encode(&self.0[..8]))
    }
}
