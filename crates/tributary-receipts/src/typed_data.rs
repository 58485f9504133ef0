use crate::error::{ReceiptError, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use tributary_types::{AssetId, Principal, UsdAmount};

/// EIP-712 domain. Fixed at verifier construction; any change to these
/// fields invalidates every outstanding signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Principal,
}

impl TypedDomain {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Principal,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract,
        }
    }

    /// Canonical EIP-712 domain separator:
    /// `keccak256(typehash ‖ keccak(name) ‖ keccak(version) ‖ chain_id ‖ contract)`.
    pub fn separator(&self) -> [u8; 32] {
        let typehash = Keccak256::digest(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );

        let mut hasher = Keccak256::new();
        hasher.update(typehash);
        hasher.update(Keccak256::digest(self.name.as_bytes()));
        hasher.update(Keccak256::digest(self.version.as_bytes()));
        hasher.update(u256_word(self.chain_id as u128));
        hasher.update(address_word(&self.verifying_contract));
        hasher.finalize().into()
    }
}

/// A signed claim that `user` owes `amount` for using `asset_id` before
/// `deadline`, uniquified by `nonce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReceipt {
    pub asset_id: AssetId,
    pub amount: UsdAmount,
    pub user: Principal,
    pub nonce: u64,
    pub deadline: i64,
}

impl UsageReceipt {
    /// Struct hash over the wire-fixed field order:
    /// `asset_id (u256 BE) ‖ amount (u256 BE) ‖ user (20 bytes) ‖
    ///  nonce (u256 BE) ‖ deadline (u256 BE)`.
    pub fn struct_hash(&self) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update(u256_word(self.asset_id.value() as u128));
        hasher.update(u256_word(self.amount.to_base_units()));
        hasher.update(self.user.as_bytes());
        hasher.update(u256_word(self.nonce as u128));
        hasher.update(u256_word(self.deadline.max(0) as u128));
        hasher.finalize().into()
    }

    /// Tagged digest: `keccak256(0x19 0x01 ‖ domain_separator ‖ struct_hash)`.
    pub fn digest(&self, domain: &TypedDomain) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update([0x19, 0x01]);
        hasher.update(domain.separator());
        hasher.update(self.struct_hash());
        hasher.finalize().into()
    }
}

/// Big-endian u256 word holding a native value in its low bytes.
fn u256_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Address left-padded to a 32-byte word, per ABI encoding.
fn address_word(principal: &Principal) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(principal.as_bytes());
    word
}

/// Ethereum-style address of a secp256k1 verifying key: low 20 bytes of
/// the keccak of the uncompressed point (tag byte stripped).
pub fn principal_from_verifying_key(key: &VerifyingKey) -> Principal {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..32]);
    Principal::from_bytes(out)
}

/// Recover the signing principal from a 65-byte `r ‖ s ‖ v` signature
/// over `digest`. Accepts `v` as 0/1 or 27/28.
pub fn recover_signer(digest: &[u8; 32], signature: &[u8; 65]) -> Result<Principal> {
    let v = signature[64];
    let recovery = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery).ok_or(ReceiptError::InvalidSignature)?;

    let sig =
        Signature::from_slice(&signature[..64]).map_err(|_| ReceiptError::InvalidSignature)?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| ReceiptError::InvalidSignature)?;

    Ok(principal_from_verifying_key(&key))
}

/// Produce a 65-byte recoverable signature over the receipt's digest.
/// Used by tests and off-chain tooling; production signatures come from
/// external wallets following the same construction.
pub fn sign_receipt(
    key: &SigningKey,
    domain: &TypedDomain,
    receipt: &UsageReceipt,
) -> Result<[u8; 65]> {
    let digest = receipt.digest(domain);
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(&digest)
        .map_err(|_| ReceiptError::InvalidSignature)?;

    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&sig.to_bytes());
    out[64] = recovery_id.to_byte() + 27;
    Ok(out)
}
