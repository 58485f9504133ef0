use crate::error::{ReceiptError, Result};
use crate::typed_data::{recover_signer, TypedDomain, UsageReceipt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tributary_access::{PauseFlag, RolesGate};
use tributary_escrow::Escrow;
use tributary_splitter::SplitterFactory;
use tributary_token::SettlementToken;
use tributary_types::{Clock, EngineEvent, EventSink, Principal, RoleId};

/// Verifies typed-data usage receipts and turns them into escrowed
/// payments. Nonces are strictly sequential per user; a consumed receipt
/// can never be replayed.
pub struct ReceiptVerifier {
    domain: TypedDomain,
    address: Principal,
    token: Arc<dyn SettlementToken>,
    factory: Arc<SplitterFactory>,
    escrow: Arc<Escrow>,
    roles: Arc<RolesGate>,
    pause: PauseFlag,
    events: EventSink,
    clock: Clock,
    nonces: Arc<RwLock<HashMap<Principal, u64>>>,
}

impl ReceiptVerifier {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        eip712_name: impl Into<String>,
        eip712_version: impl Into<String>,
        chain_id: u64,
        token: Arc<dyn SettlementToken>,
        factory: Arc<SplitterFactory>,
        escrow: Arc<Escrow>,
        roles: Arc<RolesGate>,
        pause: PauseFlag,
        events: EventSink,
        clock: Clock,
    ) -> Self {
        let address = Principal::derived("tributary/verifier", b"v1");
        let domain = TypedDomain::new(eip712_name, eip712_version, chain_id, address);

        Self {
            domain,
            address,
            token,
            factory,
            escrow,
            roles,
            pause,
            events,
            clock,
            nonces: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The verifier's own principal: the typed-data `verifying_contract`,
    /// the allowance spender users approve, and the caller identity the
    /// escrow sees on `hold_payment`.
    pub fn address(&self) -> Principal {
        self.address
    }

    pub fn domain(&self) -> &TypedDomain {
        &self.domain
    }

    pub fn pause_flag(&self) -> &PauseFlag {
        &self.pause
    }

    /// Next expected nonce for `user`.
    pub async fn nonce_of(&self, user: Principal) -> u64 {
        let nonces = self.nonces.read().await;
        nonces.get(&user).copied().unwrap_or(0)
    }

    /// Verify `receipt` and escrow its payment. Returns the assigned
    /// payment id.
    ///
    /// The nonce bump precedes the token pull so an adversarial token
    /// reentering mid-transfer sees the receipt as already consumed; a
    /// failed pull rolls the bump back, leaving zero state change.
    pub async fn verify_and_pay(
        &self,
        caller: Principal,
        receipt: &UsageReceipt,
        signature: &[u8; 65],
    ) -> Result<u64> {
        self.roles.require(RoleId::verifier(), caller).await?;
        self.pause.ensure_active().await?;
        // The escrow hand-off must not be able to fail after funds move.
        self.roles.require(RoleId::verifier(), self.address).await?;
        self.escrow.pause_flag().ensure_active().await?;

        let now = self.clock.now();
        if now > receipt.deadline {
            return Err(ReceiptError::ReceiptExpired {
                deadline: receipt.deadline,
                now,
            });
        }

        let expected = self.nonce_of(receipt.user).await;
        if receipt.nonce != expected {
            return Err(ReceiptError::InvalidNonce {
                expected,
                got: receipt.nonce,
            });
        }

        let digest = receipt.digest(&self.domain);
        let signer = recover_signer(&digest, signature)?;
        if signer != receipt.user {
            return Err(ReceiptError::InvalidSignature);
        }

        let splitter = self
            .factory
            .splitter_of(receipt.asset_id)
            .await
            .ok_or(ReceiptError::SplitterNotCreated(receipt.asset_id))?;

        // Effect before interaction.
        self.nonces.write().await.insert(receipt.user, expected + 1);

        // Pull the payment straight into escrow custody. The user must
        // have approved this verifier for at least `amount`.
        if let Err(e) = self
            .token
            .transfer_from(
                self.address,
                receipt.user,
                self.escrow.address(),
                receipt.amount,
            )
            .await
        {
            self.nonces.write().await.insert(receipt.user, expected);
            return Err(e.into());
        }

        let payment_id = match self
            .escrow
            .hold_payment(
                self.address,
                receipt.asset_id,
                receipt.user,
                receipt.amount,
                splitter.address(),
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                // Preconditions were checked above; reachable only if an
                // admin revoked or paused mid-operation.
                self.nonces.write().await.insert(receipt.user, expected);
                self.token
                    .transfer(self.escrow.address(), receipt.user, receipt.amount)
                    .await?;
                return Err(e.into());
            }
        };

        info!(
            asset_id = %receipt.asset_id,
            user = %receipt.user,
            amount = %receipt.amount,
            nonce = receipt.nonce,
            payment_id,
            "Receipt consumed"
        );
        self.events
            .emit(EngineEvent::ReceiptConsumed {
                asset_id: receipt.asset_id,
                user: receipt.user,
                amount: receipt.amount,
                nonce: receipt.nonce,
            })
            .await;
        Ok(payment_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed_data::{principal_from_verifying_key, sign_receipt};
    use k256::ecdsa::SigningKey;
    use tributary_escrow::{FeeTreasury, PaymentStatus};
    use tributary_graph::{MemoryAssetDirectory, ProvenanceGraph};
    use tributary_token::MemoryToken;
    use tributary_types::{AssetId, UsdAmount};

    struct Fixture {
        verifier: ReceiptVerifier,
        escrow: Arc<Escrow>,
        token: Arc<MemoryToken>,
        clock: Clock,
        gateway: Principal,
        user_key: SigningKey,
        user: Principal,
    }

    async fn fixture() -> Fixture {
        let admin = Principal::from_bytes([1; 20]);
        let owner = Principal::from_bytes([2; 20]);
        let gateway = Principal::from_bytes([3; 20]);
        let contributor = Principal::from_bytes([0xaa; 20]);
        let sink = Principal::from_bytes([0xfe; 20]);

        let mut key_bytes = [0u8; 32];
        key_bytes[31] = 42;
        let user_key = SigningKey::from_slice(&key_bytes).unwrap();
        let user = principal_from_verifying_key(user_key.verifying_key());

        let roles = Arc::new(RolesGate::new(admin));
        roles.grant(admin, RoleId::verifier(), gateway).await.unwrap();
        roles
            .grant(admin, RoleId::contributor(), contributor)
            .await
            .unwrap();

        let events = EventSink::new();
        let clock = Clock::new();
        let token = Arc::new(MemoryToken::new());

        let directory = Arc::new(MemoryAssetDirectory::new());
        directory.register(AssetId::new(1), owner).await.unwrap();

        let graph = Arc::new(ProvenanceGraph::new(
            directory,
            roles.clone(),
            PauseFlag::new("graph", roles.clone(), events.clone()),
            events.clone(),
        ));
        graph
            .add_contributor_edge(owner, AssetId::new(1), contributor, 10_000)
            .await
            .unwrap();
        graph.finalize(owner, AssetId::new(1)).await.unwrap();

        let factory = Arc::new(SplitterFactory::new(
            graph,
            PauseFlag::new("splitter", roles.clone(), events.clone()),
            events.clone(),
        ));
        factory.create_splitter(AssetId::new(1)).await.unwrap();

        let treasury =
            Arc::new(FeeTreasury::new(roles.clone(), events.clone(), 250, sink).unwrap());
        let escrow = Arc::new(Escrow::new(
            259_200,
            token.clone(),
            treasury,
            roles.clone(),
            PauseFlag::new("escrow", roles.clone(), events.clone()),
            events.clone(),
            clock.clone(),
        ));

        let verifier = ReceiptVerifier::new(
            "AIUsageReceipts",
            "1",
            1,
            token.clone(),
            factory,
            escrow.clone(),
            roles.clone(),
            PauseFlag::new("verifier", roles.clone(), events.clone()),
            events,
            clock.clone(),
        );
        roles
            .grant(admin, RoleId::verifier(), verifier.address())
            .await
            .unwrap();

        // Payer funding and allowance.
        token
            .mint(user, UsdAmount::from_base_units(100_000_000))
            .await
            .unwrap();
        token
            .approve(user, verifier.address(), UsdAmount::from_base_units(100_000_000))
            .await;

        Fixture {
            verifier,
            escrow,
            token,
            clock,
            gateway,
            user_key,
            user,
        }
    }

    fn receipt(fx: &Fixture, nonce: u64, deadline_offset: i64) -> UsageReceipt {
        UsageReceipt {
            asset_id: AssetId::new(1),
            amount: UsdAmount::from_base_units(100_000_000),
            user: fx.user,
            nonce,
            deadline: fx.clock.now() + deadline_offset,
        }
    }

    #[tokio::test]
    async fn test_accepts_valid_receipt() {
        let fx = fixture().await;
        let r = receipt(&fx, 0, 3600);
        let sig = sign_receipt(&fx.user_key, fx.verifier.domain(), &r).unwrap();

        let payment_id = fx
            .verifier
            .verify_and_pay(fx.gateway, &r, &sig)
            .await
            .unwrap();
        assert_eq!(payment_id, 0);

        assert_eq!(fx.verifier.nonce_of(fx.user).await, 1);
        assert_eq!(fx.token.balance_of(fx.user).await, UsdAmount::ZERO);
        assert_eq!(
            fx.token.balance_of(fx.escrow.address()).await.to_base_units(),
            100_000_000
        );

        let payment = fx.escrow.payment(0).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Held);
        assert_eq!(payment.user, fx.user);
    }

    #[tokio::test]
    async fn test_rejects_expired_receipt() {
        let fx = fixture().await;
        let r = receipt(&fx, 0, -1);
        let sig = sign_receipt(&fx.user_key, fx.verifier.domain(), &r).unwrap();

        let err = fx
            .verifier
            .verify_and_pay(fx.gateway, &r, &sig)
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::ReceiptExpired { .. }));

        // No state change: nonce untouched, no funds moved.
        assert_eq!(fx.verifier.nonce_of(fx.user).await, 0);
        assert_eq!(
            fx.token.balance_of(fx.user).await.to_base_units(),
            100_000_000
        );
    }

    #[tokio::test]
    async fn test_rejects_replay() {
        let fx = fixture().await;
        let r = receipt(&fx, 0, 3600);
        let sig = sign_receipt(&fx.user_key, fx.verifier.domain(), &r).unwrap();

        // Fund a second payment so only the nonce can fail.
        fx.token
            .mint(fx.user, UsdAmount::from_base_units(100_000_000))
            .await
            .unwrap();
        fx.token
            .approve(
                fx.user,
                fx.verifier.address(),
                UsdAmount::from_base_units(200_000_000),
            )
            .await;

        fx.verifier
            .verify_and_pay(fx.gateway, &r, &sig)
            .await
            .unwrap();
        let err = fx
            .verifier
            .verify_and_pay(fx.gateway, &r, &sig)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReceiptError::InvalidNonce { expected: 1, got: 0 }
        ));
    }

    #[tokio::test]
    async fn test_rejects_wrong_signer() {
        let fx = fixture().await;
        let r = receipt(&fx, 0, 3600);

        let mut other_bytes = [0u8; 32];
        other_bytes[31] = 43;
        let other_key = SigningKey::from_slice(&other_bytes).unwrap();
        let sig = sign_receipt(&other_key, fx.verifier.domain(), &r).unwrap();

        let err = fx
            .verifier
            .verify_and_pay(fx.gateway, &r, &sig)
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::InvalidSignature));
        assert_eq!(fx.verifier.nonce_of(fx.user).await, 0);
    }

    #[tokio::test]
    async fn test_rejects_missing_splitter() {
        let fx = fixture().await;
        let mut r = receipt(&fx, 0, 3600);
        r.asset_id = AssetId::new(9);
        let sig = sign_receipt(&fx.user_key, fx.verifier.domain(), &r).unwrap();

        let err = fx
            .verifier
            .verify_and_pay(fx.gateway, &r, &sig)
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::SplitterNotCreated(_)));
    }

    #[tokio::test]
    async fn test_requires_verifier_role() {
        let fx = fixture().await;
        let r = receipt(&fx, 0, 3600);
        let sig = sign_receipt(&fx.user_key, fx.verifier.domain(), &r).unwrap();

        let err = fx
            .verifier
            .verify_and_pay(fx.user, &r, &sig)
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::Access(_)));
    }

    #[tokio::test]
    async fn test_failed_pull_rolls_back_nonce() {
        let fx = fixture().await;
        let r = receipt(&fx, 0, 3600);
        let sig = sign_receipt(&fx.user_key, fx.verifier.domain(), &r).unwrap();

        // Drop the allowance below the receipt amount.
        fx.token
            .approve(fx.user, fx.verifier.address(), UsdAmount::from_usd(1.0))
            .await;

        let err = fx
            .verifier
            .verify_and_pay(fx.gateway, &r, &sig)
            .await
            .unwrap_err();
        assert!(matches!(err, ReceiptError::Token(_)));

        assert_eq!(fx.verifier.nonce_of(fx.user).await, 0);
        assert_eq!(
            fx.token.balance_of(fx.user).await.to_base_units(),
            100_000_000
        );
        assert!(fx.escrow.payment(0).await.is_none());
    }
}
