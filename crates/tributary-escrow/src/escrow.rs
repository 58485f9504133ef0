use crate::error::{EscrowError, Result};
use crate::treasury::FeeTreasury;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tributary_access::{PauseFlag, RolesGate};
use tributary_token::SettlementToken;
use tributary_types::{AssetId, Clock, EngineEvent, EventSink, Principal, RoleId, UsdAmount};

/// Escrowed-payment lifecycle. Terminal states are `Released` and
/// `Refunded`; no transition is ever skipped or revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Held,
    Disputed,
    Released,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Held => "held",
            PaymentStatus::Disputed => "disputed",
            PaymentStatus::Released => "released",
            PaymentStatus::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowedPayment {
    pub payment_id: u64,
    pub asset_id: AssetId,
    pub user: Principal,
    pub amount: UsdAmount,
    pub splitter: Principal,
    pub held_at: i64,
    pub release_time: i64,
    pub status: PaymentStatus,
}

/// Aggregate escrow counters, mostly for operators and tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscrowStats {
    pub total_payments: usize,
    pub held: usize,
    pub disputed: usize,
    pub released: usize,
    pub refunded: usize,
    pub escrowed_total: UsdAmount,
}

/// Time-locked custody of verified payments. Funds sit at the escrow's
/// token account from `hold_payment` until `release`/`resolve_dispute`
/// moves them to the splitter and treasury, or back to the payer.
pub struct Escrow {
    address: Principal,
    dispute_window_secs: u64,
    token: Arc<dyn SettlementToken>,
    treasury: Arc<FeeTreasury>,
    roles: Arc<RolesGate>,
    pause: PauseFlag,
    events: EventSink,
    clock: Clock,
    payments: Arc<RwLock<HashMap<u64, EscrowedPayment>>>,
    next_payment_id: Arc<RwLock<u64>>,
}

impl Escrow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dispute_window_secs: u64,
        token: Arc<dyn SettlementToken>,
        treasury: Arc<FeeTreasury>,
        roles: Arc<RolesGate>,
        pause: PauseFlag,
        events: EventSink,
        clock: Clock,
    ) -> Self {
        Self {
            address: Principal::derived("tributary/escrow", b"v1"),
            dispute_window_secs,
            token,
            treasury,
            roles,
            pause,
            events,
            clock,
            payments: Arc::new(RwLock::new(HashMap::new())),
            next_payment_id: Arc::new(RwLock::new(0)),
        }
    }

    /// The escrow's account on the settlement token. Callers of
    /// `hold_payment` must have moved the funds here already.
    pub fn address(&self) -> Principal {
        self.address
    }

    pub fn dispute_window_secs(&self) -> u64 {
        self.dispute_window_secs
    }

    pub fn pause_flag(&self) -> &PauseFlag {
        &self.pause
    }

    pub async fn hold_payment(
        &self,
        caller: Principal,
        asset_id: AssetId,
        user: Principal,
        amount: UsdAmount,
        splitter: Principal,
    ) -> Result<u64> {
        self.roles.require(RoleId::verifier(), caller).await?;
        self.pause.ensure_active().await?;

        let now = self.clock.now();
        let release_time = now + self.dispute_window_secs as i64;

        let mut next_id = self.next_payment_id.write().await;
        let payment_id = *next_id;
        *next_id += 1;
        drop(next_id);

        let payment = EscrowedPayment {
            payment_id,
            asset_id,
            user,
            amount,
            splitter,
            held_at: now,
            release_time,
            status: PaymentStatus::Held,
        };
        self.payments.write().await.insert(payment_id, payment);

        info!(
            payment_id,
            %asset_id,
            %user,
            %amount,
            release_time,
            "Payment held in escrow"
        );
        self.events
            .emit(EngineEvent::PaymentHeld {
                payment_id,
                asset_id,
                user,
                amount,
            })
            .await;
        Ok(payment_id)
    }

    /// The payer converts a held payment into a disputed one. Only
    /// possible while the dispute window is open.
    pub async fn open_dispute(&self, caller: Principal, payment_id: u64) -> Result<()> {
        self.pause.ensure_active().await?;

        let now = self.clock.now();
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(&payment_id)
            .ok_or(EscrowError::PaymentNotFound(payment_id))?;

        if payment.status != PaymentStatus::Held {
            return Err(EscrowError::InvalidStatus {
                payment_id,
                current: payment.status,
            });
        }
        if caller != payment.user {
            return Err(EscrowError::NotUser(payment_id));
        }
        if now > payment.release_time {
            return Err(EscrowError::DisputeWindowClosed {
                payment_id,
                release_time: payment.release_time,
                now,
            });
        }

        payment.status = PaymentStatus::Disputed;
        drop(payments);

        warn!(payment_id, by = %caller, "Dispute opened");
        self.events
            .emit(EngineEvent::DisputeOpened { payment_id })
            .await;
        Ok(())
    }

    /// After the dispute window has elapsed anyone may push a held
    /// payment out to the splitter and treasury.
    pub async fn release(&self, payment_id: u64) -> Result<()> {
        self.pause.ensure_active().await?;

        let now = self.clock.now();
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(&payment_id)
            .ok_or(EscrowError::PaymentNotFound(payment_id))?;

        if payment.status != PaymentStatus::Held {
            return Err(EscrowError::InvalidStatus {
                payment_id,
                current: payment.status,
            });
        }
        if now < payment.release_time {
            return Err(EscrowError::StillLocked {
                release_time: payment.release_time,
                now,
            });
        }

        payment.status = PaymentStatus::Released;
        let snapshot = payment.clone();
        drop(payments);

        if let Err(e) = self.distribute(&snapshot).await {
            self.revert_status(payment_id, PaymentStatus::Held).await;
            return Err(e);
        }

        info!(payment_id, destination = %snapshot.splitter, "Payment released");
        self.events
            .emit(EngineEvent::PaymentReleased {
                payment_id,
                destination: snapshot.splitter,
            })
            .await;
        Ok(())
    }

    /// Arbiter ruling on a disputed payment: refund the payer in full, or
    /// release to the splitter as if undisputed.
    pub async fn resolve_dispute(
        &self,
        caller: Principal,
        payment_id: u64,
        refund_to_user: bool,
    ) -> Result<()> {
        self.roles.require(RoleId::arbiter(), caller).await?;
        self.pause.ensure_active().await?;

        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(&payment_id)
            .ok_or(EscrowError::PaymentNotFound(payment_id))?;

        if payment.status != PaymentStatus::Disputed {
            return Err(EscrowError::InvalidStatus {
                payment_id,
                current: payment.status,
            });
        }

        if refund_to_user {
            payment.status = PaymentStatus::Refunded;
            let snapshot = payment.clone();
            drop(payments);

            if let Err(e) = self
                .token
                .transfer(self.address, snapshot.user, snapshot.amount)
                .await
            {
                self.revert_status(payment_id, PaymentStatus::Disputed).await;
                return Err(e.into());
            }

            info!(payment_id, user = %snapshot.user, amount = %snapshot.amount, "Payment refunded");
            self.events
                .emit(EngineEvent::PaymentRefunded {
                    payment_id,
                    user: snapshot.user,
                })
                .await;
        } else {
            payment.status = PaymentStatus::Released;
            let snapshot = payment.clone();
            drop(payments);

            if let Err(e) = self.distribute(&snapshot).await {
                self.revert_status(payment_id, PaymentStatus::Disputed).await;
                return Err(e);
            }

            info!(payment_id, destination = %snapshot.splitter, "Dispute resolved for payee side");
            self.events
                .emit(EngineEvent::PaymentReleased {
                    payment_id,
                    destination: snapshot.splitter,
                })
                .await;
        }
        Ok(())
    }

    /// Fee-split distribution: `floor(amount * fee_bps / 10000)` to the
    /// treasury sink, the remainder to the splitter. The escrow custody
    /// invariant (`balance >= sum of outstanding amounts`) is checked up
    /// front so the pair of transfers cannot half-complete for lack of
    /// funds.
    async fn distribute(&self, payment: &EscrowedPayment) -> Result<()> {
        let fee_bps = self.treasury.fee_bps().await;
        let sink = self.treasury.treasury_sink().await;

        let fee = payment.amount.bps_share(fee_bps);
        let remainder = payment.amount.saturating_sub(fee);

        let balance = self.token.balance_of(self.address).await;
        if balance < payment.amount {
            return Err(EscrowError::Token(
                tributary_token::TokenError::InsufficientBalance {
                    account: self.address,
                    available: balance,
                    required: payment.amount,
                },
            ));
        }

        if !fee.is_zero() {
            self.token.transfer(self.address, sink, fee).await?;
        }
        self.token
            .transfer(self.address, payment.splitter, remainder)
            .await?;

        info!(
            payment_id = payment.payment_id,
            fee = %fee,
            remainder = %remainder,
            sink = %sink,
            splitter = %payment.splitter,
            "Fee split distributed"
        );
        Ok(())
    }

    async fn revert_status(&self, payment_id: u64, status: PaymentStatus) {
        let mut payments = self.payments.write().await;
        if let Some(payment) = payments.get_mut(&payment_id) {
            warn!(payment_id, reverted_to = %status, "Distribution failed, status reverted");
            payment.status = status;
        }
    }

    pub async fn payment(&self, payment_id: u64) -> Option<EscrowedPayment> {
        let payments = self.payments.read().await;
        payments.get(&payment_id).cloned()
    }

    pub async fn payments_for_asset(&self, asset_id: AssetId) -> Vec<EscrowedPayment> {
        let payments = self.payments.read().await;
        let mut out: Vec<EscrowedPayment> = payments
            .values()
            .filter(|p| p.asset_id == asset_id)
            .cloned()
            .collect();
        out.sort_by_key(|p| p.payment_id);
        out
    }

    pub async fn stats(&self) -> EscrowStats {
        let payments = self.payments.read().await;
        let mut stats = EscrowStats {
            total_payments: payments.len(),
            ..Default::default()
        };

        for payment in payments.values() {
            match payment.status {
                PaymentStatus::Held => {
                    stats.held += 1;
                    stats.escrowed_total = stats.escrowed_total.saturating_add(payment.amount);
                }
                PaymentStatus::Disputed => {
                    stats.disputed += 1;
                    stats.escrowed_total = stats.escrowed_total.saturating_add(payment.amount);
                }
                PaymentStatus::Released => stats.released += 1,
                PaymentStatus::Refunded => stats.refunded += 1,
            }
        }
        stats
    }
}
