use crate::error::{EscrowError, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tributary_access::RolesGate;
use tributary_types::{EngineEvent, EventSink, Principal, RoleId, MAX_FEE_BPS};

/// Protocol fee rate and treasury sink. Both settable only by
/// `DEFAULT_ADMIN`; setters are deliberately not pausable so fees can be
/// corrected during an incident.
pub struct FeeTreasury {
    roles: Arc<RolesGate>,
    events: EventSink,
    fee_bps: RwLock<u16>,
    sink: RwLock<Principal>,
}

impl FeeTreasury {
    pub fn new(
        roles: Arc<RolesGate>,
        events: EventSink,
        initial_fee_bps: u16,
        initial_sink: Principal,
    ) -> Result<Self> {
        if initial_fee_bps > MAX_FEE_BPS {
            return Err(EscrowError::FeeTooHigh {
                requested: initial_fee_bps,
                max: MAX_FEE_BPS,
            });
        }
        if initial_sink.is_zero() {
            return Err(EscrowError::ZeroAddress);
        }

        Ok(Self {
            roles,
            events,
            fee_bps: RwLock::new(initial_fee_bps),
            sink: RwLock::new(initial_sink),
        })
    }

    pub async fn fee_bps(&self) -> u16 {
        *self.fee_bps.read().await
    }

    pub async fn treasury_sink(&self) -> Principal {
        *self.sink.read().await
    }

    pub async fn set_fee_bps(&self, caller: Principal, new_bps: u16) -> Result<()> {
        self.roles.require(RoleId::default_admin(), caller).await?;
        if new_bps > MAX_FEE_BPS {
            return Err(EscrowError::FeeTooHigh {
                requested: new_bps,
                max: MAX_FEE_BPS,
            });
        }

        let mut fee = self.fee_bps.write().await;
        let old = *fee;
        *fee = new_bps;
        drop(fee);

        info!(old_fee_bps = old, new_fee_bps = new_bps, by = %caller, "Fee updated");
        self.events
            .emit(EngineEvent::FeeUpdated { new_fee_bps: new_bps })
            .await;
        Ok(())
    }

    pub async fn set_treasury_sink(&self, caller: Principal, new_sink: Principal) -> Result<()> {
        self.roles.require(RoleId::default_admin(), caller).await?;
        if new_sink.is_zero() {
            return Err(EscrowError::ZeroAddress);
        }

        let mut sink = self.sink.write().await;
        let old = *sink;
        *sink = new_sink;
        drop(sink);

        info!(old_sink = %old, new_sink = %new_sink, by = %caller, "Treasury sink updated");
        self.events
            .emit(EngineEvent::TreasuryUpdated { new_sink })
            .await;
        Ok(())
    }
}
