use crate::error::{Result, SplitterError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tributary_token::SettlementToken;
use tributary_types::{AssetId, Principal, UsdAmount};

/// Immutable payee/weight snapshot taken from a finalized graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterRecord {
    pub asset_id: AssetId,
    pub address: Principal,
    pub payees: Vec<Principal>,
    pub shares: Vec<u16>,
    pub total_shares: u32,
}

/// Pull-payment splitter. Funds accumulate at `address` on the settlement
/// token; each payee withdraws its pro-rata slice with `release`.
///
/// Shares are the raw contributor weights. When they sum below 10_000 the
/// per-payee slice scales up accordingly (`amount / total_shares`), so a
/// sub-10000 snapshot pays out the full balance, never a residual.
#[derive(Debug)]
pub struct PaymentSplitter {
    record: SplitterRecord,
    shares_by_payee: HashMap<Principal, u16>,
    released: RwLock<HashMap<Principal, UsdAmount>>,
    total_released: RwLock<UsdAmount>,
}

impl PaymentSplitter {
    /// Build a splitter from an already-materialized record. The factory
    /// is the normal construction path; this is public for tooling and
    /// tests. A payee listed twice accrues the sum of its weights.
    pub fn new(record: SplitterRecord) -> Self {
        let mut shares_by_payee: HashMap<Principal, u16> = HashMap::new();
        for (payee, weight) in record.payees.iter().zip(record.shares.iter()) {
            *shares_by_payee.entry(*payee).or_insert(0) += weight;
        }
        Self {
            record,
            shares_by_payee,
            released: RwLock::new(HashMap::new()),
            total_released: RwLock::new(UsdAmount::ZERO),
        }
    }

    pub fn asset_id(&self) -> AssetId {
        self.record.asset_id
    }

    /// The splitter's account on the settlement token.
    pub fn address(&self) -> Principal {
        self.record.address
    }

    pub fn record(&self) -> &SplitterRecord {
        &self.record
    }

    pub fn payees(&self) -> &[Principal] {
        &self.record.payees
    }

    pub fn payee(&self, index: usize) -> Option<Principal> {
        self.record.payees.get(index).copied()
    }

    pub fn total_shares(&self) -> u32 {
        self.record.total_shares
    }

    pub fn shares(&self, payee: Principal) -> u16 {
        self.shares_by_payee.get(&payee).copied().unwrap_or(0)
    }

    pub async fn released(&self, payee: Principal) -> UsdAmount {
        let released = self.released.read().await;
        released.get(&payee).copied().unwrap_or(UsdAmount::ZERO)
    }

    pub async fn total_released(&self) -> UsdAmount {
        *self.total_released.read().await
    }

    /// Amount `payee` could withdraw right now.
    pub async fn pending(&self, token: &dyn SettlementToken, payee: Principal) -> Result<UsdAmount> {
        let share = self
            .shares_by_payee
            .get(&payee)
            .copied()
            .ok_or(SplitterError::UnknownPayee(payee))?;

        let balance = token.balance_of(self.record.address).await;
        let total_released = *self.total_released.read().await;
        let total_received = balance.saturating_add(total_released);

        let entitled = total_received.mul_div_floor(share as u32, self.record.total_shares);
        let already = self.released(payee).await;
        Ok(entitled.saturating_sub(already))
    }

    /// Withdraw `payee`'s accrued slice. Released accounting is updated
    /// before the token transfer and rolled back if the transfer fails,
    /// so a failed withdrawal leaves no trace.
    pub async fn release(
        self: &Arc<Self>,
        token: &dyn SettlementToken,
        payee: Principal,
    ) -> Result<UsdAmount> {
        let due = self.pending(token, payee).await?;
        if due.is_zero() {
            return Err(SplitterError::NothingDue(payee));
        }

        {
            let mut released = self.released.write().await;
            let entry = released.entry(payee).or_insert(UsdAmount::ZERO);
            *entry = entry.saturating_add(due);
            let mut total = self.total_released.write().await;
            *total = total.saturating_add(due);
        }

        if let Err(e) = token.transfer(self.record.address, payee, due).await {
            let mut released = self.released.write().await;
            if let Some(entry) = released.get_mut(&payee) {
                *entry = entry.saturating_sub(due);
            }
            let mut total = self.total_released.write().await;
            *total = total.saturating_sub(due);
            return Err(e.into());
        }

        info!(
            asset_id = %self.record.asset_id,
            payee = %payee,
            amount = %due,
            "Splitter share released"
        );
        Ok(due)
    }
}
