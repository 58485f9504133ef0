use crate::error::{Result, TokenError};
use crate::SettlementToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use tributary_types::{Principal, UsdAmount};

/// Settled transfer, kept for explorers and test assertions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub from: Principal,
    pub to: Principal,
    pub amount: UsdAmount,
    pub timestamp: DateTime<Utc>,
    pub tx_hash: String,
}

/// In-memory stablecoin ledger with allowances. Stands in for the external
/// token contract in tests and single-process deployments.
#[derive(Default)]
pub struct MemoryToken {
    balances: Arc<RwLock<HashMap<Principal, UsdAmount>>>,
    allowances: Arc<RwLock<HashMap<(Principal, Principal), UsdAmount>>>,
    history: Arc<RwLock<Vec<TransferRecord>>>,
}

impl MemoryToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit freshly issued units to `account`. Test and bootstrap use.
    pub async fn mint(&self, account: Principal, amount: UsdAmount) -> Result<()> {
        let mut balances = self.balances.write().await;
        let current = balances.get(&account).copied().unwrap_or(UsdAmount::ZERO);
        let updated = current
            .checked_add(amount)
            .ok_or(TokenError::BalanceOverflow(account))?;
        balances.insert(account, updated);

        info!(account = %account, amount = %amount, "Tokens minted");
        Ok(())
    }

    /// `owner` authorizes `spender` to pull up to `amount` via
    /// `transfer_from`. Overwrites any previous allowance.
    pub async fn approve(&self, owner: Principal, spender: Principal, amount: UsdAmount) {
        let mut allowances = self.allowances.write().await;
        allowances.insert((owner, spender), amount);
        debug!(owner = %owner, spender = %spender, amount = %amount, "Allowance set");
    }

    pub async fn allowance(&self, owner: Principal, spender: Principal) -> UsdAmount {
        let allowances = self.allowances.read().await;
        allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(UsdAmount::ZERO)
    }

    /// Transfers affecting `account`, oldest first.
    pub async fn transaction_history(&self, account: Principal) -> Vec<TransferRecord> {
        let history = self.history.read().await;
        history
            .iter()
            .filter(|r| r.from == account || r.to == account)
            .cloned()
            .collect()
    }

    async fn record_transfer(&self, from: Principal, to: Principal, amount: UsdAmount) {
        let timestamp = Utc::now();
        let mut hasher = blake3::Hasher::new();
        hasher.update(from.as_bytes());
        hasher.update(to.as_bytes());
        hasher.update(&amount.to_base_units().to_le_bytes());
        hasher.update(&timestamp.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        let tx_hash = hex::encode(hasher.finalize().as_bytes());

        self.history.write().await.push(TransferRecord {
            from,
            to,
            amount,
            timestamp,
            tx_hash,
        });
    }

    /// Move `amount` between two accounts under an already-acquired write
    /// lock so debits and credits land atomically.
    fn move_balance(
        balances: &mut HashMap<Principal, UsdAmount>,
        from: Principal,
        to: Principal,
        amount: UsdAmount,
    ) -> Result<()> {
        let from_balance = balances.get(&from).copied().unwrap_or(UsdAmount::ZERO);
        let new_from = from_balance
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                account: from,
                available: from_balance,
                required: amount,
            })?;

        let to_balance = balances.get(&to).copied().unwrap_or(UsdAmount::ZERO);
        let new_to = to_balance
            .checked_add(amount)
            .ok_or(TokenError::BalanceOverflow(to))?;

        balances.insert(from, new_from);
        balances.insert(to, new_to);
        Ok(())
    }
}

#[async_trait]
impl SettlementToken for MemoryToken {
    async fn transfer_from(
        &self,
        spender: Principal,
        from: Principal,
        to: Principal,
        amount: UsdAmount,
    ) -> Result<()> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }

        let mut allowances = self.allowances.write().await;
        let allowed = allowances
            .get(&(from, spender))
            .copied()
            .unwrap_or(UsdAmount::ZERO);
        let remaining = allowed
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientAllowance {
                owner: from,
                spender,
                available: allowed,
                required: amount,
            })?;

        {
            let mut balances = self.balances.write().await;
            Self::move_balance(&mut balances, from, to, amount)?;
            allowances.insert((from, spender), remaining);
        }
        self.record_transfer(from, to, amount).await;

        debug!(
            spender = %spender,
            from = %from,
            to = %to,
            amount = %amount,
            "transfer_from executed"
        );
        Ok(())
    }

    async fn transfer(&self, from: Principal, to: Principal, amount: UsdAmount) -> Result<()> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }

        {
            let mut balances = self.balances.write().await;
            Self::move_balance(&mut balances, from, to, amount)?;
        }
        self.record_transfer(from, to, amount).await;

        debug!(from = %from, to = %to, amount = %amount, "transfer executed");
        Ok(())
    }

    async fn balance_of(&self, owner: Principal) -> UsdAmount {
        let balances = self.balances.read().await;
        balances.get(&owner).copied().unwrap_or(UsdAmount::ZERO)
    }
}
