pub mod error;
pub mod memory;

pub use error::{Result, TokenError};
pub use memory::{MemoryToken, TransferRecord};

use async_trait::async_trait;
use tributary_types::{Principal, UsdAmount};

/// Interface to the USD-stablecoin ledger the engine settles in. The real
/// token lives outside the core; the engine only ever calls these three
/// operations.
///
/// `transfer` debits `from` directly and is used by components moving
/// funds they hold themselves. `transfer_from` spends an allowance that
/// `from` granted to `spender` beforehand.
#[async_trait]
pub trait SettlementToken: Send + Sync {
    async fn transfer_from(
        &self,
        spender: Principal,
        from: Principal,
        to: Principal,
        amount: UsdAmount,
    ) -> Result<()>;

    async fn transfer(&self, from: Principal, to: Principal, amount: UsdAmount) -> Result<()>;

    async fn balance_of(&self, owner: Principal) -> UsdAmount;
}
