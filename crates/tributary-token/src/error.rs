use thiserror::Error;
use tributary_types::{Principal, UsdAmount};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Insufficient balance for {account}: has {available}, needs {required}")]
    InsufficientBalance {
        account: Principal,
        available: UsdAmount,
        required: UsdAmount,
    },

    #[error("Insufficient allowance from {owner} to {spender}: has {available}, needs {required}")]
    InsufficientAllowance {
        owner: Principal,
        spender: Principal,
        available: UsdAmount,
        required: UsdAmount,
    },

    #[error("Balance overflow for {0}")]
    BalanceOverflow(Principal),

    #[error("Transfer to the zero address")]
    ZeroAddress,
}

pub type Result<T> = std::result::Result<T, TokenError>;
