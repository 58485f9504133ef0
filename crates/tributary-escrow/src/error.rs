use crate::escrow::PaymentStatus;
use thiserror::Error;
use tributary_access::AccessError;
use tributary_token::TokenError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    #[error("Payment not found: {0}")]
    PaymentNotFound(u64),

    #[error("Caller is not the payer of payment {0}")]
    NotUser(u64),

    #[error("Payment {payment_id} has status {current}, operation not allowed")]
    InvalidStatus {
        payment_id: u64,
        current: PaymentStatus,
    },

    #[error("Payment still locked until {release_time} (now {now})")]
    StillLocked { release_time: i64, now: i64 },

    #[error("Dispute window for payment {payment_id} closed at {release_time} (now {now})")]
    DisputeWindowClosed {
        payment_id: u64,
        release_time: i64,
        now: i64,
    },

    #[error("Fee {requested} bps exceeds maximum {max} bps")]
    FeeTooHigh { requested: u16, max: u16 },

    #[error("Treasury sink must not be the zero address")]
    ZeroAddress,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

pub type Result<T> = std::result::Result<T, EscrowError>;
