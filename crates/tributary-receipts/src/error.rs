use thiserror::Error;
use tributary_access::AccessError;
use tributary_escrow::EscrowError;
use tributary_token::TokenError;
use tributary_types::AssetId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReceiptError {
    #[error("Receipt expired at {deadline} (now {now})")]
    ReceiptExpired { deadline: i64, now: i64 },

    #[error("Invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("No splitter created for {0}")]
    SplitterNotCreated(AssetId),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Escrow(#[from] EscrowError),
}

pub type Result<T> = std::result::Result<T, ReceiptError>;
