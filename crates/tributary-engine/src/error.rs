use thiserror::Error;
use tributary_access::AccessError;
use tributary_escrow::EscrowError;
use tributary_graph::GraphError;
use tributary_receipts::ReceiptError;
use tributary_splitter::SplitterError;
use tributary_token::TokenError;

/// Unified error surface of the engine facade. Component errors pass
/// through unchanged so callers can match on the precise failure.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Splitter(#[from] SplitterError),

    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    #[error(transparent)]
    Escrow(#[from] EscrowError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
