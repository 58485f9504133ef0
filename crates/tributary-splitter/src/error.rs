use thiserror::Error;
use tributary_access::AccessError;
use tributary_token::TokenError;
use tributary_types::{AssetId, Principal};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitterError {
    #[error("Graph for {0} is not finalized")]
    GraphNotFinalized(AssetId),

    #[error("Graph for {0} has no contributor edges")]
    NoContributors(AssetId),

    #[error("Splitter already exists for {0}")]
    SplitterAlreadyExists(AssetId),

    #[error("{0} is not a payee of this splitter")]
    UnknownPayee(Principal),

    #[error("{0} is not due any payment")]
    NothingDue(Principal),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

pub type Result<T> = std::result::Result<T, SplitterError>;
