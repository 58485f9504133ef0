use thiserror::Error;
use tributary_access::AccessError;
use tributary_types::{AssetId, Principal};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Caller is not the owner of {0}")]
    NotAssetOwner(AssetId),

    #[error("Asset does not exist: {0}")]
    AssetDoesNotExist(AssetId),

    #[error("Graph for {0} is finalized")]
    GraphIsFinalized(AssetId),

    #[error("{0} does not hold the CONTRIBUTOR role")]
    NotAContributor(Principal),

    #[error("Invalid edge weight: {0} bps (must be 1..=10000)")]
    InvalidWeight(u16),

    #[error("Total weight would exceed 10000 bps: current {current}, requested {requested}")]
    TotalWeightExceeded { current: u32, requested: u16 },

    #[error("Asset id zero is reserved")]
    ZeroAssetId,

    #[error("Owner must not be the zero address")]
    ZeroAddress,

    #[error("Asset already registered: {0}")]
    AssetAlreadyRegistered(AssetId),

    #[error(transparent)]
    Access(#[from] AccessError),
}

pub type Result<T> = std::result::Result<T, GraphError>;
