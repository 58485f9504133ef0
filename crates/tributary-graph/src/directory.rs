use crate::error::{GraphError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tributary_types::{AssetId, Principal};

/// Identity and ownership queries for assets. The asset token contract
/// lives outside the core; the graph consults it on every mutation.
#[async_trait]
pub trait AssetDirectory: Send + Sync {
    /// Current owner. Fails with `AssetDoesNotExist` for unknown ids.
    async fn owner_of(&self, asset_id: AssetId) -> Result<Principal>;

    async fn exists(&self, asset_id: AssetId) -> bool;
}

/// In-memory directory for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryAssetDirectory {
    owners: Arc<RwLock<HashMap<AssetId, Principal>>>,
}

impl MemoryAssetDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, asset_id: AssetId, owner: Principal) -> Result<()> {
        if asset_id.is_zero() {
            return Err(GraphError::ZeroAssetId);
        }
        if owner.is_zero() {
            return Err(GraphError::ZeroAddress);
        }

        let mut owners = self.owners.write().await;
        if owners.contains_key(&asset_id) {
            return Err(GraphError::AssetAlreadyRegistered(asset_id));
        }
        owners.insert(asset_id, owner);

        info!(%asset_id, %owner, "Asset registered");
        Ok(())
    }

    pub async fn transfer_ownership(
        &self,
        caller: Principal,
        asset_id: AssetId,
        new_owner: Principal,
    ) -> Result<()> {
        if new_owner.is_zero() {
            return Err(GraphError::ZeroAddress);
        }

        let mut owners = self.owners.write().await;
        let owner = owners
            .get_mut(&asset_id)
            .ok_or(GraphError::AssetDoesNotExist(asset_id))?;
        if *owner != caller {
            return Err(GraphError::NotAssetOwner(asset_id));
        }
        *owner = new_owner;

        info!(%asset_id, from = %caller, to = %new_owner, "Asset ownership transferred");
        Ok(())
    }
}

#[async_trait]
impl AssetDirectory for MemoryAssetDirectory {
    async fn owner_of(&self, asset_id: AssetId) -> Result<Principal> {
        let owners = self.owners.read().await;
        owners
            .get(&asset_id)
            .copied()
            .ok_or(GraphError::AssetDoesNotExist(asset_id))
    }

    async fn exists(&self, asset_id: AssetId) -> bool {
        let owners = self.owners.read().await;
        owners.contains_key(&asset_id)
    }
}
