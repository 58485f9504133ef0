use crate::directory::AssetDirectory;
use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tributary_access::{PauseFlag, RolesGate};
use tributary_types::{AssetId, EngineEvent, EventSink, Principal, RoleId, BPS_DENOMINATOR};

/// Revenue share assigned to a human contributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorEdge {
    pub contributor: Principal,
    pub weight_bps: u16,
}

/// Provenance link to a parent asset. Parent edges never feed the payment
/// splitter; they are on-graph metadata for off-core discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentEdge {
    pub parent_asset_id: AssetId,
    pub weight_bps: u16,
}

/// Per-asset graph state. Mutable until finalized, then permanently
/// read-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphEntry {
    pub contributor_edges: Vec<ContributorEdge>,
    pub parent_edges: Vec<ParentEdge>,
    pub total_bps: u32,
    pub finalized: bool,
}

/// Build-up, validation, and one-way finalization of per-asset provenance
/// edges. Mutations are restricted to the asset's current owner, resolved
/// through the directory at call time.
pub struct ProvenanceGraph {
    directory: Arc<dyn AssetDirectory>,
    roles: Arc<RolesGate>,
    pause: PauseFlag,
    events: EventSink,
    entries: Arc<RwLock<HashMap<AssetId, GraphEntry>>>,
}

impl ProvenanceGraph {
    pub fn new(
        directory: Arc<dyn AssetDirectory>,
        roles: Arc<RolesGate>,
        pause: PauseFlag,
        events: EventSink,
    ) -> Self {
        Self {
            directory,
            roles,
            pause,
            events,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn pause_flag(&self) -> &PauseFlag {
        &self.pause
    }

    /// Ownership, existence, finalization, and weight-range checks shared
    /// by both edge operations. Returns nothing; the write lock is taken
    /// afterwards so directory lookups never run under it.
    async fn check_mutation(
        &self,
        caller: Principal,
        asset_id: AssetId,
        weight_bps: u16,
    ) -> Result<()> {
        self.pause.ensure_active().await?;

        if !self.directory.exists(asset_id).await {
            return Err(GraphError::AssetDoesNotExist(asset_id));
        }
        if self.directory.owner_of(asset_id).await? != caller {
            return Err(GraphError::NotAssetOwner(asset_id));
        }
        if weight_bps == 0 || weight_bps as u32 > BPS_DENOMINATOR {
            return Err(GraphError::InvalidWeight(weight_bps));
        }
        Ok(())
    }

    pub async fn add_contributor_edge(
        &self,
        caller: Principal,
        asset_id: AssetId,
        contributor: Principal,
        weight_bps: u16,
    ) -> Result<()> {
        self.check_mutation(caller, asset_id, weight_bps).await?;

        if !self.roles.has(RoleId::contributor(), contributor).await {
            return Err(GraphError::NotAContributor(contributor));
        }

        let mut entries = self.entries.write().await;
        let entry = entries.entry(asset_id).or_default();
        if entry.finalized {
            return Err(GraphError::GraphIsFinalized(asset_id));
        }
        if entry.total_bps + weight_bps as u32 > BPS_DENOMINATOR {
            return Err(GraphError::TotalWeightExceeded {
                current: entry.total_bps,
                requested: weight_bps,
            });
        }

        entry.contributor_edges.push(ContributorEdge {
            contributor,
            weight_bps,
        });
        entry.total_bps += weight_bps as u32;
        let total_bps = entry.total_bps;
        drop(entries);

        info!(%asset_id, %contributor, weight_bps, total_bps, "Contributor edge added");
        self.events
            .emit(EngineEvent::ContributorEdgeAdded {
                asset_id,
                contributor,
                weight_bps,
            })
            .await;
        Ok(())
    }

    pub async fn add_parent_edge(
        &self,
        caller: Principal,
        asset_id: AssetId,
        parent_asset_id: AssetId,
        weight_bps: u16,
    ) -> Result<()> {
        self.check_mutation(caller, asset_id, weight_bps).await?;

        if !self.directory.exists(parent_asset_id).await {
            return Err(GraphError::AssetDoesNotExist(parent_asset_id));
        }

        let mut entries = self.entries.write().await;
        let entry = entries.entry(asset_id).or_default();
        if entry.finalized {
            return Err(GraphError::GraphIsFinalized(asset_id));
        }
        if entry.total_bps + weight_bps as u32 > BPS_DENOMINATOR {
            return Err(GraphError::TotalWeightExceeded {
                current: entry.total_bps,
                requested: weight_bps,
            });
        }

        entry.parent_edges.push(ParentEdge {
            parent_asset_id,
            weight_bps,
        });
        entry.total_bps += weight_bps as u32;
        let total_bps = entry.total_bps;
        drop(entries);

        info!(%asset_id, %parent_asset_id, weight_bps, total_bps, "Parent edge added");
        self.events
            .emit(EngineEvent::ParentEdgeAdded {
                asset_id,
                parent_asset_id,
                weight_bps,
            })
            .await;
        Ok(())
    }

    /// One-way transition to read-only. An empty graph may be finalized;
    /// splitter creation is where emptiness is rejected.
    pub async fn finalize(&self, caller: Principal, asset_id: AssetId) -> Result<()> {
        self.pause.ensure_active().await?;

        if !self.directory.exists(asset_id).await {
            return Err(GraphError::AssetDoesNotExist(asset_id));
        }
        if self.directory.owner_of(asset_id).await? != caller {
            return Err(GraphError::NotAssetOwner(asset_id));
        }

        let mut entries = self.entries.write().await;
        let entry = entries.entry(asset_id).or_default();
        if entry.finalized {
            return Err(GraphError::GraphIsFinalized(asset_id));
        }
        entry.finalized = true;
        let total_bps = entry.total_bps;
        drop(entries);

        info!(%asset_id, total_bps, "Graph finalized");
        self.events
            .emit(EngineEvent::GraphFinalized { asset_id })
            .await;
        Ok(())
    }

    pub async fn contributor_edges(&self, asset_id: AssetId) -> Vec<ContributorEdge> {
        let entries = self.entries.read().await;
        entries
            .get(&asset_id)
            .map(|e| e.contributor_edges.clone())
            .unwrap_or_default()
    }

    pub async fn parent_edges(&self, asset_id: AssetId) -> Vec<ParentEdge> {
        let entries = self.entries.read().await;
        entries
            .get(&asset_id)
            .map(|e| e.parent_edges.clone())
            .unwrap_or_default()
    }

    pub async fn total_bps(&self, asset_id: AssetId) -> u32 {
        let entries = self.entries.read().await;
        entries.get(&asset_id).map(|e| e.total_bps).unwrap_or(0)
    }

    pub async fn is_finalized(&self, asset_id: AssetId) -> bool {
        let entries = self.entries.read().await;
        entries.get(&asset_id).map(|e| e.finalized).unwrap_or(false)
    }

    /// Full snapshot of one asset's graph state.
    pub async fn entry(&self, asset_id: AssetId) -> Option<GraphEntry> {
        let entries = self.entries.read().await;
        entries.get(&asset_id).cloned()
    }
}
