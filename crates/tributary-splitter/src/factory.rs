use crate::error::{Result, SplitterError};
use crate::splitter::{PaymentSplitter, SplitterRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tributary_access::PauseFlag;
use tributary_graph::ProvenanceGraph;
use tributary_types::{AssetId, EngineEvent, EventSink, Principal, BPS_DENOMINATOR};

/// One-shot materialization of finalized graphs into immutable payment
/// splitters. Exactly one splitter may ever exist per asset.
pub struct SplitterFactory {
    graph: Arc<ProvenanceGraph>,
    pause: PauseFlag,
    events: EventSink,
    splitters: Arc<RwLock<HashMap<AssetId, Arc<PaymentSplitter>>>>,
}

impl SplitterFactory {
    pub fn new(graph: Arc<ProvenanceGraph>, pause: PauseFlag, events: EventSink) -> Self {
        Self {
            graph,
            pause,
            events,
            splitters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn pause_flag(&self) -> &PauseFlag {
        &self.pause
    }

    /// Snapshot `asset_id`'s contributor edges into a splitter. Parent
    /// edges are provenance metadata and never become payees.
    pub async fn create_splitter(&self, asset_id: AssetId) -> Result<Arc<PaymentSplitter>> {
        self.pause.ensure_active().await?;

        if !self.graph.is_finalized(asset_id).await {
            return Err(SplitterError::GraphNotFinalized(asset_id));
        }

        let edges = self.graph.contributor_edges(asset_id).await;
        if edges.is_empty() {
            return Err(SplitterError::NoContributors(asset_id));
        }

        let mut splitters = self.splitters.write().await;
        if splitters.contains_key(&asset_id) {
            return Err(SplitterError::SplitterAlreadyExists(asset_id));
        }

        let payees: Vec<Principal> = edges.iter().map(|e| e.contributor).collect();
        let shares: Vec<u16> = edges.iter().map(|e| e.weight_bps).collect();
        let total_shares: u32 = shares.iter().map(|w| *w as u32).sum();
        let address = Principal::derived("tributary/splitter", &asset_id.value().to_be_bytes());

        if total_shares < BPS_DENOMINATOR {
            // Raw weights are kept; payouts divide by total_shares, so
            // each payee's slice is larger than its nominal bps suggests.
            warn!(
                %asset_id,
                total_shares,
                "Splitter created with under-allocated shares"
            );
        }

        let record = SplitterRecord {
            asset_id,
            address,
            payees: payees.clone(),
            shares: shares.clone(),
            total_shares,
        };
        let splitter = Arc::new(PaymentSplitter::new(record));
        splitters.insert(asset_id, splitter.clone());
        drop(splitters);

        info!(
            %asset_id,
            splitter = %address,
            payee_count = payees.len(),
            total_shares,
            "Splitter created"
        );
        self.events
            .emit(EngineEvent::SplitterCreated {
                asset_id,
                splitter: address,
                payees,
                shares,
            })
            .await;
        Ok(splitter)
    }

    pub async fn splitter_of(&self, asset_id: AssetId) -> Option<Arc<PaymentSplitter>> {
        let splitters = self.splitters.read().await;
        splitters.get(&asset_id).cloned()
    }
}
