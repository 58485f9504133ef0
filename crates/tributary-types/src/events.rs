use crate::{AssetId, Principal, UsdAmount};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Externally visible engine events. Emitted exactly once per successful
/// operation, after all state effects and token transfers; a failed
/// operation emits nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    ContributorEdgeAdded {
        asset_id: AssetId,
        contributor: Principal,
        weight_bps: u16,
    },
    ParentEdgeAdded {
        asset_id: AssetId,
        parent_asset_id: AssetId,
        weight_bps: u16,
    },
    GraphFinalized {
        asset_id: AssetId,
    },
    SplitterCreated {
        asset_id: AssetId,
        splitter: Principal,
        payees: Vec<Principal>,
        shares: Vec<u16>,
    },
    ReceiptConsumed {
        asset_id: AssetId,
        user: Principal,
        amount: UsdAmount,
        nonce: u64,
    },
    PaymentHeld {
        payment_id: u64,
        asset_id: AssetId,
        user: Principal,
        amount: UsdAmount,
    },
    DisputeOpened {
        payment_id: u64,
    },
    PaymentReleased {
        payment_id: u64,
        destination: Principal,
    },
    PaymentRefunded {
        payment_id: u64,
        user: Principal,
    },
    FeeUpdated {
        new_fee_bps: u16,
    },
    TreasuryUpdated {
        new_sink: Principal,
    },
    Paused {
        component: String,
        by: Principal,
    },
    Unpaused {
        component: String,
        by: Principal,
    },
}

/// Callback invoked for every emitted event.
pub type EventCallback = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Cloneable fan-out sink shared by all components. Listeners run
/// synchronously so an event is fully delivered before the emitting
/// operation returns.
#[derive(Clone, Default)]
pub struct EventSink {
    listeners: Arc<RwLock<Vec<EventCallback>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, callback: EventCallback) {
        self.listeners.write().await.push(callback);
    }

    pub async fn emit(&self, event: EngineEvent) {
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            listener(event.clone());
        }
    }
}
