use crate::config::EngineConfig;
use crate::error::Result;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::info;
use tributary_access::{PauseFlag, RolesGate};
use tributary_escrow::{Escrow, EscrowStats, EscrowedPayment, FeeTreasury};
use tributary_graph::{
    AssetDirectory, ContributorEdge, GraphEntry, MemoryAssetDirectory, ParentEdge,
    ProvenanceGraph,
};
use tributary_receipts::{ReceiptVerifier, TypedDomain, UsageReceipt};
use tributary_splitter::{PaymentSplitter, SplitterFactory};
use tributary_token::{MemoryToken, SettlementToken};
use tributary_types::{
    AssetId, Clock, EngineEvent, EventCallback, EventSink, Principal, RoleId, UsdAmount,
};

/// Pausable engine components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Graph,
    Splitter,
    Verifier,
    Escrow,
}

/// The assembled revenue-sharing engine.
///
/// All state-changing entry points run under one operation lock, so every
/// public operation executes atomically relative to every other; there is
/// no interleaving a caller can observe. Reads take consistent snapshots
/// and skip the lock.
pub struct RoyaltyEngine {
    config: EngineConfig,
    clock: Clock,
    events: EventSink,
    journal: Arc<StdMutex<Vec<EngineEvent>>>,
    token: Arc<dyn SettlementToken>,
    roles: Arc<RolesGate>,
    graph: Arc<ProvenanceGraph>,
    factory: Arc<SplitterFactory>,
    treasury: Arc<FeeTreasury>,
    escrow: Arc<Escrow>,
    verifier: Arc<ReceiptVerifier>,
    op_lock: Mutex<()>,
}

impl RoyaltyEngine {
    /// Wire the full component stack. `root_admin` is seeded with
    /// `DEFAULT_ADMIN`; the verifier's own principal is granted
    /// `VERIFIER` so its escrow hand-off is authorized.
    pub async fn new(
        config: EngineConfig,
        token: Arc<dyn SettlementToken>,
        directory: Arc<dyn AssetDirectory>,
        root_admin: Principal,
    ) -> Result<Self> {
        config.validate()?;

        let clock = Clock::new();
        let events = EventSink::new();
        let roles = Arc::new(RolesGate::new(root_admin));

        let journal: Arc<StdMutex<Vec<EngineEvent>>> = Arc::new(StdMutex::new(Vec::new()));
        {
            let journal = journal.clone();
            events
                .subscribe(Arc::new(move |event| {
                    journal.lock().expect("journal poisoned").push(event);
                }))
                .await;
        }

        let graph = Arc::new(ProvenanceGraph::new(
            directory,
            roles.clone(),
            PauseFlag::new("graph", roles.clone(), events.clone()),
            events.clone(),
        ));
        let factory = Arc::new(SplitterFactory::new(
            graph.clone(),
            PauseFlag::new("splitter", roles.clone(), events.clone()),
            events.clone(),
        ));
        let treasury = Arc::new(FeeTreasury::new(
            roles.clone(),
            events.clone(),
            config.fee_bps,
            config.treasury_sink()?,
        )?);
        let escrow = Arc::new(Escrow::new(
            config.dispute_window_seconds,
            token.clone(),
            treasury.clone(),
            roles.clone(),
            PauseFlag::new("escrow", roles.clone(), events.clone()),
            events.clone(),
            clock.clone(),
        ));
        let verifier = Arc::new(ReceiptVerifier::new(
            config.eip712_name.clone(),
            config.eip712_version.clone(),
            config.chain_id,
            token.clone(),
            factory.clone(),
            escrow.clone(),
            roles.clone(),
            PauseFlag::new("verifier", roles.clone(), events.clone()),
            events.clone(),
            clock.clone(),
        ));
        roles
            .grant(root_admin, RoleId::verifier(), verifier.address())
            .await?;

        info!(
            chain_id = config.chain_id,
            dispute_window_seconds = config.dispute_window_seconds,
            fee_bps = config.fee_bps,
            verifier = %verifier.address(),
            escrow = %escrow.address(),
            "Royalty engine assembled"
        );

        Ok(Self {
            config,
            clock,
            events,
            journal,
            token,
            roles,
            graph,
            factory,
            treasury,
            escrow,
            verifier,
            op_lock: Mutex::new(()),
        })
    }

    /// Engine backed by in-memory token and directory instances, for
    /// tests and single-process deployments.
    pub async fn in_memory(
        config: EngineConfig,
        root_admin: Principal,
    ) -> Result<(Self, Arc<MemoryToken>, Arc<MemoryAssetDirectory>)> {
        let token = Arc::new(MemoryToken::new());
        let directory = Arc::new(MemoryAssetDirectory::new());
        let engine = Self::new(config, token.clone(), directory.clone(), root_admin).await?;
        Ok((engine, token, directory))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    // ---- roles & pause ---------------------------------------------------

    pub async fn grant_role(
        &self,
        caller: Principal,
        role: RoleId,
        principal: Principal,
    ) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.roles.grant(caller, role, principal).await?;
        Ok(())
    }

    pub async fn revoke_role(
        &self,
        caller: Principal,
        role: RoleId,
        principal: Principal,
    ) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.roles.revoke(caller, role, principal).await?;
        Ok(())
    }

    pub async fn has_role(&self, role: RoleId, principal: Principal) -> bool {
        self.roles.has(role, principal).await
    }

    fn pause_flag(&self, component: Component) -> &PauseFlag {
        match component {
            Component::Graph => self.graph.pause_flag(),
            Component::Splitter => self.factory.pause_flag(),
            Component::Verifier => self.verifier.pause_flag(),
            Component::Escrow => self.escrow.pause_flag(),
        }
    }

    pub async fn pause(&self, caller: Principal, component: Component) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.pause_flag(component).pause(caller).await?;
        Ok(())
    }

    pub async fn unpause(&self, caller: Principal, component: Component) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.pause_flag(component).unpause(caller).await?;
        Ok(())
    }

    pub async fn is_paused(&self, component: Component) -> bool {
        self.pause_flag(component).is_paused().await
    }

    // ---- provenance graph ------------------------------------------------

    pub async fn add_contributor_edge(
        &self,
        caller: Principal,
        asset_id: AssetId,
        contributor: Principal,
        weight_bps: u16,
    ) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.graph
            .add_contributor_edge(caller, asset_id, contributor, weight_bps)
            .await?;
        Ok(())
    }

    pub async fn add_parent_edge(
        &self,
        caller: Principal,
        asset_id: AssetId,
        parent_asset_id: AssetId,
        weight_bps: u16,
    ) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.graph
            .add_parent_edge(caller, asset_id, parent_asset_id, weight_bps)
            .await?;
        Ok(())
    }

    pub async fn finalize_graph(&self, caller: Principal, asset_id: AssetId) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.graph.finalize(caller, asset_id).await?;
        Ok(())
    }

    pub async fn contributor_edges(&self, asset_id: AssetId) -> Vec<ContributorEdge> {
        self.graph.contributor_edges(asset_id).await
    }

    pub async fn parent_edges(&self, asset_id: AssetId) -> Vec<ParentEdge> {
        self.graph.parent_edges(asset_id).await
    }

    pub async fn total_bps(&self, asset_id: AssetId) -> u32 {
        self.graph.total_bps(asset_id).await
    }

    pub async fn is_finalized(&self, asset_id: AssetId) -> bool {
        self.graph.is_finalized(asset_id).await
    }

    pub async fn graph_entry(&self, asset_id: AssetId) -> Option<GraphEntry> {
        self.graph.entry(asset_id).await
    }

    // ---- splitters -------------------------------------------------------

    pub async fn create_splitter(&self, asset_id: AssetId) -> Result<Arc<PaymentSplitter>> {
        let _guard = self.op_lock.lock().await;
        Ok(self.factory.create_splitter(asset_id).await?)
    }

    pub async fn splitter_of(&self, asset_id: AssetId) -> Option<Arc<PaymentSplitter>> {
        self.factory.splitter_of(asset_id).await
    }

    /// Withdraw `payee`'s accrued share from an asset's splitter.
    pub async fn release_share(&self, asset_id: AssetId, payee: Principal) -> Result<UsdAmount> {
        let _guard = self.op_lock.lock().await;
        let splitter = self
            .factory
            .splitter_of(asset_id)
            .await
            .ok_or(tributary_receipts::ReceiptError::SplitterNotCreated(asset_id))?;
        Ok(splitter.release(self.token.as_ref(), payee).await?)
    }

    pub async fn pending_share(&self, asset_id: AssetId, payee: Principal) -> Result<UsdAmount> {
        let splitter = self
            .factory
            .splitter_of(asset_id)
            .await
            .ok_or(tributary_receipts::ReceiptError::SplitterNotCreated(asset_id))?;
        Ok(splitter.pending(self.token.as_ref(), payee).await?)
    }

    // ---- fees & treasury -------------------------------------------------

    pub async fn set_fee_bps(&self, caller: Principal, new_bps: u16) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.treasury.set_fee_bps(caller, new_bps).await?;
        Ok(())
    }

    pub async fn set_treasury_sink(&self, caller: Principal, new_sink: Principal) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.treasury.set_treasury_sink(caller, new_sink).await?;
        Ok(())
    }

    pub async fn fee_bps(&self) -> u16 {
        self.treasury.fee_bps().await
    }

    pub async fn treasury_sink(&self) -> Principal {
        self.treasury.treasury_sink().await
    }

    // ---- receipts & payments ---------------------------------------------

    /// The domain external signers must use.
    pub fn receipt_domain(&self) -> &TypedDomain {
        self.verifier.domain()
    }

    /// The allowance spender payers must approve.
    pub fn verifier_address(&self) -> Principal {
        self.verifier.address()
    }

    pub fn escrow_address(&self) -> Principal {
        self.escrow.address()
    }

    pub async fn nonce_of(&self, user: Principal) -> u64 {
        self.verifier.nonce_of(user).await
    }

    pub async fn verify_and_pay(
        &self,
        caller: Principal,
        receipt: &UsageReceipt,
        signature: &[u8; 65],
    ) -> Result<u64> {
        let _guard = self.op_lock.lock().await;
        Ok(self.verifier.verify_and_pay(caller, receipt, signature).await?)
    }

    pub async fn release_payment(&self, payment_id: u64) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.escrow.release(payment_id).await?;
        Ok(())
    }

    pub async fn open_dispute(&self, caller: Principal, payment_id: u64) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.escrow.open_dispute(caller, payment_id).await?;
        Ok(())
    }

    pub async fn resolve_dispute(
        &self,
        caller: Principal,
        payment_id: u64,
        refund_to_user: bool,
    ) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.escrow
            .resolve_dispute(caller, payment_id, refund_to_user)
            .await?;
        Ok(())
    }

    pub async fn payment(&self, payment_id: u64) -> Option<EscrowedPayment> {
        self.escrow.payment(payment_id).await
    }

    pub async fn payments_for_asset(&self, asset_id: AssetId) -> Vec<EscrowedPayment> {
        self.escrow.payments_for_asset(asset_id).await
    }

    pub async fn escrow_stats(&self) -> EscrowStats {
        self.escrow.stats().await
    }

    // ---- events ----------------------------------------------------------

    pub async fn subscribe_events(&self, callback: EventCallback) {
        self.events.subscribe(callback).await;
    }

    /// Events emitted so far, oldest first.
    pub fn recent_events(&self) -> Vec<EngineEvent> {
        self.journal.lock().expect("journal poisoned").clone()
    }
}
