//! Walks one payment through the full lifecycle: graph build-up,
//! finalization, splitter creation, receipt verification, escrow, and
//! pro-rata withdrawal.
//!
//! Run with: `cargo run --example end_to_end -p tributary-engine`

use anyhow::Result;
use k256::ecdsa::SigningKey;
use tributary_engine::{init_logging, EngineConfig, RoyaltyEngine};
use tributary_receipts::{principal_from_verifying_key, sign_receipt, UsageReceipt};
use tributary_token::SettlementToken;
use tributary_types::{AssetId, Principal, RoleId, UsdAmount};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("info");

    let admin = Principal::from_bytes([1; 20]);
    let owner = Principal::from_bytes([2; 20]);
    let gateway = Principal::from_bytes([3; 20]);
    let annotator = Principal::from_bytes([0xaa; 20]);
    let curator = Principal::from_bytes([0xbb; 20]);

    let (engine, token, directory) =
        RoyaltyEngine::in_memory(EngineConfig::default(), admin).await?;

    engine.grant_role(admin, RoleId::verifier(), gateway).await?;
    engine.grant_role(admin, RoleId::contributor(), annotator).await?;
    engine.grant_role(admin, RoleId::contributor(), curator).await?;

    // A dataset with two contributors at 80/20.
    let dataset = AssetId::new(1);
    directory.register(dataset, owner).await?;
    engine.add_contributor_edge(owner, dataset, annotator, 8000).await?;
    engine.add_contributor_edge(owner, dataset, curator, 2000).await?;
    engine.finalize_graph(owner, dataset).await?;
    engine.create_splitter(dataset).await?;

    // The payer signs a usage receipt off-chain.
    let mut key_bytes = [0u8; 32];
    key_bytes[31] = 0x5a;
    let payer_key = SigningKey::from_slice(&key_bytes)?;
    let payer = principal_from_verifying_key(payer_key.verifying_key());

    let amount = UsdAmount::from_usd(100.0);
    token.mint(payer, amount).await?;
    token.approve(payer, engine.verifier_address(), amount).await;

    let receipt = UsageReceipt {
        asset_id: dataset,
        amount,
        user: payer,
        nonce: 0,
        deadline: engine.clock().now() + 3600,
    };
    let signature = sign_receipt(&payer_key, engine.receipt_domain(), &receipt)?;

    let payment_id = engine.verify_and_pay(gateway, &receipt, &signature).await?;
    println!("payment {payment_id} held, escrow stats: {:?}", engine.escrow_stats().await);

    // Fast-forward past the dispute window and release.
    engine.clock().advance(engine.config().dispute_window_seconds + 1);
    engine.release_payment(payment_id).await?;

    let annotator_cut = engine.release_share(dataset, annotator).await?;
    let curator_cut = engine.release_share(dataset, curator).await?;
    println!("annotator received {annotator_cut}, curator received {curator_cut}");
    println!(
        "treasury sink holds {}",
        token.balance_of(engine.treasury_sink().await).await
    );

    Ok(())
}
