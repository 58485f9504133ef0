//! Cross-component invariants that must always hold.

use k256::ecdsa::SigningKey;
use std::sync::Arc;
use tributary_engine::{EngineConfig, RoyaltyEngine};
use tributary_graph::MemoryAssetDirectory;
use tributary_receipts::{principal_from_verifying_key, sign_receipt, UsageReceipt};
use tributary_token::{MemoryToken, SettlementToken};
use tributary_types::{AssetId, Principal, RoleId, UsdAmount};

fn p(byte: u8) -> Principal {
    Principal::from_bytes([byte; 20])
}

fn user_key(tag: u8) -> SigningKey {
    let mut bytes = [0u8; 32];
    bytes[31] = tag;
    SigningKey::from_slice(&bytes).unwrap()
}

struct World {
    engine: RoyaltyEngine,
    token: Arc<MemoryToken>,
    directory: Arc<MemoryAssetDirectory>,
    admin: Principal,
    owner: Principal,
    gateway: Principal,
}

async fn world() -> World {
    let admin = p(1);
    let owner = p(2);
    let gateway = p(3);

    let (engine, token, directory) =
        RoyaltyEngine::in_memory(EngineConfig::default(), admin).await.unwrap();
    engine
        .grant_role(admin, RoleId::verifier(), gateway)
        .await
        .unwrap();

    World {
        engine,
        token,
        directory,
        admin,
        owner,
        gateway,
    }
}

/// Invariants 1 & 2: total_bps always equals the sum over both edge kinds
/// and never exceeds 10000, whatever the mutation order.
#[tokio::test]
async fn test_total_bps_matches_edge_sum() {
    let w = world().await;
    let asset = AssetId::new(1);
    w.directory.register(asset, w.owner).await.unwrap();
    w.directory.register(AssetId::new(2), w.owner).await.unwrap();

    let weights = [500u16, 1500, 2500, 3000, 1000];
    for (i, weight) in weights.iter().enumerate() {
        let contributor = p(0x10 + i as u8);
        w.engine
            .grant_role(w.admin, RoleId::contributor(), contributor)
            .await
            .unwrap();
        if i % 2 == 0 {
            w.engine
                .add_contributor_edge(w.owner, asset, contributor, *weight)
                .await
                .unwrap();
        } else {
            w.engine
                .add_parent_edge(w.owner, asset, AssetId::new(2), *weight)
                .await
                .unwrap();
        }

        let entry = w.engine.graph_entry(asset).await.unwrap();
        let edge_sum: u32 = entry
            .contributor_edges
            .iter()
            .map(|e| e.weight_bps as u32)
            .sum::<u32>()
            + entry
                .parent_edges
                .iter()
                .map(|e| e.weight_bps as u32)
                .sum::<u32>();
        assert_eq!(entry.total_bps, edge_sum);
        assert!(entry.total_bps <= 10_000);
    }

    // 8500 so far; pushing past the ceiling must fail and change nothing.
    let extra = p(0x20);
    w.engine
        .grant_role(w.admin, RoleId::contributor(), extra)
        .await
        .unwrap();
    assert!(w
        .engine
        .add_contributor_edge(w.owner, asset, extra, 1501)
        .await
        .is_err());
    assert_eq!(w.engine.total_bps(asset).await, 8500);
}

/// Invariant 3: a finalized graph accepts no further mutation.
#[tokio::test]
async fn test_finalized_graph_is_immutable() {
    let w = world().await;
    let asset = AssetId::new(1);
    let contributor = p(0xaa);
    w.directory.register(asset, w.owner).await.unwrap();
    w.engine
        .grant_role(w.admin, RoleId::contributor(), contributor)
        .await
        .unwrap();

    w.engine
        .add_contributor_edge(w.owner, asset, contributor, 4000)
        .await
        .unwrap();
    w.engine.finalize_graph(w.owner, asset).await.unwrap();

    let before = w.engine.graph_entry(asset).await.unwrap();
    assert!(w
        .engine
        .add_contributor_edge(w.owner, asset, contributor, 100)
        .await
        .is_err());
    assert!(w
        .engine
        .add_parent_edge(w.owner, asset, asset, 100)
        .await
        .is_err());

    let after = w.engine.graph_entry(asset).await.unwrap();
    assert_eq!(after.contributor_edges.len(), before.contributor_edges.len());
    assert_eq!(after.total_bps, before.total_bps);
}

/// Invariant 4: nonces advance by exactly one per accepted receipt and
/// never move on a rejected one.
#[tokio::test]
async fn test_nonce_monotonicity() {
    let w = world().await;
    let asset = AssetId::new(1);
    let contributor = p(0xaa);
    w.directory.register(asset, w.owner).await.unwrap();
    w.engine
        .grant_role(w.admin, RoleId::contributor(), contributor)
        .await
        .unwrap();
    w.engine
        .add_contributor_edge(w.owner, asset, contributor, 10_000)
        .await
        .unwrap();
    w.engine.finalize_graph(w.owner, asset).await.unwrap();
    w.engine.create_splitter(asset).await.unwrap();

    let key = user_key(9);
    let user = principal_from_verifying_key(key.verifying_key());
    let amount = UsdAmount::from_usd(5.0);

    for round in 0u64..4 {
        w.token.mint(user, amount).await.unwrap();
        w.token.approve(user, w.engine.verifier_address(), amount).await;

        // Wrong nonce first: must be rejected without advancing.
        let bad = UsageReceipt {
            asset_id: asset,
            amount,
            user,
            nonce: round + 1,
            deadline: w.engine.clock().now() + 600,
        };
        let bad_sig = sign_receipt(&key, w.engine.receipt_domain(), &bad).unwrap();
        assert!(w.engine.verify_and_pay(w.gateway, &bad, &bad_sig).await.is_err());
        assert_eq!(w.engine.nonce_of(user).await, round);

        let good = UsageReceipt { nonce: round, ..bad };
        let good_sig = sign_receipt(&key, w.engine.receipt_domain(), &good).unwrap();
        w.engine
            .verify_and_pay(w.gateway, &good, &good_sig)
            .await
            .unwrap();
        assert_eq!(w.engine.nonce_of(user).await, round + 1);
    }
}

/// Invariant 5: payment statuses never skip or revisit a state.
#[tokio::test]
async fn test_status_machine_has_no_shortcuts() {
    let w = world().await;
    let asset = AssetId::new(1);
    let contributor = p(0xaa);
    let arbiter = p(4);
    w.directory.register(asset, w.owner).await.unwrap();
    w.engine
        .grant_role(w.admin, RoleId::contributor(), contributor)
        .await
        .unwrap();
    w.engine
        .grant_role(w.admin, RoleId::arbiter(), arbiter)
        .await
        .unwrap();
    w.engine
        .add_contributor_edge(w.owner, asset, contributor, 10_000)
        .await
        .unwrap();
    w.engine.finalize_graph(w.owner, asset).await.unwrap();
    w.engine.create_splitter(asset).await.unwrap();

    let key = user_key(9);
    let user = principal_from_verifying_key(key.verifying_key());

    async fn hold(w: &World, key: &SigningKey, asset: AssetId, nonce: u64) -> u64 {
        let user = principal_from_verifying_key(key.verifying_key());
        let amount = UsdAmount::from_usd(10.0);
        w.token.mint(user, amount).await.unwrap();
        w.token.approve(user, w.engine.verifier_address(), amount).await;
        let receipt = UsageReceipt {
            asset_id: asset,
            amount,
            user,
            nonce,
            deadline: w.engine.clock().now() + 600,
        };
        let sig = sign_receipt(key, w.engine.receipt_domain(), &receipt).unwrap();
        w.engine.verify_and_pay(w.gateway, &receipt, &sig).await.unwrap()
    }

    // Held -> Disputed -> Refunded; all other exits must fail.
    let a = hold(&w, &key, asset, 0).await;
    w.engine.open_dispute(user, a).await.unwrap();
    assert!(w.engine.open_dispute(user, a).await.is_err());
    w.engine.resolve_dispute(arbiter, a, true).await.unwrap();
    assert!(w.engine.resolve_dispute(arbiter, a, true).await.is_err());
    assert!(w.engine.release_payment(a).await.is_err());
    assert!(w.engine.open_dispute(user, a).await.is_err());

    // Held -> Released is terminal too.
    let b = hold(&w, &key, asset, 1).await;
    w.engine.clock().advance(259_201);
    w.engine.release_payment(b).await.unwrap();
    assert!(w.engine.release_payment(b).await.is_err());
    assert!(w.engine.open_dispute(user, b).await.is_err());
    assert!(w.engine.resolve_dispute(arbiter, b, false).await.is_err());
}

/// Invariant 6: on release, treasury + splitter receipts equal the held
/// amount exactly, with the treasury getting the floored fee.
#[tokio::test]
async fn test_release_conserves_amount() {
    let w = world().await;
    let asset = AssetId::new(1);
    let contributor = p(0xaa);
    w.directory.register(asset, w.owner).await.unwrap();
    w.engine
        .grant_role(w.admin, RoleId::contributor(), contributor)
        .await
        .unwrap();
    w.engine
        .add_contributor_edge(w.owner, asset, contributor, 10_000)
        .await
        .unwrap();
    w.engine.finalize_graph(w.owner, asset).await.unwrap();
    w.engine.create_splitter(asset).await.unwrap();

    let key = user_key(9);
    let user = principal_from_verifying_key(key.verifying_key());
    // Awkward amount so the fee floors.
    let amount = UsdAmount::from_base_units(1_000_003);
    w.token.mint(user, amount).await.unwrap();
    w.token.approve(user, w.engine.verifier_address(), amount).await;

    let receipt = UsageReceipt {
        asset_id: asset,
        amount,
        user,
        nonce: 0,
        deadline: w.engine.clock().now() + 600,
    };
    let sig = sign_receipt(&key, w.engine.receipt_domain(), &receipt).unwrap();
    let id = w.engine.verify_and_pay(w.gateway, &receipt, &sig).await.unwrap();

    w.engine.clock().advance(259_201);
    w.engine.release_payment(id).await.unwrap();

    let sink = w.engine.treasury_sink().await;
    let splitter = w.engine.splitter_of(asset).await.unwrap();
    let to_treasury = w.token.balance_of(sink).await;
    let to_splitter = w.token.balance_of(splitter.address()).await;

    // floor(1_000_003 * 250 / 10_000) = 25_000
    assert_eq!(to_treasury.to_base_units(), 25_000);
    assert_eq!(to_treasury.saturating_add(to_splitter), amount);
}

/// Invariant 7: splitter share sums, and the custody invariant that the
/// escrow balance covers all outstanding payments.
#[tokio::test]
async fn test_splitter_shares_and_escrow_custody() {
    let w = world().await;
    let asset = AssetId::new(1);
    w.directory.register(asset, w.owner).await.unwrap();

    let weights = [4500u16, 3000, 1500];
    for (i, weight) in weights.iter().enumerate() {
        let contributor = p(0x30 + i as u8);
        w.engine
            .grant_role(w.admin, RoleId::contributor(), contributor)
            .await
            .unwrap();
        w.engine
            .add_contributor_edge(w.owner, asset, contributor, *weight)
            .await
            .unwrap();
    }
    w.engine.finalize_graph(w.owner, asset).await.unwrap();
    let splitter = w.engine.create_splitter(asset).await.unwrap();

    let share_sum: u32 = splitter
        .payees()
        .iter()
        .map(|payee| splitter.shares(*payee) as u32)
        .sum();
    assert_eq!(share_sum, splitter.total_shares());
    assert!(splitter.total_shares() >= 1);

    // Two held payments; custody must cover both.
    let key = user_key(9);
    let user = principal_from_verifying_key(key.verifying_key());
    let amount = UsdAmount::from_usd(20.0);
    for nonce in 0u64..2 {
        w.token.mint(user, amount).await.unwrap();
        w.token.approve(user, w.engine.verifier_address(), amount).await;
        let receipt = UsageReceipt {
            asset_id: asset,
            amount,
            user,
            nonce,
            deadline: w.engine.clock().now() + 600,
        };
        let sig = sign_receipt(&key, w.engine.receipt_domain(), &receipt).unwrap();
        w.engine.verify_and_pay(w.gateway, &receipt, &sig).await.unwrap();
    }

    let stats = w.engine.escrow_stats().await;
    assert_eq!(stats.held, 2);
    let escrow_balance = w.token.balance_of(w.engine.escrow_address()).await;
    assert!(escrow_balance >= stats.escrowed_total);
}
