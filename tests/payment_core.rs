//! Exercises the token ledger and consumption guard against the in-memory
//! `MockStore`, covering the concrete end-to-end scenarios of spec.md
//! section 8 that don't require a live gateway.

mod common;

use std::sync::Arc;

use common::{default_pricing, MockStore};
use tokenmeter_server::config::PricingConfig;
use tokenmeter_server::db::Store;
use tokenmeter_server::error::AppError;
use tokenmeter_server::models::domain::ServiceKind;
use tokenmeter_server::services::analysis_engine::{AnalysisEngine, NoopAnalysisEngine};
use tokenmeter_server::services::consumption_guard::ConsumptionGuard;
use tokenmeter_server::services::payment_orchestrator::PaymentOrchestrator;
use tokenmeter_server::services::token_ledger::TokenLedger;

fn guard(
    store: Arc<dyn Store>,
    pricing: PricingConfig,
) -> (Arc<TokenLedger>, ConsumptionGuard<Arc<dyn AnalysisEngine>>) {
    let ledger = Arc::new(TokenLedger::new(store.clone(), pricing.free_grant_tokens));
    let engine: Arc<dyn AnalysisEngine> = Arc::new(NoopAnalysisEngine);
    let guard = ConsumptionGuard::new(ledger.clone(), store, pricing, engine);
    (ledger, guard)
}

/// Scenario 1: new user's first balance lookup applies the free grant
/// exactly once, then `analyze` debits the service cost.
#[tokio::test]
async fn first_use_grant_then_consume() {
    let store: Arc<dyn Store> = Arc::new(MockStore::new());
    let pricing = default_pricing();
    let (ledger, guard) = guard(store.clone(), pricing);

    let balance = ledger.balance_of("u1").await.unwrap();
    assert_eq!(balance.balance, 100);
    assert_eq!(balance.total_purchased, 100);
    assert_eq!(balance.total_consumed, 0);

    // A second lookup must not re-apply the grant.
    let balance_again = ledger.balance_of("u1").await.unwrap();
    assert_eq!(balance_again.total_purchased, 100);

    let (result, usage) = guard
        .consume("u1", ServiceKind::Analysis, None, None, || async {
            Ok::<_, AppError>(guard.engine().analyze("work-1").await?)
        })
        .await
        .unwrap();

    assert!(result.is_object());
    assert_eq!(usage.tokens_consumed, 10);
    assert_eq!(usage.remaining_balance, 90);

    let history = ledger.consumption_history("u1", 50).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].token_qty, 10);
}

/// Scenario 4: three concurrent `analyze` calls against a balance of 25
/// (cost 10 each) — exactly two succeed, one fails with `InsufficientTokens`,
/// and the consumption log only grows for the calls that actually ran.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_analyses_exhausting_balance() {
    let store: Arc<dyn Store> = Arc::new(MockStore::new());
    // Seed the balance directly below the default free grant so the numbers
    // in spec.md's scenario 4 apply verbatim.
    store.get_or_create_balance("u3", 25).await.unwrap();

    let pricing = default_pricing();
    let ledger = Arc::new(TokenLedger::new(store.clone(), pricing.free_grant_tokens));
    let engine: Arc<dyn AnalysisEngine> = Arc::new(NoopAnalysisEngine);
    let guard = Arc::new(ConsumptionGuard::new(ledger.clone(), store.clone(), pricing, engine));

    let mut handles = Vec::new();
    for i in 0..3 {
        let guard = guard.clone();
        handles.push(tokio::spawn(async move {
            guard
                .consume("u3", ServiceKind::Analysis, Some(format!("job-{i}")), None, || async {
                    Ok::<_, AppError>(serde_json::json!({ "ok": true }))
                })
                .await
        }));
    }

    let mut successes = 0;
    let mut failures = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::InsufficientTokens { required, current }) => {
                assert_eq!(required, 10);
                assert_eq!(current, 5);
                failures += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 2);
    assert_eq!(failures, 1);

    let balance = ledger.balance_of("u3").await.unwrap();
    assert_eq!(balance.balance, 5);
    assert_eq!(balance.total_consumed, 20);

    let history = ledger.consumption_history("u3", 50).await.unwrap();
    assert_eq!(history.len(), 2);
}

/// Scenario 6: a purchase below the configured minimum is rejected before
/// any transaction row is written.
#[tokio::test]
async fn purchase_amount_out_of_range_creates_no_transaction() {
    let store: Arc<dyn Store> = Arc::new(MockStore::new());
    // min_purchase_money raised to 50.00 so a small, evenly-divisible
    // token_qty (2 tokens -> 1.00) lands below the floor, isolating the
    // range check from the divisibility check exercised elsewhere.
    let mut pricing = default_pricing();
    pricing.min_purchase_money = "50.00".parse().unwrap();
    let gateway_config = tokenmeter_server::config::settings::GatewayConfig {
        client_id: "client".to_string(),
        secret_key: "secret".to_string(),
        merchant_code: "MERCH".to_string(),
        pay_item_id: "ITEM".to_string(),
        mode: tokenmeter_server::config::settings::GatewayMode::Test,
        token_base_url: "https://gateway.test".to_string(),
        checkout_base_url: "https://gateway.test/checkout".to_string(),
        api_base_url: "https://gateway.test".to_string(),
    };
    let gateway = Arc::new(tokenmeter_server::services::gateway_client::GatewayClient::new(
        gateway_config.clone(),
        reqwest::Client::new(),
    ));
    let ledger = Arc::new(TokenLedger::new(store.clone(), pricing.free_grant_tokens));
    let orchestrator = PaymentOrchestrator::new(
        store.clone(),
        ledger,
        gateway,
        pricing,
        gateway_config,
        "https://app.test/return".to_string(),
        3600,
    );

    // token_qty=2 -> amount=1.00, well below the 50.00 minimum.
    let err = orchestrator.purchase("u6", 2, "NGN").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Validation fails before the balance row would be created or a
    // reference generated, so `u6` must still be entirely unobserved.
    let (_, was_created) = store.get_or_create_balance("u6", 1).await.unwrap();
    assert!(was_created, "purchase must not have touched the store before failing validation");
}
