//! In-memory `Store` for exercising orchestrator/ledger/guard logic without a
//! live Postgres instance (SPEC_FULL.md section 4.1 ambient note: "tests
//! substitute an in-memory implementation where convenient for property
//! tests of C3/C4 logic that don't need real atomicity guarantees").

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokenmeter_server::db::Store;
use tokenmeter_server::error::{AppError, AppResult};
use tokenmeter_server::models::domain::{
    ConsumptionEntry, DebitOutcome, PaymentTransaction, StatusUpdateOutcome, TransactionStatus, UserBalance,
};

#[derive(Default)]
pub struct MockStore {
    balances: Mutex<HashMap<String, UserBalance>>,
    transactions: Mutex<HashMap<String, PaymentTransaction>>,
    consumption: Mutex<Vec<ConsumptionEntry>>,
    pub credit_calls: AtomicU64,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MockStore {
    async fn get_or_create_balance(&self, user_key: &str, free_grant: i64) -> AppResult<(UserBalance, bool)> {
        let mut balances = self.balances.lock().unwrap();
        if let Some(existing) = balances.get(user_key) {
            return Ok((existing.clone(), false));
        }
        let now = Utc::now();
        let created = UserBalance {
            user_key: user_key.to_string(),
            balance: free_grant,
            total_purchased: free_grant,
            total_consumed: 0,
            last_purchase_at: None,
            created_at: now,
            updated_at: now,
        };
        balances.insert(user_key.to_string(), created.clone());
        Ok((created, true))
    }

    async fn credit(&self, user_key: &str, qty: i64, purchase_at: DateTime<Utc>) -> AppResult<UserBalance> {
        if qty <= 0 {
            return Err(AppError::Validation("credit quantity must be positive".to_string()));
        }
        let mut balances = self.balances.lock().unwrap();
        let entry = balances
            .get_mut(user_key)
            .ok_or_else(|| AppError::UnknownUser(user_key.to_string()))?;
        entry.balance += qty;
        entry.total_purchased += qty;
        entry.last_purchase_at = Some(purchase_at);
        entry.updated_at = Utc::now();
        self.credit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(entry.clone())
    }

    async fn try_debit(&self, user_key: &str, qty: i64) -> AppResult<DebitOutcome> {
        if qty <= 0 {
            return Err(AppError::Validation("debit quantity must be positive".to_string()));
        }
        let mut balances = self.balances.lock().unwrap();
        let entry = balances
            .get_mut(user_key)
            .ok_or_else(|| AppError::UnknownUser(user_key.to_string()))?;
        if entry.balance >= qty {
            entry.balance -= qty;
            entry.total_consumed += qty;
            entry.updated_at = Utc::now();
            Ok(DebitOutcome::Ok { new_balance: entry.balance })
        } else {
            Ok(DebitOutcome::Insufficient { current_balance: entry.balance })
        }
    }

    async fn insert_transaction(&self, tx: &PaymentTransaction) -> AppResult<()> {
        let mut transactions = self.transactions.lock().unwrap();
        if transactions.contains_key(&tx.reference) {
            return Err(AppError::AlreadyExists(format!("reference {} already exists", tx.reference)));
        }
        transactions.insert(tx.reference.clone(), tx.clone());
        Ok(())
    }

    async fn get_transaction(&self, reference: &str) -> AppResult<Option<PaymentTransaction>> {
        Ok(self.transactions.lock().unwrap().get(reference).cloned())
    }

    async fn update_transaction_status(
        &self,
        reference: &str,
        target: TransactionStatus,
        gateway_payload: Option<JsonValue>,
        completed_at: Option<DateTime<Utc>>,
        mark_credited: bool,
    ) -> AppResult<StatusUpdateOutcome> {
        let mut transactions = self.transactions.lock().unwrap();
        let tx = transactions
            .get_mut(reference)
            .ok_or_else(|| AppError::UnknownReference(reference.to_string()))?;

        if tx.status == TransactionStatus::Pending {
            tx.status = target;
            if let Some(payload) = gateway_payload {
                tx.gateway_payload = Some(payload);
            }
            if let Some(completed) = completed_at {
                tx.completed_at = Some(completed);
            }
            tx.credited = tx.credited || mark_credited;
            tx.updated_at = Utc::now();
            return Ok(StatusUpdateOutcome::Applied(tx.clone()));
        }

        if tx.status == target {
            Ok(StatusUpdateOutcome::AlreadyInTargetState(tx.clone()))
        } else {
            Ok(StatusUpdateOutcome::Conflict(tx.clone()))
        }
    }

    async fn sweep_stale_pending(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        let mut transactions = self.transactions.lock().unwrap();
        let mut count = 0;
        for tx in transactions.values_mut() {
            if tx.status == TransactionStatus::Pending && tx.created_at < older_than {
                tx.status = TransactionStatus::Cancelled;
                tx.updated_at = Utc::now();
                count += 1;
            }
        }
        Ok(count)
    }

    async fn append_consumption(&self, entry: &ConsumptionEntry) -> AppResult<()> {
        self.consumption.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list_consumption(&self, user_key: &str, limit: i64) -> AppResult<Vec<ConsumptionEntry>> {
        let mut matching: Vec<ConsumptionEntry> = self
            .consumption
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_key == user_key)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.consumed_at.cmp(&a.consumed_at));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }
}

/// A `PricingConfig` matching spec.md section 8's literal scenario defaults:
/// 2 tokens per 1 money unit, `analysis` costs 10 tokens, free grant 100.
pub fn default_pricing() -> tokenmeter_server::config::PricingConfig {
    use tokenmeter_server::models::domain::ServiceKind;
    let mut service_costs = HashMap::new();
    service_costs.insert(ServiceKind::Analysis, 10);
    service_costs.insert(ServiceKind::Transform, 5);
    service_costs.insert(ServiceKind::PremiumInsights, 25);

    tokenmeter_server::config::PricingConfig {
        currency: "NGN".to_string(),
        tokens_per_unit_money: 2,
        min_purchase_money: "1.00".parse().unwrap(),
        max_purchase_money: "1000000.00".parse().unwrap(),
        free_grant_tokens: 100,
        service_costs,
    }
}
