use std::sync::Arc;
use std::future::Future;

use chrono::Utc;
use uuid::Uuid;

use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::domain::{ConsumptionEntry, DebitOutcome, ServiceKind};
use crate::services::analysis_engine::AnalysisEngine;
use crate::services::pricing_policy::PricingPolicy;
use crate::services::token_ledger::TokenLedger;
use crate::config::PricingConfig;

pub struct UsageInfo {
    pub tokens_consumed: i64,
    pub remaining_balance: i64,
}

/// Wraps any paid operation (spec section 4.6): debit first, then perform
/// the work, bookkeeping the consumption only on success. `Engine` is the
/// opaque external `AnalysisEngine` collaborator; generic so the guard has
/// no knowledge of what the engine actually does.
pub struct ConsumptionGuard<Engine> {
    ledger: Arc<TokenLedger>,
    store: Arc<dyn Store>,
    pricing: PricingConfig,
    engine: Engine,
}

impl<Engine> ConsumptionGuard<Engine>
where
    Engine: AsRef<dyn AnalysisEngine> + Send + Sync,
{
    pub fn new(ledger: Arc<TokenLedger>, store: Arc<dyn Store>, pricing: PricingConfig, engine: Engine) -> Self {
        Self {
            ledger,
            store,
            pricing,
            engine,
        }
    }

    pub fn engine(&self) -> &dyn AnalysisEngine {
        self.engine.as_ref()
    }

    /// Debits `cost_of(service_kind)` atomically, then if and only if
    /// sufficient, runs `do_work`. The debit is never automatically reversed
    /// if `do_work` fails (spec section 4.6 rationale: external resources
    /// may already have been spent; compensation is a deliberate operator
    /// action).
    pub async fn consume<F, Fut, T, E>(
        &self,
        user_key: &str,
        service_kind: ServiceKind,
        work_item_id: Option<String>,
        description: Option<String>,
        do_work: F,
    ) -> Result<(T, UsageInfo), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AppError>,
    {
        let policy = PricingPolicy::new(&self.pricing);
        let cost = policy.cost_of(service_kind).map_err(E::from)?;

        let debit_outcome = self.ledger.debit(user_key, cost).await.map_err(E::from)?;
        let new_balance = match debit_outcome {
            DebitOutcome::Ok { new_balance } => new_balance,
            DebitOutcome::Insufficient { current_balance } => {
                return Err(E::from(AppError::InsufficientTokens {
                    required: cost,
                    current: current_balance,
                }));
            }
        };

        let result = do_work().await?;

        let entry = ConsumptionEntry {
            id: Uuid::new_v4(),
            user_key: user_key.to_string(),
            token_qty: cost,
            service_kind,
            work_item_id,
            description,
            consumed_at: Utc::now(),
        };
        self.store.append_consumption(&entry).await.map_err(E::from)?;

        Ok((
            result,
            UsageInfo {
                tokens_consumed: cost,
                remaining_balance: new_balance,
            },
        ))
    }
}
