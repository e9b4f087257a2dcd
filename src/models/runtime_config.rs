use std::sync::Arc;

use crate::config::AppSettings;
use crate::services::analysis_engine::AnalysisEngine;
use crate::services::consumption_guard::ConsumptionGuard;
use crate::services::payment_orchestrator::PaymentOrchestrator;
use crate::services::token_ledger::TokenLedger;

/// Shared application state injected into every handler via `web::Data`.
/// Mirrors the teacher's `app_data(...)` wiring in `main.rs`: one `Arc` per
/// collaborator, cloned cheaply per worker thread.
pub struct AppState {
    pub settings: Arc<AppSettings>,
    pub token_ledger: Arc<TokenLedger>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub guard: Arc<ConsumptionGuard<Arc<dyn AnalysisEngine>>>,
}
