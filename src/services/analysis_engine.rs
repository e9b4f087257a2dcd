use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::AppError;

/// Opaque external collaborator (spec section 1): the dataset-analysis
/// pipeline (profiling, PII scan, LLM call, resource search). The core only
/// needs to gate invocation on token availability through `ConsumptionGuard`;
/// it has no opinion on what the engine does internally.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn analyze(&self, work_item_id: &str) -> Result<JsonValue, AppError>;
}

/// Placeholder implementation. The real analysis pipeline is external to
/// this core per spec section 1; this stub lets the service boot and the
/// `/analyze` endpoint exercise the full ConsumptionGuard path end to end
/// without a real pipeline wired up.
pub struct NoopAnalysisEngine;

#[async_trait]
impl AnalysisEngine for NoopAnalysisEngine {
    async fn analyze(&self, work_item_id: &str) -> Result<JsonValue, AppError> {
        Ok(serde_json::json!({ "work_item_id": work_item_id, "status": "completed" }))
    }
}
