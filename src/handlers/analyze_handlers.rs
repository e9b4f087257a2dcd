use actix_web::{post, web, HttpRequest, HttpResponse};

use crate::error::{AppError, AppResult};
use crate::models::domain::ServiceKind;
use crate::models::dto::AnalyzeResponse;
use crate::models::runtime_config::AppState;

fn extract_user_key(req: &HttpRequest) -> AppResult<String> {
    req.headers()
        .get("user-key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("missing or empty user-key header".to_string()))
}

/// `POST /analyze/{work_item_id}` (spec section 6), guarded by
/// `ConsumptionGuard` at `service_kind=analysis`.
#[post("/{work_item_id}")]
pub async fn analyze(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let user_key = extract_user_key(&req)?;
    let work_item_id = path.into_inner();

    let (result, usage) = state
        .guard
        .consume(
            &user_key,
            ServiceKind::Analysis,
            Some(work_item_id.clone()),
            None,
            || async { state.guard.engine().analyze(&work_item_id).await },
        )
        .await?;

    Ok(HttpResponse::Ok().json(AnalyzeResponse {
        result,
        tokens_consumed: usage.tokens_consumed,
        remaining_balance: usage.remaining_balance,
    }))
}
