use actix_web::{get, web, HttpResponse};

use crate::error::AppResult;
use crate::models::dto::{BalanceResponse, ConsumptionEntryResponse, HistoryQuery, HistoryResponse};
use crate::models::runtime_config::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 500;

/// `GET /payment/balance/{user_key}` (spec section 6).
#[get("/balance/{user_key}")]
pub async fn get_balance(state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let user_key = path.into_inner();
    let balance = state.token_ledger.balance_of(&user_key).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse::from(balance)))
}

/// `GET /payment/balance/{user_key}/history?limit=N` (spec section 6).
#[get("/balance/{user_key}/history")]
pub async fn get_balance_history(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> AppResult<HttpResponse> {
    let user_key = path.into_inner();
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let history = state.token_ledger.consumption_history(&user_key, limit).await?;
    let total_records = history.len();

    Ok(HttpResponse::Ok().json(HistoryResponse {
        user_key,
        history: history.into_iter().map(ConsumptionEntryResponse::from).collect(),
        total_records,
    }))
}
