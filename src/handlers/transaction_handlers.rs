use actix_web::{get, web, HttpResponse};

use crate::error::AppResult;
use crate::models::dto::TransactionResponse;
use crate::models::runtime_config::AppState;

/// `GET /payment/transaction/{reference}` (spec section 6).
#[get("/transaction/{reference}")]
pub async fn get_transaction(state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let reference = path.into_inner();
    let tx = state.orchestrator.get_transaction(&reference).await?;
    Ok(HttpResponse::Ok().json(TransactionResponse::from(tx)))
}
