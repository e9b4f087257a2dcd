use actix_web::{post, web, HttpResponse};

use crate::error::AppResult;
use crate::models::dto::{PurchaseRequest, PurchaseResponse};
use crate::models::runtime_config::AppState;

/// `POST /payment/purchase` (spec section 6).
#[post("/purchase")]
pub async fn create_purchase(state: web::Data<AppState>, body: web::Json<PurchaseRequest>) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let outcome = state
        .orchestrator
        .purchase(&body.user_key, body.token_qty, &body.currency)
        .await?;

    Ok(HttpResponse::Ok().json(PurchaseResponse {
        reference: outcome.reference,
        token_qty: outcome.token_qty,
        amount: outcome.amount,
        payment_url: outcome.payment_url,
        status: "pending",
        expires_at: outcome.expires_at,
    }))
}
