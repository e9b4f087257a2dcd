use actix_web::{post, web, HttpResponse};

use crate::error::AppResult;
use crate::models::domain::TransactionStatus;
use crate::models::dto::VerifyResponse;
use crate::models::runtime_config::AppState;

/// `POST /payment/verify/{reference}` (spec section 6). A gateway-rejected
/// transaction is not an HTTP error: this always answers 200 with the
/// outcome embedded in the body (spec section 7, `GatewayRejected`).
#[post("/verify/{reference}")]
pub async fn verify_purchase(state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let reference = path.into_inner();
    let outcome = state.orchestrator.verify(&reference).await?;

    let message = match outcome.status {
        TransactionStatus::Successful => "Payment verified successfully.",
        TransactionStatus::Pending => "Payment is still being processed.",
        TransactionStatus::Failed => "Payment was rejected by the gateway.",
        TransactionStatus::Cancelled => "Payment was cancelled before completion.",
    };

    Ok(HttpResponse::Ok().json(VerifyResponse {
        reference: outcome.reference,
        status: outcome.status,
        tokens_credited: outcome.tokens_credited,
        current_balance: outcome.current_balance,
        message: message.to_string(),
    }))
}
