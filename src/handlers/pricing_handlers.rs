use actix_web::{get, web, HttpResponse};

use crate::error::AppResult;
use crate::models::domain::ServiceKind;
use crate::models::dto::{PricingExample, PricingResponse, ServiceCosts};
use crate::models::runtime_config::AppState;
use crate::services::pricing_policy::PricingPolicy;

/// `GET /payment/pricing` (spec section 6).
#[get("/pricing")]
pub async fn get_pricing(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let pricing = &state.settings.pricing;
    let policy = PricingPolicy::new(pricing);

    let service_costs = ServiceCosts {
        analysis: policy.cost_of(ServiceKind::Analysis)?,
        transform: policy.cost_of(ServiceKind::Transform)?,
        premium_insights: policy.cost_of(ServiceKind::PremiumInsights)?,
    };

    let mut examples = Vec::new();
    for token_qty in [pricing.tokens_per_unit_money, pricing.tokens_per_unit_money * 100, pricing.tokens_per_unit_money * 1000] {
        if let Ok(amount) = policy.amount_for(token_qty) {
            examples.push(PricingExample { token_qty, amount });
        }
    }

    Ok(HttpResponse::Ok().json(PricingResponse {
        tokens_per_unit_money: pricing.tokens_per_unit_money,
        min_purchase_money: pricing.min_purchase_money.clone(),
        max_purchase_money: pricing.max_purchase_money.clone(),
        service_costs,
        examples,
    }))
}
