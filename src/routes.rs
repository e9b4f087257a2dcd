use actix_web::web;

use crate::handlers;

/// Mounts the token-metered payment and consumption API (spec section 6).
/// `/payment/*` covers pricing discovery, purchase, verification, balance
/// and history lookups; `/analyze/*` is the sole token-gated service
/// endpoint wired up in this core.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payment")
            .service(handlers::pricing_handlers::get_pricing)
            .service(handlers::purchase_handlers::create_purchase)
            .service(handlers::verify_handlers::verify_purchase)
            .service(handlers::balance_handlers::get_balance)
            .service(handlers::balance_handlers::get_balance_history)
            .service(handlers::transaction_handlers::get_transaction),
    );
    cfg.service(web::scope("/analyze").service(handlers::analyze_handlers::analyze));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn test_routes_compile() {
        let _app = test::init_service(actix_web::App::new().configure(configure_routes)).await;
    }
}
