use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    version: String,
    database: &'static str,
}

/// `GET /health`, mounted without auth or scope (spec section 9 ambient
/// endpoints). Exercises the pool rather than trusting it's merely present.
pub async fn health_check(pool: web::Data<PgPool>) -> impl Responder {
    let database = match crate::db::verify_connection(&pool).await {
        Ok(()) => "ok",
        Err(_) => "unreachable",
    };

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    };

    HttpResponse::Ok().json(response)
}
