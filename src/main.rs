use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use tokio_cron_scheduler::{Job, JobScheduler};

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod routes;
mod services;

use crate::config::AppSettings;
use crate::db::connection::{create_pool, verify_connection};
use crate::db::PgStore;
use crate::models::runtime_config::AppState;
use crate::services::analysis_engine::{AnalysisEngine, NoopAnalysisEngine};
use crate::services::consumption_guard::ConsumptionGuard;
use crate::services::gateway_client::GatewayClient;
use crate::services::payment_orchestrator::PaymentOrchestrator;
use crate::services::token_ledger::TokenLedger;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = match AppSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings from environment: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };

    let db_pool = match create_pool(&settings.database.url).await {
        Ok(pool) => {
            if let Err(e) = verify_connection(&pool).await {
                log::error!("Database connection verification failed: {}", e);
                log::error!("Cannot start server without a working database connection");
                std::process::exit(1);
            }
            log::info!("Database connection established successfully");
            pool
        }
        Err(e) => {
            log::error!("Failed to create database connection pool: {}", e);
            log::error!("Cannot start server without a working database connection");
            std::process::exit(1);
        }
    };

    let http_client = reqwest::Client::new();

    let store: Arc<dyn db::Store> = Arc::new(PgStore::new(db_pool.clone()));
    let ledger = Arc::new(TokenLedger::new(store.clone(), settings.pricing.free_grant_tokens));
    let gateway = Arc::new(GatewayClient::new(settings.gateway.clone(), http_client.clone()));
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        store.clone(),
        ledger.clone(),
        gateway.clone(),
        settings.pricing.clone(),
        settings.gateway.clone(),
        settings.payment_return_url.clone(),
        settings.transaction_ttl_seconds,
    ));
    let engine: Arc<dyn AnalysisEngine> = Arc::new(NoopAnalysisEngine);
    let guard = Arc::new(ConsumptionGuard::new(
        ledger.clone(),
        store.clone(),
        settings.pricing.clone(),
        engine,
    ));

    if settings.enable_pending_sweep {
        let sweep_orchestrator = orchestrator.clone();
        match JobScheduler::new().await {
            Ok(scheduler) => {
                let job = Job::new_async("0 */15 * * * *", move |_uuid, _l| {
                    let orchestrator = sweep_orchestrator.clone();
                    Box::pin(async move {
                        match orchestrator.sweep_stale_pending().await {
                            Ok(count) if count > 0 => {
                                log::info!("swept {} stale pending transactions", count)
                            }
                            Ok(_) => {}
                            Err(e) => log::error!("stale pending sweep failed: {}", e),
                        }
                    })
                });
                match job {
                    Ok(job) => {
                        if let Err(e) = scheduler.add(job).await {
                            log::error!("failed to schedule stale pending sweep: {}", e);
                        } else if let Err(e) = scheduler.start().await {
                            log::error!("failed to start stale pending sweep scheduler: {}", e);
                        } else {
                            log::info!("stale pending sweep scheduler started");
                        }
                    }
                    Err(e) => log::error!("failed to build stale pending sweep job: {}", e),
                }
            }
            Err(e) => log::error!("failed to initialize job scheduler: {}", e),
        }
    }

    let host = settings.server.host.clone();
    let port = settings.server.port;
    log::info!("Starting server at http://{}:{}", host, port);

    HttpServer::new(move || {
        let mut cors = Cors::default();
        if settings.server.cors_origins.iter().any(|o| o == "*") {
            cors = cors.allow_any_origin();
        } else {
            for origin in &settings.server.cors_origins {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header();

        let app_state = web::Data::new(AppState {
            settings: Arc::new(settings.clone()),
            token_ledger: ledger.clone(),
            orchestrator: orchestrator.clone(),
            guard: guard.clone(),
        });

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(app_state)
            .service(web::resource("/health").route(web::get().to(handlers::health::health_check)))
            .configure(routes::configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
