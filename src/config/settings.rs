use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::domain::ServiceKind;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pricing: PricingConfig,
    pub gateway: GatewayConfig,
    pub payment_return_url: String,
    pub transaction_ttl_seconds: i64,
    pub enable_pending_sweep: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Process-wide pricing configuration, loaded once at startup (spec section 3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PricingConfig {
    pub currency: String,
    pub tokens_per_unit_money: i64,
    pub min_purchase_money: bigdecimal::BigDecimal,
    pub max_purchase_money: bigdecimal::BigDecimal,
    pub free_grant_tokens: i64,
    pub service_costs: HashMap<ServiceKind, i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GatewayMode {
    Test,
    Live,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub client_id: String,
    pub secret_key: String,
    pub merchant_code: String,
    pub pay_item_id: String,
    pub mode: GatewayMode,
    pub token_base_url: String,
    pub checkout_base_url: String,
    pub api_base_url: String,
}

impl AppSettings {
    pub fn from_env() -> Result<Self, AppError> {
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Configuration("SERVER_PORT must be a valid port number".to_string()))?;
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Configuration("DATABASE_URL must be set".to_string()))?;

        let currency = env::var("CURRENCY").unwrap_or_else(|_| "NGN".to_string());
        let tokens_per_unit_money = env::var("TOKENS_PER_UNIT_MONEY")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<i64>()
            .map_err(|_| AppError::Configuration("TOKENS_PER_UNIT_MONEY must be a valid integer".to_string()))?;
        let min_purchase_money = env::var("MIN_PURCHASE_MONEY")
            .unwrap_or_else(|_| "50.00".to_string())
            .parse::<bigdecimal::BigDecimal>()
            .map_err(|_| AppError::Configuration("MIN_PURCHASE_MONEY must be a valid decimal".to_string()))?;
        let max_purchase_money = env::var("MAX_PURCHASE_MONEY")
            .unwrap_or_else(|_| "1000000.00".to_string())
            .parse::<bigdecimal::BigDecimal>()
            .map_err(|_| AppError::Configuration("MAX_PURCHASE_MONEY must be a valid decimal".to_string()))?;
        let free_grant_tokens = env::var("FREE_GRANT_TOKENS")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<i64>()
            .map_err(|_| AppError::Configuration("FREE_GRANT_TOKENS must be a valid integer".to_string()))?;

        let mut service_costs = HashMap::new();
        service_costs.insert(
            ServiceKind::Analysis,
            env::var("SERVICE_COST_ANALYSIS")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<i64>()
                .map_err(|_| AppError::Configuration("SERVICE_COST_ANALYSIS must be a valid integer".to_string()))?,
        );
        service_costs.insert(
            ServiceKind::Transform,
            env::var("SERVICE_COST_TRANSFORM")
                .unwrap_or_else(|_| "5".to_string())
                .parse::<i64>()
                .map_err(|_| AppError::Configuration("SERVICE_COST_TRANSFORM must be a valid integer".to_string()))?,
        );
        service_costs.insert(
            ServiceKind::PremiumInsights,
            env::var("SERVICE_COST_PREMIUM_INSIGHTS")
                .unwrap_or_else(|_| "25".to_string())
                .parse::<i64>()
                .map_err(|_| {
                    AppError::Configuration("SERVICE_COST_PREMIUM_INSIGHTS must be a valid integer".to_string())
                })?,
        );

        let gateway_client_id = env::var("GATEWAY_CLIENT_ID")
            .map_err(|_| AppError::Configuration("GATEWAY_CLIENT_ID must be set".to_string()))?;
        let gateway_secret_key = env::var("GATEWAY_SECRET_KEY")
            .map_err(|_| AppError::Configuration("GATEWAY_SECRET_KEY must be set".to_string()))?;
        let gateway_merchant_code = env::var("GATEWAY_MERCHANT_CODE")
            .map_err(|_| AppError::Configuration("GATEWAY_MERCHANT_CODE must be set".to_string()))?;
        let gateway_pay_item_id = env::var("GATEWAY_PAY_ITEM_ID")
            .map_err(|_| AppError::Configuration("GATEWAY_PAY_ITEM_ID must be set".to_string()))?;
        let gateway_mode = match env::var("GATEWAY_MODE").unwrap_or_else(|_| "TEST".to_string()).as_str() {
            "LIVE" => GatewayMode::Live,
            "TEST" => GatewayMode::Test,
            other => {
                return Err(AppError::Configuration(format!(
                    "GATEWAY_MODE must be TEST or LIVE, got {}",
                    other
                )));
            }
        };
        let (default_token_base, default_checkout_base, default_api_base) = match gateway_mode {
            GatewayMode::Test => (
                "https://remitademo.net/remita",
                "https://remitademo.net/remita/ecomm/finalize.reg",
                "https://remitademo.net/remita",
            ),
            GatewayMode::Live => (
                "https://login.remita.net/remita",
                "https://login.remita.net/remita/ecomm/finalize.reg",
                "https://login.remita.net/remita",
            ),
        };
        let token_base_url =
            env::var("GATEWAY_TOKEN_BASE_URL").unwrap_or_else(|_| default_token_base.to_string());
        let checkout_base_url =
            env::var("GATEWAY_CHECKOUT_BASE_URL").unwrap_or_else(|_| default_checkout_base.to_string());
        let api_base_url = env::var("GATEWAY_API_BASE_URL").unwrap_or_else(|_| default_api_base.to_string());

        let payment_return_url = env::var("PAYMENT_RETURN_URL")
            .map_err(|_| AppError::Configuration("PAYMENT_RETURN_URL must be set".to_string()))?;
        let transaction_ttl_seconds = env::var("TRANSACTION_TTL_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<i64>()
            .map_err(|_| AppError::Configuration("TRANSACTION_TTL_SECONDS must be a valid integer".to_string()))?;
        let enable_pending_sweep = env::var("ENABLE_PENDING_SWEEP")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .map_err(|_| AppError::Configuration("ENABLE_PENDING_SWEEP must be true or false".to_string()))?;

        Ok(Self {
            server: ServerConfig {
                host: server_host,
                port: server_port,
                cors_origins,
            },
            database: DatabaseConfig { url: database_url },
            pricing: PricingConfig {
                currency,
                tokens_per_unit_money,
                min_purchase_money,
                max_purchase_money,
                free_grant_tokens,
                service_costs,
            },
            gateway: GatewayConfig {
                client_id: gateway_client_id,
                secret_key: gateway_secret_key,
                merchant_code: gateway_merchant_code,
                pay_item_id: gateway_pay_item_id,
                mode: gateway_mode,
                token_base_url,
                checkout_base_url,
                api_base_url,
            },
            payment_return_url,
            transaction_ttl_seconds,
            enable_pending_sweep,
        })
    }
}
