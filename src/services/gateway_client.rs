use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use bigdecimal::{BigDecimal, ToPrimitive};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha512};
use tokio::sync::RwLock;

use crate::config::GatewayConfig;
use crate::error::AppError;

/// Safety margin before expiry at which a cached access token is considered
/// stale and must be refreshed (spec section 4.2: "a small safety margin,
/// e.g., 5 minutes").
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Successful,
    Pending,
    Failed,
}

#[derive(Debug, Clone)]
pub struct VerifyResult {
    pub status: GatewayStatus,
    pub gateway_payload: JsonValue,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct VerifyResponseBody {
    #[serde(rename = "responseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseCode")]
    response_code_alt: Option<String>,
    #[serde(flatten)]
    rest: JsonValue,
}

/// Protocol adapter over the external payment gateway (spec section 4.2).
/// Pure computation for `payment_url`/`inline_config`; network I/O only for
/// `verify` and the OAuth2 token fetch it triggers. The access token cache
/// uses a `RwLock` rather than the teacher's plain `Mutex` so that callers
/// observing a fresh-enough token take only a read lock and never contend
/// with each other; only a refresh escalates to the write lock, and a
/// double-checked read after acquiring it skips a redundant refresh if
/// another caller won the race first.
pub struct GatewayClient {
    config: GatewayConfig,
    http: Client,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig, http: Client) -> Self {
        Self {
            config,
            http,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    async fn access_token(&self) -> Result<String, AppError> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut cache = self.token_cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        let basic = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.config.client_id, self.config.secret_key));

        let response = self
            .http
            .post(format!("{}/oauth/token", self.config.token_base_url))
            .header("Authorization", format!("Basic {}", basic))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::GatewayUnavailable(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("malformed token response: {}", e)))?;

        let fresh = CachedToken {
            access_token: body.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        };
        *cache = Some(fresh);

        Ok(body.access_token)
    }

    fn amount_minor_units(amount: &BigDecimal) -> Result<i64, AppError> {
        (amount * BigDecimal::from(100))
            .to_i64()
            .ok_or_else(|| AppError::Validation("amount does not fit minor-unit conversion".to_string()))
    }

    /// Deterministic construction from the configured checkout base URL; no
    /// network I/O (spec section 4.2).
    pub fn payment_url(
        &self,
        reference: &str,
        amount: &BigDecimal,
        currency_numeric_code: &str,
        user_key: &str,
        return_url: &str,
    ) -> Result<String, AppError> {
        let amount_minor = Self::amount_minor_units(amount)?;
        let hash = hex::encode(Sha512::digest(
            format!(
                "{}{}{}{}{}",
                self.config.pay_item_id, reference, amount_minor, return_url, self.config.secret_key
            )
            .as_bytes(),
        ));

        let mut url = url::Url::parse(&self.config.checkout_base_url)
            .map_err(|e| AppError::Configuration(format!("invalid checkout base url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("merchant_code", &self.config.merchant_code)
            .append_pair("pay_item_id", &self.config.pay_item_id)
            .append_pair("amount", &amount_minor.to_string())
            .append_pair("currency", currency_numeric_code)
            .append_pair("site_redirect_url", return_url)
            .append_pair("txn_ref", reference)
            .append_pair("customer_id", user_key)
            .append_pair("hash", &hash);

        Ok(url.to_string())
    }

    /// Same fields a browser widget would need, no network I/O.
    pub fn inline_config(
        &self,
        reference: &str,
        amount: &BigDecimal,
        user_key: &str,
        return_url: &str,
    ) -> Result<JsonValue, AppError> {
        let amount_minor = Self::amount_minor_units(amount)?;
        Ok(serde_json::json!({
            "merchant_code": self.config.merchant_code,
            "pay_item_id": self.config.pay_item_id,
            "amount": amount_minor,
            "txn_ref": reference,
            "customer_id": user_key,
            "site_redirect_url": return_url,
        }))
    }

    /// GET the gateway's verification endpoint. Network errors surface as
    /// `GatewayUnavailable`, distinguishable from a gateway-reported failure
    /// (spec section 4.2 failure semantics).
    pub async fn verify(&self, reference: &str, amount: &BigDecimal) -> Result<VerifyResult, AppError> {
        let access_token = self.access_token().await?;
        let amount_minor = Self::amount_minor_units(amount)?;
        let hash = hex::encode(Sha512::digest(
            format!("{}{}{}", self.config.secret_key, amount_minor, reference).as_bytes(),
        ));

        let response = self
            .http
            .get(format!("{}/collections/api/v1/gettransaction.json", self.config.api_base_url))
            .query(&[
                ("merchantcode", self.config.merchant_code.as_str()),
                ("transactionreference", reference),
                ("amount", &amount_minor.to_string()),
            ])
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Hash", hash)
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("verify request failed: {}", e)))?;

        if response.status().is_server_error() {
            return Err(AppError::GatewayUnavailable(format!(
                "gateway returned {}",
                response.status()
            )));
        }

        let raw: JsonValue = response
            .json()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("malformed verify response: {}", e)))?;

        let parsed: VerifyResponseBody = serde_json::from_value(raw.clone())
            .map_err(|e| AppError::GatewayUnavailable(format!("malformed verify response: {}", e)))?;
        let code = parsed
            .response_code
            .or(parsed.response_code_alt)
            .unwrap_or_default();

        let status = match code.as_str() {
            "00" => GatewayStatus::Successful,
            "09" | "Z1" => GatewayStatus::Pending,
            _ => GatewayStatus::Failed,
        };

        Ok(VerifyResult {
            status,
            gateway_payload: raw,
        })
    }
}
