use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::distr::{Alphanumeric, SampleString};
use uuid::Uuid;

use crate::config::{GatewayConfig, PricingConfig};
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::domain::{PaymentTransaction, StatusUpdateOutcome, TransactionStatus};
use crate::services::gateway_client::{GatewayClient, GatewayStatus};
use crate::services::pricing_policy::PricingPolicy;
use crate::services::token_ledger::TokenLedger;

/// Reference prefix; the remainder is a UTC-seconds timestamp component plus
/// a random alphanumeric suffix of at least 48 bits of entropy (spec section
/// 4.5). 10 base62 characters carry ~59.5 bits, comfortably over the floor.
const REFERENCE_PREFIX: &str = "TXN";
const REFERENCE_SUFFIX_LEN: usize = 10;

pub struct PurchaseOutcome {
    pub reference: String,
    pub token_qty: i64,
    pub amount: BigDecimal,
    pub payment_url: String,
    pub expires_at: DateTime<Utc>,
}

pub struct VerifyOutcome {
    pub reference: String,
    pub status: TransactionStatus,
    pub tokens_credited: Option<i64>,
    pub current_balance: i64,
}

/// State machine and centerpiece of the design (spec section 4.5): purchase,
/// verify, and idempotent crediting on top of the Store's atomic operations.
pub struct PaymentOrchestrator {
    store: Arc<dyn Store>,
    ledger: Arc<TokenLedger>,
    gateway: Arc<GatewayClient>,
    pricing: PricingConfig,
    gateway_config: GatewayConfig,
    return_url: String,
    transaction_ttl_seconds: i64,
}

impl PaymentOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<TokenLedger>,
        gateway: Arc<GatewayClient>,
        pricing: PricingConfig,
        gateway_config: GatewayConfig,
        return_url: String,
        transaction_ttl_seconds: i64,
    ) -> Self {
        Self {
            store,
            ledger,
            gateway,
            pricing,
            gateway_config,
            return_url,
            transaction_ttl_seconds,
        }
    }

    fn generate_reference(&self) -> String {
        let ts = Utc::now().format("%Y%m%d%H%M%S");
        let suffix = Alphanumeric.sample_string(&mut rand::rng(), REFERENCE_SUFFIX_LEN);
        format!("{}-{}-{}", REFERENCE_PREFIX, ts, suffix)
    }

    fn currency_numeric_code(&self, currency: &str) -> AppResult<&'static str> {
        match currency {
            "NGN" => Ok("566"),
            "USD" => Ok("840"),
            "GBP" => Ok("826"),
            "EUR" => Ok("978"),
            other => Err(AppError::Validation(format!("unsupported currency code {}", other))),
        }
    }

    /// Validate, ensure the balance row exists (applying the free grant on
    /// first use), generate a reference, insert a pending transaction, and
    /// compute the gateway payment URL. Does not block on user completion.
    pub async fn purchase(&self, user_key: &str, token_qty: i64, currency: &str) -> AppResult<PurchaseOutcome> {
        let policy = PricingPolicy::new(&self.pricing);
        policy.validate_currency(currency)?;
        if token_qty <= 0 {
            return Err(AppError::Validation("token_qty must be positive".to_string()));
        }
        let amount = policy.amount_for(token_qty)?;
        policy.validate_purchase_amount(&amount)?;

        self.ledger.balance_of(user_key).await?;

        let reference = self.generate_reference();
        let now = Utc::now();
        let tx = PaymentTransaction {
            id: Uuid::new_v4(),
            reference: reference.clone(),
            user_key: user_key.to_string(),
            amount: amount.clone(),
            currency: currency.to_string(),
            token_qty,
            status: TransactionStatus::Pending,
            gateway_payload: None,
            credited: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.store.insert_transaction(&tx).await?;

        let currency_code = self.currency_numeric_code(currency)?;
        let payment_url = self
            .gateway
            .payment_url(&reference, &amount, currency_code, user_key, &self.return_url)?;

        let expires_at = now + ChronoDuration::seconds(self.transaction_ttl_seconds);

        Ok(PurchaseOutcome {
            reference,
            token_qty,
            amount,
            payment_url,
            expires_at,
        })
    }

    /// Ask the gateway for the terminal outcome and apply the exactly-once
    /// credit transition (spec section 4.5).
    pub async fn verify(&self, reference: &str) -> AppResult<VerifyOutcome> {
        let tx = self
            .store
            .get_transaction(reference)
            .await?
            .ok_or_else(|| AppError::UnknownReference(reference.to_string()))?;

        // Terminal states short-circuit without contacting the gateway again
        // (spec section 8, scenario 5: "implementations MAY short-circuit").
        if tx.status != TransactionStatus::Pending {
            let balance = self.ledger.balance_of(&tx.user_key).await?;
            return Ok(VerifyOutcome {
                reference: tx.reference,
                status: tx.status,
                tokens_credited: if tx.status == TransactionStatus::Successful {
                    Some(tx.token_qty)
                } else {
                    None
                },
                current_balance: balance.balance,
            });
        }

        let verify_result = self.gateway.verify(reference, &tx.amount).await?;

        match verify_result.status {
            GatewayStatus::Successful => {
                let outcome = self
                    .store
                    .update_transaction_status(
                        reference,
                        TransactionStatus::Successful,
                        Some(verify_result.gateway_payload),
                        Some(Utc::now()),
                        true,
                    )
                    .await?;

                let (settled_tx, should_credit) = match outcome {
                    StatusUpdateOutcome::Applied(settled) => (settled, true),
                    // A concurrent verifier already flipped the row: skip
                    // the credit, it has already happened exactly once.
                    StatusUpdateOutcome::AlreadyInTargetState(settled) => (settled, false),
                    StatusUpdateOutcome::Conflict(other) => {
                        log::error!(
                            "verify observed a conflicting transaction state for {}: {:?}",
                            reference,
                            other.status
                        );
                        return Err(AppError::ConflictingState(format!(
                            "transaction {} is in state {:?}, expected pending or successful",
                            reference, other.status
                        )));
                    }
                };

                if should_credit {
                    self.ledger.credit(&settled_tx.user_key, settled_tx.token_qty).await?;
                }

                let balance = self.ledger.balance_of(&settled_tx.user_key).await?;
                Ok(VerifyOutcome {
                    reference: settled_tx.reference,
                    status: TransactionStatus::Successful,
                    tokens_credited: Some(settled_tx.token_qty),
                    current_balance: balance.balance,
                })
            }
            GatewayStatus::Pending => {
                let balance = self.ledger.balance_of(&tx.user_key).await?;
                Ok(VerifyOutcome {
                    reference: tx.reference,
                    status: TransactionStatus::Pending,
                    tokens_credited: None,
                    current_balance: balance.balance,
                })
            }
            GatewayStatus::Failed => {
                let outcome = self
                    .store
                    .update_transaction_status(
                        reference,
                        TransactionStatus::Failed,
                        Some(verify_result.gateway_payload),
                        Some(Utc::now()),
                        false,
                    )
                    .await?;
                let settled_tx = match outcome {
                    StatusUpdateOutcome::Applied(t) | StatusUpdateOutcome::AlreadyInTargetState(t) => t,
                    StatusUpdateOutcome::Conflict(other) => {
                        log::error!(
                            "verify observed a conflicting transaction state for {}: {:?}",
                            reference,
                            other.status
                        );
                        other
                    }
                };
                let balance = self.ledger.balance_of(&settled_tx.user_key).await?;
                Ok(VerifyOutcome {
                    reference: settled_tx.reference,
                    status: TransactionStatus::Failed,
                    tokens_credited: None,
                    current_balance: balance.balance,
                })
            }
        }
    }

    pub async fn get_transaction(&self, reference: &str) -> AppResult<PaymentTransaction> {
        self.store
            .get_transaction(reference)
            .await?
            .ok_or_else(|| AppError::UnknownReference(reference.to_string()))
    }

    /// Optional external maintenance routine (spec section 4.5, SPEC_FULL
    /// section 4.5 supplement): sweep `pending` rows older than the
    /// configured TTL to `cancelled`. Never touches `successful` rows.
    pub async fn sweep_stale_pending(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - ChronoDuration::seconds(self.transaction_ttl_seconds);
        self.store.sweep_stale_pending(cutoff).await
    }
}
