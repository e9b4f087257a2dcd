use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::domain::{ConsumptionEntry, PaymentTransaction, ServiceKind, TransactionStatus, UserBalance};

/// `GET /payment/pricing` response (spec section 6). Modeled as an explicit
/// structured record per the redesign note against dynamic request/response
/// dictionaries: unknown fields are never silently accepted anywhere in this
/// crate's request bodies.
#[derive(Debug, Serialize)]
pub struct PricingResponse {
    pub tokens_per_unit_money: i64,
    pub min_purchase_money: BigDecimal,
    pub max_purchase_money: BigDecimal,
    pub service_costs: ServiceCosts,
    pub examples: Vec<PricingExample>,
}

#[derive(Debug, Serialize)]
pub struct ServiceCosts {
    pub analysis: i64,
    pub transform: i64,
    pub premium_insights: i64,
}

#[derive(Debug, Serialize)]
pub struct PricingExample {
    pub token_qty: i64,
    pub amount: BigDecimal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurchaseRequest {
    pub token_qty: i64,
    pub user_key: String,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub reference: String,
    pub token_qty: i64,
    pub amount: BigDecimal,
    pub payment_url: String,
    pub status: &'static str,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub reference: String,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_credited: Option<i64>,
    pub current_balance: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_key: String,
    pub balance: i64,
    pub total_purchased: i64,
    pub total_consumed: i64,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserBalance> for BalanceResponse {
    fn from(b: UserBalance) -> Self {
        Self {
            user_key: b.user_key,
            balance: b.balance,
            total_purchased: b.total_purchased,
            total_consumed: b.total_consumed,
            last_purchase_at: b.last_purchase_at,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConsumptionEntryResponse {
    pub token_qty: i64,
    pub service_kind: ServiceKind,
    pub work_item_id: Option<String>,
    pub description: Option<String>,
    pub consumed_at: DateTime<Utc>,
}

impl From<ConsumptionEntry> for ConsumptionEntryResponse {
    fn from(e: ConsumptionEntry) -> Self {
        Self {
            token_qty: e.token_qty,
            service_kind: e.service_kind,
            work_item_id: e.work_item_id,
            description: e.description,
            consumed_at: e.consumed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub user_key: String,
    pub history: Vec<ConsumptionEntryResponse>,
    pub total_records: usize,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub reference: String,
    pub user_key: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub token_qty: i64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<PaymentTransaction> for TransactionResponse {
    fn from(t: PaymentTransaction) -> Self {
        Self {
            reference: t.reference,
            user_key: t.user_key,
            amount: t.amount,
            currency: t.currency,
            token_qty: t.token_qty,
            status: t.status,
            created_at: t.created_at,
            updated_at: t.updated_at,
            completed_at: t.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse<T> {
    #[serde(flatten)]
    pub result: T,
    pub tokens_consumed: i64,
    pub remaining_balance: i64,
}
