use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Enumerated priced operation (spec section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Analysis,
    Transform,
    PremiumInsights,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Analysis => "analysis",
            ServiceKind::Transform => "transform",
            ServiceKind::PremiumInsights => "premium_insights",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "analysis" => Some(ServiceKind::Analysis),
            "transform" => Some(ServiceKind::Transform),
            "premium_insights" => Some(ServiceKind::PremiumInsights),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row per user key (spec section 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBalance {
    pub user_key: String,
    pub balance: i64,
    pub total_purchased: i64,
    pub total_consumed: i64,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Successful,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Successful => "successful",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    /// Column values are plain TEXT (no Postgres enum type), matching the
    /// rest of this store's columns. Unknown text is a storage-level defect.
    pub fn parse(s: &str) -> Result<Self, crate::error::AppError> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "successful" => Ok(TransactionStatus::Successful),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(crate::error::AppError::Storage(format!(
                "unrecognized transaction status in storage: {}",
                other
            ))),
        }
    }
}

/// One row per purchase attempt (spec section 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub reference: String,
    pub user_key: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub token_qty: i64,
    pub status: TransactionStatus,
    /// Opaque last verification payload from the gateway. Never logged unmasked.
    pub gateway_payload: Option<serde_json::Value>,
    /// Flipped atomically with the credit; lets a reconciliation replay tell
    /// a stuck-successful-without-credit row apart from a fully settled one.
    pub credited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One row per paid operation, append-only (spec section 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionEntry {
    pub id: Uuid,
    pub user_key: String,
    pub token_qty: i64,
    pub service_kind: ServiceKind,
    pub work_item_id: Option<String>,
    pub description: Option<String>,
    pub consumed_at: DateTime<Utc>,
}

/// Result of an attempted atomic debit (spec section 9: explicit sum type,
/// not an exception, for the insufficient-balance control path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    Ok { new_balance: i64 },
    Insufficient { current_balance: i64 },
}

/// Result of the conditional `pending -> successful|failed|cancelled` update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdateOutcome {
    Applied(PaymentTransaction),
    AlreadyInTargetState(PaymentTransaction),
    Conflict(PaymentTransaction),
}
