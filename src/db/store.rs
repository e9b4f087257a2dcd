use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::domain::{
    ConsumptionEntry, DebitOutcome, PaymentTransaction, ServiceKind, StatusUpdateOutcome, TransactionStatus,
    UserBalance,
};

/// Durable persistence for balances, transactions, and the consumption log
/// (spec section 4.1). Dependency-injected as a trait object so the
/// orchestrator and guard never depend on a concrete database.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_or_create_balance(&self, user_key: &str, free_grant: i64) -> AppResult<(UserBalance, bool)>;
    async fn credit(&self, user_key: &str, qty: i64, purchase_at: DateTime<Utc>) -> AppResult<UserBalance>;
    async fn try_debit(&self, user_key: &str, qty: i64) -> AppResult<DebitOutcome>;

    async fn insert_transaction(&self, tx: &PaymentTransaction) -> AppResult<()>;
    async fn get_transaction(&self, reference: &str) -> AppResult<Option<PaymentTransaction>>;
    /// Conditional transition; only applies when the row's current status is
    /// `pending`. `credit_applied` is flipped atomically with the status when
    /// transitioning to `successful` (spec section 7 recovery note).
    async fn update_transaction_status(
        &self,
        reference: &str,
        target: TransactionStatus,
        gateway_payload: Option<JsonValue>,
        completed_at: Option<DateTime<Utc>>,
        mark_credited: bool,
    ) -> AppResult<StatusUpdateOutcome>;

    /// Sweeps `pending` rows older than `older_than` to `cancelled`. Never
    /// touches `successful` rows. Optional external maintenance routine
    /// (spec section 4.5); returns the number of rows transitioned.
    async fn sweep_stale_pending(&self, older_than: DateTime<Utc>) -> AppResult<u64>;

    async fn append_consumption(&self, entry: &ConsumptionEntry) -> AppResult<()>;
    async fn list_consumption(&self, user_key: &str, limit: i64) -> AppResult<Vec<ConsumptionEntry>>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_balance(row: &sqlx::postgres::PgRow) -> UserBalance {
        UserBalance {
            user_key: row.get("user_key"),
            balance: row.get("balance"),
            total_purchased: row.get("total_purchased"),
            total_consumed: row.get("total_consumed"),
            last_purchase_at: row.get("last_purchase_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn row_to_transaction(row: &sqlx::postgres::PgRow) -> AppResult<PaymentTransaction> {
        let status_text: String = row.get("status");
        Ok(PaymentTransaction {
            id: row.get("id"),
            reference: row.get("reference"),
            user_key: row.get("user_key"),
            amount: row.get("amount"),
            currency: row.get("currency"),
            token_qty: row.get("token_qty"),
            status: TransactionStatus::parse(&status_text)?,
            gateway_payload: row.get("gateway_payload"),
            credited: row.get("credited"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            completed_at: row.get("completed_at"),
        })
    }

    fn row_to_consumption(row: &sqlx::postgres::PgRow) -> AppResult<ConsumptionEntry> {
        let kind_text: String = row.get("service_kind");
        let service_kind = ServiceKind::parse(&kind_text)
            .ok_or_else(|| AppError::Storage(format!("unrecognized service_kind in storage: {}", kind_text)))?;
        Ok(ConsumptionEntry {
            id: row.get("id"),
            user_key: row.get("user_key"),
            token_qty: row.get("token_qty"),
            service_kind,
            work_item_id: row.get("work_item_id"),
            description: row.get("description"),
            consumed_at: row.get("consumed_at"),
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_or_create_balance(&self, user_key: &str, free_grant: i64) -> AppResult<(UserBalance, bool)> {
        // INSERT ... ON CONFLICT DO NOTHING wins the race exactly once; the
        // fallback SELECT distinguishes "we created it" from "it already
        // existed" so the caller can tell whether the grant was just applied.
        let inserted = sqlx::query(
            r#"
            INSERT INTO user_balances (user_key, balance, total_purchased, total_consumed, created_at, updated_at)
            VALUES ($1, $2, $2, 0, NOW(), NOW())
            ON CONFLICT (user_key) DO NOTHING
            RETURNING user_key, balance, total_purchased, total_consumed, last_purchase_at, created_at, updated_at
            "#,
        )
        .bind(user_key)
        .bind(free_grant)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((Self::row_to_balance(&row), true));
        }

        let row = sqlx::query(
            r#"
            SELECT user_key, balance, total_purchased, total_consumed, last_purchase_at, created_at, updated_at
            FROM user_balances WHERE user_key = $1
            "#,
        )
        .bind(user_key)
        .fetch_one(&self.pool)
        .await?;

        Ok((Self::row_to_balance(&row), false))
    }

    async fn credit(&self, user_key: &str, qty: i64, purchase_at: DateTime<Utc>) -> AppResult<UserBalance> {
        if qty <= 0 {
            return Err(AppError::Validation("credit quantity must be positive".to_string()));
        }
        let row = sqlx::query(
            r#"
            UPDATE user_balances
            SET balance = balance + $2,
                total_purchased = total_purchased + $2,
                last_purchase_at = $3,
                updated_at = NOW()
            WHERE user_key = $1
            RETURNING user_key, balance, total_purchased, total_consumed, last_purchase_at, created_at, updated_at
            "#,
        )
        .bind(user_key)
        .bind(qty)
        .bind(purchase_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Self::row_to_balance(&row)),
            None => Err(AppError::UnknownUser(user_key.to_string())),
        }
    }

    async fn try_debit(&self, user_key: &str, qty: i64) -> AppResult<DebitOutcome> {
        if qty <= 0 {
            return Err(AppError::Validation("debit quantity must be positive".to_string()));
        }
        // The WHERE balance >= $2 guard makes this a single atomic
        // compare-and-decrement: Postgres's row-level lock during the UPDATE
        // serializes concurrent debits against the same user_key, so balance
        // can never observe a negative value under any interleaving.
        let row = sqlx::query(
            r#"
            UPDATE user_balances
            SET balance = balance - $2,
                total_consumed = total_consumed + $2,
                updated_at = NOW()
            WHERE user_key = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(user_key)
        .bind(qty)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let new_balance: i64 = row.get("balance");
            return Ok(DebitOutcome::Ok { new_balance });
        }

        let current = sqlx::query(r#"SELECT balance FROM user_balances WHERE user_key = $1"#)
            .bind(user_key)
            .fetch_optional(&self.pool)
            .await?;

        let current_balance = match current {
            Some(row) => row.get::<i64, _>("balance"),
            None => return Err(AppError::UnknownUser(user_key.to_string())),
        };
        Ok(DebitOutcome::Insufficient { current_balance })
    }

    async fn insert_transaction(&self, tx: &PaymentTransaction) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_transactions
                (id, reference, user_key, amount, currency, token_qty, status, gateway_payload, credited, created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(tx.id)
        .bind(&tx.reference)
        .bind(&tx.user_key)
        .bind(&tx.amount)
        .bind(&tx.currency)
        .bind(tx.token_qty)
        .bind(tx.status.as_str())
        .bind(&tx.gateway_payload)
        .bind(tx.credited)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .bind(tx.completed_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(AppError::AlreadyExists(format!("reference {} already exists", tx.reference)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_transaction(&self, reference: &str) -> AppResult<Option<PaymentTransaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, reference, user_key, amount, currency, token_qty, status, gateway_payload, credited, created_at, updated_at, completed_at
            FROM payment_transactions WHERE reference = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    async fn update_transaction_status(
        &self,
        reference: &str,
        target: TransactionStatus,
        gateway_payload: Option<JsonValue>,
        completed_at: Option<DateTime<Utc>>,
        mark_credited: bool,
    ) -> AppResult<StatusUpdateOutcome> {
        // Conditional on current status = 'pending': at most one concurrent
        // caller observes a changed row, the rest fall through to the
        // read-back below and learn whether the row already matches their
        // target (idempotent no-op) or is in some other terminal state
        // (a defect — should be unreachable given the orchestrator's logic).
        let row = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = $2,
                gateway_payload = COALESCE($3, gateway_payload),
                completed_at = COALESCE($4, completed_at),
                credited = credited OR $5,
                updated_at = NOW()
            WHERE reference = $1 AND status = 'pending'
            RETURNING id, reference, user_key, amount, currency, token_qty, status, gateway_payload, credited, created_at, updated_at, completed_at
            "#,
        )
        .bind(reference)
        .bind(target.as_str())
        .bind(&gateway_payload)
        .bind(completed_at)
        .bind(mark_credited)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(StatusUpdateOutcome::Applied(Self::row_to_transaction(&row)?));
        }

        let existing = self
            .get_transaction(reference)
            .await?
            .ok_or_else(|| AppError::UnknownReference(reference.to_string()))?;

        if existing.status == target {
            Ok(StatusUpdateOutcome::AlreadyInTargetState(existing))
        } else {
            Ok(StatusUpdateOutcome::Conflict(existing))
        }
    }

    async fn sweep_stale_pending(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = 'cancelled', updated_at = NOW()
            WHERE status = 'pending' AND created_at < $1
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn append_consumption(&self, entry: &ConsumptionEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO consumption_entries (id, user_key, token_qty, service_kind, work_item_id, description, consumed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.user_key)
        .bind(entry.token_qty)
        .bind(entry.service_kind.as_str())
        .bind(&entry.work_item_id)
        .bind(&entry.description)
        .bind(entry.consumed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_consumption(&self, user_key: &str, limit: i64) -> AppResult<Vec<ConsumptionEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_key, token_qty, service_kind, work_item_id, description, consumed_at
            FROM consumption_entries
            WHERE user_key = $1
            ORDER BY consumed_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_consumption).collect()
    }
}
