use std::sync::Arc;

use crate::db::Store;
use crate::error::AppResult;
use crate::models::domain::{DebitOutcome, UserBalance};

/// Thin facade over the Store that enforces invariants and centralizes
/// policy for first-use grant application (spec section 4.4). No other code
/// path may credit the free grant.
pub struct TokenLedger {
    store: Arc<dyn Store>,
    free_grant_tokens: i64,
}

impl TokenLedger {
    pub fn new(store: Arc<dyn Store>, free_grant_tokens: i64) -> Self {
        Self { store, free_grant_tokens }
    }

    pub async fn balance_of(&self, user_key: &str) -> AppResult<UserBalance> {
        let (balance, _was_created) = self.store.get_or_create_balance(user_key, self.free_grant_tokens).await?;
        Ok(balance)
    }

    /// Returns the balance alongside whether this call was the first
    /// observation of `user_key` (and therefore applied the free grant).
    pub async fn balance_of_with_creation_flag(&self, user_key: &str) -> AppResult<(UserBalance, bool)> {
        self.store.get_or_create_balance(user_key, self.free_grant_tokens).await
    }

    pub async fn credit(&self, user_key: &str, qty: i64) -> AppResult<UserBalance> {
        debug_assert!(qty > 0, "credit quantity must be positive");
        self.store.credit(user_key, qty, chrono::Utc::now()).await
    }

    pub async fn debit(&self, user_key: &str, qty: i64) -> AppResult<DebitOutcome> {
        self.store.try_debit(user_key, qty).await
    }

    pub async fn consumption_history(&self, user_key: &str, limit: i64) -> AppResult<Vec<crate::models::domain::ConsumptionEntry>> {
        self.store.list_consumption(user_key, limit).await
    }
}
