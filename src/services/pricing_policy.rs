use bigdecimal::{BigDecimal, ToPrimitive};

use crate::config::PricingConfig;
use crate::error::{AppError, AppResult};
use crate::models::domain::ServiceKind;

/// Pure functions converting between monetary amounts and token quantities,
/// and service pricing lookups (spec section 4.3). No I/O.
pub struct PricingPolicy<'a> {
    config: &'a PricingConfig,
}

impl<'a> PricingPolicy<'a> {
    pub fn new(config: &'a PricingConfig) -> Self {
        Self { config }
    }

    /// `floor(amount * tokens_per_unit_money)`.
    pub fn tokens_for(&self, amount: &BigDecimal) -> AppResult<i64> {
        let scaled = amount * BigDecimal::from(self.config.tokens_per_unit_money);
        scaled
            .with_scale(0)
            .to_i64()
            .ok_or_else(|| AppError::Validation("amount out of representable range".to_string()))
    }

    /// Exact inverse at two-decimal precision. Strict integer pricing
    /// (DESIGN.md open-question resolution): rejects a token quantity that
    /// does not divide cleanly back into the configured currency's cent
    /// precision, rather than flooring and donating the residue.
    pub fn amount_for(&self, token_qty: i64) -> AppResult<BigDecimal> {
        if token_qty <= 0 {
            return Err(AppError::Validation("token_qty must be positive".to_string()));
        }
        if token_qty % self.config.tokens_per_unit_money != 0 {
            return Err(AppError::Validation(format!(
                "token_qty {} does not convert to an exact amount at {} tokens per unit money",
                token_qty, self.config.tokens_per_unit_money
            )));
        }
        let amount = BigDecimal::from(token_qty) / BigDecimal::from(self.config.tokens_per_unit_money);
        Ok(amount.with_scale(2))
    }

    pub fn cost_of(&self, service_kind: ServiceKind) -> AppResult<i64> {
        self.config
            .service_costs
            .get(&service_kind)
            .copied()
            .ok_or_else(|| AppError::Configuration(format!("no configured cost for {}", service_kind)))
    }

    /// Rejects values outside `[min_purchase_money, max_purchase_money]`.
    pub fn validate_purchase_amount(&self, amount: &BigDecimal) -> AppResult<()> {
        if amount < &self.config.min_purchase_money {
            return Err(AppError::Validation(format!(
                "amount {} is below the minimum purchase of {}",
                amount, self.config.min_purchase_money
            )));
        }
        if amount > &self.config.max_purchase_money {
            return Err(AppError::Validation(format!(
                "amount {} exceeds the maximum purchase of {}",
                amount, self.config.max_purchase_money
            )));
        }
        Ok(())
    }

    pub fn validate_currency(&self, currency: &str) -> AppResult<()> {
        if currency != self.config.currency {
            return Err(AppError::Validation(format!(
                "unsupported currency {}, expected {}",
                currency, self.config.currency
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::str::FromStr;

    fn test_config() -> PricingConfig {
        let mut service_costs = HashMap::new();
        service_costs.insert(ServiceKind::Analysis, 10);
        service_costs.insert(ServiceKind::Transform, 5);
        service_costs.insert(ServiceKind::PremiumInsights, 25);
        PricingConfig {
            currency: "NGN".to_string(),
            tokens_per_unit_money: 2,
            min_purchase_money: BigDecimal::from_str("50.00").unwrap(),
            max_purchase_money: BigDecimal::from_str("1000000.00").unwrap(),
            free_grant_tokens: 100,
            service_costs,
        }
    }

    #[test]
    fn tokens_for_amount_for_round_trip_on_divisible_quantities() {
        let config = test_config();
        let policy = PricingPolicy::new(&config);
        let amount = policy.amount_for(1000).unwrap();
        let qty = policy.tokens_for(&amount).unwrap();
        assert_eq!(qty, 1000);
    }

    #[test]
    fn amount_for_rejects_non_divisible_quantities() {
        let config = test_config();
        let policy = PricingPolicy::new(&config);
        assert!(policy.amount_for(3).is_err());
    }

    #[test]
    fn boundary_min_purchase_accepted_one_unit_less_rejected() {
        let config = test_config();
        let policy = PricingPolicy::new(&config);
        assert!(policy.validate_purchase_amount(&config.min_purchase_money).is_ok());
        let below = &config.min_purchase_money - BigDecimal::from_str("0.01").unwrap();
        assert!(policy.validate_purchase_amount(&below).is_err());
    }

    proptest::proptest! {
        #[test]
        fn tokens_for_is_never_negative_for_nonnegative_amounts(cents in 0i64..100_000_000) {
            let config = test_config();
            let policy = PricingPolicy::new(&config);
            let amount = BigDecimal::from(cents) / BigDecimal::from(100);
            let qty = policy.tokens_for(&amount).unwrap();
            prop_assert!(qty >= 0);
        }
    }
}
