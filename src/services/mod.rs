pub mod analysis_engine;
pub mod consumption_guard;
pub mod gateway_client;
pub mod payment_orchestrator;
pub mod pricing_policy;
pub mod token_ledger;
