//! API handlers for different service endpoints

pub mod auth;
pub mod execution;
pub mod health;
pub mod market_data;
pub mod risk;

pub use auth::AuthHandlers;
pub use execution::ExecutionHandlers;
pub use health::HealthHandlers;
pub use market_data::MarketDataHandlers;
pub use risk::RiskHandlers;
