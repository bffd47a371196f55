//! Integration modules for production-grade feed processing

pub mod binance_testnet_v2;
pub mod zerodha_live_test;

pub use binance_testnet_v2::*;
pub use zerodha_live_test::*;
