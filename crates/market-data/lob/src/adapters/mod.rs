//! Market data adapters for converting tick data to LOB format

pub mod binance_live_features;
pub mod binance_testnet_v1;
pub mod features_demo;
pub mod nifty_tick_to_lob;

pub use binance_live_features::*;
pub use binance_testnet_v1::*;
pub use features_demo::*;
pub use nifty_tick_to_lob::*;
