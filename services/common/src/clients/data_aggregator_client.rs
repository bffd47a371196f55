//! Data Aggregator Client
//!
//! Client for interacting with the data aggregator service

use anyhow::Result;
use common::{Px, Qty, Symbol, Ts};
use data_aggregator::{Candle, DataAggregator, DataAggregatorService, Timeframe};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Client for data aggregator service
pub struct DataAggregatorClient {
    /// The aggregator service
    service: Arc<RwLock<DataAggregatorService>>,
    /// Service name
    name: String,
}

impl DataAggregatorClient {
    /// Create new client without WAL
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            service: Arc::new(RwLock::new(DataAggregatorService::new())),
            name: name.into(),
        }
    }

    /// Create new client with WAL persistence
    pub fn with_wal(name: impl Into<String>, wal_path: &Path) -> Result<Self> {
        let service = DataAggregatorService::with_wal(wal_path)?;
        Ok(Self {
            service: Arc::new(RwLock::new(service)),
            name: name.into(),
        })
    }

    /// Process a trade
    pub async fn process_trade(
        &self,
        symbol: Symbol,
        price: Px,
        quantity: Qty,
        is_buy: bool,
    ) -> Result<()> {
        let ts = Ts::now();
        let mut service = self.service.write().await;
        service
            .process_trade(symbol, ts, price, quantity, is_buy)
            .await?;
        debug!(
            "[{}] Processed trade: {:?} {} @ {}",
            self.name, symbol, quantity, price
        );
        Ok(())
    }

    /// Process a trade with timestamp
    pub async fn process_trade_with_ts(
        &self,
        symbol: Symbol,
        ts: Ts,
        price: Px,
        quantity: Qty,
        is_buy: bool,
    ) -> Result<()> {
        let mut service = self.service.write().await;
        service
            .process_trade(symbol, ts, price, quantity, is_buy)
            .await?;
        debug!(
            "[{}] Processed trade: {:?} {} @ {} at {}",
            self.name, symbol, quantity, price, ts
        );
        Ok(())
    }

    /// Get current candle for symbol and timeframe
    pub async fn get_current_candle(&self, symbol: Symbol, timeframe: Timeframe) -> Option<Candle> {
        let service = self.service.read().await;
        service.get_current_candle(symbol, timeframe).await
    }

    /// Get completed candles
    pub async fn get_candles(
        &self,
        symbol: Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Vec<Candle> {
        let service = self.service.read().await;
        service.get_candles(symbol, timeframe, limit).await
    }

    /// Flush WAL to disk
    pub async fn flush_wal(&self) -> Result<()> {
        let service = self.service.read().await;
        service.flush_wal().await?;
        info!("[{}] WAL flushed to disk", self.name);
        Ok(())
    }

    /// Get WAL statistics
    pub async fn get_wal_stats(&self) -> Result<Option<data_aggregator::storage::wal::WalStats>> {
        let service = self.service.read().await;
        service.wal_stats().await
    }

    /// Replay events from WAL
    pub async fn replay_from_wal(&self, from_ts: Option<Ts>) -> Result<u64> {
        info!("[{}] Starting WAL replay from {:?}", self.name, from_ts);

        let service = self.service.read().await;
        let count = service.replay_from_wal(from_ts).await?;

        info!(
            "[{}] Completed WAL replay: {} events processed",
            self.name, count
        );
        Ok(count)
    }
}
