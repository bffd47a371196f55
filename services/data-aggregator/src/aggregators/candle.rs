//! Candle aggregator implementation

/// Aggregator for candle data processing
#[derive(Debug)]
pub struct CandleAggregator {
    // Implementation details
}

impl Default for CandleAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandleAggregator {
    /// Create a new candle aggregator
    #[must_use] pub const fn new() -> Self {
        Self {}
    }
}
