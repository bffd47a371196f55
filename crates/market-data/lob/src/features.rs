//! Feature extraction from order book

use crate::book::OrderBook;
use common::{FeatureFrame, Px, Qty, Ts};

/// Feature calculator for order book metrics
pub struct FeatureCalculator {
    /// VWAP window in nanoseconds
    window_ns: u64,
    /// VWAP price history (circular buffer)
    prices: Vec<(Ts, Px, Qty)>,
    /// Current position in circular buffer
    pos: usize,
    /// Max entries in VWAP buffer
    capacity: usize,
}

impl FeatureCalculator {
    /// Create a new feature calculator
    #[must_use]
    pub fn new(vwap_window_ns: u64, vwap_capacity: usize) -> Self {
        Self {
            window_ns: vwap_window_ns,
            prices: Vec::with_capacity(vwap_capacity),
            pos: 0,
            capacity: vwap_capacity,
        }
    }

    /// Calculate features from current order book state
    #[inline]
    pub fn calculate(&mut self, book: &OrderBook) -> Option<FeatureFrame> {
        // Need both sides for most features
        let (bid_px, bid_qty) = book.best_bid()?;
        let (ask_px, ask_qty) = book.best_ask()?;

        // Basic features
        let spread_ticks = ask_px.as_i64() - bid_px.as_i64();
        let mid = i64::midpoint(bid_px.as_i64(), ask_px.as_i64());

        // Microprice
        let micro = {
            let bid_val = bid_px.as_i64() * ask_qty.as_i64();
            let ask_val = ask_px.as_i64() * bid_qty.as_i64();
            let total_qty = bid_qty.as_i64() + ask_qty.as_i64();
            if total_qty > 0 {
                (bid_val + ask_val) / total_qty
            } else {
                mid
            }
        };

        // Imbalance at depth 5
        let imbalance = book.imbalance(5).unwrap_or(0.0);

        // Update VWAP tracking with mid price
        let mid_px = Px::from_i64(mid);
        let total_qty = Qty::from_i64(bid_qty.as_i64() + ask_qty.as_i64());
        self.update_prices(book.ts, mid_px, total_qty);

        // Calculate VWAP deviation
        let vwap_dev = self.calculate_deviation(mid_px);

        Some(
            FeatureFrame::new(book.ts, book.symbol)
                .with_prices(spread_ticks, mid, micro)
                .with_metrics(imbalance, vwap_dev),
        )
    }

    /// Update price tracking
    #[inline]
    fn update_prices(&mut self, ts: Ts, price: Px, qty: Qty) {
        // Add to circular buffer
        if self.prices.len() < self.capacity {
            self.prices.push((ts, price, qty));
        } else {
            self.prices[self.pos] = (ts, price, qty);
            self.pos = (self.pos + 1) % self.capacity;
        }

        // Remove old entries
        let cutoff = ts.as_nanos().saturating_sub(self.window_ns);
        self.prices.retain(|(t, _, _)| t.as_nanos() >= cutoff);
    }

    /// Calculate VWAP deviation as percentage
    #[inline]
    fn calculate_deviation(&self, current_price: Px) -> f64 {
        if self.prices.is_empty() {
            return 0.0;
        }

        let mut value_sum = 0i64;
        let mut qty_sum = 0i64;

        for (_, px, qty) in &self.prices {
            value_sum += px.as_i64() * qty.as_i64();
            qty_sum += qty.as_i64();
        }

        if qty_sum > 0 {
            let vwap = value_sum / qty_sum;
            let deviation = current_price.as_i64() - vwap;
            #[allow(clippy::cast_precision_loss)]
            // SAFETY: Cast is safe within expected range
            let result = (deviation as f64 / vwap as f64) * 100.0;
            result
        } else {
            0.0
        }
    }

    /// Reset the calculator
    pub fn reset(&mut self) {
        self.prices.clear();
        self.pos = 0;
    }
}
