//! Core order book implementation

use common::{L2Update, LOBUpdate, Px, Qty, Side, Symbol, Ts};
use crate::price_levels::{SideBook, DEPTH};

/// Full order book for a single symbol
#[derive(Clone, Debug)]
pub struct OrderBook {
    /// Symbol this book represents
    pub symbol: Symbol,
    /// Last update timestamp
    pub ts: Ts,
    /// Bid side (buyers)
    pub bids: SideBook,
    /// Ask side (sellers)  
    pub asks: SideBook,
    /// Sequence number for updates
    pub sequence: u64,
}

impl OrderBook {
    /// Create a new empty order book
    #[inline]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            ts: Ts::from_nanos(0),
            bids: SideBook::new(),
            asks: SideBook::new(),
            sequence: 0,
        }
    }

    /// Apply an L2 update to the book
    /// 
    /// This is the hot path - must be < 200ns p50
    #[inline]
    pub fn apply(&mut self, update: &L2Update) -> Result<(), BookError> {
        // Update timestamp and sequence
        self.ts = update.ts;
        self.sequence += 1;

        // Select the side
        let side = match update.side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };

        // Apply the update
        side.set(update.level as usize, update.price, update.qty);

        // Check for crossed book
        if self.is_crossed() {
            return Err(BookError::CrossedBook {
                bid: self.bids.best().map(|(p, _)| p),
                ask: self.asks.best().map(|(p, _)| p),
            });
        }

        Ok(())
    }

    /// Get the best bid price and size
    #[inline]
    pub fn best_bid(&self) -> Option<(Px, Qty)> {
        self.bids.best()
    }

    /// Get the best ask price and size
    #[inline]
    pub fn best_ask(&self) -> Option<(Px, Qty)> {
        self.asks.best()
    }

    /// Calculate mid price (average of best bid and ask)
    #[inline]
    pub fn mid(&self) -> Option<Px> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => {
                let mid_ticks = (bid.as_i64() + ask.as_i64()) / 2;
                Some(Px::from_i64(mid_ticks))
            }
            _ => None,
        }
    }

    /// Calculate microprice (size-weighted mid)
    #[inline]
    pub fn microprice(&self) -> Option<Px> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid_px, bid_qty)), Some((ask_px, ask_qty))) => {
                let bid_val = bid_px.as_i64() * ask_qty.as_i64();
                let ask_val = ask_px.as_i64() * bid_qty.as_i64();
                let total_qty = bid_qty.as_i64() + ask_qty.as_i64();
                
                if total_qty > 0 {
                    let micro_ticks = (bid_val + ask_val) / total_qty;
                    Some(Px::from_i64(micro_ticks))
                } else {
                    self.mid()
                }
            }
            _ => None,
        }
    }

    /// Calculate spread in ticks
    #[inline]
    pub fn spread_ticks(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => {
                Some(ask.as_i64() - bid.as_i64())
            }
            _ => None,
        }
    }

    /// Calculate order book imbalance
    /// Returns value between -1.0 (all on ask) and 1.0 (all on bid)
    #[inline]
    pub fn imbalance(&self, depth: usize) -> Option<f64> {
        let bid_qty = self.bids.total_qty(depth).as_i64();
        let ask_qty = self.asks.total_qty(depth).as_i64();
        let total = bid_qty + ask_qty;
        
        if total > 0 {
            Some((bid_qty - ask_qty) as f64 / total as f64)
        } else {
            None
        }
    }

    /// Check if book is crossed (bid >= ask)
    #[inline]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    /// Check if book is locked (bid == ask)
    #[inline]
    pub fn is_locked(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid == ask,
            _ => false,
        }
    }

    /// Clear the entire book
    #[inline]
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.sequence = 0;
    }

    /// Create LOB update message
    #[inline]
    pub fn to_update(&self) -> LOBUpdate {
        let (bid, bid_size) = self.best_bid()
            .map(|(p, q)| (Some(p), Some(q)))
            .unwrap_or((None, None));
        
        let (ask, ask_size) = self.best_ask()
            .map(|(p, q)| (Some(p), Some(q)))
            .unwrap_or((None, None));

        LOBUpdate::new(
            self.ts,
            self.symbol,
            bid,
            bid_size,
            ask,
            ask_size,
        )
    }

    /// Get a hash of the book state for deterministic verification
    #[inline]
    pub fn state_hash(&self) -> u64 {
        let mut hash = 0u64;
        
        // Include bid levels
        for i in 0..self.bids.depth.min(DEPTH) {
            hash = hash.wrapping_mul(31).wrapping_add(self.bids.prices[i].as_i64() as u64);
            hash = hash.wrapping_mul(31).wrapping_add(self.bids.qtys[i].as_i64() as u64);
        }
        
        // Include ask levels
        for i in 0..self.asks.depth.min(DEPTH) {
            hash = hash.wrapping_mul(31).wrapping_add(self.asks.prices[i].as_i64() as u64);
            hash = hash.wrapping_mul(31).wrapping_add(self.asks.qtys[i].as_i64() as u64);
        }
        
        hash
    }
}

/// Error types for order book operations
#[derive(Debug, thiserror::Error)]
pub enum BookError {
    /// Book would be crossed after update
    #[error("Crossed book: bid={bid:?} >= ask={ask:?}")]
    CrossedBook {
        /// Best bid that would cross
        bid: Option<Px>,
        /// Best ask that would cross
        ask: Option<Px>,
    },
    
    /// Invalid price level
    #[error("Invalid level: {level} >= {}", DEPTH)]
    InvalidLevel {
        /// The invalid level
        level: usize,
    },
}
