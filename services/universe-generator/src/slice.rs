//! Slices: timestamped, multi-symbol bundles of trade bars, quote bars and
//! open interest.

use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

/// OHLCV trade bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeBar {
    /// Bar open time.
    pub end_time: DateTime<Utc>,
    /// Opening price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
}

/// OHLC bar built from bid/ask midpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteBar {
    /// Bar end time.
    pub end_time: DateTime<Utc>,
    /// Midpoint open.
    pub open: f64,
    /// Midpoint high.
    pub high: f64,
    /// Midpoint low.
    pub low: f64,
    /// Midpoint close.
    pub close: f64,
    /// Latest best bid, used by the Greeks engine's put-call parity seed.
    pub bid: f64,
    /// Latest best ask.
    pub ask: f64,
}

impl QuoteBar {
    /// Mid price implied by this quote bar's close.
    #[must_use]
    pub fn mid(&self) -> f64 {
        self.close
    }
}

/// One timestamped cross-section of market data across a set of symbols.
#[derive(Debug, Clone, Default)]
pub struct Slice {
    /// Slice timestamp.
    pub time: Option<DateTime<Utc>>,
    /// Trade bars keyed by symbol.
    pub trades: FxHashMap<Symbol, TradeBar>,
    /// Quote bars keyed by symbol.
    pub quotes: FxHashMap<Symbol, QuoteBar>,
    /// Open interest snapshots keyed by symbol.
    pub open_interest: FxHashMap<Symbol, u64>,
}

impl Slice {
    /// An empty slice at the given time.
    #[must_use]
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time: Some(time),
            ..Default::default()
        }
    }

    /// True if this slice carries no data for any symbol.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.quotes.is_empty() && self.open_interest.is_empty()
    }
}

/// Merge two ordered slice streams by timestamp.
///
/// The merge emits at every timestamp present in *either* stream; a stream
/// with no entry at a given timestamp contributes nothing for that
/// timestamp rather than blocking the other.
/// Both inputs must already be sorted by `time`.
pub fn synchronize(mut left: Vec<Slice>, mut right: Vec<Slice>) -> Vec<Slice> {
    left.sort_by_key(|s| s.time);
    right.sort_by_key(|s| s.time);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);

    while i < left.len() || j < right.len() {
        let lt = left.get(i).and_then(|s| s.time);
        let rt = right.get(j).and_then(|s| s.time);

        match (lt, rt) {
            (Some(lt), Some(rt)) if lt == rt => {
                let mut combined = left[i].clone();
                merge_into(&mut combined, &right[j]);
                merged.push(combined);
                i += 1;
                j += 1;
            }
            (Some(lt), Some(rt)) if lt < rt => {
                merged.push(left[i].clone());
                i += 1;
            }
            (Some(_), Some(_)) => {
                merged.push(right[j].clone());
                j += 1;
            }
            (Some(_), None) => {
                merged.push(left[i].clone());
                i += 1;
            }
            (None, Some(_)) => {
                merged.push(right[j].clone());
                j += 1;
            }
            (None, None) => break,
        }
    }

    merged
}

fn merge_into(dst: &mut Slice, src: &Slice) {
    for (sym, bar) in &src.trades {
        dst.trades.insert(sym.clone(), *bar);
    }
    for (sym, bar) in &src.quotes {
        dst.quotes.insert(sym.clone(), *bar);
    }
    for (sym, oi) in &src.open_interest {
        dst.open_interest.insert(sym.clone(), *oi);
    }
}
