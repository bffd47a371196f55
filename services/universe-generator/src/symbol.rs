//! Symbol identity: security types, option style/right, canonical symbols,
//! and mirror-option symmetry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Security type a [`Symbol`] can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityType {
    /// Equity.
    Equity,
    /// Equity index.
    Index,
    /// Future contract.
    Future,
    /// Equity option.
    EquityOption,
    /// Index option.
    IndexOption,
    /// Option on a future.
    FutureOption,
}

impl SecurityType {
    /// Whether a security of this type supports IV/Greeks computation.
    ///
    /// Future-options are emitted with blank IV/Greeks columns even
    /// though they are options.
    #[must_use]
    pub fn has_greeks(self) -> bool {
        self.is_option() && self != SecurityType::FutureOption
    }

    /// Whether this security type is some flavor of option contract.
    #[must_use]
    pub fn is_option(self) -> bool {
        matches!(
            self,
            SecurityType::EquityOption | SecurityType::IndexOption | SecurityType::FutureOption
        )
    }

    /// Whether a canonical of this type resolves to an underlying security
    /// (i.e. needs underlying price history at all).
    #[must_use]
    pub fn needs_underlying_data(self) -> bool {
        self.is_option()
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SecurityType::Equity => "equity",
            SecurityType::Index => "index",
            SecurityType::Future => "future",
            SecurityType::EquityOption => "equityoption",
            SecurityType::IndexOption => "indexoption",
            SecurityType::FutureOption => "futureoption",
        };
        write!(f, "{s}")
    }
}

/// Option exercise style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionStyle {
    /// Exercisable any time before expiry.
    American,
    /// Exercisable only at expiry.
    European,
}

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionRight {
    /// Right to buy.
    Call,
    /// Right to sell.
    Put,
}

impl OptionRight {
    /// The opposite right, used to build a contract's mirror option.
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            OptionRight::Call => OptionRight::Put,
            OptionRight::Put => OptionRight::Call,
        }
    }

    /// Deterministic sort key: calls sort before puts.
    fn sort_key(self) -> u8 {
        match self {
            OptionRight::Call => 0,
            OptionRight::Put => 1,
        }
    }

    /// The `C`/`P` token this right is embedded as in a contract ticker
    /// (`TICKER_YYYYMMDD_[C|P]_STRIKE[_STYLE]`), matching
    /// `chain_discovery::parse_contract_ticker`'s decoding.
    #[must_use]
    pub fn ticker_marker(self) -> &'static str {
        match self {
            OptionRight::Call => "C",
            OptionRight::Put => "P",
        }
    }
}

/// Strike price stored as ten-thousandths of the quoted unit so that
/// [`Symbol`] can derive `Eq`/`Hash`/`Ord` without the pitfalls of hashing
/// raw `f64`. Mirrors the fixed-point convention
/// `VolatilitySurface::f64_to_fixed_point` uses for surface keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Strike(i64);

const STRIKE_SCALE: f64 = 10_000.0;

impl Strike {
    /// Build a strike from a decimal price. Negative strikes are rejected
    /// by callers; this constructor clamps to zero defensively rather than
    /// panicking on malformed input.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        let clamped = if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        };
        Self((clamped * STRIKE_SCALE).round() as i64)
    }

    /// Recover the decimal strike.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / STRIKE_SCALE
    }
}

/// Opaque identifier for a tradable (or canonical) derivative instrument.
///
/// Symbols are value-equal by their identifier fields; two `Symbol`s
/// constructed with the same fields compare equal regardless of identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// Security type.
    pub security_type: SecurityType,
    /// Market/exchange tag (e.g. "usa").
    pub market: String,
    /// Human/ticker identifier, e.g. "SPY", "NIFTY24JAN25000CE".
    pub ticker: String,
    /// Reference to the canonical underlying, absent for futures and for
    /// canonical symbols themselves.
    pub underlying: Option<Box<Symbol>>,
    /// Exercise style, when this is an option.
    pub option_style: Option<OptionStyle>,
    /// Call/put, when this is an option.
    pub option_right: Option<OptionRight>,
    /// Strike, zero for non-options.
    pub strike: Strike,
    /// Expiry date. Non-derivative symbols use a sentinel far-future date.
    pub expiry: DateTime<Utc>,
}

impl Symbol {
    /// True if this symbol denotes a chain root rather than a tradable
    /// contract.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.option_right.is_none() && self.strike.as_f64() == 0.0
    }

    /// Construct the mirror option: identical underlying/style/market/
    /// strike/expiry with the right flipped, and the ticker rewritten to
    /// the opposite-right contract's own ticker so history lookups by
    /// ticker (`archive_reader.rs`) resolve the true mirror contract
    /// rather than re-reading the original.
    ///
    /// Defined for every option symbol and involutive:
    /// `s.mirror().mirror() == s` (tested by `mirror_symbol_tests`). If
    /// `ticker` doesn't carry the expected right marker where the
    /// `TICKER_YYYYMMDD_[C|P]_STRIKE[_STYLE]` convention puts it, the
    /// ticker is left unchanged rather than guessed at.
    #[must_use]
    pub fn mirror(&self) -> Option<Symbol> {
        let right = self.option_right?;
        let flipped = right.flip();
        let ticker = flip_contract_ticker(&self.ticker, right, flipped).unwrap_or_else(|| self.ticker.clone());
        Some(Symbol {
            ticker,
            option_right: Some(flipped),
            ..self.clone()
        })
    }

    /// Deterministic ordering key used for chain enumeration:
    /// `(right, strike, expiry, full identifier)`.
    fn order_key(&self) -> (u8, Strike, DateTime<Utc>, &str) {
        let right_key = self.option_right.map_or(2, OptionRight::sort_key);
        (right_key, self.strike, self.expiry, self.ticker.as_str())
    }
}

/// Rewrite a contract ticker's `_[C|P]_` right token from `from` to `to`.
/// Returns `None` (leave the ticker alone) if the token at that position
/// doesn't match `from`'s marker, since the ticker then isn't in the
/// convention this function understands.
fn flip_contract_ticker(ticker: &str, from: OptionRight, to: OptionRight) -> Option<String> {
    let mut parts: Vec<&str> = ticker.split('_').collect();
    let slot = parts.get(2)?;
    if *slot != from.ticker_marker() {
        return None;
    }
    parts[2] = to.ticker_marker();
    Some(parts.join("_"))
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ticker)
    }
}
