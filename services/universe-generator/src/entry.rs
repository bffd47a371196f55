//! C3 — typed universe rows with update-from-slice semantics and CSV
//! emission.

use crate::greeks_engine::GreeksSnapshot;
use crate::slice::Slice;
use crate::symbol::Symbol;

fn fmt_decimal(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{value}")
    }
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map(fmt_decimal).unwrap_or_default()
}

/// Common OHLCV fields every row variant carries.
#[derive(Debug, Clone, Default)]
struct Ohlcv {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl Ohlcv {
    fn apply_trade(&mut self, bar: &crate::slice::TradeBar) {
        self.open = bar.open;
        self.high = bar.high;
        self.low = bar.low;
        self.close = bar.close;
        self.volume = bar.volume;
    }

    fn apply_quote_ohlc_only(&mut self, bar: &crate::slice::QuoteBar) {
        self.open = bar.open;
        self.high = bar.high;
        self.low = bar.low;
        self.close = bar.close;
    }
}

/// Underlying (non-contract) row: equity, index, or future root.
#[derive(Debug, Clone)]
pub struct UnderlyingRow {
    /// Underlying symbol.
    pub symbol: Symbol,
    ohlcv: Ohlcv,
}

impl UnderlyingRow {
    /// Start a fresh, empty underlying row.
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            ohlcv: Ohlcv::default(),
        }
    }

    /// Prefer trade bars; fall back to quote-bar OHLC with volume left at
    /// zero.
    pub fn update(&mut self, slice: &Slice) {
        if let Some(bar) = slice.trades.get(&self.symbol) {
            self.ohlcv.apply_trade(bar);
        } else if let Some(quote) = slice.quotes.get(&self.symbol) {
            self.ohlcv.apply_quote_ohlc_only(quote);
        }
    }

    /// Column headers for this row's CSV shape.
    #[must_use]
    pub fn header_fields() -> Vec<&'static str> {
        vec!["symbol_id", "symbol_value", "open", "high", "low", "close", "volume"]
    }

    /// This row rendered as CSV fields, in header order.
    ///
    /// `symbol_id` and `symbol_value` both carry `symbol.ticker`: this
    /// type has no separate SID distinct from the ticker, so the two
    /// columns collapse to the same value rather than one going blank.
    #[must_use]
    pub fn to_csv_fields(&self) -> Vec<String> {
        vec![
            self.symbol.ticker.clone(),
            self.symbol.ticker.clone(),
            fmt_decimal(self.ohlcv.open),
            fmt_decimal(self.ohlcv.high),
            fmt_decimal(self.ohlcv.low),
            fmt_decimal(self.ohlcv.close),
            fmt_decimal(self.ohlcv.volume),
        ]
    }
}

/// Base contract row (e.g. a future) without IV/Greeks.
#[derive(Debug, Clone)]
pub struct ContractRow {
    /// Contract symbol.
    pub symbol: Symbol,
    ohlcv: Ohlcv,
    open_interest: u64,
}

impl ContractRow {
    /// Start a fresh, empty contract row.
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            ohlcv: Ohlcv::default(),
            open_interest: 0,
        }
    }

    /// Adopt open interest when present; take volume from trade bars and
    /// OHLC from whichever bar type is available.
    pub fn update(&mut self, slice: &Slice) {
        if let Some(oi) = slice.open_interest.get(&self.symbol) {
            self.open_interest = *oi;
        }
        if let Some(bar) = slice.trades.get(&self.symbol) {
            self.ohlcv.apply_trade(bar);
        } else if let Some(quote) = slice.quotes.get(&self.symbol) {
            self.ohlcv.apply_quote_ohlc_only(quote);
        }
    }

    /// Column headers for this row's CSV shape.
    #[must_use]
    pub fn header_fields() -> Vec<&'static str> {
        let mut h = UnderlyingRow::header_fields();
        h.push("open_interest");
        h
    }

    /// This row rendered as CSV fields, in header order. `symbol_id` and
    /// `symbol_value` both carry `symbol.ticker` (see `UnderlyingRow`'s
    /// `to_csv_fields`).
    #[must_use]
    pub fn to_csv_fields(&self) -> Vec<String> {
        vec![
            self.symbol.ticker.clone(),
            self.symbol.ticker.clone(),
            fmt_decimal(self.ohlcv.open),
            fmt_decimal(self.ohlcv.high),
            fmt_decimal(self.ohlcv.low),
            fmt_decimal(self.ohlcv.close),
            fmt_decimal(self.ohlcv.volume),
            self.open_interest.to_string(),
        ]
    }
}

/// Option contract row: base contract fields plus IV and the five Greeks.
#[derive(Debug, Clone)]
pub struct OptionRow {
    /// Option symbol.
    pub symbol: Symbol,
    ohlcv: Ohlcv,
    open_interest: u64,
    /// Implied volatility, `None` when missing (never written as 0.0 —
    /// rendered as an empty CSV field instead).
    pub implied_volatility: Option<f64>,
    /// Greeks, `None` when IV itself is missing.
    pub greeks: Option<GreeksSnapshot>,
}

impl OptionRow {
    /// Start a fresh, empty option row.
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            ohlcv: Ohlcv::default(),
            open_interest: 0,
            implied_volatility: None,
            greeks: None,
        }
    }

    /// All base-contract update behavior; IV/Greeks are populated
    /// separately by the orchestrator from the contract's [`GreeksEngine`]
    /// once the full history stream has been consumed — option rows
    /// forward bars into the Greeks engine, they don't compute Greeks
    /// themselves.
    ///
    /// [`GreeksEngine`]: crate::greeks_engine::GreeksEngine
    pub fn update(&mut self, slice: &Slice) {
        if let Some(oi) = slice.open_interest.get(&self.symbol) {
            self.open_interest = *oi;
        }
        if let Some(bar) = slice.trades.get(&self.symbol) {
            self.ohlcv.apply_trade(bar);
        } else if let Some(quote) = slice.quotes.get(&self.symbol) {
            self.ohlcv.apply_quote_ohlc_only(quote);
        }
    }

    /// Record the IV/Greeks snapshot computed by the streaming engine (or
    /// later by the IV interpolator's repair pass).
    pub fn set_greeks(&mut self, iv: f64, greeks: GreeksSnapshot) {
        self.implied_volatility = Some(iv);
        self.greeks = Some(greeks);
    }

    /// Column headers for this row's CSV shape.
    #[must_use]
    pub fn header_fields() -> Vec<&'static str> {
        let mut h = ContractRow::header_fields();
        h.extend(["implied_volatility", "delta", "gamma", "vega", "theta", "rho"]);
        h
    }

    /// This row rendered as CSV fields, in header order. `symbol_id` and
    /// `symbol_value` both carry `symbol.ticker` (see `UnderlyingRow`'s
    /// `to_csv_fields`).
    #[must_use]
    pub fn to_csv_fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.symbol.ticker.clone(),
            self.symbol.ticker.clone(),
            fmt_decimal(self.ohlcv.open),
            fmt_decimal(self.ohlcv.high),
            fmt_decimal(self.ohlcv.low),
            fmt_decimal(self.ohlcv.close),
            fmt_decimal(self.ohlcv.volume),
            self.open_interest.to_string(),
        ];
        fields.push(fmt_optional(self.implied_volatility));
        fields.push(fmt_optional(self.greeks.map(|g| g.delta)));
        fields.push(fmt_optional(self.greeks.map(|g| g.gamma)));
        fields.push(fmt_optional(self.greeks.map(|g| g.vega)));
        fields.push(fmt_optional(self.greeks.map(|g| g.theta)));
        fields.push(fmt_optional(self.greeks.map(|g| g.rho)));
        fields
    }
}

/// A universe row of any variant, sharing a common update/render interface
/// — composition over a deep-inheritance row hierarchy.
#[derive(Debug, Clone)]
pub enum UniverseEntry {
    /// Underlying row.
    Underlying(UnderlyingRow),
    /// Non-option contract row (e.g. a future).
    Contract(ContractRow),
    /// Option contract row.
    Option(OptionRow),
}

impl UniverseEntry {
    /// Integrate one slice into this row.
    pub fn update(&mut self, slice: &Slice) {
        match self {
            UniverseEntry::Underlying(r) => r.update(slice),
            UniverseEntry::Contract(r) => r.update(slice),
            UniverseEntry::Option(r) => r.update(slice),
        }
    }

    /// This row rendered as CSV fields.
    #[must_use]
    pub fn to_csv_fields(&self) -> Vec<String> {
        match self {
            UniverseEntry::Underlying(r) => r.to_csv_fields(),
            UniverseEntry::Contract(r) => r.to_csv_fields(),
            UniverseEntry::Option(r) => r.to_csv_fields(),
        }
    }

    /// The symbol this row belongs to.
    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        match self {
            UniverseEntry::Underlying(r) => &r.symbol,
            UniverseEntry::Contract(r) => &r.symbol,
            UniverseEntry::Option(r) => &r.symbol,
        }
    }
}
