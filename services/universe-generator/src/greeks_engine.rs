//! C4 — the stateful per-contract Greeks engine.
//!
//! Generalizes `options_engine::BlackScholes`'s one-shot functions into a
//! streaming indicator bundle: a shared IV indicator is updated once per
//! batch, and each Greek reads that shared value, rather than each Greek
//! holding its own pointer back to the IV indicator.

use crate::pricing::{self, Greeks};
use crate::slice::{QuoteBar, Slice, TradeBar};
use crate::symbol::{OptionRight, Symbol};
use tracing::debug;

/// Pricing model used both for IV inversion and for Greeks recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingModel {
    /// Closed-form Black-Scholes.
    BlackScholes,
    /// Cox-Ross-Rubinstein-style binomial tree.
    BinomialTree,
    /// Forward (risk-neutral growth) binomial tree.
    ForwardTree,
}

/// Shared configuration for a [`GreeksEngine`].
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Annualized risk-free rate.
    pub risk_free_rate: f64,
    /// Annualized dividend/carry yield.
    pub dividend_yield: f64,
    /// Pricing model used to recompute a theoretical price from IV.
    pub pricing_model: PricingModel,
    /// Tree depth, used only when `pricing_model` is a tree variant.
    pub tree_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            dividend_yield: 0.0,
            pricing_model: PricingModel::BlackScholes,
            tree_steps: 200,
        }
    }
}

/// A full Greeks snapshot, returned by `get_greeks()`.
/// `lambda` is always zero — it is not computed by this engine, only
/// reserved in the snapshot shape the caller expects.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GreeksSnapshot {
    /// Delta.
    pub delta: f64,
    /// Gamma.
    pub gamma: f64,
    /// Vega.
    pub vega: f64,
    /// Theta.
    pub theta: f64,
    /// Rho.
    pub rho: f64,
    /// Leverage factor; unused, always zero.
    pub lambda: f64,
}

impl From<Greeks> for GreeksSnapshot {
    fn from(g: Greeks) -> Self {
        Self {
            delta: g.delta,
            gamma: g.gamma,
            vega: g.vega,
            theta: g.theta,
            rho: g.rho,
            lambda: 0.0,
        }
    }
}

/// Streaming per-contract IV + Greeks indicator bundle.
pub struct GreeksEngine {
    config: EngineConfig,
    option: Symbol,
    right: OptionRight,
    expiry: chrono::DateTime<chrono::Utc>,
    strike: f64,
    last_underlying_close: Option<f64>,
    last_option_mid: Option<f64>,
    last_mirror_mid: Option<f64>,
    iv: f64,
    greeks: GreeksSnapshot,
}

impl GreeksEngine {
    /// Create a fresh engine for one option contract.
    #[must_use]
    pub fn new(option: Symbol, config: EngineConfig) -> Self {
        let right = option.option_right.unwrap_or(OptionRight::Call);
        let expiry = option.expiry;
        let strike = option.strike.as_f64();
        Self {
            config,
            option,
            right,
            expiry,
            strike,
            last_underlying_close: None,
            last_option_mid: None,
            last_mirror_mid: None,
            iv: 0.0,
            greeks: GreeksSnapshot::default(),
        }
    }

    /// Latest implied volatility, `0.0` if none has been found yet.
    #[must_use]
    pub fn iv(&self) -> f64 {
        self.iv
    }

    /// Current Greeks snapshot.
    #[must_use]
    pub fn get_greeks(&self) -> GreeksSnapshot {
        self.greeks
    }

    /// Integrate one slice: forward every underlying trade bar and every
    /// quote bar (self or mirror) that appears in it. Any computation
    /// failure for this bar is logged and swallowed — the engine keeps its
    /// previous IV/Greeks rather than propagating an error.
    pub fn update(&mut self, slice: &Slice, underlying: &Symbol) {
        if let Some(bar) = slice.trades.get(underlying) {
            self.on_underlying_trade(bar);
        }

        if let Some(quote) = slice.quotes.get(&self.option) {
            self.last_option_mid = Some(quote.mid());
        }

        if let Some(mirror) = self.option.mirror() {
            if let Some(quote) = slice.quotes.get(&mirror) {
                self.last_mirror_mid = Some(quote.mid());
            }
        }

        if slice.quotes.contains_key(&self.option) || self.last_option_mid.is_some() {
            self.recompute(slice.time.unwrap_or_else(chrono::Utc::now));
        }
    }

    fn on_underlying_trade(&mut self, bar: &TradeBar) {
        self.last_underlying_close = Some(bar.close);
    }

    fn recompute(&mut self, reference_time: chrono::DateTime<chrono::Utc>) {
        let (Some(spot), Some(option_mid)) = (self.last_underlying_close, self.last_option_mid)
        else {
            return;
        };

        let tau = pricing::time_till_expiry(self.expiry, reference_time);
        if tau <= 0.0 {
            debug!(ticker = %self.option.ticker, "expired contract, skipping IV update");
            return;
        }

        match self.invert_iv(spot, tau, option_mid) {
            Some(iv) => {
                self.iv = iv;
                self.greeks = greeks_for_model(
                    self.config.pricing_model,
                    iv,
                    spot,
                    self.strike,
                    tau,
                    self.config.risk_free_rate,
                    self.config.dividend_yield,
                    self.right,
                    self.config.tree_steps,
                )
                .into();
            }
            None => {
                debug!(ticker = %self.option.ticker, "IV root-find diverged, keeping previous value");
            }
        }
    }

    /// Seed and solve implied volatility. When a mirror quote is available,
    /// put-call parity gives a cheap, more stable initial guess.
    fn invert_iv(&self, spot: f64, tau: f64, option_mid: f64) -> Option<f64> {
        let seed = self
            .last_mirror_mid
            .map(|mirror_mid| self.parity_seed(spot, tau, option_mid, mirror_mid))
            .unwrap_or(0.2);

        newton_raphson_iv(
            self.config.pricing_model,
            self.right,
            spot,
            self.strike,
            self.config.risk_free_rate,
            self.config.dividend_yield,
            tau,
            option_mid,
            seed.clamp(1e-3, 3.0),
            self.config.tree_steps,
        )
    }

    fn parity_seed(&self, spot: f64, tau: f64, option_mid: f64, mirror_mid: f64) -> f64 {
        // Put-call parity: C - P = S*e^{-qT} - K*e^{-rT}. Used to confirm
        // the pair is consistent before trusting a Brenner-Subrahmanyam
        // ATM approximation derived from whichever side is closer to the
        // money; otherwise fall back to a flat 20% seed.
        let (call_mid, put_mid) = match self.right {
            OptionRight::Call => (option_mid, mirror_mid),
            OptionRight::Put => (mirror_mid, option_mid),
        };
        let theoretical_diff = spot * (-self.config.dividend_yield * tau).exp()
            - self.strike * (-self.config.risk_free_rate * tau).exp();
        let observed_diff = call_mid - put_mid;
        if (observed_diff - theoretical_diff).abs() > spot * 0.5 || tau <= 0.0 {
            return 0.2;
        }
        // Brenner-Subrahmanyam approximation: IV ~ sqrt(2*pi/T) * (price/S).
        let approx = (2.0 * std::f64::consts::PI / tau).sqrt() * (option_mid / spot);
        if approx.is_finite() && approx > 0.0 {
            approx
        } else {
            0.2
        }
    }
}

/// Newton-Raphson IV solver, bounded to `(0, 4.0]`. Prices and vegas come
/// from whichever model `EngineConfig::pricing_model` selects, so a tree
/// config root-finds against tree prices rather than silently falling back
/// to Black-Scholes.
#[allow(clippy::too_many_arguments)]
fn newton_raphson_iv(
    model: PricingModel,
    right: OptionRight,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend: f64,
    time: f64,
    market_price: f64,
    initial_guess: f64,
    tree_steps: usize,
) -> Option<f64> {
    let mut vol = initial_guess;
    const TOLERANCE: f64 = 1e-6;
    const MAX_ITERATIONS: u32 = 100;

    for _ in 0..MAX_ITERATIONS {
        let price = price_for_model(model, vol, spot, strike, time, rate, dividend, right, tree_steps);
        let vega = greeks_for_model(model, vol, spot, strike, time, rate, dividend, right, tree_steps).vega;

        if vega.abs() < 1e-10 {
            break;
        }

        let diff = market_price - price;
        if diff.abs() < TOLERANCE {
            return Some(vol.clamp(1e-7, 4.0));
        }

        vol += diff / vega;
        vol = vol.clamp(1e-7, 4.0);
    }

    None
}

/// Theoretical price under `model`. Both tree variants currently share one
/// implementation ([`pricing::forward_tree_theoretical_price`]); kept as
/// distinct config values so a future second tree convention has somewhere
/// to plug in without changing the engine's call sites.
#[allow(clippy::too_many_arguments)]
pub(crate) fn price_for_model(
    model: PricingModel,
    iv: f64,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    dividend: f64,
    right: OptionRight,
    tree_steps: usize,
) -> f64 {
    match model {
        PricingModel::BlackScholes => pricing::black_theoretical_price(iv, spot, strike, time, rate, dividend, right),
        PricingModel::BinomialTree | PricingModel::ForwardTree => {
            pricing::forward_tree_theoretical_price(iv, spot, strike, time, rate, dividend, right, tree_steps)
        }
    }
}

/// Greeks under `model`. Closed-form for Black-Scholes; bump-and-reprice
/// finite differences against the tree price for the tree variants, since
/// the tree has no closed-form sensitivities.
#[allow(clippy::too_many_arguments)]
fn greeks_for_model(
    model: PricingModel,
    iv: f64,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    dividend: f64,
    right: OptionRight,
    tree_steps: usize,
) -> Greeks {
    match model {
        PricingModel::BlackScholes => pricing::black_greeks(iv, spot, strike, time, rate, dividend, right),
        PricingModel::BinomialTree | PricingModel::ForwardTree => {
            tree_greeks_by_finite_difference(iv, spot, strike, time, rate, dividend, right, tree_steps)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn tree_greeks_by_finite_difference(
    iv: f64,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    dividend: f64,
    right: OptionRight,
    tree_steps: usize,
) -> Greeks {
    if time <= 0.0 || iv <= 0.0 {
        return Greeks::default();
    }

    let price = |s: f64, t: f64, r: f64, sigma: f64| {
        pricing::forward_tree_theoretical_price(sigma, s, strike, t, r, dividend, right, tree_steps)
    };

    let base = price(spot, time, rate, iv);

    let h_s = (spot * 1e-3).max(1e-4);
    let up = price(spot + h_s, time, rate, iv);
    let down = price(spot - h_s, time, rate, iv);
    let delta = (up - down) / (2.0 * h_s);
    let gamma = (up - 2.0 * base + down) / (h_s * h_s);

    let h_v = 1e-3;
    let vega = (price(spot, time, rate, iv + h_v) - price(spot, time, rate, iv - h_v)) / (2.0 * h_v);

    let h_t = (1.0 / 365.0).min(time / 2.0);
    let theta = if h_t > 0.0 {
        (price(spot, time - h_t, rate, iv) - base) / h_t
    } else {
        0.0
    };

    let h_r = 1e-4;
    let rho = (price(spot, time, rate + h_r, iv) - price(spot, time, rate - h_r, iv)) / (2.0 * h_r);

    Greeks {
        delta,
        gamma,
        vega,
        theta,
        rho,
    }
}
