//! Pure option pricing functions: Black-Scholes closed form and a
//! binomial/forward-tree fallback, generalized from
//! `options_engine::BlackScholes` for arbitrary (not just Indian-index)
//! underlyings.

use crate::symbol::OptionRight;

const SQRT_2PI: f64 = 2.506_628_274_631_000_7;

/// Standard normal CDF.
#[must_use]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
}

/// Standard normal PDF.
#[must_use]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / SQRT_2PI
}

fn d1(s: f64, k: f64, r: f64, q: f64, sigma: f64, t: f64) -> f64 {
    ((s / k).ln() + (r - q + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

fn d2(s: f64, k: f64, r: f64, q: f64, sigma: f64, t: f64) -> f64 {
    d1(s, k, r, q, sigma, t) - sigma * t.sqrt()
}

/// Years between `expiry` and `reference`, calendar-day basis
/// `(expiry - reference).days / 365.0`.
#[must_use]
pub fn time_till_expiry(
    expiry: chrono::DateTime<chrono::Utc>,
    reference: chrono::DateTime<chrono::Utc>,
) -> f64 {
    (expiry - reference).num_days() as f64 / 365.0
}

/// Closed-form Black-Scholes/Black-76-style theoretical price with a
/// continuous dividend (or cost-of-carry) yield `q`.
#[must_use]
pub fn black_theoretical_price(
    iv: f64,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    dividend: f64,
    right: OptionRight,
) -> f64 {
    if time <= 0.0 || iv <= 0.0 {
        return match right {
            OptionRight::Call => (spot - strike).max(0.0),
            OptionRight::Put => (strike - spot).max(0.0),
        };
    }

    let d1 = d1(spot, strike, rate, dividend, iv, time);
    let d2 = d2(spot, strike, rate, dividend, iv, time);
    let disc_r = (-rate * time).exp();
    let disc_q = (-dividend * time).exp();

    match right {
        OptionRight::Call => spot * disc_q * norm_cdf(d1) - strike * disc_r * norm_cdf(d2),
        OptionRight::Put => strike * disc_r * norm_cdf(-d2) - spot * disc_q * norm_cdf(-d1),
    }
}

/// Full Greeks bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Greeks {
    /// Price sensitivity to spot.
    pub delta: f64,
    /// Delta sensitivity to spot.
    pub gamma: f64,
    /// Sensitivity to implied volatility, per 1.0 vol point.
    pub vega: f64,
    /// Daily time decay.
    pub theta: f64,
    /// Sensitivity to the risk-free rate, per 1.0 rate point.
    pub rho: f64,
}

/// Closed-form Greeks at the given inputs.
#[must_use]
pub fn black_greeks(
    iv: f64,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    dividend: f64,
    right: OptionRight,
) -> Greeks {
    if time <= 0.0 || iv <= 0.0 {
        return Greeks::default();
    }

    let sqrt_t = time.sqrt();
    let d1 = d1(spot, strike, rate, dividend, iv, time);
    let d2 = d2(spot, strike, rate, dividend, iv, time);
    let disc_r = (-rate * time).exp();
    let disc_q = (-dividend * time).exp();
    let npd1 = norm_pdf(d1);

    let delta = match right {
        OptionRight::Call => disc_q * norm_cdf(d1),
        OptionRight::Put => disc_q * (norm_cdf(d1) - 1.0),
    };

    let gamma = disc_q * npd1 / (spot * iv * sqrt_t);

    let theta_annual = match right {
        OptionRight::Call => {
            -(spot * disc_q * npd1 * iv) / (2.0 * sqrt_t) - rate * strike * disc_r * norm_cdf(d2)
                + dividend * spot * disc_q * norm_cdf(d1)
        }
        OptionRight::Put => {
            -(spot * disc_q * npd1 * iv) / (2.0 * sqrt_t) + rate * strike * disc_r * norm_cdf(-d2)
                - dividend * spot * disc_q * norm_cdf(-d1)
        }
    };
    let theta = theta_annual / 365.0;

    let vega = spot * disc_q * npd1 * sqrt_t;

    let rho = match right {
        OptionRight::Call => strike * time * disc_r * norm_cdf(d2),
        OptionRight::Put => -strike * time * disc_r * norm_cdf(-d2),
    };

    Greeks {
        delta,
        gamma,
        vega,
        theta,
        rho,
    }
}

/// Binomial forward-tree theoretical price, used as the primary pricing
/// model when recomputing Greeks after an IV repair, with
/// [`black_theoretical_price`] as the documented fallback on pathological
/// inputs (non-finite inputs, non-positive volatility, zero or negative
/// time to expiry, or a degenerate up/down factor).
#[must_use]
pub fn forward_tree_theoretical_price(
    iv: f64,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    dividend: f64,
    right: OptionRight,
    steps: usize,
) -> f64 {
    match try_forward_tree(iv, spot, strike, time, rate, dividend, right, steps) {
        Some(price) if price.is_finite() && price >= 0.0 => price,
        _ => black_theoretical_price(iv, spot, strike, time, rate, dividend, right),
    }
}

fn try_forward_tree(
    iv: f64,
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    dividend: f64,
    right: OptionRight,
    steps: usize,
) -> Option<f64> {
    if !(iv > 0.0 && iv.is_finite())
        || !(time > 0.0 && time.is_finite())
        || !(spot > 0.0 && spot.is_finite())
        || steps == 0
    {
        return None;
    }

    let dt = time / steps as f64;
    let up = (iv * dt.sqrt()).exp();
    if !(up > 1.0) {
        return None;
    }
    let down = 1.0 / up;
    let growth = ((rate - dividend) * dt).exp();
    let p_up = (growth - down) / (up - down);
    if !(0.0..=1.0).contains(&p_up) {
        return None;
    }
    let disc = (-rate * dt).exp();

    // Terminal payoffs across the `steps + 1` terminal nodes.
    let mut values: Vec<f64> = (0..=steps)
        .map(|i| {
            let ups = i as f64;
            let downs = (steps - i) as f64;
            let terminal_spot = spot * up.powf(ups) * down.powf(downs);
            match right {
                OptionRight::Call => (terminal_spot - strike).max(0.0),
                OptionRight::Put => (strike - terminal_spot).max(0.0),
            }
        })
        .collect();

    // Backward induction (American-style early-exercise check at every
    // node, which subsumes the European case since it never improves on
    // the continuation value for it).
    for level in (0..steps).rev() {
        for i in 0..=level {
            let continuation = disc * (p_up * values[i + 1] + (1.0 - p_up) * values[i]);
            let ups = i as f64;
            let downs = (level - i) as f64;
            let node_spot = spot * up.powf(ups) * down.powf(downs);
            let intrinsic = match right {
                OptionRight::Call => (node_spot - strike).max(0.0),
                OptionRight::Put => (strike - node_spot).max(0.0),
            };
            values[i] = continuation.max(intrinsic);
        }
    }

    Some(values[0])
}
