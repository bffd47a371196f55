//! C5 — the implied-volatility surface repair pass. Hand-rolled OLS and
//! Brent root-finding rather than a linear-algebra or root-finding crate,
//! matching the numerics style used elsewhere in this workspace for
//! one-off solves of this size.

use crate::greeks_engine::{price_for_model, EngineConfig, GreeksEngine, GreeksSnapshot};
use crate::slice::{QuoteBar, Slice, TradeBar};
use crate::symbol::Symbol;
use tracing::warn;

/// One fitted contract's regression inputs and response.
#[derive(Debug, Clone, Copy)]
pub struct SurfacePoint {
    /// Strike.
    pub strike: f64,
    /// Years to expiry.
    pub tau: f64,
    /// Observed implied volatility.
    pub iv: f64,
}

/// `ln(K/S) / (iv * sqrt(tau))`. Edge cases:
///
/// | K | τ | v | moneyness |
/// |---|---|---|---|
/// | 0 | >0 | >0 | -inf |
/// | >0 | 0 | >0 | +inf |
/// | >0 | >0 | 0 | +inf (divide by zero) |
/// | <0 | any | any | NaN |
/// | any | <0 | any | NaN |
///
/// These fall out of plain IEEE-754 float semantics; no branching is
/// needed beyond what `f64` arithmetic already does.
#[must_use]
pub fn moneyness(strike: f64, spot: f64, tau: f64, vol: f64) -> f64 {
    (strike / spot).ln() / (vol * tau.sqrt())
}

fn regressors(strike: f64, spot: f64, tau: f64, vol: f64) -> [f64; 5] {
    let m = moneyness(strike, spot, tau, vol);
    [m, tau, m * m, tau * tau, m * tau]
}

/// Fitted IV surface: intercept + 5 regressor coefficients.
#[derive(Debug, Clone, Copy)]
pub struct IvSurfaceFit {
    coefficients: [f64; 6],
}

impl IvSurfaceFit {
    /// Fit by ordinary least squares over every strictly-valid point
    /// (`iv > 0 && iv.is_finite()`). Returns `None` when fewer than 6
    /// valid points are available.
    pub fn fit(points: &[SurfacePoint], spot: f64) -> Option<Self> {
        let valid: Vec<&SurfacePoint> = points
            .iter()
            .filter(|p| p.iv > 0.0 && p.iv.is_finite())
            .collect();
        if valid.len() < 6 {
            return None;
        }

        // Design matrix rows: [1, m, tau, m^2, tau^2, m*tau].
        let rows: Vec<[f64; 6]> = valid
            .iter()
            .map(|p| {
                let [m, t, m2, t2, mt] = regressors(p.strike, spot, p.tau, p.iv);
                [1.0, m, t, m2, t2, mt]
            })
            .collect();
        let responses: Vec<f64> = valid.iter().map(|p| p.iv).collect();

        let coefficients = solve_normal_equations(&rows, &responses)?;
        Some(Self { coefficients })
    }

    /// Model prediction at a given regressor vector (intercept implicit).
    fn predict(&self, m: f64, tau: f64) -> f64 {
        let [b0, b1, b2, b3, b4, b5] = self.coefficients;
        b0 + b1 * m + b2 * tau + b3 * m * m + b4 * tau * tau + b5 * m * tau
    }

    /// Solve the fixed point `v = predict(m(K, tau, v), tau)` for a missing
    /// contract via Brent's method on `[1e-7, 4.0]`.
    #[must_use]
    pub fn query(&self, strike: f64, spot: f64, tau: f64) -> Option<f64> {
        let f = |v: f64| v - self.predict(moneyness(strike, spot, tau, v), tau);
        brent(f, 1e-7, 4.0, 1e-4, 100)
    }
}

/// Build and solve `XᵀX·β = Xᵀy` via Gauss-Jordan elimination on the
/// augmented 6x6 system. Returns `None` on a singular matrix.
fn solve_normal_equations(rows: &[[f64; 6]], responses: &[f64]) -> Option<[f64; 6]> {
    let mut xtx = [[0.0_f64; 6]; 6];
    let mut xty = [0.0_f64; 6];

    for (row, &y) in rows.iter().zip(responses) {
        for i in 0..6 {
            xty[i] += row[i] * y;
            for j in 0..6 {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    // Augmented matrix [xtx | xty], solved in place.
    let mut aug = [[0.0_f64; 7]; 6];
    for i in 0..6 {
        aug[i][..6].copy_from_slice(&xtx[i]);
        aug[i][6] = xty[i];
    }

    for col in 0..6 {
        let pivot_row = (col..6).max_by(|&a, &b| aug[a][col].abs().total_cmp(&aug[b][col].abs()))?;
        if aug[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for v in aug[col].iter_mut() {
            *v /= pivot;
        }

        for row in 0..6 {
            if row == col {
                continue;
            }
            let factor = aug[row][col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..7 {
                aug[row][k] -= factor * aug[col][k];
            }
        }
    }

    let mut coefficients = [0.0_f64; 6];
    for i in 0..6 {
        coefficients[i] = aug[i][6];
    }
    Some(coefficients)
}

/// Brent's root-finding method (Brent, R. 1973). Requires `f(lo)` and
/// `f(hi)` to have opposite signs; returns `None` if they don't, or if the
/// iteration limit is exhausted without reaching `tol`.
fn brent(mut f: impl FnMut(f64) -> f64, mut lo: f64, mut hi: f64, tol: f64, max_iter: u32) -> Option<f64> {
    let mut f_lo = f(lo);
    let mut f_hi = f(hi);
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        return None;
    }

    if f_lo.abs() < f_hi.abs() {
        std::mem::swap(&mut lo, &mut hi);
        std::mem::swap(&mut f_lo, &mut f_hi);
    }

    let mut prev = lo;
    let mut f_prev = f_lo;
    let mut mflag = true;
    let mut s = hi;

    for _ in 0..max_iter {
        if (hi - lo).abs() < tol {
            return Some(hi);
        }

        s = if f_lo != f_prev && f_hi != f_prev {
            // Inverse quadratic interpolation.
            lo * f_hi * f_prev / ((f_lo - f_hi) * (f_lo - f_prev))
                + hi * f_lo * f_prev / ((f_hi - f_lo) * (f_hi - f_prev))
                + prev * f_lo * f_hi / ((f_prev - f_lo) * (f_prev - f_hi))
        } else {
            // Secant.
            hi - f_hi * (hi - lo) / (f_hi - f_lo)
        };

        let bisection_mid = (3.0 * lo + hi) / 4.0;
        let out_of_bounds = !((bisection_mid < s && s < hi) || (hi < s && s < bisection_mid));
        let not_converging = (mflag && (s - hi).abs() >= (hi - prev).abs() / 2.0)
            || (!mflag && (s - hi).abs() >= (prev - f_prev).abs() / 2.0);

        if out_of_bounds || not_converging {
            s = (lo + hi) / 2.0;
            mflag = true;
        } else {
            mflag = false;
        }

        let f_s = f(s);
        prev = hi;
        f_prev = f_hi;

        if f_lo.signum() != f_s.signum() {
            hi = s;
            f_hi = f_s;
        } else {
            lo = s;
            f_lo = f_s;
        }

        if f_lo.abs() < f_hi.abs() {
            std::mem::swap(&mut lo, &mut hi);
            std::mem::swap(&mut f_lo, &mut f_hi);
        }

        if f_hi.abs() < tol {
            return Some(hi);
        }
    }

    Some(s).filter(|_| (hi - lo).abs() < tol * 10.0)
}

/// Recompute Greeks for a contract repaired to volatility `repaired_iv`:
/// price the contract via the forward tree (Black fallback), then replay a
/// two-bar synthetic update through a fresh [`GreeksEngine`].
pub fn recompute_greeks_after_repair(
    option: Symbol,
    underlying: Symbol,
    underlying_close: f64,
    strike: f64,
    tau: f64,
    repaired_iv: f64,
    config: EngineConfig,
    reference_time: chrono::DateTime<chrono::Utc>,
) -> (f64, GreeksSnapshot) {
    let right = option.option_right.unwrap_or(crate::symbol::OptionRight::Call);
    let theoretical_price = price_for_model(
        config.pricing_model,
        repaired_iv,
        underlying_close,
        strike,
        tau,
        config.risk_free_rate,
        config.dividend_yield,
        right,
        config.tree_steps,
    );

    let mut engine = GreeksEngine::new(option.clone(), config);
    let mut slice = Slice::at(reference_time);
    slice.trades.insert(
        underlying.clone(),
        TradeBar {
            end_time: reference_time,
            open: underlying_close,
            high: underlying_close,
            low: underlying_close,
            close: underlying_close,
            volume: 0.0,
        },
    );
    slice.quotes.insert(
        option,
        QuoteBar {
            end_time: reference_time,
            open: theoretical_price,
            high: theoretical_price,
            low: theoretical_price,
            close: theoretical_price,
            bid: theoretical_price,
            ask: theoretical_price,
        },
    );
    engine.update(&slice, &underlying);

    if engine.iv() <= 0.0 {
        warn!("repaired contract's replayed engine failed to converge, keeping synthetic price as theoretical");
    }

    (repaired_iv, engine.get_greeks())
}
