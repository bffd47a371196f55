//! C2 — history retrieval with a resolution fallback ladder, and an HTTP
//! secondary-provider fallback grounded on
//! `options_engine::zerodha::ZerodhaOptionsClient`'s `reqwest` + retry-loop
//! shape.

use crate::chain_discovery::Resolution;
use crate::slice::Slice;
use crate::symbol::Symbol;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

/// Inclusive UTC window a history request covers.
#[derive(Debug, Clone, Copy)]
pub struct SliceZone {
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
}

/// One symbol's history request, carrying its own resolution ladder so
/// different security types can be configured independently.
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    /// Symbol to fetch.
    pub symbol: Symbol,
    /// Resolutions to try, finest first.
    pub resolution_ladder: Vec<Resolution>,
}

impl HistoryRequest {
    /// A request using the default minute-then-hour-then-daily ladder.
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            resolution_ladder: vec![Resolution::Minute, Resolution::Hour, Resolution::Daily],
        }
    }
}

/// Retrieves history for a batch of symbols, trying each symbol's
/// resolution ladder until a non-empty result is found.
pub trait HistoryGateway {
    /// Fetch slices for every request, recomputing the request window per
    /// resolution as needed; returns one `Vec<Slice>` per request, in the
    /// same order, empty when every resolution in the ladder came up dry.
    fn get_history(&self, requests: &[HistoryRequest], zone: SliceZone) -> Result<Vec<Vec<Slice>>>;
}

/// Out-of-process history source used as a fallback after the primary
/// archive-backed path is exhausted, retried 5x with a fixed 1s backoff.
pub trait SecondaryProvider: Send + Sync {
    /// Fetch slices for one symbol over the given window, retrying
    /// transient failures internally.
    fn fetch(&self, symbol: &Symbol, zone: SliceZone) -> Result<Vec<Slice>>;
}

/// A [`SecondaryProvider`] that never has data, for deployments with no
/// configured `data-provider` fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecondaryProvider;

impl SecondaryProvider for NoSecondaryProvider {
    fn fetch(&self, _symbol: &Symbol, _zone: SliceZone) -> Result<Vec<Slice>> {
        Ok(Vec::new())
    }
}

/// Primary-archive-backed implementation: tries each resolution in a
/// request's ladder via a caller-supplied reader, falling back to a
/// [`SecondaryProvider`] when the whole ladder is empty.
pub struct LadderedHistoryGateway<R, S> {
    reader: R,
    secondary: Option<S>,
}

/// Reads one symbol's bars at one resolution from the local archive store.
pub trait ResolutionReader {
    /// Read slices for `symbol` at `resolution` within `zone`. An empty
    /// `Vec` means "no data at this resolution", not an error.
    fn read(&self, symbol: &Symbol, resolution: Resolution, zone: SliceZone) -> Result<Vec<Slice>>;
}

impl<R: ResolutionReader, S: SecondaryProvider> LadderedHistoryGateway<R, S> {
    /// Build a gateway over a local resolution reader and an optional
    /// secondary (HTTP) provider consulted once the ladder is exhausted.
    pub fn new(reader: R, secondary: Option<S>) -> Self {
        Self { reader, secondary }
    }

    fn fetch_one(&self, request: &HistoryRequest, zone: SliceZone) -> Result<Vec<Slice>> {
        for &resolution in &request.resolution_ladder {
            match self.reader.read(&request.symbol, resolution, zone) {
                Ok(slices) if !slices.is_empty() => {
                    debug!(
                        symbol = %request.symbol.ticker,
                        resolution = ?resolution,
                        count = slices.len(),
                        "resolved history from ladder"
                    );
                    return Ok(slices);
                }
                Ok(_) => continue,
                Err(err) => {
                    warn!(
                        symbol = %request.symbol.ticker,
                        resolution = ?resolution,
                        error = %err,
                        "resolution read failed, trying next rung"
                    );
                }
            }
        }

        if let Some(secondary) = &self.secondary {
            return retry_with_backoff(5, Duration::from_secs(1), || secondary.fetch(&request.symbol, zone));
        }

        Ok(Vec::new())
    }
}

impl<R: ResolutionReader, S: SecondaryProvider> HistoryGateway for LadderedHistoryGateway<R, S> {
    fn get_history(&self, requests: &[HistoryRequest], zone: SliceZone) -> Result<Vec<Vec<Slice>>> {
        requests.iter().map(|r| self.fetch_one(r, zone)).collect()
    }
}

/// Run `op` up to `attempts` times, sleeping `delay` between tries.
/// Returns the last error if every attempt fails.
fn retry_with_backoff<T>(
    attempts: u32,
    delay: Duration,
    mut op: impl FnMut() -> Result<Vec<T>>,
) -> Result<Vec<T>> {
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op() {
            Ok(v) => return Ok(v),
            Err(err) => {
                warn!(attempt, max = attempts, error = %err, "secondary provider attempt failed");
                last_err = Some(err);
                if attempt < attempts {
                    std::thread::sleep(delay);
                }
            }
        }
    }
    Err(last_err.expect("at least one attempt runs"))
}

/// `reqwest`-backed secondary provider, grounded on
/// `ZerodhaOptionsClient`'s client-plus-retry shape. This crate does not
/// parse a concrete vendor wire format; `parse` is injected so different
/// markets' history archives can be wired in without changing the retry
/// plumbing.
pub struct HttpSecondaryProvider<F> {
    client: reqwest::blocking::Client,
    base_url: String,
    parse: F,
}

impl<F> HttpSecondaryProvider<F>
where
    F: Fn(&[u8]) -> Result<Vec<Slice>> + Send + Sync,
{
    /// Build a provider pointed at `base_url`, using `parse` to decode the
    /// response body into slices.
    pub fn new(base_url: impl Into<String>, parse: F) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            parse,
        })
    }
}

impl<F> SecondaryProvider for HttpSecondaryProvider<F>
where
    F: Fn(&[u8]) -> Result<Vec<Slice>> + Send + Sync,
{
    fn fetch(&self, symbol: &Symbol, zone: SliceZone) -> Result<Vec<Slice>> {
        let url = format!(
            "{}/history/{}?start={}&end={}",
            self.base_url,
            symbol.ticker,
            zone.start.to_rfc3339(),
            zone.end.to_rfc3339()
        );
        let response = self.client.get(&url).send()?.error_for_status()?;
        let bytes = response.bytes()?;
        (self.parse)(&bytes)
    }
}
