//! The generator orchestrator: bounded per-canonical fan-out,
//! market-hours gating, per-contract streaming, IV repair, and CSV
//! emission.

use crate::chain_discovery::ChainDiscovery;
use crate::config::Config;
use crate::entry::{ContractRow, OptionRow, UnderlyingRow, UniverseEntry};
use crate::error::PipelineError;
use crate::greeks_engine::{EngineConfig, GreeksEngine, PricingModel};
use crate::history_gateway::{HistoryGateway, HistoryRequest, SliceZone};
use crate::iv_interpolator::{recompute_greeks_after_repair, IvSurfaceFit, SurfacePoint};
use crate::market_hours::MarketHours;
use crate::slice::{self, Slice};
use crate::symbol::Symbol;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared atomic counters, read from multiple concurrently-running tasks.
#[derive(Default)]
struct Counters {
    symbol_counter: AtomicU64,
    underlyings_with_missing_data: AtomicU64,
    force_eta_update: AtomicU64,
}

/// Drives the full per-date universe generation pipeline.
#[derive(Clone)]
pub struct Generator {
    config: Arc<Config>,
    chain_discovery: Arc<dyn ChainDiscovery + Send + Sync>,
    history_gateway: Arc<dyn HistoryGateway + Send + Sync>,
    market_hours: Arc<dyn MarketHours + Send + Sync>,
    date: NaiveDate,
}

impl Generator {
    /// Build a generator for one processing date.
    pub fn new(
        config: Config,
        chain_discovery: Arc<dyn ChainDiscovery + Send + Sync>,
        history_gateway: Arc<dyn HistoryGateway + Send + Sync>,
        market_hours: Arc<dyn MarketHours + Send + Sync>,
        date: NaiveDate,
    ) -> Self {
        Self {
            config: Arc::new(config),
            chain_discovery,
            history_gateway,
            market_hours,
            date,
        }
    }

    /// Run the pipeline. Returns `Ok(false)` when a per-canonical fatal
    /// failure cancelled the remaining work; `Ok(true)` on a clean
    /// (possibly partially-skipped) run.
    pub async fn run(&self) -> Result<bool> {
        let chain = self
            .chain_discovery
            .discover(self.date, self.config.security_type, &self.config.market)
            .context("chain discovery failed")?;

        let chain = filter_to_configured_symbols(chain, &self.config.symbols);
        let total_contracts: u64 = chain.values().map(|c| c.len() as u64).sum();

        let pool_size = ((1.5 * num_cpus::get() as f64).floor() as usize).max(1);
        let semaphore = Arc::new(Semaphore::new(pool_size));
        let token = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let started = Instant::now();

        let mut join_set = tokio::task::JoinSet::new();

        for (canonical, contracts) in chain {
            let generator = self.clone();
            let semaphore = semaphore.clone();
            let token = token.clone();
            let counters = counters.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closes");
                if token.is_cancelled() {
                    return Ok(());
                }
                let result = generator
                    .process_canonical(&canonical, &contracts, &counters, &token, total_contracts, started)
                    .await;
                if let Err(err) = &result {
                    error!(canonical = %canonical.ticker, error = %err, "canonical failed fatally, cancelling run");
                    token.cancel();
                }
                result
            });
        }

        let mut any_fatal = false;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(_)) => any_fatal = true,
                Err(join_err) => {
                    error!(error = %join_err, "canonical task panicked, cancelling run");
                    token.cancel();
                    any_fatal = true;
                }
            }
        }

        Ok(!any_fatal && !token.is_cancelled())
    }

    async fn process_canonical(
        &self,
        canonical: &Symbol,
        contracts: &[Symbol],
        counters: &Arc<Counters>,
        token: &CancellationToken,
        total_contracts: u64,
        started: Instant,
    ) -> Result<()> {
        if !self.market_hours.is_open(&self.config.market, self.date) {
            info!(canonical = %canonical.ticker, "market is closed, skipping");
            return Ok(());
        }

        let reference_time = date_to_utc(self.date);
        let zone = SliceZone {
            start: reference_time - chrono::Duration::days(7),
            end: reference_time,
        };

        let underlying_slices = {
            let history_gateway = Arc::clone(&self.history_gateway);
            let request = HistoryRequest::new(canonical.clone());
            tokio::task::spawn_blocking(move || history_gateway.get_history(&[request], zone))
                .await
                .context("history gateway task panicked")?
                .map_err(|source| PipelineError::CanonicalFatal {
                    canonical: canonical.ticker.clone(),
                    source,
                })?
        }
        .into_iter()
        .next()
        .unwrap_or_default();

        let mut underlying_row = UnderlyingRow::new(canonical.clone());
        for slice in &underlying_slices {
            underlying_row.update(slice);
        }

        if underlying_slices.is_empty() && canonical.security_type.needs_underlying_data() {
            counters.underlyings_with_missing_data.fetch_add(1, Ordering::Relaxed);
            warn!(canonical = %canonical.ticker, "no underlying history, aborting canonical");
            return Ok(());
        }

        let mut entries: Vec<UniverseEntry> = if canonical.security_type.needs_underlying_data() {
            vec![UniverseEntry::Underlying(underlying_row)]
        } else {
            Vec::new()
        };
        let engine_config = EngineConfig {
            risk_free_rate: self.config.risk_free_rate,
            dividend_yield: self.config.dividend_yield,
            pricing_model: PricingModel::ForwardTree,
            tree_steps: self.config.tree_steps,
        };

        for contract in contracts {
            if token.is_cancelled() {
                break;
            }

            let mut requests = vec![HistoryRequest::new(contract.clone())];
            if let Some(mirror) = contract.mirror() {
                requests.push(HistoryRequest::new(mirror));
            }
            let responses = {
                let history_gateway = Arc::clone(&self.history_gateway);
                tokio::task::spawn_blocking(move || history_gateway.get_history(&requests, zone))
                    .await
                    .context("history gateway task panicked")?
                    .map_err(|source| PipelineError::CanonicalFatal {
                        canonical: canonical.ticker.clone(),
                        source,
                    })?
            };

            let entry = self
                .process_contract(contract, canonical, &underlying_slices, responses, engine_config)
                .map_err(|source| PipelineError::CanonicalFatal {
                    canonical: canonical.ticker.clone(),
                    source,
                })?;
            entries.push(entry);

            let processed = counters.symbol_counter.fetch_add(1, Ordering::Relaxed) + 1;
            if processed % self.config.eta_log_every == 0 {
                log_eta(processed, total_contracts, started);
                counters.force_eta_update.fetch_add(1, Ordering::Relaxed);
            }
        }

        if canonical.security_type.is_option() {
            self.repair_missing_ivs(&mut entries, canonical, &underlying_slices, engine_config, reference_time);
        }

        self.write_universe_file(canonical, &entries)
            .map_err(|source| PipelineError::CanonicalFatal {
                canonical: canonical.ticker.clone(),
                source,
            })?;

        Ok(())
    }

    /// CPU-only: merges already-fetched history and runs it through the
    /// row/Greeks update loop. Fetching `responses` is the caller's job
    /// (via `spawn_blocking`), so this stays a plain synchronous function
    /// with nothing in it that can block the async runtime.
    fn process_contract(
        &self,
        contract: &Symbol,
        underlying: &Symbol,
        underlying_slices: &[Slice],
        mut responses: Vec<Vec<Slice>>,
        engine_config: EngineConfig,
    ) -> Result<UniverseEntry> {
        let contract_slices = responses.remove(0);
        let mirror_slices = if !responses.is_empty() { responses.remove(0) } else { Vec::new() };

        let mut merged = slice::synchronize(underlying_slices.to_vec(), contract_slices);
        if !mirror_slices.is_empty() {
            merged = slice::synchronize(merged, mirror_slices);
        }

        if contract.security_type.is_option() {
            let mut row = OptionRow::new(contract.clone());
            let mut greeks_engine = GreeksEngine::new(contract.clone(), engine_config);

            for slice in &merged {
                row.update(slice);
                greeks_engine.update(slice, underlying);
            }

            if contract.security_type.has_greeks() && greeks_engine.iv() > 0.0 {
                row.set_greeks(greeks_engine.iv(), greeks_engine.get_greeks());
            } else {
                debug!(contract = %contract.ticker, "no IV resolved from stream, leaving for repair pass");
            }

            Ok(UniverseEntry::Option(row))
        } else {
            let mut row = ContractRow::new(contract.clone());
            for slice in &merged {
                row.update(slice);
            }
            Ok(UniverseEntry::Contract(row))
        }
    }

    fn repair_missing_ivs(
        &self,
        entries: &mut [UniverseEntry],
        underlying_symbol: &Symbol,
        underlying_slices: &[Slice],
        engine_config: EngineConfig,
        reference_time: DateTime<Utc>,
    ) {
        let underlying_close = underlying_slices
            .iter()
            .rev()
            .find_map(|s| s.trades.get(underlying_symbol).map(|b| b.close))
            .unwrap_or(0.0);
        if underlying_close <= 0.0 {
            warn!("no underlying close available, skipping IV repair pass");
            return;
        }

        let points: Vec<SurfacePoint> = entries
            .iter()
            .filter_map(|entry| match entry {
                UniverseEntry::Option(row) if row.implied_volatility.unwrap_or(0.0) > 0.0 => {
                    Some(SurfacePoint {
                        strike: row.symbol.strike.as_f64(),
                        tau: crate::pricing::time_till_expiry(row.symbol.expiry, reference_time),
                        iv: row.implied_volatility.unwrap(),
                    })
                }
                _ => None,
            })
            .collect();

        let total = entries
            .iter()
            .filter(|e| matches!(e, UniverseEntry::Option(_)))
            .count();
        if points.len() >= total {
            return; // nothing missing
        }

        let Some(fit) = IvSurfaceFit::fit(&points, underlying_close) else {
            warn!("fewer than 6 valid IVs, skipping repair pass for this canonical");
            return;
        };

        for entry in entries.iter_mut() {
            let UniverseEntry::Option(row) = entry else { continue };
            if row.implied_volatility.unwrap_or(0.0) > 0.0 {
                continue;
            }
            let strike = row.symbol.strike.as_f64();
            let tau = crate::pricing::time_till_expiry(row.symbol.expiry, reference_time);
            if tau <= 0.0 {
                continue;
            }
            match fit.query(strike, underlying_close, tau) {
                Some(repaired_iv) => {
                    let (iv, greeks) = recompute_greeks_after_repair(
                        row.symbol.clone(),
                        underlying_symbol.clone(),
                        underlying_close,
                        strike,
                        tau,
                        repaired_iv,
                        engine_config,
                        reference_time,
                    );
                    row.set_greeks(iv, greeks);
                }
                None => {
                    warn!(contract = %row.symbol.ticker, "IV repair root-find failed, leaving IV missing");
                }
            }
        }
    }

    fn write_universe_file(&self, canonical: &Symbol, entries: &[UniverseEntry]) -> Result<()> {
        let path = output_path(&self.config.output_root, self.config.security_type, &self.config.market, canonical, self.date);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(PipelineError::Io)?;
        }

        // The whole file shares one column width, determined by the
        // file's security class, not by each row's own variant — the
        // underlying row is padded out to match so every data line's
        // column count equals the header's.
        let headers = if self.config.security_type.is_option() {
            OptionRow::header_fields()
        } else {
            ContractRow::header_fields()
        };
        let width = headers.len();

        let mut file = std::fs::File::create(&path).map_err(PipelineError::Io)?;
        writeln!(file, "#{}", headers.join(",")).map_err(PipelineError::Io)?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        for entry in entries {
            let mut fields = entry.to_csv_fields();
            fields.resize(width, String::new());
            writer.write_record(fields)?;
        }
        writer.flush()?;

        Ok(())
    }
}

fn filter_to_configured_symbols(
    chain: BTreeMap<Symbol, Vec<Symbol>>,
    symbols: &[String],
) -> BTreeMap<Symbol, Vec<Symbol>> {
    if symbols.is_empty() {
        return chain;
    }
    chain
        .into_iter()
        .filter(|(canonical, _)| symbols.iter().any(|s| s.eq_ignore_ascii_case(&canonical.ticker)))
        .collect()
}

fn date_to_utc(date: NaiveDate) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).expect("valid midnight"), Utc)
}

fn log_eta(processed: u64, total: u64, started: Instant) {
    let elapsed = started.elapsed();
    let eta = if processed > 0 {
        let per_unit = elapsed.as_secs_f64() / processed as f64;
        per_unit * (total.saturating_sub(processed)) as f64
    } else {
        0.0
    };
    info!(processed, total, elapsed_s = elapsed.as_secs_f64(), eta_s = eta, "progress");
}

/// `<out>/<sec-type>/<market>/universes/<underlying-key>/<YYYYMMDD>.csv`
fn output_path(output_root: &str, security_type: crate::symbol::SecurityType, market: &str, canonical: &Symbol, date: NaiveDate) -> PathBuf {
    Path::new(output_root)
        .join(security_type.to_string())
        .join(market)
        .join("universes")
        .join(underlying_key(canonical))
        .join(format!("{}.csv", date.format("%Y%m%d")))
}

fn underlying_key(canonical: &Symbol) -> String {
    use crate::symbol::SecurityType;
    match canonical.security_type {
        SecurityType::FutureOption => {
            let root = canonical
                .underlying
                .as_ref()
                .map(|u| u.ticker.as_str())
                .unwrap_or(canonical.ticker.as_str());
            format!("{}/{}", strip_root(root), canonical.expiry.format("%Y%m%d"))
        }
        _ => strip_root(&canonical.ticker),
    }
}

fn strip_root(ticker: &str) -> String {
    ticker.trim_start_matches('/').to_lowercase()
}
