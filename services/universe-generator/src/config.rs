//! Configuration: CLI flags (`clap`) falling back to a TOML config file
//! (`config` crate) and finally to hard defaults, mirroring
//! `services/gateway::config::GatewayConfig::from_file`.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::symbol::SecurityType;

/// CLI arguments: `--security-type`, `--market`, optional config file path.
#[derive(Parser, Debug)]
#[command(name = "universe-generator")]
#[command(about = "Generates per-underlying derivative universe files")]
#[command(version)]
pub struct Cli {
    /// Security type to process (equity, index, future, equityoption,
    /// indexoption, futureoption).
    #[arg(long)]
    pub security_type: Option<String>,

    /// Market/exchange tag, e.g. "usa".
    #[arg(long)]
    pub market: Option<String>,

    /// Path to an optional TOML config file.
    #[arg(long)]
    pub config: Option<String>,

    /// Root directory the input archives live under.
    #[arg(long)]
    pub data_root: Option<String>,

    /// Root directory universe files are written under.
    #[arg(long)]
    pub output_root: Option<String>,
}

/// Fully-resolved runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Security type being processed.
    #[serde(skip)]
    pub security_type: SecurityType,
    /// Market/exchange tag.
    pub market: String,
    /// Input archive root.
    pub data_root: String,
    /// Output universe-file root.
    pub output_root: String,
    /// Annualized risk-free rate used by the Greeks engine.
    pub risk_free_rate: f64,
    /// Annualized dividend/carry yield.
    pub dividend_yield: f64,
    /// Binomial/forward tree depth.
    pub tree_steps: usize,
    /// Restrict processing to these underlyings, when non-empty.
    pub symbols: Vec<String>,
    /// How many processed contracts between ETA log lines.
    pub eta_log_every: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            security_type: SecurityType::EquityOption,
            market: "usa".to_string(),
            data_root: "data".to_string(),
            output_root: "output".to_string(),
            risk_free_rate: 0.0,
            dividend_yield: 0.0,
            tree_steps: 200,
            symbols: Vec::new(),
            eta_log_every: 500,
        }
    }
}

/// File-backed overrides, same shape as [`Config`] minus `security_type`
/// (parsed separately, since the config-file layer never needs to repeat
/// the CLI's enum parsing policy).
#[derive(Debug, Clone, Default, Deserialize)]
struct FileOverrides {
    market: Option<String>,
    data_root: Option<String>,
    output_root: Option<String>,
    risk_free_rate: Option<f64>,
    dividend_yield: Option<f64>,
    tree_steps: Option<usize>,
    symbols: Option<Vec<String>>,
    eta_log_every: Option<u64>,
}

impl Config {
    /// Assemble a [`Config`]: CLI flags take precedence, then the config
    /// file (if `--config` points at one), then hard defaults.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = &cli.config {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(path))
                .add_source(config::Environment::with_prefix("UNIVERSE_GENERATOR"))
                .build()?;
            let overrides: FileOverrides = settings.try_deserialize().unwrap_or_default();
            config.apply_overrides(overrides);
        }

        if let Some(security_type) = &cli.security_type {
            config.security_type = parse_security_type(security_type)?;
        }
        if let Some(market) = &cli.market {
            config.market = market.clone();
        }
        if let Some(data_root) = &cli.data_root {
            config.data_root = data_root.clone();
        }
        if let Some(output_root) = &cli.output_root {
            config.output_root = output_root.clone();
        }

        Ok(config)
    }

    fn apply_overrides(&mut self, overrides: FileOverrides) {
        if let Some(v) = overrides.market {
            self.market = v;
        }
        if let Some(v) = overrides.data_root {
            self.data_root = v;
        }
        if let Some(v) = overrides.output_root {
            self.output_root = v;
        }
        if let Some(v) = overrides.risk_free_rate {
            self.risk_free_rate = v;
        }
        if let Some(v) = overrides.dividend_yield {
            self.dividend_yield = v;
        }
        if let Some(v) = overrides.tree_steps {
            self.tree_steps = v;
        }
        if let Some(v) = overrides.symbols {
            self.symbols = v;
        }
        if let Some(v) = overrides.eta_log_every {
            self.eta_log_every = v;
        }
    }
}

/// This crate only ever processes derivative classes: a universe file is
/// pointless without options/futures rows to fill it. Bare `"equity"` and
/// `"index"` are accepted as shorthand for their option class rather than
/// rejected outright, since that's the class every other part of this
/// config already assumes (see `Config::default`'s choice of
/// `EquityOption`).
fn parse_security_type(raw: &str) -> Result<SecurityType> {
    match raw.to_ascii_lowercase().as_str() {
        "equity" | "equityoption" => Ok(SecurityType::EquityOption),
        "index" | "indexoption" => Ok(SecurityType::IndexOption),
        "future" => Ok(SecurityType::Future),
        "futureoption" => Ok(SecurityType::FutureOption),
        other => Err(crate::error::PipelineError::InvalidSecurityType(other.to_string()).into()),
    }
}

/// Resolve the processing date: `QC_DATAFLEET_DEPLOYMENT_DATE` env var
/// (`YYYYMMDD`), falling back to today (UTC).
pub fn deployment_date() -> NaiveDate {
    std::env::var("QC_DATAFLEET_DEPLOYMENT_DATE")
        .ok()
        .and_then(|raw| NaiveDate::parse_from_str(&raw, "%Y%m%d").ok())
        .unwrap_or_else(|| chrono::Utc::now().date_naive())
}
