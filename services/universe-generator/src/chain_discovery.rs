//! C1 — enumerate canonical underlyings and their live contracts on a
//! processing date from the date-partitioned archive directory layout.

use crate::symbol::{OptionRight, OptionStyle, SecurityType, Strike, Symbol};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Resolution tried, finest first, during chain discovery and history
/// retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Resolution {
    /// One-minute bars.
    Minute,
    /// Hourly bars.
    Hour,
    /// Daily bars.
    Daily,
}

impl Resolution {
    pub(crate) fn path_segment(self) -> &'static str {
        match self {
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Daily => "daily",
        }
    }
}

/// Enumerate canonicals and their live contracts for a processing date.
pub trait ChainDiscovery {
    /// Discover the chain: `canonical symbol -> ordered, deduplicated list
    /// of live contract symbols`.
    fn discover(
        &self,
        date: NaiveDate,
        security_type: SecurityType,
        market: &str,
    ) -> Result<BTreeMap<Symbol, Vec<Symbol>>>;
}

/// External chain provider used when filesystem scanning is bypassed (e.g.
/// CFE VIX futures driven by a futures-expiry dictionary).
pub trait ChainProvider: Send + Sync {
    /// Pure function: canonical + date -> contract list.
    fn contracts(&self, canonical: &Symbol, date: NaiveDate) -> Vec<Symbol>;
}

/// Discovery that delegates entirely to an external [`ChainProvider`],
/// bypassing the zip archive scan.
pub struct DelegatedChainDiscovery<P: ChainProvider> {
    provider: P,
    canonicals: Vec<Symbol>,
}

impl<P: ChainProvider> DelegatedChainDiscovery<P> {
    /// Build a delegated discovery over a fixed set of canonicals.
    pub fn new(provider: P, canonicals: Vec<Symbol>) -> Self {
        Self { provider, canonicals }
    }
}

impl<P: ChainProvider> ChainDiscovery for DelegatedChainDiscovery<P> {
    fn discover(
        &self,
        date: NaiveDate,
        _security_type: SecurityType,
        _market: &str,
    ) -> Result<BTreeMap<Symbol, Vec<Symbol>>> {
        let mut out = BTreeMap::new();
        for canonical in &self.canonicals {
            let mut contracts: Vec<Symbol> = self.provider.contracts(canonical, date);
            contracts.sort();
            contracts.dedup();
            out.insert(canonical.clone(), contracts);
        }
        Ok(out)
    }
}

/// Archive-scanning discovery: reads `<root>/<sec-type>/<market>/<resolution>/...`
pub struct ArchiveChainDiscovery {
    data_root: PathBuf,
    resolution_ladder: Vec<Resolution>,
}

impl ArchiveChainDiscovery {
    /// Build a discovery rooted at `data_root`, trying resolutions in
    /// `resolution_ladder` order (finest first) and skipping coarser scans
    /// for a canonical once a finer one has already produced contracts.
    #[must_use]
    pub fn new(data_root: PathBuf, resolution_ladder: Vec<Resolution>) -> Self {
        Self {
            data_root,
            resolution_ladder,
        }
    }

    fn resolution_dir(&self, security_type: SecurityType, market: &str, resolution: Resolution) -> PathBuf {
        self.data_root
            .join(security_type.to_string())
            .join(market)
            .join(resolution.path_segment())
    }

    /// Parse the canonical underlying ticker out of a zip's path: the
    /// immediate parent directory name under the resolution directory,
    /// e.g. `.../minute/spy/20240102_quote_american.zip` -> `SPY`.
    fn canonical_from_path(&self, zip_path: &Path) -> Option<String> {
        zip_path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
    }

    /// Whether `zip_path`'s filename encodes `date`.
    fn zip_matches_date(&self, zip_path: &Path, date: NaiveDate) -> bool {
        let Some(stem) = zip_path.file_stem().and_then(|s| s.to_str()) else {
            return false;
        };
        stem.starts_with(&date.format("%Y%m%d").to_string())
    }

    fn read_zip_contract_names(&self, zip_path: &Path) -> Result<Vec<String>> {
        let file = std::fs::File::open(zip_path)
            .with_context(|| format!("opening archive {}", zip_path.display()))?;
        let mut archive = zip::ZipArchive::new(file)
            .with_context(|| format!("reading archive index {}", zip_path.display()))?;

        let mut names = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            let stem = Path::new(entry.name())
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            if !stem.is_empty() {
                names.push(stem);
            }
        }
        Ok(names)
    }

    fn canonical_symbol(&self, ticker: &str, security_type: SecurityType, market: &str) -> Symbol {
        Symbol {
            security_type,
            market: market.to_string(),
            ticker: ticker.to_string(),
            underlying: None,
            option_style: None,
            option_right: None,
            strike: Strike::from_f64(0.0),
            expiry: far_future(),
        }
    }
}

/// Sentinel expiry for canonical/non-derivative symbols: far enough in the
/// future it is never treated as expired relative to any processing date.
fn far_future() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2999-12-31T00:00:00Z")
        .expect("valid sentinel date")
        .with_timezone(&Utc)
}

impl ChainDiscovery for ArchiveChainDiscovery {
    fn discover(
        &self,
        date: NaiveDate,
        security_type: SecurityType,
        market: &str,
    ) -> Result<BTreeMap<Symbol, Vec<Symbol>>> {
        let mut resolved: BTreeSet<String> = BTreeSet::new();
        let mut out: BTreeMap<Symbol, Vec<Symbol>> = BTreeMap::new();

        for &resolution in &self.resolution_ladder {
            let dir = self.resolution_dir(security_type, market, resolution);
            if !dir.exists() {
                continue;
            }

            let entries = match walk_zips(&dir) {
                Ok(zips) => zips,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "failed to scan resolution directory, skipping");
                    continue;
                }
            };

            for zip_path in entries {
                if !self.zip_matches_date(&zip_path, date) {
                    continue;
                }
                let Some(canonical_ticker) = self.canonical_from_path(&zip_path) else {
                    continue;
                };
                if resolved.contains(&canonical_ticker) {
                    // A finer resolution already produced this canonical.
                    continue;
                }

                let contract_names = match self.read_zip_contract_names(&zip_path) {
                    Ok(names) => names,
                    Err(err) => {
                        warn!(zip = %zip_path.display(), error = %err, "failed to parse archive, skipping");
                        continue;
                    }
                };

                let canonical = self.canonical_symbol(&canonical_ticker, security_type, market);
                let mut contracts: BTreeSet<Symbol> = BTreeSet::new();
                for name in contract_names {
                    if let Some(symbol) = parse_contract_symbol(&name, security_type, market, &canonical) {
                        if symbol.expiry > date_to_utc(date) {
                            contracts.insert(symbol);
                        } else {
                            debug!(contract = %symbol.ticker, "skipping expired contract");
                        }
                    }
                }

                if !contracts.is_empty() {
                    resolved.insert(canonical_ticker);
                    out.insert(canonical, contracts.into_iter().collect());
                }
            }
        }

        Ok(out)
    }
}

fn date_to_utc(date: NaiveDate) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).expect("valid midnight"), Utc)
}

fn walk_zips(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walkdir_shallow(dir)? {
        if entry.extension().and_then(|e| e.to_str()) == Some("zip") {
            out.push(entry);
        }
    }
    Ok(out)
}

/// Two-level walk: `<resolution>/<ticker>/*.zip`. Non-recursive beyond
/// that depth; deeper structure is not part of the documented layout.
fn walkdir_shallow(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for ticker_dir in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let ticker_dir = ticker_dir?.path();
        if !ticker_dir.is_dir() {
            continue;
        }
        for zip_entry in std::fs::read_dir(&ticker_dir)? {
            let zip_entry = zip_entry?.path();
            if zip_entry.is_file() {
                out.push(zip_entry);
            }
        }
    }
    Ok(out)
}

/// The pieces a contract ticker encodes, decoded from the
/// `TICKER_YYYYMMDD_[C|P]_STRIKE[_STYLE]` convention this crate's zip scan
/// assigns as a contract's ticker. Reused by the additional-fields pass
/// (C7) to recover expiry/strike/right from a previously-written CSV's
/// `symbol_id` column without re-reading the archive.
#[derive(Debug, Clone, Copy)]
pub struct ParsedContractTicker {
    /// Decoded expiry.
    pub expiry: NaiveDate,
    /// Decoded right.
    pub right: OptionRight,
    /// Decoded strike.
    pub strike: f64,
    /// Decoded exercise style.
    pub style: OptionStyle,
}

/// Decode a contract ticker's embedded fields. This is a minimal reference
/// parser; a real symbol-parsing library is treated as an external
/// collaborator.
#[must_use]
pub fn parse_contract_ticker(stem: &str) -> Option<ParsedContractTicker> {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 4 {
        return None;
    }
    let expiry = NaiveDate::parse_from_str(parts[1], "%Y%m%d").ok()?;
    let right = match parts[2] {
        "C" => OptionRight::Call,
        "P" => OptionRight::Put,
        _ => return None,
    };
    let strike: f64 = parts[3].parse().ok()?;
    let style = match parts.get(4) {
        Some(&"european") => OptionStyle::European,
        _ => OptionStyle::American,
    };

    Some(ParsedContractTicker {
        expiry,
        right,
        strike,
        style,
    })
}

fn parse_contract_symbol(
    stem: &str,
    security_type: SecurityType,
    market: &str,
    canonical: &Symbol,
) -> Option<Symbol> {
    let parsed = parse_contract_ticker(stem)?;
    Some(Symbol {
        security_type,
        market: market.to_string(),
        ticker: stem.to_string(),
        underlying: Some(Box::new(canonical.clone())),
        option_style: Some(parsed.style),
        option_right: Some(parsed.right),
        strike: Strike::from_f64(parsed.strike),
        expiry: date_to_utc(parsed.expiry),
    })
}
