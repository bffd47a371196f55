//! Production [`ResolutionReader`]: reads trade/quote/open-interest bars out
//! of the same dated zip archives [`ArchiveChainDiscovery`] scans for
//! contract names.
//!
//! Per-symbol, per-day zips are opened lazily and any missing file is
//! treated as "no data at this resolution" rather than an error, matching
//! C2's documented empty-ladder-rung behavior.

use crate::chain_discovery::Resolution;
use crate::history_gateway::{ResolutionReader, SliceZone};
use crate::slice::{QuoteBar, Slice, TradeBar};
use crate::symbol::Symbol;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which tick type a dated zip holds, encoded in its filename.
#[derive(Debug, Clone, Copy)]
enum TickType {
    Trade,
    Quote,
    OpenInterest,
}

impl TickType {
    fn file_suffix(self) -> &'static str {
        match self {
            TickType::Trade => "trade",
            TickType::Quote => "quote",
            TickType::OpenInterest => "openinterest",
        }
    }
}

/// Reads bars for one symbol at one resolution from `<root>/<sec-type>/<market>/<resolution>/<ticker>/<YYYYMMDD>_<tick-type>.zip`.
pub struct ArchiveResolutionReader {
    data_root: PathBuf,
    security_type: crate::symbol::SecurityType,
    market: String,
}

impl ArchiveResolutionReader {
    /// Build a reader rooted at `data_root` for one security type/market.
    #[must_use]
    pub fn new(data_root: PathBuf, security_type: crate::symbol::SecurityType, market: impl Into<String>) -> Self {
        Self {
            data_root,
            security_type,
            market: market.into(),
        }
    }

    fn ticker_dir(&self, symbol: &Symbol, resolution: Resolution) -> PathBuf {
        let root_ticker = symbol
            .underlying
            .as_deref()
            .map(|u| u.ticker.as_str())
            .unwrap_or(symbol.ticker.as_str());
        self.data_root
            .join(self.security_type.to_string())
            .join(&self.market)
            .join(resolution.path_segment())
            .join(root_ticker.trim_start_matches('/').to_lowercase())
    }

    fn zip_path(&self, symbol: &Symbol, resolution: Resolution, date: NaiveDate, tick: TickType) -> PathBuf {
        self.ticker_dir(symbol, resolution)
            .join(format!("{}_{}.zip", date.format("%Y%m%d"), tick.file_suffix()))
    }

    fn read_bars(&self, symbol: &Symbol, resolution: Resolution, date: NaiveDate, tick: TickType) -> Result<Vec<(DateTime<Utc>, Vec<f64>)>> {
        let path = self.zip_path(symbol, resolution, date, tick);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let mut archive = zip::ZipArchive::new(file).with_context(|| format!("reading archive index {}", path.display()))?;

        let entry_name = format!("{}.csv", symbol.ticker);
        let Ok(mut entry) = archive.by_name(&entry_name) else {
            debug!(symbol = %symbol.ticker, zip = %path.display(), "symbol absent from archive");
            return Ok(Vec::new());
        };

        let mut contents = String::new();
        entry.read_to_string(&mut contents)?;
        drop(entry);

        let mut rows = Vec::new();
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(contents.as_bytes());
        for record in reader.records() {
            let record = record?;
            let Some(ts_field) = record.get(0) else { continue };
            let Ok(millis) = ts_field.parse::<i64>() else { continue };
            let Some(time) = DateTime::from_timestamp_millis(millis) else { continue };
            let values: Vec<f64> = record.iter().skip(1).filter_map(|f| f.parse::<f64>().ok()).collect();
            rows.push((time, values));
        }
        Ok(rows)
    }
}

impl ResolutionReader for ArchiveResolutionReader {
    fn read(&self, symbol: &Symbol, resolution: Resolution, zone: SliceZone) -> Result<Vec<Slice>> {
        let mut by_time: BTreeMap<DateTime<Utc>, Slice> = BTreeMap::new();

        let mut date = zone.start.date_naive();
        let end_date = zone.end.date_naive();
        while date <= end_date {
            for (time, values) in self.read_bars(symbol, resolution, date, TickType::Trade)? {
                if values.len() >= 5 {
                    by_time.entry(time).or_insert_with(|| Slice::at(time)).trades.insert(
                        symbol.clone(),
                        TradeBar {
                            end_time: time,
                            open: values[0],
                            high: values[1],
                            low: values[2],
                            close: values[3],
                            volume: values[4],
                        },
                    );
                }
            }

            for (time, values) in self.read_bars(symbol, resolution, date, TickType::Quote)? {
                if values.len() >= 6 {
                    by_time.entry(time).or_insert_with(|| Slice::at(time)).quotes.insert(
                        symbol.clone(),
                        QuoteBar {
                            end_time: time,
                            open: values[0],
                            high: values[1],
                            low: values[2],
                            close: values[3],
                            bid: values[4],
                            ask: values[5],
                        },
                    );
                }
            }

            for (time, values) in self.read_bars(symbol, resolution, date, TickType::OpenInterest)? {
                if let Some(&oi) = values.first() {
                    by_time
                        .entry(time)
                        .or_insert_with(|| Slice::at(time))
                        .open_interest
                        .insert(symbol.clone(), oi.max(0.0) as u64);
                }
            }

            date = date.succ_opt().unwrap_or(date);
            if date == zone.start.date_naive() {
                break; // guards against NaiveDate overflow looping forever
            }
        }

        Ok(by_time.into_values().collect())
    }
}
