//! C7 — the additional-fields post-pass: IV30, IV-rank, IV-percentile
//! over a trailing year of previously-written universe files.
//!
//! The triple is attached only to the underlying row; contract rows'
//! trailing columns are left empty rather than duplicated across every
//! line of a file.

use crate::chain_discovery::parse_contract_ticker;
use anyhow::Result;
use chrono::NaiveDate;
use statrs::statistics::{Data, Max, Min, OrderStatistics};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write as _};
use std::path::{Path, PathBuf};
use tracing::warn;

const REQUIRED_COLUMNS: [&str; 2] = ["implied_volatility", "delta"];
const TRAILING_YEAR_DAYS: i64 = 365;

/// Runs the additional-fields pass for one underlying's universe
/// directory at one processing date.
pub struct AdditionalFieldsPass;

impl AdditionalFieldsPass {
    /// Compute and append `iv_30,iv_rank,iv_percentile` to the universe
    /// file for `date` under `underlying_dir`, using the trailing year of
    /// sibling files as the ranking population. No-op if `date`'s file
    /// does not exist.
    pub fn run(underlying_dir: &Path, date: NaiveDate) -> Result<()> {
        let target_path = underlying_dir.join(format!("{}.csv", date.format("%Y%m%d")));
        if !target_path.exists() {
            return Ok(());
        }

        let files = list_trailing_year_files(underlying_dir, date)?;

        let mut ivs: Vec<(NaiveDate, f64)> = Vec::new();
        for (file_date, path) in &files {
            match compute_file_iv30(path, *file_date) {
                Ok(Some(iv30)) => ivs.push((*file_date, iv30)),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping file lacking required columns");
                }
            }
        }
        ivs.sort_by_key(|(d, _)| *d);

        let values: Vec<f64> = ivs.iter().map(|(_, v)| *v).collect();
        let Some(&latest) = values.last() else {
            return Ok(());
        };

        let (iv_rank, iv_percentile) = rank_and_percentile(&values, latest);

        rewrite_with_additional_fields(&target_path, latest, iv_rank, iv_percentile)
    }
}

/// `iv_rank = (latest - min) / (max - min)`, `iv_percentile` = fraction of
/// `values` strictly less than `latest`; both empty (`None`) when fewer
/// than 2 values are available.
fn rank_and_percentile(values: &[f64], latest: f64) -> (Option<f64>, Option<f64>) {
    if values.len() < 2 {
        return (None, None);
    }
    let mut data = Data::new(values.to_vec());
    let min = data.min();
    let max = data.max();
    let iv_rank = if (max - min).abs() > f64::EPSILON {
        Some((latest - min) / (max - min))
    } else {
        Some(0.0)
    };
    let below = values.iter().filter(|&&v| v < latest).count();
    let iv_percentile = Some(below as f64 / values.len() as f64);
    (iv_rank, iv_percentile)
}

/// List `(date, path)` pairs for every `<YYYYMMDD>.csv` file in
/// `underlying_dir` whose date falls within `[date - 365d, date]`, sorted
/// ascending by date.
fn list_trailing_year_files(underlying_dir: &Path, date: NaiveDate) -> Result<Vec<(NaiveDate, PathBuf)>> {
    let earliest = date - chrono::Duration::days(TRAILING_YEAR_DAYS);
    let mut out = Vec::new();

    for entry in std::fs::read_dir(underlying_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Ok(file_date) = NaiveDate::parse_from_str(stem, "%Y%m%d") else {
            continue;
        };
        if file_date >= earliest && file_date <= date {
            out.push((file_date, path));
        }
    }

    out.sort_by_key(|(d, _)| *d);
    Ok(out)
}

/// Compute one file's ATM IV30: bracket `file_date + 30d` by expiry, using
/// within each expiry the contract whose `|delta - 0.5|` is minimal.
fn compute_file_iv30(path: &Path, file_date: NaiveDate) -> Result<Option<f64>> {
    let file = std::fs::File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let Some(header_line) = lines.next() else {
        return Ok(None);
    };
    let header_line = header_line?;
    let header: Vec<&str> = header_line.trim_start_matches('#').split(',').collect();

    let Some(symbol_idx) = header.iter().position(|&h| h == "symbol_id") else {
        return Ok(None);
    };
    if !REQUIRED_COLUMNS.iter().all(|col| header.contains(col)) {
        return Ok(None);
    }
    let iv_idx = header.iter().position(|&h| h == "implied_volatility").unwrap();
    let delta_idx = header.iter().position(|&h| h == "delta").unwrap();

    let mut best_per_expiry: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();

    for line in lines {
        let line = line?;
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() <= symbol_idx.max(iv_idx).max(delta_idx) {
            continue;
        }
        let Some(parsed) = parse_contract_ticker(fields[symbol_idx]) else {
            continue;
        };
        let (Ok(iv), Ok(delta)) = (fields[iv_idx].parse::<f64>(), fields[delta_idx].parse::<f64>()) else {
            continue;
        };
        if iv <= 0.0 {
            continue;
        }

        let score = (delta - 0.5).abs();
        best_per_expiry
            .entry(parsed.expiry)
            .and_modify(|(best_score, best_iv)| {
                if score < *best_score {
                    *best_score = score;
                    *best_iv = iv;
                }
            })
            .or_insert((score, iv));
    }

    if best_per_expiry.is_empty() {
        return Ok(None);
    }

    Ok(Some(interpolate_iv30(&best_per_expiry, file_date)))
}

fn interpolate_iv30(by_expiry: &BTreeMap<NaiveDate, (f64, f64)>, file_date: NaiveDate) -> f64 {
    let target = file_date + chrono::Duration::days(30);

    let near = by_expiry.range(..=target).next_back().map(|(&d, &(_, iv))| (d, iv));
    let far = by_expiry.range(target..).next().map(|(&d, &(_, iv))| (d, iv));

    match (near, far) {
        (Some((nd, niv)), Some((fd, fiv))) if nd == fd => niv,
        (Some((nd, niv)), Some((fd, fiv))) => {
            let span = (fd - nd).num_days() as f64;
            if span <= 0.0 {
                return niv;
            }
            let w_near = (fd - target).num_days() as f64 / span;
            let w_far = (target - nd).num_days() as f64 / span;
            niv * w_near + fiv * w_far
        }
        (Some((_, niv)), None) => niv,
        (None, Some((_, fiv))) => fiv,
        (None, None) => unreachable!("checked non-empty before calling"),
    }
}

/// Rewrite `path` in place: extend the header comment with
/// `,iv_30,iv_rank,iv_percentile` and extend every data row — the triple
/// on the first (underlying) row, three empty fields on every other row.
fn rewrite_with_additional_fields(
    path: &Path,
    iv_30: f64,
    iv_rank: Option<f64>,
    iv_percentile: Option<f64>,
) -> Result<()> {
    let original = std::fs::read_to_string(path)?;
    let mut lines = original.lines();

    let Some(header_line) = lines.next() else {
        return Ok(());
    };

    let mut rewritten = String::with_capacity(original.len() + 64);
    rewritten.push_str(header_line);
    rewritten.push_str(",iv_30,iv_rank,iv_percentile\n");

    let underlying_suffix = format!(
        ",{},{},{}\n",
        fmt_opt(Some(iv_30)),
        fmt_opt(iv_rank),
        fmt_opt(iv_percentile)
    );

    for (i, line) in lines.enumerate() {
        rewritten.push_str(line);
        if i == 0 {
            rewritten.push_str(&underlying_suffix);
        } else {
            rewritten.push_str(",,,\n");
        }
    }

    let mut file = std::fs::File::create(path)?;
    file.write_all(rewritten.as_bytes())?;
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}
