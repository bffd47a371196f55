//! `universe-generator` binary entry point: CLI parsing, wiring of the
//! archive-backed chain discovery / history gateway, and the per-date
//! pipeline run.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use universe_generator::archive_reader::ArchiveResolutionReader;
use universe_generator::chain_discovery::{ArchiveChainDiscovery, Resolution};
use universe_generator::config::{self, Cli, Config};
use universe_generator::history_gateway::{LadderedHistoryGateway, NoSecondaryProvider};
use universe_generator::additional_fields::AdditionalFieldsPass;
use universe_generator::market_hours::WeekendHolidayCalendar;
use universe_generator::orchestrator::Generator;

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "universe_generator=info".to_string()),
        )
        .init();

    match run() {
        Ok(true) => {
            info!("universe generation completed");
            std::process::exit(0);
        }
        Ok(false) => {
            error!("universe generation cancelled by a per-canonical fatal failure");
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "universe generation failed");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();
    let config = Config::resolve(&cli)?;
    let date = config::deployment_date();

    info!(
        security_type = %config.security_type,
        market = %config.market,
        date = %date.format("%Y-%m-%d"),
        "starting universe generation"
    );

    let resolution_ladder = vec![Resolution::Minute, Resolution::Hour, Resolution::Daily];
    let chain_discovery = Arc::new(ArchiveChainDiscovery::new(
        PathBuf::from(&config.data_root),
        resolution_ladder,
    ));

    let reader = ArchiveResolutionReader::new(
        PathBuf::from(&config.data_root),
        config.security_type,
        config.market.clone(),
    );
    let history_gateway = Arc::new(LadderedHistoryGateway::<_, NoSecondaryProvider>::new(reader, None));

    let market_hours = Arc::new(WeekendHolidayCalendar::default());

    let output_root = config.output_root.clone();
    let security_type = config.security_type;
    let market = config.market.clone();

    let generator = Generator::new(config, chain_discovery, history_gateway, market_hours, date);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let ok = runtime.block_on(generator.run())?;

    if ok && security_type.has_greeks() {
        run_additional_fields_pass(&output_root, security_type, &market, date);
    }

    Ok(ok)
}

/// C7: walk every underlying directory this run wrote to and append the
/// trailing-year IV30/rank/percentile columns.
fn run_additional_fields_pass(
    output_root: &str,
    security_type: universe_generator::symbol::SecurityType,
    market: &str,
    date: chrono::NaiveDate,
) {
    let universes_dir = std::path::Path::new(output_root)
        .join(security_type.to_string())
        .join(market)
        .join("universes");

    let Ok(entries) = std::fs::read_dir(&universes_dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if let Err(err) = AdditionalFieldsPass::run(&path, date) {
            error!(dir = %path.display(), error = %err, "additional-fields pass failed for underlying");
        }
    }
}
