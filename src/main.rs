//! Retirement Engine CLI
//!
//! Runs projections, catalog lookups, series fetches and ledger previews and
//! prints JSON to stdout. `RUST_LOG` controls log output on stderr.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use retirement_engine::config::{Settings, DEFAULT_CONFIG_PATH};
use retirement_engine::ledger::{LedgerSummary, MedicalLedger, Receipt, ReceiptId};
use retirement_engine::projection::{FlowSchedule, PortfolioProjector, PortfolioState};
use retirement_engine::series::{
    ConstantSeriesProvider, FallbackChain, SeriesCache, SeriesService, StaticSeriesProvider,
};
use retirement_engine::{Catalog, ChartData};

#[derive(Parser)]
#[command(
    name = "retirement_engine",
    version,
    about = "Retirement projection and market series toolkit"
)]
struct Cli {
    /// Settings file (defaults apply when it does not exist)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Country returns table, overriding the settings file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Project bucket balances year by year
    Project {
        /// Starting balance, e.g. `stocks=100000` (repeatable, order is kept)
        #[arg(long = "balance", value_parser = parse_pair, required = true)]
        balances: Vec<(String, f64)>,

        /// Annual rate override, e.g. `stocks=0.07`
        #[arg(long = "rate", value_parser = parse_pair)]
        rates: Vec<(String, f64)>,

        /// Signed yearly flow, e.g. `bills=-5000` (applied every projected year)
        #[arg(long = "flow", value_parser = parse_pair)]
        flows: Vec<(String, f64)>,

        #[arg(long, default_value_t = 30)]
        years: u32,

        /// Calendar year of the starting balances (defaults to this year)
        #[arg(long)]
        start_year: Option<i32>,

        #[arg(long, value_enum, default_value_t = ProjectionView::Balances)]
        view: ProjectionView,
    },

    /// List catalog countries and their data flags
    Countries {
        /// Only the curated default selection
        #[arg(long)]
        defaults: bool,
    },

    /// Compounded historical returns for one or more countries
    Country {
        #[arg(required = true)]
        codes: Vec<String>,

        #[arg(long)]
        start: Option<i32>,

        #[arg(long)]
        end: Option<i32>,
    },

    /// Fetch and compound market series through the provider chain
    Series {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Preview reimbursement values for stored or ad hoc receipts
    LedgerPreview {
        /// JSON array of receipts
        #[arg(long)]
        receipts: Option<PathBuf>,

        /// Ad hoc receipt amount (with --incurred)
        #[arg(long, requires = "incurred")]
        amount: Option<f64>,

        #[arg(long)]
        incurred: Option<NaiveDate>,

        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Annual growth rate override
        #[arg(long)]
        rate: Option<f64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProjectionView {
    Balances,
    Allocations,
    Full,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptPreview {
    id: ReceiptId,
    amount: f64,
    incurred: NaiveDate,
    value: Option<f64>,
    reimbursed: bool,
}

#[derive(Serialize)]
struct LedgerPreview {
    summary: LedgerSummary,
    receipts: Vec<ReceiptPreview>,
}

fn parse_pair(raw: &str) -> std::result::Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("'{}' is not a number: {}", value, e))?;
    Ok((key.trim().to_string(), value))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

fn load_catalog(settings: &Settings, override_path: Option<&PathBuf>) -> Result<Catalog> {
    let path = override_path.unwrap_or(&settings.catalog.path);
    Catalog::from_csv_path(path, settings.catalog_options())
        .with_context(|| format!("loading catalog from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::load_or_default(&cli.config)
        .with_context(|| format!("reading settings from {}", cli.config.display()))?;

    match cli.command {
        Command::Project {
            balances,
            rates,
            flows,
            years,
            start_year,
            view,
        } => {
            let initial = balances
                .iter()
                .try_fold(PortfolioState::new(), |state, (bucket, balance)| {
                    state.with_bucket(bucket.clone(), *balance)
                })?;

            // Default rates only for buckets the caller holds
            let mut bucket_rates = retirement_engine::BucketRates::new();
            for bucket in initial.names() {
                if let Some(rate) = settings.projection.rates.get(bucket) {
                    bucket_rates = bucket_rates.with_rate(bucket, rate);
                }
            }
            for (bucket, rate) in rates {
                bucket_rates = bucket_rates.with_rate(bucket, rate);
            }

            let flow_pairs: Vec<(&str, f64)> =
                flows.iter().map(|(b, a)| (b.as_str(), *a)).collect();
            let schedule = FlowSchedule::constant(&flow_pairs, years);

            let projector = PortfolioProjector::new(settings.projection_config());
            let result = projector.project(&initial, &bucket_rates, &schedule, years)?;
            let start_year = start_year.unwrap_or_else(|| Utc::now().year());

            match view {
                ProjectionView::Balances => {
                    print_json(&ChartData::from_projection(&result, start_year), cli.pretty)?
                }
                ProjectionView::Allocations => {
                    print_json(&ChartData::allocations(&result, start_year), cli.pretty)?
                }
                ProjectionView::Full => print_json(&result, cli.pretty)?,
            }
        }

        Command::Countries { defaults } => {
            let catalog = load_catalog(&settings, cli.catalog.as_ref())?;
            let listing = if defaults {
                catalog.default_countries()
            } else {
                catalog.available_countries()
            };
            print_json(&listing, cli.pretty)?;
        }

        Command::Country { codes, start, end } => {
            let catalog = load_catalog(&settings, cli.catalog.as_ref())?;
            let start = start.unwrap_or(settings.catalog.window_start);
            let end = end.unwrap_or(settings.catalog.window_end);

            let mut series = Vec::with_capacity(codes.len());
            for code in &codes {
                let compounded = catalog
                    .country_returns(code, start, end)
                    .with_context(|| format!("country {}", code))?;
                series.push((code.as_str(), compounded));
            }
            let named: Vec<(&str, &_)> = series.iter().map(|(code, s)| (*code, s)).collect();
            print_json(&ChartData::from_series(&named), cli.pretty)?;
        }

        Command::Series { ids } => {
            let mut chain = FallbackChain::new(settings.attempt_timeout());
            if settings.series.path.exists() {
                let local = StaticSeriesProvider::from_csv_path("local", &settings.series.path)?;
                chain = chain.with_provider(local);
            }
            if let Some(rate) = settings.series.fallback_rate {
                let (first, last) = (settings.catalog.window_start, settings.catalog.window_end);
                let mut flat = ConstantSeriesProvider::new("flat", first, last);
                for id in &ids {
                    flat = flat.with_rate(id.clone(), rate);
                }
                chain = chain.with_provider(flat);
            }
            if chain.provider_names().is_empty() {
                bail!(
                    "no series providers configured (missing {} and no fallback_rate)",
                    settings.series.path.display()
                );
            }

            let service = SeriesService::new(chain, SeriesCache::new(settings.cache_ttl()));
            let mut fetched = Vec::with_capacity(ids.len());
            for id in &ids {
                let series = service
                    .compounded(id)
                    .await
                    .with_context(|| format!("series {}", id))?;
                fetched.push((id.as_str(), series));
            }
            let named: Vec<(&str, &_)> = fetched.iter().map(|(id, s)| (*id, &**s)).collect();
            print_json(&ChartData::from_series(&named), cli.pretty)?;
        }

        Command::LedgerPreview {
            receipts,
            amount,
            incurred,
            as_of,
            rate,
        } => {
            let basis = match rate {
                Some(rate) => retirement_engine::GrowthBasis::FixedRate(rate),
                None => settings.growth_basis(),
            };

            let stored: Vec<Receipt> = match &receipts {
                Some(path) => {
                    let contents = std::fs::read_to_string(path)
                        .with_context(|| format!("reading receipts from {}", path.display()))?;
                    serde_json::from_str(&contents)
                        .with_context(|| format!("parsing {}", path.display()))?
                }
                None => Vec::new(),
            };
            let mut ledger = MedicalLedger::from_receipts(basis, stored)?;

            if let (Some(amount), Some(incurred)) = (amount, incurred) {
                ledger.submit_receipt(amount, incurred)?;
            }
            if ledger.is_empty() {
                bail!("nothing to preview: pass --receipts or --amount with --incurred");
            }

            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let mut previews = Vec::with_capacity(ledger.len());
            for receipt in ledger.receipts() {
                let value = if receipt.is_pending() {
                    if receipt.incurred <= as_of {
                        Some(ledger.pending_value(receipt.id, as_of)?)
                    } else {
                        None
                    }
                } else {
                    ledger.realized_value(receipt.id)?
                };
                previews.push(ReceiptPreview {
                    id: receipt.id,
                    amount: receipt.amount,
                    incurred: receipt.incurred,
                    value,
                    reimbursed: !receipt.is_pending(),
                });
            }

            let preview = LedgerPreview {
                summary: ledger.summary(as_of)?,
                receipts: previews,
            };
            print_json(&preview, cli.pretty)?;
        }
    }

    Ok(())
}
