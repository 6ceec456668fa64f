#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `landprice`: import survey extracts and inspect reconciled series.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use landprice_aggregate::Grouping;
use landprice_cli_utils::IndicatifProgress;
use landprice_database::{catalog_db, unresolved_db};
use landprice_ingest::progress::NullProgress;
use landprice_ingest::{GeoJsonDirectorySource, ImportConfig, Importer};
use landprice_models::{RunSummary, TimeSeries, UnresolvedRecord};

#[derive(Parser)]
#[command(name = "landprice", about = "Historical land-price reconciliation")]
struct Cli {
    /// Config file (defaults to `landprice.toml` in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// `DuckDB` file (overrides config and `LANDPRICE_DB`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import survey years into the reconciled store
    Import {
        /// Years to import. Defaults to `--from`..=`--to`.
        years: Vec<u16>,
        /// First year of the range
        #[arg(long)]
        from: Option<u16>,
        /// Last year of the range
        #[arg(long)]
        to: Option<u16>,
        /// Directory holding the per-year extracts
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Municipality code (e.g. "13112")
        #[arg(long)]
        city: Option<String>,
        /// Address prefix to strip, in order (repeatable, e.g. `--prefix 東京都 --prefix 渋谷区`)
        #[arg(long = "prefix")]
        prefixes: Vec<String>,
        /// Concurrent block writers
        #[arg(long)]
        workers: Option<usize>,
        /// Positional look-back for the N-years-ago change rate
        #[arg(long)]
        horizon: Option<usize>,
        /// Row granularity: `block` or `block-and-address`
        #[arg(long)]
        grouping: Option<Grouping>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load town blocks from a CSV export into the catalog
    LoadCatalog {
        /// CSV with a `name` (or `choume`) column and optional `code`, `active`
        csv: PathBuf,
        /// Municipality the blocks belong to
        #[arg(long)]
        city: Option<String>,
    },
    /// List the year-to-schema profile table
    Profiles,
    /// Print one block's yearly series with change rates
    Series {
        /// Catalog block code
        block_code: String,
        /// Row disambiguator (empty for per-block rows)
        #[arg(long, default_value = "")]
        disambiguator: String,
        /// Positional look-back for the N-years-ago change rate
        #[arg(long)]
        horizon: Option<usize>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List records that could not be matched to a block
    Unresolved {
        /// Only this survey year
        #[arg(long)]
        year: Option<u16>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild change rates for every stored series
    Recompute {
        /// Positional look-back for the N-years-ago change rate
        #[arg(long)]
        horizon: Option<usize>,
    },
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = landprice_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = ImportConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Import {
            years,
            from,
            to,
            data_dir,
            city,
            prefixes,
            workers,
            horizon,
            grouping,
            json,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            match city {
                Some(city) => config = config.with_city(&city, prefixes)?,
                None if !prefixes.is_empty() => config.city_prefixes = prefixes,
                None => {}
            }
            if let Some(workers) = workers {
                config.workers = workers.max(1);
            }
            if let Some(horizon) = horizon {
                config.horizon = horizon;
            }
            if let Some(grouping) = grouping {
                config.grouping = grouping;
            }
            let years: Vec<u16> = if years.is_empty() {
                (from.unwrap_or(config.first_year)..=to.unwrap_or(config.last_year)).collect()
            } else {
                years
            };

            log::info!(
                "Importing {} years for {} from {}",
                years.len(),
                config.city_code,
                config.data_dir.display()
            );

            let conn = landprice_database::open(&config.db_path)?;
            let source = Arc::new(GeoJsonDirectorySource::new(&config.data_dir));
            let importer = Importer::new(conn, landprice_schema::default_table()?, source, config)?
                .with_progress(
                    IndicatifProgress::years_bar(&multi, years.len() as u64),
                    IndicatifProgress::rows_bar(&multi),
                );

            let summary = importer.import_years(years).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::LoadCatalog { csv, city } => {
            let city = city.unwrap_or_else(|| config.city_code.clone());
            let blocks = catalog_db::load_catalog_csv(std::fs::File::open(&csv)?, &city)?;
            let conn = landprice_database::open(&config.db_path)?;
            let written = catalog_db::upsert_blocks(&conn, &blocks)?;
            println!("Loaded {written} town blocks for {city} from {}", csv.display());
        }
        Commands::Profiles => {
            let table = landprice_schema::default_table()?;
            let (first, last) = table.span();
            println!("Import span {first}-{last}");
            println!("{:<16} {:<11} {:<10} DESCRIPTION", "ID", "YEARS", "FORMAT");
            println!("{}", "-".repeat(72));
            for profile in table.profiles() {
                println!(
                    "{:<16} {:<11} {:<10} {}",
                    profile.id,
                    format!("{}-{}", profile.start_year, profile.end_year),
                    profile.source_format.as_ref(),
                    profile.description
                );
            }
            if !table.unclassified().is_empty() {
                let years: Vec<String> = table.unclassified().iter().map(ToString::to_string).collect();
                println!("Unclassified (skipped): {}", years.join(", "));
            }
        }
        Commands::Series {
            block_code,
            disambiguator,
            horizon,
            json,
        } => {
            let conn = landprice_database::open(&config.db_path)?;
            let series = landprice_ingest::load_time_series(
                &conn,
                &block_code,
                &disambiguator,
                horizon.unwrap_or(config.horizon),
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else if series.rows.is_empty() {
                println!("No rows for block {block_code}");
            } else {
                print_series(&series);
            }
        }
        Commands::Unresolved { year, json } => {
            let conn = landprice_database::open(&config.db_path)?;
            let records = unresolved_db::load(&conn, year)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_unresolved(&records);
            }
        }
        Commands::Recompute { horizon } => {
            let conn = landprice_database::open(&config.db_path)?;
            let report = landprice_ingest::recompute(
                &conn,
                horizon.unwrap_or(config.horizon),
                &NullProgress,
            )?;
            println!(
                "Recomputed {} series, updated {} rows",
                report.series, report.rows_updated
            );
        }
    }

    Ok(())
}

fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:+.2}%"))
}

fn print_summary(summary: &RunSummary) {
    println!("{:<6} {:>8} {:>8} {:>6}", "YEAR", "SEEN", "MATCHED", "ROWS");
    println!("{}", "-".repeat(31));
    for year in &summary.years {
        println!(
            "{:<6} {:>8} {:>8} {:>6}",
            year.survey_year, year.records_seen, year.records_matched, year.rows_written
        );
    }
    println!(
        "{} records, {} rows written",
        summary.records_seen(),
        summary.rows_written()
    );
    if !summary.skipped_years.is_empty() {
        let years: Vec<String> = summary.skipped_years.iter().map(ToString::to_string).collect();
        println!("Skipped years: {}", years.join(", "));
    }
    for (kind, count) in &summary.errors {
        println!("  {:<32} {count}", kind.as_ref());
    }
}

fn print_series(series: &TimeSeries) {
    println!(
        "{:<6} {:>6} {:>12} {:>10} {:>10} {:>9} {:>9} {:>9}",
        "YEAR",
        "POINTS",
        "AVG",
        "MIN",
        "MAX",
        "PRIOR",
        format!("{}Y", series.horizon),
        "FIRST"
    );
    println!("{}", "-".repeat(78));
    for row in &series.rows {
        println!(
            "{:<6} {:>6} {:>12} {:>10} {:>10} {:>9} {:>9} {:>9}",
            row.survey_year,
            row.point_count,
            row.avg_price.map_or_else(|| "-".to_string(), |v| format!("{v:.0}")),
            opt(row.min_price),
            opt(row.max_price),
            pct(row.changes.vs_prior_year),
            pct(row.changes.vs_n_years_ago),
            pct(row.changes.vs_first_year),
        );
    }
}

fn print_unresolved(records: &[UnresolvedRecord]) {
    println!("{:<6} {:<14} {:<10} ADDRESS", "YEAR", "REASON", "PRICE");
    println!("{}", "-".repeat(60));
    for record in records {
        println!(
            "{:<6} {:<14} {:<10} {}",
            record.survey_year,
            record.reason.as_ref(),
            record.raw_price,
            record.raw_address
        );
    }
    println!("{} unresolved records", records.len());
}
