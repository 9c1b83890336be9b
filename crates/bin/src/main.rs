//! Terrace CLI binary.
//!
//! Drives every dashboard engine from the command line: bulk import,
//! region listings, pivoted series, rebased indices, volatility,
//! correlation, PCA, clustering, choropleth snapshots and performance
//! summaries. Tabular results print to stdout; `--output` writes CSV (or
//! GeoJSON for the map command) instead.

use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use std::fs::File;
use std::path::PathBuf;
use std::process;
use terrace::{AppConfig, AppContext};
use terrace_analytics::{
    BaseOptions, RebaseConfig, correlation, decompose, k_means, latest_performance, log_returns,
    rebase, rolling_volatility, select_base_candidates,
};
use terrace_data::{AGGREGATE_REGION, import_csv};
use terrace_geo::{join_to_geometry, snapshot};

#[derive(Parser)]
#[command(name = "terrace")]
#[command(about = "UK house-price dashboard analytics", long_about = None)]
#[command(version)]
struct Cli {
    /// Data directory holding the SQLite database and geometry cache
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a UK-HPI full CSV file into the database
    Import {
        /// Path to the UK-HPI full file
        file: PathBuf,
    },

    /// List all known regions
    Regions,

    /// List available snapshot months
    Months,

    /// Show the observed date range, optionally for a region selection
    Bounds {
        /// Regions to intersect (all data when omitted)
        regions: Vec<String>,
    },

    /// Print the pivoted price table for a region selection
    Series {
        /// Regions to include
        regions: Vec<String>,

        /// Also include the whole-market aggregate
        #[arg(long)]
        uk: bool,

        /// Write CSV to this path instead of printing
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Rebase a region selection to 100 at a base month
    Rebase {
        /// Regions to rebase
        regions: Vec<String>,

        /// Base month (YYYY-MM); defaults to the policy-preferred month
        #[arg(long)]
        base: Option<String>,

        /// Keep rows before the base month
        #[arg(long)]
        include_before: bool,

        /// Write CSV to this path instead of printing
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Rolling volatility of log-returns
    Volatility {
        /// Regions to include
        regions: Vec<String>,

        /// Trailing window in months
        #[arg(long, default_value_t = terrace_analytics::returns::DEFAULT_VOLATILITY_WINDOW)]
        window: usize,

        /// Write CSV to this path instead of printing
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Pairwise correlation of log-returns
    Correlation {
        /// Regions to include (all regions when omitted)
        regions: Vec<String>,
    },

    /// Principal components of standardized log-returns
    Pca {
        /// Regions to include (all regions when omitted)
        regions: Vec<String>,

        /// Number of components
        #[arg(long, default_value = "3")]
        components: usize,
    },

    /// K-means clusters of regions over their component loadings
    Clusters {
        /// Regions to include (all regions when omitted)
        regions: Vec<String>,

        /// Number of components to cluster on
        #[arg(long, default_value = "3")]
        components: usize,

        /// Number of clusters
        #[arg(short, default_value = "5")]
        k: usize,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Export a choropleth snapshot for one month as GeoJSON
    Map {
        /// Month (YYYY-MM); defaults to the latest available
        #[arg(long)]
        month: Option<String>,

        /// Write GeoJSON to this path instead of printing
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Latest prices and performance relative to the UK aggregate
    Summary {
        /// Regions to summarize
        regions: Vec<String>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .or_else(|| dirs::data_dir().map(|d| d.join("terrace")))
        .unwrap_or_else(|| PathBuf::from("data"));
    std::fs::create_dir_all(&data_dir)?;
    let context = AppContext::new(AppConfig::with_data_dir(data_dir))?;

    match cli.command {
        Commands::Import { file } => cmd_import(&context, &file),
        Commands::Regions => cmd_regions(&context),
        Commands::Months => cmd_months(&context),
        Commands::Bounds { regions } => cmd_bounds(&context, &regions),
        Commands::Series { regions, uk, output } => cmd_series(&context, &regions, uk, output),
        Commands::Rebase {
            regions,
            base,
            include_before,
            output,
        } => cmd_rebase(&context, &regions, base.as_deref(), include_before, output),
        Commands::Volatility {
            regions,
            window,
            output,
        } => cmd_volatility(&context, &regions, window, output),
        Commands::Correlation { regions } => cmd_correlation(&context, &regions),
        Commands::Pca {
            regions,
            components,
        } => cmd_pca(&context, &regions, components),
        Commands::Clusters {
            regions,
            components,
            k,
            seed,
        } => cmd_clusters(&context, &regions, components, k, seed),
        Commands::Map { month, output } => cmd_map(&context, month.as_deref(), output),
        Commands::Summary { regions } => cmd_summary(&context, &regions),
    }
}

fn cmd_import(context: &AppContext, file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );

    let report = import_csv(context.store(), file, |rows| {
        pb.set_message(format!("{rows} rows imported"));
        pb.tick();
    })?;

    pb.finish_with_message(format!(
        "Imported {} rows ({} area codes corrected)",
        report.rows_inserted, report.area_codes_corrected
    ));
    Ok(())
}

fn cmd_regions(context: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    for region in context.store().region_names()? {
        println!("{region}");
    }
    Ok(())
}

fn cmd_months(context: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    for month in context.store().available_months()? {
        println!("{}", month.format("%Y-%m"));
    }
    Ok(())
}

fn cmd_bounds(context: &AppContext, regions: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let selection = (!regions.is_empty()).then_some(regions);
    match context.store().date_bounds(selection)? {
        Some((min, max)) => println!("{} .. {}", min.format("%Y-%m"), max.format("%Y-%m")),
        None => println!("No data for the selection"),
    }
    if regions.is_empty() {
        if let Some(bounds) = context.store().price_bounds()? {
            println!("Price scale: £{} .. £{}", bounds.min, bounds.max);
        }
    }
    Ok(())
}

fn cmd_series(
    context: &AppContext,
    regions: &[String],
    include_aggregate: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = context.region_series(regions, include_aggregate)?;
    if table.height() == 0 {
        println!("No data available for the selected regions");
        return Ok(());
    }
    emit(table.as_ref().clone(), output)
}

fn cmd_rebase(
    context: &AppContext,
    regions: &[String],
    base: Option<&str>,
    include_before: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = context.region_series(regions, false)?;
    if table.height() == 0 {
        println!("No data available for the selected regions");
        return Ok(());
    }

    let config: &RebaseConfig = &context.config().rebase;
    let (present, base_date) = match select_base_candidates(&table, regions, config)? {
        BaseOptions::NoRegions => {
            println!("None of the selected regions are available in the dataset");
            return Ok(());
        }
        BaseOptions::NoCoverage { .. } => {
            println!("No month has data for all selected regions");
            return Ok(());
        }
        BaseOptions::Candidates {
            present,
            valid_dates,
            default_base,
        } => {
            let base_date = match base {
                Some(raw) => {
                    let requested = parse_month(raw)?;
                    if !valid_dates.contains(&requested) {
                        println!(
                            "{} is not a valid base month for this selection",
                            requested.format("%Y-%m")
                        );
                        return Ok(());
                    }
                    requested
                }
                None => default_base,
            };
            (present, base_date)
        }
    };

    println!("Base month: {}", base_date.format("%b %Y"));
    let rebased = rebase(&table, &present, Some(base_date), include_before)?;
    emit(rebased, output)
}

fn cmd_volatility(
    context: &AppContext,
    regions: &[String],
    window: usize,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = returns_for(context, regions)?;
    let Some(returns) = table else {
        println!("No data available for the selected regions");
        return Ok(());
    };
    emit(rolling_volatility(&returns, window)?, output)
}

fn cmd_correlation(
    context: &AppContext,
    regions: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(returns) = returns_for(context, regions)? else {
        println!("No data available for the selected regions");
        return Ok(());
    };
    let corr = correlation(&returns)?;
    println!("{}", corr.to_frame()?);
    Ok(())
}

fn cmd_pca(
    context: &AppContext,
    regions: &[String],
    components: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(returns) = returns_for(context, regions)? else {
        println!("No data available for the selected regions");
        return Ok(());
    };
    let decomposition = decompose(&returns, components)?;

    println!("{}", decomposition.to_frame()?);
    for (i, ratio) in decomposition.explained_variance.iter().enumerate() {
        println!("PC{}: {:.1}% of variance", i + 1, ratio * 100.0);
    }
    Ok(())
}

fn cmd_clusters(
    context: &AppContext,
    regions: &[String],
    components: usize,
    k: usize,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(returns) = returns_for(context, regions)? else {
        println!("No data available for the selected regions");
        return Ok(());
    };
    let loadings = decompose(&returns, components)?.to_frame()?;
    for assignment in k_means(&loadings, "region", k, seed)? {
        println!("{}\t{}", assignment.key, assignment.label);
    }
    Ok(())
}

fn cmd_map(
    context: &AppContext,
    month: Option<&str>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let month = match month {
        Some(raw) => parse_month(raw)?,
        None => match context.store().available_months()?.last().copied() {
            Some(latest) => latest,
            None => {
                println!("No data imported yet");
                return Ok(());
            }
        },
    };

    let boundaries = context.boundaries()?;
    let monthly = context.monthly_snapshot(month)?;
    let rows = snapshot(&monthly, &boundaries)?;
    let geo = join_to_geometry(&rows, &boundaries);

    let raw = serde_json::to_string(&geo)?;
    match output {
        Some(path) => {
            std::fs::write(&path, raw)?;
            println!(
                "Wrote {} features for {} to {}",
                geo.features.len(),
                month.format("%b %Y"),
                path.display()
            );
        }
        None => println!("{raw}"),
    }
    Ok(())
}

fn cmd_summary(context: &AppContext, regions: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let table = context.region_series(regions, true)?;
    if table.height() == 0 {
        println!("No data available for the selected regions");
        return Ok(());
    }

    for entry in latest_performance(&table, regions, AGGREGATE_REGION)? {
        println!(
            "{}\t£{}\t{:.0}% of UK average",
            entry.region,
            entry.latest_value.round() as i64,
            entry.ratio_to_aggregate * 100.0
        );
    }
    Ok(())
}

/// Log-returns for a selection, with an empty selection meaning all regions.
fn returns_for(
    context: &AppContext,
    regions: &[String],
) -> Result<Option<DataFrame>, Box<dyn std::error::Error>> {
    let selection = if regions.is_empty() {
        context.store().region_names()?
    } else {
        regions.to_vec()
    };
    let table = context.region_series(&selection, false)?;
    if table.height() == 0 {
        return Ok(None);
    }
    Ok(Some(log_returns(&table)?))
}

/// Print a frame, or write it as CSV when an output path is given.
fn emit(mut frame: DataFrame, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            let file = File::create(&path)?;
            CsvWriter::new(file).finish(&mut frame)?;
            println!("Wrote {} rows to {}", frame.height(), path.display());
        }
        None => println!("{frame}"),
    }
    Ok(())
}

/// Accept `YYYY-MM` or `YYYY-MM-DD`, normalized to the first of the month.
fn parse_month(raw: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    let padded = if raw.len() == 7 {
        format!("{raw}-01")
    } else {
        raw.to_string()
    };
    let date = NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
        .map_err(|_| format!("invalid month '{raw}', expected YYYY-MM"))?;
    Ok(date.with_day(1).unwrap_or(date))
}
