use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use metrotime_core::config::parse_base_date;
use metrotime_core::{pipeline, ConfigLayer, RunConfig, StoredTable};
use metrotime_parser::{convert, TIMESTAMP_FORMAT};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Resolve past-midnight timetable times against a service day and store them in SQLite",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a timetable file and replace the destination table
    Convert(ConvertArgs),
    /// Normalize individual HH:MM:SS values
    Normalize(NormalizeArgs),
    /// Show per-date row counts of a stored table
    Distribution(TargetArgs),
}

#[derive(Args, Debug, Default)]
struct TargetArgs {
    /// TOML file layered between the built-in defaults and the environment
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,
    /// Destination table name
    #[arg(long)]
    table: Option<String>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Timetable file to read
    #[arg(long)]
    input: Option<PathBuf>,
    /// Service day (YYYY-MM-DD) that overflow hours are resolved against
    #[arg(long, value_parser = parse_date_arg)]
    base_date: Option<NaiveDate>,
    /// Text encoding of the input file (e.g. cp949, utf-8)
    #[arg(long)]
    encoding: Option<String>,
    /// Print the run report as JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    #[arg(long, value_parser = parse_date_arg)]
    base_date: NaiveDate,
    #[arg(required = true)]
    values: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Convert(args) => {
            let json = args.json;
            let config = RunConfig::from_layers(convert_layers(args)?)
                .context("failed to resolve run configuration")?;
            info!(
                input = %config.input_path.display(),
                database = %config.database_path.display(),
                table = %config.table_name,
                base_date = %config.base_date,
                "starting conversion"
            );
            let report = pipeline::run(&config)
                .await
                .with_context(|| format!("conversion of {} failed", config.input_path.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                render::print_report(&report);
            }
            Ok(())
        }
        Command::Normalize(args) => {
            for value in &args.values {
                let normalized = convert(Some(value), args.base_date)
                    .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_else(|| "(absent)".to_string());
                println!("{value}\t{normalized}");
            }
            Ok(())
        }
        Command::Distribution(args) => {
            let target = StoredTable::from_layers(target_layers(&args)?)
                .context("failed to resolve storage configuration")?;
            let (total, distribution) = pipeline::stored_distribution(&target)
                .await
                .with_context(|| {
                    format!(
                        "failed to read table {} from {}",
                        target.table_name,
                        target.database_path.display()
                    )
                })?;
            render::print_distribution(&target.table_name, total, &distribution);
            Ok(())
        }
    }
}

fn target_layers(args: &TargetArgs) -> Result<Vec<ConfigLayer>> {
    let mut layers = Vec::with_capacity(3);
    if let Some(path) = &args.config {
        let file = ConfigLayer::from_file(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?;
        layers.push(file);
    }
    layers.push(ConfigLayer::from_env().context("invalid METROTIME_* environment")?);
    layers.push(ConfigLayer {
        database_path: args.database.clone(),
        table_name: args.table.clone(),
        ..ConfigLayer::default()
    });
    Ok(layers)
}

fn convert_layers(args: ConvertArgs) -> Result<Vec<ConfigLayer>> {
    let mut layers = target_layers(&args.target)?;
    layers.push(ConfigLayer {
        input_path: args.input,
        base_date: args.base_date,
        encoding: args.encoding,
        ..ConfigLayer::default()
    });
    Ok(layers)
}

fn parse_date_arg(raw: &str) -> std::result::Result<NaiveDate, String> {
    parse_base_date(raw).map_err(|err| err.to_string())
}
