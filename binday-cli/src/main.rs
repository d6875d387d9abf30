//! `binday`: look up Belfast bin collection days from the command line.

mod config;
mod output;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use reqwest::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use binday_core::service::BinLookupService;
use binday_core::store::SqliteScheduleCache;
use binday_core::{LookupQuery, ScheduleEntry, SystemClock};

use crate::config::AppConfig;
use crate::output::Report;

#[derive(Debug, Parser)]
#[command(name = "binday", version, about = "Find your next bin collection day in Belfast")]
struct Cli {
    /// Configuration file (defaults to ./binday.toml when present).
    #[arg(long, global = true, env = "BINDAY_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Look up the collection schedule for an address.
    Lookup {
        /// Postcode, e.g. "BT1 5GS".
        postcode: String,
        /// House number or name used to pick the address.
        #[arg(long)]
        house_number: Option<String>,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Load schedule records from a JSON array into the cache.
    Import {
        /// JSON file holding the records.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Lookup {
            postcode,
            house_number,
            json,
        } => lookup(&config, LookupQuery::new(postcode, house_number), json).await,
        Command::Import { file } => import(&config, &file),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_cache(config: &AppConfig) -> Result<SqliteScheduleCache> {
    SqliteScheduleCache::open(&config.cache.path)
        .with_context(|| format!("opening schedule cache {}", config.cache.path.display()))
}

#[expect(clippy::print_stdout, reason = "command line output")]
async fn lookup(config: &AppConfig, query: LookupQuery, json: bool) -> Result<()> {
    let client = Client::builder().user_agent("binday/0.1").build()?;
    let cache = open_cache(config)?;
    let scraper = binday_provider_belfast::scraper(client, &config.scraper);
    let service = BinLookupService::new(Arc::new(cache), Arc::new(scraper), Arc::new(SystemClock));

    let resolved = service.resolve(&query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved.result)?);
    } else {
        print!(
            "{}",
            Report {
                result: &resolved.result,
                source: resolved.source,
            }
        );
    }
    Ok(())
}

#[expect(clippy::print_stdout, reason = "command line output")]
fn import(config: &AppConfig, file: &Path) -> Result<()> {
    let raw = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let entries: Vec<ScheduleEntry> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;

    let cache = open_cache(config)?;
    let imported = cache.import(&entries)?;
    info!(imported, path = %config.cache.path.display(), "schedule records imported");
    println!("Imported {imported} schedule records into {}", config.cache.path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_arguments_parse() {
        let cli = Cli::try_parse_from([
            "binday",
            "-vv",
            "lookup",
            "BT1 5GS",
            "--house-number",
            "12",
            "--json",
        ])
        .expect("valid arguments");

        assert_eq!(cli.verbose, 2);
        let Command::Lookup {
            postcode,
            house_number,
            json,
        } = cli.command
        else {
            panic!("expected lookup");
        };
        assert_eq!(postcode, "BT1 5GS");
        assert_eq!(house_number.as_deref(), Some("12"));
        assert!(json);
    }

    #[test]
    fn import_loads_records_into_the_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let records = dir.path().join("records.json");
        fs::write(
            &records,
            r#"[{
                "route": "R12",
                "bin_type": "General Waste",
                "day_of_week": "Tuesday",
                "house_number": "1",
                "street": "Main Street",
                "city": "Belfast",
                "county": "Antrim",
                "postcode": "BT1 1AA",
                "full_address": "1 Main Street, Belfast, BT1 1AA"
            }]"#,
        )
        .expect("write records");

        let mut config = AppConfig::default();
        config.cache.path = dir.path().join("cache.sqlite3");

        import(&config, &records).expect("import succeeds");

        let cache = open_cache(&config).expect("cache reopens");
        assert_eq!(cache.len().expect("count"), 1);
    }
}
