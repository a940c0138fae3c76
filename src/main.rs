use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

use email_extractor_lib::{export, input_loader, logger};
use email_extractor_lib::{
    AppConfig, BatchDriver, EmailStore, KeywordSearch, LogProgress, RecordQuery, Scraper,
    SearchEngine,
};

#[derive(Parser)]
#[command(name = "email-extractor", version, about = "Find public contact emails for search keywords")]
struct Cli {
    /// TOML config file (defaults to ./email_extractor.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search every keyword in a CSV/Excel file and store new emails
    Extract {
        /// File with a `keyword` column
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value = "new_emails.csv")]
        output: PathBuf,
    },
    /// Query previously stored emails
    Search {
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        source: Option<String>,
        /// Inclusive start date, YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Inclusive end date, YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Write matches to this CSV instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show database size against the quota
    Size,
    /// Delete every stored email
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Extract { input, output } => extract(&config, input, output),
        Command::Search {
            keyword,
            email,
            source,
            from,
            to,
            output,
        } => {
            let query = RecordQuery {
                keyword,
                email,
                source,
                date_from: from,
                date_to: to,
            };
            search(&config, &query, output)
        }
        Command::Size => {
            let store = EmailStore::open(&config.store)?;
            match store.quota_usage() {
                Some(usage) => println!("DB usage: {} GB / {} GB", usage.size_gb, usage.quota_gb),
                None => println!("DB size unavailable"),
            }
            Ok(())
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to clear the database without --yes");
            }
            EmailStore::open(&config.store)?.truncate()?;
            Ok(())
        }
    }
}

fn extract(config: &AppConfig, input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    info!("Starting Email Extractor...");

    // Rejects files without a keyword column before any searching starts
    let keywords = input_loader::load_keywords(&input)
        .with_context(|| format!("reading keywords from {}", input.display()))?;
    if keywords.is_empty() {
        warn!("No keywords found in {}", input.display());
        return Ok(());
    }

    let store = EmailStore::open(&config.store)?;
    if let Some(usage) = store.quota_usage() {
        info!("DB usage: {} GB / {} GB", usage.size_gb, usage.quota_gb);
    }

    let scraper = Scraper::new(&config.http)?;
    let engine = SearchEngine::new(&config.http, &config.search)?;
    let search = KeywordSearch::new(engine, scraper, config);

    let report = BatchDriver::new(&search, &store).run(&keywords, &mut LogProgress);

    if report.storage_limit_reached {
        warn!("DB limit reached during this run, older records were cleared");
    }

    if report.inserted.is_empty() {
        info!("No new emails stored (duplicates or none found)");
        return Ok(());
    }

    export::save_run_csv(&output, &report.inserted)?;
    info!(
        "Wrote {} new email(s) to {}",
        report.inserted.len(),
        output.display()
    );
    Ok(())
}

fn search(config: &AppConfig, query: &RecordQuery, output: Option<PathBuf>) -> anyhow::Result<()> {
    let store = EmailStore::open(&config.store)?;
    let records = store.search(query)?;

    if records.is_empty() {
        println!("No records found");
        return Ok(());
    }

    match output {
        Some(path) => {
            export::save_records_csv(&path, &records)?;
            println!("{} records written to {}", records.len(), path.display());
        }
        None => {
            export::write_records_csv(std::io::stdout().lock(), &records)?;
            eprintln!("{} records found", records.len());
        }
    }
    Ok(())
}
