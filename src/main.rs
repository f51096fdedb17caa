//! Command line front end for fetching and enriching bibliographic records.
//!
//! ```bash
//! # arXiv record enriched from its DOI records
//! rust-bib-enrich id 2101.00001
//!
//! # Complete a partial entry
//! rust-bib-enrich entry --title "Etat de l'art sur l'application des bandits multi-bras"
//!
//! # Fill a record from the identifiers it already has
//! rust-bib-enrich merge --doi 10.1103/PhysRevD.76.013009 --eprint 0706.0001
//! ```

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use rust_bib_enrich::resilience::retry_with_policy;
use rust_bib_enrich::{
    AdapterRegistry, Config, ConfigOverrides, EntryType, Error, FetchOrchestrator, Field,
    OrchestrationResult, Record, RetryPolicy, SearchQuery, SearchType,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Fetch bibliographic records and enrich them from several sources")]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Overall deadline per lookup in seconds
    #[arg(long, global = true)]
    deadline: Option<u64>,

    /// Timeout for each supplementary lookup in seconds
    #[arg(long, global = true)]
    supplementary_timeout: Option<u64>,

    /// Keyword separator character
    #[arg(long, global = true)]
    keyword_separator: Option<String>,

    /// Do not enrich arXiv records from DOI records
    #[arg(long, global = true)]
    no_doi_enrichment: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch an arXiv record by identifier and enrich it
    Id { identifier: String },

    /// Complete a partial entry from arXiv
    Entry {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        eprint: Option<String>,
        /// Citation key to keep on the result
        #[arg(long)]
        key: Option<String>,
    },

    /// Search arXiv and enrich every hit
    Search {
        query: String,
        /// Zero-based result page
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },

    /// Fill a record from the DOI, ISBN and arXiv identifiers given
    Merge {
        #[arg(long)]
        doi: Option<String>,
        #[arg(long)]
        isbn: Option<String>,
        #[arg(long)]
        eprint: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },

    /// Print the effective configuration as TOML
    PrintConfig,
}

fn setup_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn report(result: &OrchestrationResult) {
    for warning in &result.warnings {
        warn!("Enrichment incomplete: {}", warning);
    }
}

/// Identifier-merging needs something to look up; a title alone is not enough
fn has_identifier(record: &Record) -> bool {
    [Field::Doi, Field::Isbn, Field::Eprint]
        .iter()
        .any(|field| record.has_field(field))
}

fn print_record(record: &Record) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.json_logs);

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    config.apply_overrides(&ConfigOverrides {
        deadline_secs: cli.deadline,
        supplementary_timeout_secs: cli.supplementary_timeout,
        keyword_separator: cli.keyword_separator.clone(),
        no_doi_enrichment: cli.no_doi_enrichment,
    })?;

    let registry = || AdapterRegistry::from_config(&config);
    let policy = RetryPolicy::default();

    match cli.command {
        Command::PrintConfig => print!("{}", config.to_toml()?),
        Command::Id { identifier } => {
            let orchestrator = FetchOrchestrator::arxiv(&registry()?, &config)?;
            let orchestrator = &orchestrator;
            let id = identifier.as_str();
            let result = retry_with_policy(
                || async move { orchestrator.fetch_by_id(id).await.map_err(Error::from) },
                &policy,
                "fetch_by_id",
            )
            .await?;

            report(&result);
            match result.record {
                Some(record) => print_record(&record)?,
                None => bail!("no record found for '{identifier}'"),
            }
        }
        Command::Entry {
            title,
            author,
            year,
            eprint,
            key,
        } => {
            let mut entry = Record::new(EntryType::Article);
            for (field, value) in [
                (Field::Title, title),
                (Field::Author, author),
                (Field::Year, year),
                (Field::Eprint, eprint),
                (Field::CitationKey, key),
            ] {
                if let Some(value) = value {
                    entry.set_field(field, value);
                }
            }
            if entry.is_empty() {
                bail!("give at least one of --title, --author, --year, --eprint or --key");
            }

            let orchestrator = FetchOrchestrator::arxiv(&registry()?, &config)?;
            let orchestrator = &orchestrator;
            let entry = &entry;
            let result = retry_with_policy(
                || async move { orchestrator.fetch_by_entry(entry).await.map_err(Error::from) },
                &policy,
                "fetch_by_entry",
            )
            .await?;

            report(&result);
            match result.record {
                Some(record) => print_record(&record)?,
                None => bail!("no matching record found"),
            }
        }
        Command::Search {
            query,
            page,
            page_size,
        } => {
            let orchestrator = FetchOrchestrator::arxiv(&registry()?, &config)?;
            let orchestrator = &orchestrator;
            let query = &SearchQuery::new(query, SearchType::Auto).with_page_size(page_size);
            let results = retry_with_policy(
                || async move {
                    orchestrator
                        .fetch_by_query(query, page)
                        .await
                        .map_err(Error::from)
                },
                &policy,
                "fetch_by_query",
            )
            .await?;

            info!("{} records on page {}", results.len(), page);
            results.iter().for_each(report);
            let records: Vec<&Record> = results.iter().filter_map(|r| r.record.as_ref()).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Merge {
            doi,
            isbn,
            eprint,
            title,
        } => {
            let mut record = Record::new(EntryType::Misc);
            for (field, value) in [
                (Field::Doi, doi),
                (Field::Isbn, isbn),
                (Field::Eprint, eprint),
                (Field::Title, title),
            ] {
                if let Some(value) = value {
                    record.set_field(field, value);
                }
            }
            if !has_identifier(&record) {
                bail!("give at least one of --doi, --isbn or --eprint");
            }

            let orchestrator = FetchOrchestrator::identifier_merging(&registry()?, &config)?;
            let result = orchestrator.enrich(record).await;

            report(&result);
            if let Some(record) = result.record {
                print_record(&record)?;
            }
        }
    }

    Ok(())
}
