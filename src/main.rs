use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use lotto_history::lotto_api::LottoApiClient;
use lotto_history::model::parse_numbers;
use lotto_history::{seed, Config, DrawResults, DrawResultsEntity, DrawResultsService, MemoryTableStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Lotto draw history stored in Azure Table Storage
#[derive(Parser, Debug)]
#[command(name = "lotto-history")]
#[command(about = "Store and query lottery draw results", long_about = None)]
struct Cli {
    /// Keep everything in memory instead of talking to Azure
    #[arg(long = "memory", global = true)]
    memory: bool,

    /// Create the table first if it does not exist
    #[arg(long = "create-table", global = true)]
    create_table: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store one draw
    Add {
        #[arg(long)]
        date: String,
        /// Comma-separated Lotto numbers
        #[arg(long)]
        numbers: String,
        /// Comma-separated Plus numbers
        #[arg(long, default_value = "")]
        plus: String,
    },
    /// Show the most recent draw
    Latest,
    /// List draws, newest first
    List {
        #[arg(short = 'n', long, default_value_t = 10, allow_negative_numbers = true)]
        top: i32,
        /// Table-storage filter expression, e.g. "DrawDate ge '2024-01-01'"
        #[arg(short = 'f', long, default_value = "")]
        filter: String,
    },
    /// Import draws from a CSV file
    Import { file: PathBuf },
    /// Fetch draws from the lotto.pl API
    Fetch {
        #[arg(long)]
        from: NaiveDate,
        /// Defaults to today
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, value_enum, default_value = "csv")]
        output: FetchOutput,
        /// CSV path when writing to a file
        #[arg(long, default_value = "data.csv")]
        file: PathBuf,
        /// Pause between requests, in milliseconds
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FetchOutput {
    Csv,
    Store,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    let cancel = CancellationToken::new();
    let second_interrupt = CancellationToken::new();
    {
        let (first, second) = (cancel.clone(), second_interrupt.clone());
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                first.cancel();
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted again, stopping");
                second.cancel();
            }
        });
    }

    let (memory, create_table) = (cli.memory, cli.create_table);
    match cli.command {
        Command::Add { date, numbers, plus } => {
            let service = open_service(memory, create_table, &config).await?;
            let draw = DrawResults::new(date, parse_numbers(&numbers)?, parse_numbers(&plus)?);
            service.add(&draw, &cancel).await?;
            println!("✓ Stored draw {}", draw.draw_date);
        }
        Command::Latest => {
            let service = open_service(memory, create_table, &config).await?;
            let latest = service.get_latest(&cancel).await?;
            print_draw(&latest);
        }
        Command::List { top, filter } => {
            let service = open_service(memory, create_table, &config).await?;
            let draws = service.get(&filter, top, &cancel).await?;
            for draw in &draws {
                print_draw(draw);
            }
            println!("{} draws", draws.len());
        }
        Command::Import { file } => {
            let service = open_service(memory, create_table, &config).await?;
            let reader = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
            let draws = seed::read_draws(reader)?;
            info!("Read {} draws from {}", draws.len(), file.display());

            let summary = seed::import(&service, &draws, &cancel).await?;
            println!("✓ {} added, {} already stored", summary.added, summary.skipped);
        }
        Command::Fetch {
            from,
            to,
            output,
            file,
            delay_ms,
        } => {
            let client = LottoApiClient::from_config(&config)?;
            let to = to.unwrap_or_else(|| Local::now().date_naive());

            let fetched = client
                .fetch_range(from, to, Duration::from_millis(delay_ms), &cancel)
                .await;
            if let Some(e) = &fetched.stopped_by {
                warn!("Fetch stopped early: {}", e);
            }

            match output {
                FetchOutput::Csv => {
                    let writer = File::create(&file)
                        .with_context(|| format!("creating {}", file.display()))?;
                    seed::write_draws(writer, &fetched.draws)?;
                    println!("✓ {} draws saved to '{}'", fetched.draws.len(), file.display());
                }
                FetchOutput::Store => {
                    let service = open_service(memory, create_table, &config).await?;
                    let import_cancel = import_token(&cancel, &second_interrupt);
                    let summary = seed::import(&service, &fetched.draws, import_cancel).await?;
                    println!("✓ {} added, {} already stored", summary.added, summary.skipped);
                }
            }
        }
    }

    Ok(())
}

/// Token for saving fetched draws. If Ctrl-C already ended the fetch, what
/// was gathered is still saved and only a second Ctrl-C stops the import.
fn import_token<'a>(
    cancel: &'a CancellationToken,
    second_interrupt: &'a CancellationToken,
) -> &'a CancellationToken {
    if cancel.is_cancelled() {
        second_interrupt
    } else {
        cancel
    }
}

async fn open_service(
    memory: bool,
    create_table: bool,
    config: &Config,
) -> anyhow::Result<DrawResultsService> {
    if memory {
        info!("Using in-memory table store");
        return Ok(DrawResultsService::new(Arc::new(MemoryTableStore::new())));
    }

    DrawResultsService::connect(config, create_table)
        .await
        .context("connecting to Azure Table Storage")
}

fn print_draw(draw: &DrawResultsEntity) {
    if draw.plus_numbers.is_empty() {
        println!("{}  {}", draw.draw_date, draw.lotto_numbers);
    } else {
        println!("{}  {}  (plus: {})", draw.draw_date, draw.lotto_numbers, draw.plus_numbers);
    }
}
