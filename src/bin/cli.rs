//! shelf CLI
//!
//! Local execution entry point. For the scheduled reminder sweep on AWS
//! Lambda, use `shelf-lambda`.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use shelf::{
    error::{AppError, Result},
    models::{Config, Identity, StatusRow},
    services::{LibraryService, Resolution},
};

/// shelf - Book inventory and lending ledger
#[derive(Parser, Debug)]
#[command(name = "shelf", version, about = "Book inventory and lending ledger")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "shelf.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look an ISBN up with the external metadata providers
    Resolve { isbn: String },

    /// Check whether an ISBN is in the catalog
    Confirm { isbn: String },

    /// Register an ISBN in the catalog using provider metadata
    Register { isbn: String },

    /// Lend an item
    Borrow {
        isbn: String,

        /// Borrower's email (account identifier)
        #[arg(long)]
        email: String,

        /// Borrower's display name
        #[arg(long)]
        name: String,

        /// Group or affiliation
        #[arg(long)]
        group: String,
    },

    /// Return a lent item
    Return { isbn: String },

    /// List every title with its lending status
    Status {
        /// Only show overdue loans
        #[arg(long)]
        overdue: bool,
    },

    /// Show loans for an ISBN, or a borrower's open loans
    History {
        isbn: Option<String>,

        #[arg(long, conflicts_with = "isbn")]
        email: Option<String>,
    },

    /// Send reminders for loans due in `reminder_days_before` days
    Sweep {
        /// Run as if today were this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Validate the configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print<T: Serialize>(json: bool, value: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human();
    }
    Ok(())
}

fn status_line(row: &StatusRow) -> String {
    let base = format!(
        "{:<14} {:<9} {}",
        row.entry.isbn,
        row.status.label(),
        row.entry.title
    );
    match &row.status {
        shelf::models::LoanStatus::Lent {
            borrower, due_at, ..
        } => format!("{base} ({}, due {})", borrower.name, due_at),
        shelf::models::LoanStatus::Available => base,
    }
}

/// Main entry point for the CLI application. Failures exit with a status
/// derived from the error kind.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e.kind();
            eprintln!("Error [{}]: {}", kind.as_str(), e);
            ExitCode::from(kind.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();
    init_logging(cli.verbose, &config.logging.level);

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("Config OK (storage: {:?})", config.storage.backend);
        return Ok(());
    }

    let service = LibraryService::from_config(&config).await?;

    match cli.command {
        Command::Resolve { isbn } => {
            let resolution = service.resolve_discovery(&isbn).await?;
            print(cli.json, &resolution, || match &resolution {
                Resolution::Found { metadata, source } => {
                    println!("{} ({})", metadata.title, source);
                    println!("  by {}", metadata.authors_display());
                    println!("  published {}", metadata.published_date);
                    println!("  cover {}", metadata.thumbnail_url);
                }
                Resolution::NotFound => println!("No provider knows {isbn}"),
            })?;
        }

        Command::Confirm { isbn } => {
            let metadata = service.resolve_catalog(&isbn).await?;
            print(cli.json, &metadata, || {
                println!("{} by {}", metadata.title, metadata.authors_display());
            })?;
        }

        Command::Register { isbn } => {
            let entry = service.register_isbn(&isbn).await?;
            print(cli.json, &entry, || {
                println!("Registered {} \"{}\"", entry.isbn, entry.title);
            })?;
        }

        Command::Borrow {
            isbn,
            email,
            name,
            group,
        } => {
            let identity = Identity::new(email, name);
            let loan = service.borrow(&isbn, Some(&identity), &group).await?;
            print(cli.json, &loan, || {
                println!("Lent {} to {}, due {}", loan.isbn, loan.borrower.name, loan.due_at);
            })?;
        }

        Command::Return { isbn } => {
            let receipt = service.return_item(&isbn).await?;
            print(cli.json, &receipt, || {
                println!("\"{}\" returned by {}", receipt.title, receipt.borrower.name);
            })?;
        }

        Command::Status { overdue: true } => {
            let loans = service.overdue().await?;
            print(cli.json, &loans, || {
                for loan in &loans {
                    println!("{} {} due {}", loan.isbn, loan.borrower.name, loan.due_at);
                }
            })?;
        }

        Command::Status { overdue: false } => {
            let rows = service.list_status().await?;
            print(cli.json, &rows, || {
                for row in &rows {
                    println!("{}", status_line(row));
                }
            })?;
        }

        Command::History { isbn, email } => {
            let loans = match (isbn, email) {
                (Some(isbn), _) => service.history(&isbn).await?,
                (None, Some(email)) => service.loans_for(&email).await?,
                (None, None) => {
                    return Err(AppError::validation("give an ISBN or --email"));
                }
            };
            print(cli.json, &loans, || {
                for loan in &loans {
                    let returned = loan
                        .returned_at
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "open".to_string());
                    println!(
                        "{} {} {} -> {} ({})",
                        loan.isbn, loan.borrower.name, loan.borrowed_at, loan.due_at, returned
                    );
                }
            })?;
        }

        Command::Sweep { date } => {
            let now = match date {
                Some(date) => service.calendar().noon_of(date),
                None => chrono::Utc::now(),
            };
            let report = service.run_reminder_sweep(now).await?;
            print(cli.json, &report, || {
                println!(
                    "{} due, {} sent, {} without email, {} already reminded, {} failed",
                    report.due.len(),
                    report.sent,
                    report.skipped_no_email,
                    report.already_reminded,
                    report.failed
                );
            })?;
        }

        Command::Validate => {}
    }

    Ok(())
}
