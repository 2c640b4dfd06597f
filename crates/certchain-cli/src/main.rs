//! CertChain CLI - Command-line interface for the certificate ledger
//!
//! Commands:
//! - certchain issue <subject> <qualifier> - Issue a certificate
//! - certchain verify --hash <hex> | --id <n> - Verify a certificate
//! - certchain list - List certificates, newest first
//! - certchain audit - Walk the whole chain and report inconsistencies

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use certchain::store::SqliteStore;
use certchain::{AppendPolicy, ErrorKind, Ledger, LedgerConfig, RecordId, VerificationResult};

#[derive(Parser)]
#[command(name = "certchain")]
#[command(about = "Issue and verify hash-chained certificates", long_about = None)]
struct Cli {
    /// Path to the ledger database
    #[arg(long, env = "CERTCHAIN_DB", default_value = "certchain.db")]
    db: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Lock appends and read the tip inside the write transaction
    #[arg(long)]
    serialized: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a certificate and link it into the chain
    Issue {
        /// Recipient name
        subject: String,

        /// Course or qualification
        qualifier: String,
    },

    /// Verify a certificate by hash or id
    #[command(group(ArgGroup::new("lookup").required(true).args(["hash", "id"])))]
    Verify {
        /// Certificate hash (64 hex characters)
        #[arg(long)]
        hash: Option<String>,

        /// Certificate id
        #[arg(long)]
        id: Option<i64>,
    },

    /// List certificates, newest first
    List,

    /// Recompute every block digest and link
    Audit,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    let store = SqliteStore::open(&cli.db)
        .map_err(|e| anyhow::anyhow!("Failed to open ledger {}: {}", cli.db.display(), e))?;
    let config = LedgerConfig {
        append_policy: if cli.serialized {
            AppendPolicy::Serialized
        } else {
            AppendPolicy::Unguarded
        },
    };
    tracing::debug!(db = %cli.db.display(), policy = ?config.append_policy, "opened ledger");
    let ledger = Ledger::new(store, config);

    match cli.command {
        Commands::Issue { subject, qualifier } => {
            tracing::info!(%subject, %qualifier, "issuing certificate");
            let cert = ledger.append(&subject, &qualifier).await?;
            println!("Issued certificate {}", cert.id);
            println!("  Hash: {}", cert.hash);
        }

        Commands::Verify { hash, id } => {
            let result: certchain::Result<VerificationResult> = match (hash, id) {
                (Some(hash), _) => ledger.verify_hash(&hash).await,
                (None, Some(id)) => ledger.verify(RecordId(id)).await,
                (None, None) => anyhow::bail!("Either --hash or --id is required"),
            };

            match result {
                Ok(result) => print_json(&result)?,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::info!(error = %e, "verification failed");
                    eprintln!("NOT FOUND: {}", e);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::List => {
            let certificates = ledger.list().await?;
            tracing::info!(count = certificates.len(), "listed certificates");
            print_json(&certificates)?;
        }

        Commands::Audit => {
            let report = ledger.audit().await?;
            print_json(&report)?;
            if !report.is_consistent() {
                eprintln!("INCONSISTENT: {} issue(s) found", report.issues.len());
                std::process::exit(2);
            }
        }
    }

    Ok(())
}
