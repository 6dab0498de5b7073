use std::collections::BTreeMap;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use keyledger::config::Config;
use keyledger::db::{self, AppState};
use keyledger::handlers;
use keyledger::models::{CreateLicense, LicenseType, TransactionMetadata, TransactionType};
use keyledger::util::{expires_after_days, now};

#[derive(Parser)]
#[command(name = "keyledger", version, about = "License activation and credit ledger service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a license and print it as JSON
    CreateLicense {
        #[arg(long)]
        owner: String,
        /// TRIAL, STANDARD or PRO
        #[arg(long = "type", default_value = "STANDARD")]
        license_type: String,
        /// Overrides the type's default usage limit (0 = unlimited)
        #[arg(long)]
        usage_limit: Option<i64>,
        /// License lifetime in days from now
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// Hard-disable a license
    Deactivate {
        #[arg(long)]
        key: String,
    },
    /// Add credits to an owner's account
    AddCredits {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        amount: i64,
        /// PURCHASE, REFUND, BONUS, REFERRAL or ADJUSTMENT
        #[arg(long = "type", default_value = "ADJUSTMENT")]
        transaction_type: String,
        #[arg(long)]
        description: Option<String>,
        /// Free-form note stored with the transaction
        #[arg(long)]
        note: Option<String>,
    },
    /// Print an owner's balance
    Balance {
        #[arg(long)]
        owner: String,
    },
    /// Check that an owner's stored balance matches their ledger
    Reconcile {
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyledger=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    if !keyledger::util::is_valid_key_prefix(&config.license_key_prefix) {
        anyhow::bail!(
            "LICENSE_KEY_PREFIX must be 1-16 uppercase letters or digits, got '{}'",
            config.license_key_prefix
        );
    }

    let db_pool = db::create_pool(&config.database_path, config.db_pool_size)
        .context("failed to open main database")?;
    let audit_pool = db::create_pool(&config.audit_database_path, config.db_pool_size)
        .context("failed to open audit database")?;
    {
        let conn = db_pool.get()?;
        db::init_db(&conn)?;
        let conn = audit_pool.get()?;
        db::init_audit_db(&conn)?;
    }

    let state = AppState::new(db_pool, audit_pool, &config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, &config).await,
        Command::CreateLicense {
            owner,
            license_type,
            usage_limit,
            expires_in_days,
        } => {
            let license_type: LicenseType = license_type
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown license type '{}'", license_type))?;
            let expires_at = expires_in_days
                .map(|days| {
                    expires_after_days(now(), days)
                        .ok_or_else(|| anyhow::anyhow!("--expires-in-days {} is out of range", days))
                })
                .transpose()?;
            let license = state.activations.create_license(&CreateLicense {
                owner_id: owner,
                license_type,
                usage_limit,
                expires_at,
            })?;
            println!("{}", serde_json::to_string_pretty(&license)?);
            Ok(())
        }
        Command::Deactivate { key } => {
            let license = state.activations.deactivate_license(&key)?;
            println!("{}", serde_json::to_string_pretty(&license)?);
            Ok(())
        }
        Command::AddCredits {
            owner,
            amount,
            transaction_type,
            description,
            note,
        } => {
            let transaction_type: TransactionType = transaction_type
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown transaction type '{}'", transaction_type))?;
            let metadata = note.map(|note| TransactionMetadata::Notes {
                notes: BTreeMap::from([("note".to_string(), note)]),
            });
            let description =
                description.unwrap_or_else(|| format!("{} via CLI", transaction_type.as_ref()));
            let txn = state.ledger.credit(
                &owner,
                amount,
                transaction_type,
                &description,
                metadata.as_ref(),
            )?;
            println!("{}", serde_json::to_string_pretty(&txn)?);
            Ok(())
        }
        Command::Balance { owner } => {
            println!("{}", state.ledger.get_balance(&owner)?);
            Ok(())
        }
        Command::Reconcile { owner } => {
            let report = state.ledger.reconcile(&owner)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.consistent {
                anyhow::bail!("ledger for {} is out of balance", owner);
            }
            Ok(())
        }
    }
}

async fn serve(state: AppState, config: &Config) -> anyhow::Result<()> {
    if state.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY is not set; admin routes will reject all requests");
    }

    let app = handlers::router(state);
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("keyledger listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
