mod from_row;
pub mod queries;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::activation::ActivationService;
use crate::audit::ActivationLog;
use crate::config::Config;
use crate::error::Result;
use crate::ledger::CreditLedger;

pub type DbPool = Pool<SqliteConnectionManager>;

/// How long a writer waits on SQLite's lock before giving up with SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a request handler needs. Built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub audit: DbPool,
    pub ledger: CreditLedger,
    pub activations: ActivationService,
    pub activation_log: ActivationLog,
    pub admin_api_key: Option<String>,
    pub activation_timeout: Duration,
}

impl AppState {
    pub fn new(db: DbPool, audit: DbPool, config: &Config) -> Self {
        let ledger = CreditLedger::new(db.clone());
        let activation_log = ActivationLog::new(audit.clone(), config.activation_log_enabled);
        let activations = ActivationService::new(
            db.clone(),
            activation_log.clone(),
            config.license_key_prefix.clone(),
        );

        Self {
            db,
            audit,
            ledger,
            activations,
            activation_log,
            admin_api_key: config.admin_api_key.clone(),
            activation_timeout: config.activation_timeout,
        }
    }
}

fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )
}

/// Open a file-backed pool with WAL journaling and a busy timeout on every connection.
pub fn create_pool(path: &str, max_size: u32) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(configure_connection);
    let pool = Pool::builder().max_size(max_size).build(manager)?;
    Ok(pool)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            owner_id TEXT NOT NULL,
            license_type TEXT NOT NULL,
            device_hwid TEXT,
            device_ip TEXT,
            device_mac TEXT,
            usage_count INTEGER NOT NULL DEFAULT 0 CHECK (usage_count >= 0),
            usage_limit INTEGER NOT NULL DEFAULT 0 CHECK (usage_limit >= 0),
            expires_at INTEGER,
            active INTEGER NOT NULL DEFAULT 1,
            last_used_at INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_owner ON licenses(owner_id, created_at);

        CREATE TABLE IF NOT EXISTS credit_accounts (
            owner_id TEXT PRIMARY KEY,
            balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS credit_transactions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL REFERENCES credit_accounts(owner_id),
            amount INTEGER NOT NULL CHECK (amount != 0),
            transaction_type TEXT NOT NULL,
            description TEXT NOT NULL,
            metadata TEXT,
            balance_after INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_credit_transactions_owner ON credit_transactions(owner_id, created_at);

        CREATE TRIGGER IF NOT EXISTS credit_transactions_no_update
        BEFORE UPDATE ON credit_transactions
        BEGIN
            SELECT RAISE(ABORT, 'credit_transactions is append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS credit_transactions_no_delete
        BEFORE DELETE ON credit_transactions
        BEGIN
            SELECT RAISE(ABORT, 'credit_transactions is append-only');
        END;
        ",
    )?;
    Ok(())
}

pub fn init_audit_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS activation_logs (
            id TEXT PRIMARY KEY,
            license_id TEXT,
            license_key TEXT NOT NULL,
            owner_id TEXT,
            hwid TEXT NOT NULL,
            ip TEXT,
            action TEXT NOT NULL,
            result TEXT NOT NULL,
            reason TEXT,
            credit_used INTEGER NOT NULL DEFAULT 0,
            timestamp INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_activation_logs_license ON activation_logs(license_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_activation_logs_owner ON activation_logs(owner_id, timestamp);

        CREATE TRIGGER IF NOT EXISTS activation_logs_no_update
        BEFORE UPDATE ON activation_logs
        BEGIN
            SELECT RAISE(ABORT, 'activation_logs is append-only');
        END;
        ",
    )?;
    Ok(())
}
