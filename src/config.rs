use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub audit_database_path: String,
    /// Bearer token for /admin routes. Admin routes reject every request when unset.
    pub admin_api_key: Option<String>,
    pub license_key_prefix: String,
    /// Deadline applied to activations that don't carry their own
    pub activation_timeout: Duration,
    /// Enable/disable the activation audit trail entirely
    pub activation_log_enabled: bool,
    pub db_pool_size: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let activation_timeout_ms: u64 = env::var("ACTIVATION_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);

        let activation_log_enabled = env::var("ACTIVATION_LOG_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let db_pool_size: u32 = env::var("DB_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(8);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "keyledger.db".to_string()),
            audit_database_path: env::var("AUDIT_DATABASE_PATH")
                .unwrap_or_else(|_| "keyledger_audit.db".to_string()),
            admin_api_key: env::var("ADMIN_API_KEY").ok().filter(|k| !k.is_empty()),
            license_key_prefix: env::var("LICENSE_KEY_PREFIX")
                .unwrap_or_else(|_| "TOOL".to_string()),
            activation_timeout: Duration::from_millis(activation_timeout_ms),
            activation_log_enabled,
            db_pool_size,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
