//! Append-only trail of every activation and verification attempt.
//!
//! Lives in its own database so audit volume never contends with the
//! license/ledger write lock. Appends happen after the authoritative state
//! change has committed; a failed append is reported, never propagated
//! into the outcome of the operation being audited.

use crate::db::{DbPool, queries};
use crate::error::Result;
use crate::models::{ActivationLogEntry, ActivationLogQuery, NewActivationLogEntry};
use crate::util::{gen_id, now};

#[derive(Clone)]
pub struct ActivationLog {
    pool: DbPool,
    enabled: bool,
}

impl ActivationLog {
    pub fn new(pool: DbPool, enabled: bool) -> Self {
        Self { pool, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Persist an entry. When logging is disabled this returns the entry
    /// without writing it.
    pub fn append(&self, entry: &NewActivationLogEntry) -> Result<ActivationLogEntry> {
        if !self.enabled {
            return Ok(queries::activation_log_from_new(gen_id(), now(), entry));
        }
        let conn = self.pool.get()?;
        queries::create_activation_log(&conn, entry)
    }

    /// Best-effort append: failures are logged at error level and swallowed.
    pub fn record(&self, entry: &NewActivationLogEntry) {
        if let Err(e) = self.append(entry) {
            tracing::error!(
                "Failed to append activation log ({} {} for key {}): {}",
                entry.action.as_ref(),
                entry.result.as_ref(),
                entry.license_key,
                e
            );
        }
    }

    pub fn query(&self, query: &ActivationLogQuery) -> Result<(Vec<ActivationLogEntry>, i64)> {
        let conn = self.pool.get()?;
        queries::query_activation_logs(&conn, query)
    }
}
