use rusqlite::{Connection, OptionalExtension, params, types::Value};

use crate::error::Result;
use crate::models::*;
use crate::util::{gen_id, now};

use super::from_row::{
    ACTIVATION_LOG_COLS, CREDIT_ACCOUNT_COLS, CREDIT_TRANSACTION_COLS, LICENSE_COLS, query_all,
    query_one,
};

// ============ Licenses ============

/// Insert a new, unbound, active license. `usage_limit` is already resolved
/// against the type's default by the caller.
pub fn create_license(
    conn: &Connection,
    key: &str,
    input: &CreateLicense,
    usage_limit: i64,
) -> Result<License> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO licenses (id, key, owner_id, license_type, usage_count, usage_limit, expires_at, active, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, 1, ?7)",
        params![
            &id,
            key,
            &input.owner_id,
            input.license_type.as_ref(),
            usage_limit,
            input.expires_at,
            now
        ],
    )?;

    Ok(License {
        id,
        key: key.to_string(),
        owner_id: input.owner_id.clone(),
        license_type: input.license_type,
        device_binding: None,
        usage_count: 0,
        usage_limit,
        expires_at: input.expires_at,
        active: true,
        last_used_at: None,
        created_at: now,
    })
}

pub fn get_license_by_key(conn: &Connection, key: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE key = ?1", LICENSE_COLS),
        params![key],
    )
}

pub fn get_license_by_id(conn: &Connection, id: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE id = ?1", LICENSE_COLS),
        params![id],
    )
}

pub fn list_licenses_for_owner_paginated(
    conn: &Connection,
    owner_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<License>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM licenses WHERE owner_id = ?1",
        params![owner_id],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE owner_id = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            LICENSE_COLS
        ),
        params![owner_id, limit, offset],
    )?;
    Ok((items, total))
}

/// Record one successful activation: bump `usage_count`, stamp `last_used_at`,
/// and persist the device binding.
///
/// The UPDATE is a compare-and-swap against the snapshot the caller validated:
/// it only applies if `usage_count` is unchanged and the license is still
/// active, under its limit, and unbound or bound to the same hwid. Returns
/// `false` when the guard missed, i.e. someone else mutated the row first.
pub fn record_license_activation(
    conn: &Connection,
    license: &License,
    binding: &DeviceBinding,
    used_at: i64,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE licenses
         SET usage_count = usage_count + 1,
             last_used_at = ?1,
             device_hwid = ?2,
             device_ip = ?3,
             device_mac = ?4
         WHERE id = ?5
           AND usage_count = ?6
           AND active = 1
           AND (usage_limit = 0 OR usage_count < usage_limit)
           AND (device_hwid IS NULL OR device_hwid = ?2)",
        params![
            used_at,
            &binding.hwid,
            &binding.ip,
            &binding.mac,
            &license.id,
            license.usage_count
        ],
    )?;
    Ok(updated > 0)
}

/// Set `active = 0`. Returns whether a row matched.
pub fn deactivate_license(conn: &Connection, id: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE licenses SET active = 0 WHERE id = ?1",
        params![id],
    )?;
    Ok(updated > 0)
}

// ============ Credit Accounts ============

/// Create the owner's account with a zero balance if it doesn't exist yet.
pub fn ensure_credit_account(conn: &Connection, owner_id: &str) -> Result<()> {
    let now = now();
    conn.execute(
        "INSERT OR IGNORE INTO credit_accounts (owner_id, balance, created_at, updated_at)
         VALUES (?1, 0, ?2, ?2)",
        params![owner_id, now],
    )?;
    Ok(())
}

pub fn get_credit_account(conn: &Connection, owner_id: &str) -> Result<Option<CreditAccount>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM credit_accounts WHERE owner_id = ?1",
            CREDIT_ACCOUNT_COLS
        ),
        params![owner_id],
    )
}

/// Stored balance, 0 for owners that have never transacted.
pub fn get_balance(conn: &Connection, owner_id: &str) -> Result<i64> {
    let balance: Option<i64> = conn
        .query_row(
            "SELECT balance FROM credit_accounts WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(balance.unwrap_or(0))
}

/// Apply `delta` to the stored balance unless that would take it below zero.
///
/// Returns the new balance, or `None` if the guard rejected the change.
pub fn apply_balance_delta(conn: &Connection, owner_id: &str, delta: i64) -> Result<Option<i64>> {
    let balance = conn
        .query_row(
            "UPDATE credit_accounts
             SET balance = balance + ?1, updated_at = ?2
             WHERE owner_id = ?3 AND balance + ?1 >= 0
             RETURNING balance",
            params![delta, now(), owner_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(balance)
}

// ============ Credit Transactions ============

pub fn create_credit_transaction(
    conn: &Connection,
    owner_id: &str,
    amount: i64,
    transaction_type: TransactionType,
    description: &str,
    metadata: Option<&TransactionMetadata>,
    balance_after: i64,
) -> Result<CreditTransaction> {
    let id = gen_id();
    let now = now();
    let metadata_json = metadata.map(serde_json::to_string).transpose()?;

    conn.execute(
        "INSERT INTO credit_transactions (id, owner_id, amount, transaction_type, description, metadata, balance_after, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &id,
            owner_id,
            amount,
            transaction_type.as_ref(),
            description,
            &metadata_json,
            balance_after,
            now
        ],
    )?;

    Ok(CreditTransaction {
        id,
        owner_id: owner_id.to_string(),
        amount,
        transaction_type,
        description: description.to_string(),
        metadata: metadata.cloned(),
        balance_after,
        created_at: now,
    })
}

/// Newest first. Ties on `created_at` are broken by insertion order.
pub fn list_credit_transactions_paginated(
    conn: &Connection,
    owner_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<CreditTransaction>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM credit_transactions WHERE owner_id = ?1",
        params![owner_id],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM credit_transactions WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            CREDIT_TRANSACTION_COLS
        ),
        params![owner_id, limit, offset],
    )?;
    Ok((items, total))
}

/// Sum and count of every ledger row for an owner.
pub fn sum_credit_transactions(conn: &Connection, owner_id: &str) -> Result<(i64, i64)> {
    let totals = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0), COUNT(*) FROM credit_transactions WHERE owner_id = ?1",
        params![owner_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(totals)
}

// ============ Activation Logs ============

pub fn create_activation_log(
    conn: &Connection,
    entry: &NewActivationLogEntry,
) -> Result<ActivationLogEntry> {
    let id = gen_id();
    let timestamp = now();

    conn.execute(
        "INSERT INTO activation_logs (id, license_id, license_key, owner_id, hwid, ip, action, result, reason, credit_used, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &id,
            &entry.license_id,
            &entry.license_key,
            &entry.owner_id,
            &entry.hwid,
            &entry.ip,
            entry.action.as_ref(),
            entry.result.as_ref(),
            &entry.reason,
            entry.credit_used,
            timestamp
        ],
    )?;

    Ok(activation_log_from_new(id, timestamp, entry))
}

/// Materialize an entry without touching the database (used when logging is disabled).
pub fn activation_log_from_new(
    id: String,
    timestamp: i64,
    entry: &NewActivationLogEntry,
) -> ActivationLogEntry {
    ActivationLogEntry {
        id,
        license_id: entry.license_id.clone(),
        license_key: entry.license_key.clone(),
        owner_id: entry.owner_id.clone(),
        hwid: entry.hwid.clone(),
        ip: entry.ip.clone(),
        action: entry.action,
        result: entry.result,
        reason: entry.reason.clone(),
        credit_used: entry.credit_used,
        timestamp,
    }
}

pub fn query_activation_logs(
    conn: &Connection,
    query: &ActivationLogQuery,
) -> Result<(Vec<ActivationLogEntry>, i64)> {
    let mut where_clause = String::from("WHERE 1=1");
    let mut filter_params: Vec<Value> = Vec::new();

    if let Some(ref license_id) = query.license_id {
        where_clause.push_str(" AND license_id = ?");
        filter_params.push(license_id.clone().into());
    }
    if let Some(ref owner_id) = query.owner_id {
        where_clause.push_str(" AND owner_id = ?");
        filter_params.push(owner_id.clone().into());
    }
    if let Some(action) = query.action {
        where_clause.push_str(" AND action = ?");
        filter_params.push(action.as_ref().to_string().into());
    }
    if let Some(result) = query.result {
        where_clause.push_str(" AND result = ?");
        filter_params.push(result.as_ref().to_string().into());
    }
    if let Some(from_ts) = query.from_timestamp {
        where_clause.push_str(" AND timestamp >= ?");
        filter_params.push(from_ts.into());
    }
    if let Some(to_ts) = query.to_timestamp {
        where_clause.push_str(" AND timestamp <= ?");
        filter_params.push(to_ts.into());
    }

    let count_sql = format!("SELECT COUNT(*) FROM activation_logs {}", where_clause);
    let total: i64 = conn.query_row(
        &count_sql,
        rusqlite::params_from_iter(filter_params.iter()),
        |row| row.get(0),
    )?;

    let select_sql = format!(
        "SELECT {} FROM activation_logs {} ORDER BY timestamp DESC, rowid DESC LIMIT ? OFFSET ?",
        ACTIVATION_LOG_COLS, where_clause
    );
    let mut select_params = filter_params;
    select_params.push(query.limit().into());
    select_params.push(query.offset().into());

    let logs = query_all(
        conn,
        &select_sql,
        rusqlite::params_from_iter(select_params.iter()),
    )?;

    Ok((logs, total))
}
