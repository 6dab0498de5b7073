//! Row mapping for the tables this service owns.
//!
//! Each `*_COLS` constant lists columns in the exact order the matching
//! [`FromRow`] impl reads them, so `SELECT {COLS} FROM ...` and the impl
//! stay in lockstep.

use rusqlite::{Connection, Params, Row, types::Type};

use crate::error::Result;
use crate::models::*;

pub const LICENSE_COLS: &str = "id, key, owner_id, license_type, device_hwid, device_ip, device_mac, usage_count, usage_limit, expires_at, active, last_used_at, created_at";

pub const CREDIT_ACCOUNT_COLS: &str = "owner_id, balance, created_at, updated_at";

pub const CREDIT_TRANSACTION_COLS: &str =
    "id, owner_id, amount, transaction_type, description, metadata, balance_after, created_at";

pub const ACTIVATION_LOG_COLS: &str = "id, license_id, license_key, owner_id, hwid, ip, action, result, reason, credit_used, timestamp";

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Parse a strum-backed enum column, reporting bad values as a conversion failure
/// instead of panicking.
fn parse_enum<T: std::str::FromStr>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unexpected enum value '{}'", raw).into(),
        )
    })
}

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let hwid: Option<String> = row.get(4)?;
        let device_binding = hwid.map(|hwid| -> rusqlite::Result<DeviceBinding> {
            Ok(DeviceBinding {
                hwid,
                ip: row.get(5)?,
                mac: row.get(6)?,
            })
        });

        Ok(License {
            id: row.get(0)?,
            key: row.get(1)?,
            owner_id: row.get(2)?,
            license_type: parse_enum(row, 3)?,
            device_binding: device_binding.transpose()?,
            usage_count: row.get(7)?,
            usage_limit: row.get(8)?,
            expires_at: row.get(9)?,
            active: row.get::<_, i32>(10)? != 0,
            last_used_at: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

impl FromRow for CreditAccount {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CreditAccount {
            owner_id: row.get(0)?,
            balance: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

impl FromRow for CreditTransaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let metadata: Option<String> = row.get(5)?;
        let metadata = metadata
            .map(|raw| {
                serde_json::from_str::<TransactionMetadata>(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })
            })
            .transpose()?;

        Ok(CreditTransaction {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            amount: row.get(2)?,
            transaction_type: parse_enum(row, 3)?,
            description: row.get(4)?,
            metadata,
            balance_after: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl FromRow for ActivationLogEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ActivationLogEntry {
            id: row.get(0)?,
            license_id: row.get(1)?,
            license_key: row.get(2)?,
            owner_id: row.get(3)?,
            hwid: row.get(4)?,
            ip: row.get(5)?,
            action: parse_enum(row, 6)?,
            result: parse_enum(row, 7)?,
            reason: row.get(8)?,
            credit_used: row.get(9)?,
            timestamp: row.get(10)?,
        })
    }
}

pub fn query_one<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(T::from_row(row)?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
