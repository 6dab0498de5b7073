//! Credit ledger: an append-only transaction log per owner plus a
//! materialized balance that must always equal the log's sum.
//!
//! Every balance change runs inside a `BEGIN IMMEDIATE` transaction, which
//! takes SQLite's write lock up front. Two debits for the same owner can
//! therefore never both read the same stale balance. The balance UPDATE also
//! carries its own `balance + delta >= 0` guard and the schema a
//! `CHECK (balance >= 0)`.
//!
//! The `*_in_tx` functions operate on a caller-owned transaction so the
//! activation path can debit credits and mutate a license in one commit.

use rusqlite::{Connection, TransactionBehavior};

use crate::db::{DbPool, queries};
use crate::error::{AppError, DenialReason, Result};
use crate::models::{BalanceReconciliation, CreditTransaction, TransactionMetadata, TransactionType};

#[derive(Clone)]
pub struct CreditLedger {
    db: DbPool,
}

impl CreditLedger {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Add credits. `transaction_type` is the caller's intent (purchase, bonus, ...)
    /// and may not be `Usage`.
    pub fn credit(
        &self,
        owner_id: &str,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
        metadata: Option<&TransactionMetadata>,
    ) -> Result<CreditTransaction> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let txn = credit_in_tx(&tx, owner_id, amount, transaction_type, description, metadata)?;
        tx.commit()?;

        tracing::info!(
            "Credited {} to {} ({}), balance now {}",
            amount,
            owner_id,
            transaction_type.as_ref(),
            txn.balance_after
        );
        Ok(txn)
    }

    /// Remove credits, recorded as a negative `Usage` transaction.
    ///
    /// Fails with `InsufficientCredits` without writing anything when the
    /// balance can't cover `amount`.
    pub fn debit(
        &self,
        owner_id: &str,
        amount: i64,
        description: &str,
        metadata: Option<&TransactionMetadata>,
    ) -> Result<CreditTransaction> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let txn = debit_in_tx(&tx, owner_id, amount, description, metadata)?;
        tx.commit()?;

        tracing::info!(
            "Debited {} from {}, balance now {}",
            amount,
            owner_id,
            txn.balance_after
        );
        Ok(txn)
    }

    pub fn get_balance(&self, owner_id: &str) -> Result<i64> {
        let conn = self.db.get()?;
        queries::get_balance(&conn, owner_id)
    }

    /// Newest first, with the owner's total transaction count.
    pub fn list_transactions(
        &self,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CreditTransaction>, i64)> {
        let conn = self.db.get()?;
        queries::list_credit_transactions_paginated(&conn, owner_id, limit, offset)
    }

    /// Compare the stored balance with the sum of the owner's ledger rows.
    ///
    /// Both reads happen in one transaction so a concurrent write can't make
    /// a consistent ledger look inconsistent.
    pub fn reconcile(&self, owner_id: &str) -> Result<BalanceReconciliation> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let stored_balance = queries::get_balance(&tx, owner_id)?;
        let (ledger_sum, transaction_count) = queries::sum_credit_transactions(&tx, owner_id)?;
        tx.commit()?;

        let consistent = stored_balance == ledger_sum;
        if !consistent {
            tracing::error!(
                "Ledger out of balance for {}: stored {} vs ledger sum {} over {} transactions",
                owner_id,
                stored_balance,
                ledger_sum,
                transaction_count
            );
        }

        Ok(BalanceReconciliation {
            owner_id: owner_id.to_string(),
            stored_balance,
            ledger_sum,
            transaction_count,
            consistent,
        })
    }
}

pub fn credit_in_tx(
    conn: &Connection,
    owner_id: &str,
    amount: i64,
    transaction_type: TransactionType,
    description: &str,
    metadata: Option<&TransactionMetadata>,
) -> Result<CreditTransaction> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount(amount));
    }
    if !transaction_type.is_credit() {
        return Err(AppError::BadRequest(
            "USAGE transactions are written by debits only".into(),
        ));
    }
    check_metadata(transaction_type, metadata)?;
    post_in_tx(conn, owner_id, amount, transaction_type, description, metadata)
}

pub fn debit_in_tx(
    conn: &Connection,
    owner_id: &str,
    amount: i64,
    description: &str,
    metadata: Option<&TransactionMetadata>,
) -> Result<CreditTransaction> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount(amount));
    }
    check_metadata(TransactionType::Usage, metadata)?;
    post_in_tx(
        conn,
        owner_id,
        -amount,
        TransactionType::Usage,
        description,
        metadata,
    )
}

fn check_metadata(
    transaction_type: TransactionType,
    metadata: Option<&TransactionMetadata>,
) -> Result<()> {
    match metadata {
        Some(metadata) if !metadata.fits(transaction_type) => Err(AppError::BadRequest(format!(
            "metadata does not match a {} transaction",
            transaction_type.as_ref()
        ))),
        _ => Ok(()),
    }
}

/// Apply a signed amount and append its ledger row. The caller owns the
/// transaction; on error it must be rolled back (dropping it does that).
fn post_in_tx(
    conn: &Connection,
    owner_id: &str,
    signed_amount: i64,
    transaction_type: TransactionType,
    description: &str,
    metadata: Option<&TransactionMetadata>,
) -> Result<CreditTransaction> {
    queries::ensure_credit_account(conn, owner_id)?;

    // SQLite silently widens an overflowing sum to REAL
    let current = queries::get_balance(conn, owner_id)?;
    if current.checked_add(signed_amount).is_none() {
        return Err(AppError::InvalidAmount(signed_amount));
    }

    let balance_after = match queries::apply_balance_delta(conn, owner_id, signed_amount)? {
        Some(balance) => balance,
        None if signed_amount < 0 => {
            return Err(AppError::Denied(DenialReason::InsufficientCredits));
        }
        None => {
            return Err(AppError::InvariantViolation(format!(
                "credit of {} to {} rejected by the non-negative balance guard",
                signed_amount, owner_id
            )));
        }
    };

    if balance_after < 0 {
        tracing::error!(
            "Negative balance observed for {} after applying {}: {}",
            owner_id,
            signed_amount,
            balance_after
        );
        return Err(AppError::InvariantViolation(format!(
            "balance for {} would be {}",
            owner_id, balance_after
        )));
    }

    queries::create_credit_transaction(
        conn,
        owner_id,
        signed_amount,
        transaction_type,
        description,
        metadata,
        balance_after,
    )
}
