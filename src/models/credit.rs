use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum TransactionType {
    Purchase,
    Usage,
    Refund,
    Bonus,
    Referral,
    Adjustment,
}

impl TransactionType {
    /// Types a caller may use when adding credits. `Usage` is written only by debits.
    pub fn is_credit(&self) -> bool {
        !matches!(self, TransactionType::Usage)
    }
}

/// Structured context attached to a ledger row, one shape per transaction type.
/// `Notes` is the escape hatch for free-form admin annotations and fits any type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionMetadata {
    Purchase {
        #[serde(default)]
        order_id: Option<String>,
        #[serde(default)]
        provider: Option<String>,
    },
    Usage {
        license_id: String,
        license_key: String,
        hwid: String,
    },
    Refund {
        #[serde(default)]
        original_transaction_id: Option<String>,
    },
    Bonus {
        #[serde(default)]
        campaign: Option<String>,
    },
    Referral {
        #[serde(default)]
        referred_owner_id: Option<String>,
    },
    Adjustment {
        #[serde(default)]
        admin_note: Option<String>,
    },
    Notes { notes: BTreeMap<String, String> },
}

impl TransactionMetadata {
    /// Whether this shape may be attached to a transaction of `transaction_type`.
    pub fn fits(&self, transaction_type: TransactionType) -> bool {
        matches!(
            (self, transaction_type),
            (TransactionMetadata::Notes { .. }, _)
                | (TransactionMetadata::Purchase { .. }, TransactionType::Purchase)
                | (TransactionMetadata::Usage { .. }, TransactionType::Usage)
                | (TransactionMetadata::Refund { .. }, TransactionType::Refund)
                | (TransactionMetadata::Bonus { .. }, TransactionType::Bonus)
                | (TransactionMetadata::Referral { .. }, TransactionType::Referral)
                | (TransactionMetadata::Adjustment { .. }, TransactionType::Adjustment)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: String,
    pub owner_id: String,
    /// Positive = credit, negative = debit
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub description: String,
    pub metadata: Option<TransactionMetadata>,
    /// Account balance right after this transaction was applied
    pub balance_after: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAccount {
    pub owner_id: String,
    pub balance: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddCredits {
    pub amount: i64,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<TransactionMetadata>,
}

/// Stored balance vs. the sum of the owner's ledger rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceReconciliation {
    pub owner_id: String,
    pub stored_balance: i64,
    pub ledger_sum: i64,
    pub transaction_count: i64,
    pub consistent: bool,
}
