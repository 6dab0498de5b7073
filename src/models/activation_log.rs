use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ActivationAction {
    Activate,
    Verify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ActivationOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationLogEntry {
    pub id: String,
    /// None when the presented key matched no license
    pub license_id: Option<String>,
    pub license_key: String,
    pub owner_id: Option<String>,
    pub hwid: String,
    pub ip: Option<String>,
    pub action: ActivationAction,
    pub result: ActivationOutcome,
    /// Reason code, set on failures
    pub reason: Option<String>,
    pub credit_used: i64,
    pub timestamp: i64,
}

/// An attempt to be recorded; id and timestamp are assigned on append.
#[derive(Debug, Clone)]
pub struct NewActivationLogEntry {
    pub license_id: Option<String>,
    pub license_key: String,
    pub owner_id: Option<String>,
    pub hwid: String,
    pub ip: Option<String>,
    pub action: ActivationAction,
    pub result: ActivationOutcome,
    pub reason: Option<String>,
    pub credit_used: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivationLogQuery {
    pub license_id: Option<String>,
    pub owner_id: Option<String>,
    pub action: Option<ActivationAction>,
    pub result: Option<ActivationOutcome>,
    pub from_timestamp: Option<i64>,
    pub to_timestamp: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ActivationLogQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 1000)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
