use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::DeviceBinding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum LicenseType {
    Trial,
    Standard,
    Pro,
}

impl LicenseType {
    /// Usage limit applied when the creator doesn't specify one (0 = unlimited).
    pub fn default_usage_limit(&self) -> i64 {
        match self {
            LicenseType::Trial => 10,
            LicenseType::Standard => 100,
            LicenseType::Pro => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub key: String,
    /// Owning account. Opaque to this service.
    pub owner_id: String,
    pub license_type: LicenseType,
    /// Absent until the first successful activation
    pub device_binding: Option<DeviceBinding>,
    pub usage_count: i64,
    /// 0 = unlimited
    pub usage_limit: i64,
    /// None = never expires
    pub expires_at: Option<i64>,
    pub active: bool,
    pub last_used_at: Option<i64>,
    pub created_at: i64,
}

impl License {
    pub fn is_bound(&self) -> bool {
        self.device_binding.is_some()
    }

    /// True once no further activation is possible because of the usage limit.
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit > 0 && self.usage_count >= self.usage_limit
    }

    pub fn remaining_uses(&self) -> Option<i64> {
        if self.usage_limit == 0 {
            None
        } else {
            Some((self.usage_limit - self.usage_count).max(0))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLicense {
    pub owner_id: String,
    pub license_type: LicenseType,
    /// Overrides the type's default limit
    #[serde(default)]
    pub usage_limit: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}
