//! License validity checks shared by the read-only verify path and the
//! mutating activate path. Pure: no I/O, no clock reads.

use crate::error::DenialReason;
use crate::models::{DeviceFingerprint, License};
use crate::util::constant_time_eq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Denied(DenialReason),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn reason(&self) -> Option<DenialReason> {
        match self {
            Verdict::Valid => None,
            Verdict::Denied(reason) => Some(*reason),
        }
    }

    pub fn into_result(self) -> std::result::Result<(), DenialReason> {
        match self {
            Verdict::Valid => Ok(()),
            Verdict::Denied(reason) => Err(reason),
        }
    }
}

/// Evaluate a license against the presented device at time `now`.
///
/// Checks run in a fixed order and stop at the first failure, so a license
/// that is both expired and bound elsewhere always reports `LicenseExpired`:
/// existence, active flag, expiry, usage limit, device binding.
pub fn validate(license: Option<&License>, device: &DeviceFingerprint, now: i64) -> Verdict {
    let Some(license) = license else {
        return Verdict::Denied(DenialReason::LicenseNotFound);
    };

    if !license.active {
        return Verdict::Denied(DenialReason::LicenseInactive);
    }

    if let Some(expires_at) = license.expires_at
        && now >= expires_at
    {
        return Verdict::Denied(DenialReason::LicenseExpired);
    }

    if license.is_exhausted() {
        return Verdict::Denied(DenialReason::UsageLimitReached);
    }

    if let Some(binding) = &license.device_binding
        && !constant_time_eq(&binding.hwid, &device.hwid)
    {
        return Verdict::Denied(DenialReason::DeviceMismatch);
    }

    Verdict::Valid
}
