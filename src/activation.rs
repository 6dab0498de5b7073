//! License lifecycle and the activation/verification flows.
//!
//! An activation is one `BEGIN IMMEDIATE` transaction on the main database:
//! look up, validate, bump usage and bind the device, debit credits, commit.
//! Any failure before the commit drops the transaction, which rolls back the
//! usage increment together with the debit. The activation log entry is
//! written afterwards to the audit database, whatever the outcome.

use std::time::Instant;

use rusqlite::TransactionBehavior;
use serde::Serialize;

use crate::audit::ActivationLog;
use crate::db::{DbPool, queries};
use crate::error::{AppError, DenialReason, Result};
use crate::ledger;
use crate::models::{
    ActivationAction, ActivationOutcome, CreateLicense, DeviceBinding, DeviceFingerprint, License,
    NewActivationLogEntry, TransactionMetadata,
};
use crate::util::{generate_license_key, is_valid_key_format, now};
use crate::validator;

/// Attempts at finding an unused key before giving up.
const KEY_GENERATION_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct ActivationRequest {
    pub key: String,
    pub device: DeviceFingerprint,
    /// Credits to debit from the license owner. 0 = free activation.
    pub credit_cost: i64,
    pub description: Option<String>,
    /// Give up if the transaction can't commit by this instant.
    pub deadline: Option<Instant>,
}

impl ActivationRequest {
    pub fn new(key: impl Into<String>, device: DeviceFingerprint) -> Self {
        Self {
            key: key.into(),
            device,
            credit_cost: 0,
            description: None,
            deadline: None,
        }
    }

    pub fn credit_cost(mut self, cost: i64) -> Self {
        self.credit_cost = cost;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivationResult {
    /// License state as committed by this activation
    pub license: License,
    pub credits_used: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

#[derive(Clone)]
pub struct ActivationService {
    db: DbPool,
    log: ActivationLog,
    key_prefix: String,
}

impl ActivationService {
    pub fn new(db: DbPool, log: ActivationLog, key_prefix: String) -> Self {
        Self {
            db,
            log,
            key_prefix,
        }
    }

    // ============ Lifecycle ============

    pub fn create_license(&self, input: &CreateLicense) -> Result<License> {
        if input.owner_id.trim().is_empty() {
            return Err(AppError::BadRequest("owner_id is required".into()));
        }
        if let Some(limit) = input.usage_limit
            && limit < 0
        {
            return Err(AppError::BadRequest(
                "usage_limit must be 0 (unlimited) or positive".into(),
            ));
        }
        let usage_limit = input
            .usage_limit
            .unwrap_or_else(|| input.license_type.default_usage_limit());

        let conn = self.db.get()?;

        let mut key = None;
        for _ in 0..KEY_GENERATION_ATTEMPTS {
            let candidate = generate_license_key(&self.key_prefix);
            if queries::get_license_by_key(&conn, &candidate)?.is_none() {
                key = Some(candidate);
                break;
            }
        }
        let key = key.ok_or_else(|| AppError::Internal("Could not generate a unique license key".into()))?;

        let license = queries::create_license(&conn, &key, input, usage_limit)?;

        tracing::info!(
            "Created {} license {} for owner {} (usage limit: {})",
            license.license_type.as_ref(),
            license.id,
            license.owner_id,
            license.usage_limit
        );

        Ok(license)
    }

    pub fn get_license(&self, key: &str) -> Result<License> {
        self.find_license(key)?
            .ok_or(AppError::Denied(DenialReason::LicenseNotFound))
    }

    pub fn list_licenses_for_owner(
        &self,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<License>, i64)> {
        let conn = self.db.get()?;
        queries::list_licenses_for_owner_paginated(&conn, owner_id, limit, offset)
    }

    /// Hard-disable a license. Deactivation is permanent; calling it again is a no-op.
    pub fn deactivate_license(&self, key: &str) -> Result<License> {
        let license = self.get_license(key)?;
        if !license.active {
            return Ok(license);
        }

        let conn = self.db.get()?;
        queries::deactivate_license(&conn, &license.id)?;

        tracing::info!("Deactivated license {} (owner {})", license.id, license.owner_id);

        Ok(License {
            active: false,
            ..license
        })
    }

    // ============ Verification ============

    /// Read-only validity check. Never changes license or credit state.
    pub fn verify(&self, key: &str, device: &DeviceFingerprint) -> Result<License> {
        let license = match self.find_license(key) {
            Ok(license) => license,
            Err(e) => {
                self.log.record(&log_entry(
                    ActivationAction::Verify,
                    key,
                    None,
                    device,
                    Err(&e),
                    0,
                ));
                return Err(e);
            }
        };

        let outcome = validator::validate(license.as_ref(), device, now())
            .into_result()
            .map_err(AppError::Denied);

        self.log.record(&log_entry(
            ActivationAction::Verify,
            key,
            license.as_ref(),
            device,
            outcome.as_ref().map(|_| ()),
            0,
        ));

        if let Err(e) = outcome {
            tracing::info!("Verify denied for key {}: {}", key, e);
            return Err(e);
        }
        license.ok_or(AppError::Denied(DenialReason::LicenseNotFound))
    }

    // ============ Activation ============

    pub fn activate(&self, request: &ActivationRequest) -> Result<ActivationResult> {
        let mut seen = None;
        let result = self.try_activate(request, &mut seen);

        let credit_used = match &result {
            Ok(r) => r.credits_used,
            Err(_) => 0,
        };
        self.log.record(&log_entry(
            ActivationAction::Activate,
            &request.key,
            seen.as_ref(),
            &request.device,
            result.as_ref().map(|_| ()),
            credit_used,
        ));

        match &result {
            Ok(r) => tracing::info!(
                "Activated license {} on {} (usage {}/{}, credits used: {})",
                r.license.id,
                request.device.hwid,
                r.license.usage_count,
                r.license.usage_limit,
                r.credits_used
            ),
            Err(e @ AppError::Denied(_)) => {
                tracing::info!("Activation denied for key {}: {}", request.key, e)
            }
            Err(e) => tracing::warn!("Activation failed for key {}: {}", request.key, e),
        }

        result
    }

    /// Everything up to and including the commit. `seen` receives the license
    /// as read, so the caller can attribute the log entry even on failure.
    fn try_activate(
        &self,
        request: &ActivationRequest,
        seen: &mut Option<License>,
    ) -> Result<ActivationResult> {
        check_deadline(request.deadline)?;

        if !is_valid_key_format(&request.key) {
            return Err(AppError::Denied(DenialReason::LicenseNotFound));
        }

        let now = now();
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(license) = queries::get_license_by_key(&tx, &request.key)? else {
            return Err(AppError::Denied(DenialReason::LicenseNotFound));
        };
        *seen = Some(license.clone());

        if request.credit_cost < 0 {
            return Err(AppError::InvalidAmount(request.credit_cost));
        }

        validator::validate(Some(&license), &request.device, now)
            .into_result()
            .map_err(AppError::Denied)?;

        let binding = DeviceBinding::for_activation(license.device_binding.as_ref(), &request.device);
        if !queries::record_license_activation(&tx, &license, &binding, now)? {
            return Err(AppError::Conflict(format!(
                "license {} changed during activation",
                license.id
            )));
        }

        let transaction = if request.credit_cost > 0 {
            let description = request
                .description
                .clone()
                .unwrap_or_else(|| format!("Activation of {}", license.key));
            let metadata = TransactionMetadata::Usage {
                license_id: license.id.clone(),
                license_key: license.key.clone(),
                hwid: binding.hwid.clone(),
            };
            Some(ledger::debit_in_tx(
                &tx,
                &license.owner_id,
                request.credit_cost,
                &description,
                Some(&metadata),
            )?)
        } else {
            None
        };

        check_deadline(request.deadline)?;
        tx.commit()?;

        Ok(ActivationResult {
            license: License {
                usage_count: license.usage_count + 1,
                last_used_at: Some(now),
                device_binding: Some(binding),
                ..license
            },
            credits_used: request.credit_cost,
            transaction_id: transaction.map(|t| t.id),
        })
    }

    /// Look up by key. Malformed keys are treated as unknown without a query.
    fn find_license(&self, key: &str) -> Result<Option<License>> {
        if !is_valid_key_format(key) {
            tracing::debug!("Rejected malformed license key");
            return Ok(None);
        }
        let conn = self.db.get()?;
        queries::get_license_by_key(&conn, key)
    }
}

fn check_deadline(deadline: Option<Instant>) -> Result<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(AppError::Timeout),
        _ => Ok(()),
    }
}

/// Reason code recorded in the activation log for a failed attempt.
fn failure_reason(error: &AppError) -> &'static str {
    match error {
        AppError::Denied(reason) => reason.code(),
        AppError::Conflict(_) => "CONFLICT",
        AppError::Timeout => "TIMEOUT",
        AppError::InvariantViolation(_) => "INVARIANT_VIOLATION",
        AppError::InvalidAmount(_) => "INVALID_AMOUNT",
        _ => "INFRASTRUCTURE",
    }
}

fn log_entry(
    action: ActivationAction,
    key: &str,
    license: Option<&License>,
    device: &DeviceFingerprint,
    outcome: std::result::Result<(), &AppError>,
    credit_used: i64,
) -> NewActivationLogEntry {
    let (result, reason) = match outcome {
        Ok(()) => (ActivationOutcome::Success, None),
        Err(e) => (ActivationOutcome::Failure, Some(failure_reason(e).to_string())),
    };

    NewActivationLogEntry {
        license_id: license.map(|l| l.id.clone()),
        license_key: key.to_string(),
        owner_id: license.map(|l| l.owner_id.clone()),
        hwid: device.hwid.clone(),
        ip: device.ip.clone(),
        action,
        result,
        reason,
        credit_used,
    }
}
