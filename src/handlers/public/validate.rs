use axum::{extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};
use crate::handlers::blocking;
use crate::models::{DeviceFingerprint, License};
use crate::util::extract_client_ip;

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub key: String,
    pub hwid: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    /// Activations left before the usage limit; absent for unlimited licenses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_uses: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

/// GET /licenses/validate?key=...&hwid=...
/// Read-only status check. Denials come back as `valid: false` with the
/// reason code; only infrastructure problems are HTTP errors.
pub async fn validate_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ValidateQuery>,
) -> Result<Json<ValidateResponse>> {
    let device = DeviceFingerprint {
        hwid: query.hwid,
        ip: extract_client_ip(&headers),
        mac: None,
    };

    let service = state.activations.clone();
    let key = query.key;
    let outcome = blocking(move || service.verify(&key, &device)).await;

    match outcome {
        Ok(license) => Ok(Json(ValidateResponse {
            valid: true,
            reason: None,
            message: None,
            remaining_uses: license.remaining_uses(),
            license: Some(license),
        })),
        Err(AppError::Denied(reason)) => Ok(Json(ValidateResponse {
            valid: false,
            reason: Some(reason.code()),
            message: Some(reason.message()),
            remaining_uses: None,
            license: None,
        })),
        Err(e) => Err(e),
    }
}
