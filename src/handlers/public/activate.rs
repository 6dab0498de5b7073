use std::time::{Duration, Instant};

use axum::{extract::State, http::HeaderMap};
use serde::Deserialize;

use crate::activation::{ActivationRequest, ActivationResult};
use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::handlers::blocking;
use crate::models::DeviceFingerprint;
use crate::util::extract_client_ip;

#[derive(Debug, Deserialize)]
pub struct ActivateBody {
    pub key: String,
    pub hwid: String,
    /// Falls back to the proxy headers when omitted
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub credit_cost: i64,
    #[serde(default)]
    pub description: Option<String>,
    /// Overrides the server's default activation deadline
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// POST /licenses/activate
/// Consume one use of a license on this device, binding it on first use,
/// and debit `credit_cost` from the owner in the same commit.
pub async fn activate_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ActivateBody>,
) -> Result<Json<ActivationResult>> {
    if body.hwid.trim().is_empty() {
        return Err(AppError::BadRequest("hwid is required".into()));
    }

    let timeout = body
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(state.activation_timeout);

    let device = DeviceFingerprint {
        hwid: body.hwid,
        ip: body.ip.or_else(|| extract_client_ip(&headers)),
        mac: body.mac,
    };

    let mut request = ActivationRequest::new(body.key, device)
        .credit_cost(body.credit_cost)
        .deadline(Instant::now() + timeout);
    if let Some(description) = body.description {
        request = request.description(description);
    }

    let service = state.activations.clone();
    let result = blocking(move || service.activate(&request)).await?;

    Ok(Json(result))
}
