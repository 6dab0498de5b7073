use std::str::FromStr;

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::handlers::blocking;
use crate::models::{CreateLicense, License, LicenseType};
use crate::pagination::{Paginated, PaginationQuery};

/// Request body for creating a license (purchase flow or admin grant)
#[derive(Debug, Deserialize)]
pub struct CreateLicenseBody {
    pub owner_id: String,
    /// TRIAL, STANDARD or PRO
    pub license_type: String,
    /// Overrides the type's default (0 = unlimited)
    #[serde(default)]
    pub usage_limit: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DeactivateLicenseResponse {
    pub deactivated: bool,
    pub license: License,
}

/// POST /admin/licenses
pub async fn create_license(
    State(state): State<AppState>,
    Json(body): Json<CreateLicenseBody>,
) -> Result<Json<License>> {
    let license_type = LicenseType::from_str(&body.license_type)
        .map_err(|_| AppError::InvalidLicenseType(body.license_type.clone()))?;

    let input = CreateLicense {
        owner_id: body.owner_id,
        license_type,
        usage_limit: body.usage_limit,
        expires_at: body.expires_at,
    };

    let service = state.activations.clone();
    let license = blocking(move || service.create_license(&input)).await?;
    Ok(Json(license))
}

/// GET /admin/licenses/{key}
pub async fn get_license(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<License>> {
    let service = state.activations.clone();
    let license = blocking(move || service.get_license(&key)).await?;
    Ok(Json(license))
}

/// POST /admin/licenses/{key}/deactivate
pub async fn deactivate_license(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeactivateLicenseResponse>> {
    let service = state.activations.clone();
    let license = blocking(move || service.deactivate_license(&key)).await?;
    Ok(Json(DeactivateLicenseResponse {
        deactivated: true,
        license,
    }))
}

/// GET /admin/owners/{owner_id}/licenses
pub async fn list_owner_licenses(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<License>>> {
    let limit = pagination.limit();
    let offset = pagination.offset();
    let service = state.activations.clone();
    let (licenses, total) =
        blocking(move || service.list_licenses_for_owner(&owner_id, limit, offset)).await?;
    Ok(Json(Paginated::new(licenses, total, limit, offset)))
}
