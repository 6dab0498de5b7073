use axum::extract::State;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::handlers::blocking;
use crate::models::{ActivationLogEntry, ActivationLogQuery};
use crate::pagination::Paginated;

/// GET /admin/activation-logs
pub async fn query_activation_logs(
    State(state): State<AppState>,
    Query(query): Query<ActivationLogQuery>,
) -> Result<Json<Paginated<ActivationLogEntry>>> {
    let limit = query.limit();
    let offset = query.offset();
    let log = state.activation_log.clone();
    let (entries, total) = blocking(move || log.query(&query)).await?;
    Ok(Json(Paginated::new(entries, total, limit, offset)))
}
