use axum::extract::State;
use serde::Serialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path, Query};
use crate::handlers::blocking;
use crate::models::{AddCredits, BalanceReconciliation, CreditTransaction};
use crate::pagination::{Paginated, PaginationQuery};

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub owner_id: String,
    pub balance: i64,
}

/// GET /admin/owners/{owner_id}/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<BalanceResponse>> {
    let ledger = state.ledger.clone();
    let lookup_owner = owner_id.clone();
    let balance = blocking(move || ledger.get_balance(&lookup_owner)).await?;
    Ok(Json(BalanceResponse { owner_id, balance }))
}

/// GET /admin/owners/{owner_id}/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Paginated<CreditTransaction>>> {
    let limit = pagination.limit();
    let offset = pagination.offset();
    let ledger = state.ledger.clone();
    let (items, total) =
        blocking(move || ledger.list_transactions(&owner_id, limit, offset)).await?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

/// POST /admin/owners/{owner_id}/credits
/// Entry point for upstream purchase events and manual grants.
pub async fn add_credits(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Json(body): Json<AddCredits>,
) -> Result<Json<CreditTransaction>> {
    let ledger = state.ledger.clone();
    let transaction = blocking(move || {
        let description = body
            .description
            .unwrap_or_else(|| format!("{} credit", body.transaction_type.as_ref()));
        ledger.credit(
            &owner_id,
            body.amount,
            body.transaction_type,
            &description,
            body.metadata.as_ref(),
        )
    })
    .await?;
    Ok(Json(transaction))
}

/// GET /admin/owners/{owner_id}/reconcile
pub async fn reconcile_balance(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<BalanceReconciliation>> {
    let ledger = state.ledger.clone();
    let report = blocking(move || ledger.reconcile(&owner_id)).await?;
    Ok(Json(report))
}
