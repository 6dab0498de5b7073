mod activation_logs;
mod credits;
mod licenses;

pub use activation_logs::*;
pub use credits::*;
pub use licenses::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Licenses
        .route("/admin/licenses", post(create_license))
        .route("/admin/licenses/{key}", get(get_license))
        .route("/admin/licenses/{key}/deactivate", post(deactivate_license))
        .route("/admin/owners/{owner_id}/licenses", get(list_owner_licenses))
        // Credits
        .route("/admin/owners/{owner_id}/balance", get(get_balance))
        .route("/admin/owners/{owner_id}/transactions", get(list_transactions))
        .route("/admin/owners/{owner_id}/credits", post(add_credits))
        .route("/admin/owners/{owner_id}/reconcile", get(reconcile_balance))
        // Audit trail
        .route("/admin/activation-logs", get(query_activation_logs))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
