pub mod admin;
pub mod public;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::db::AppState;
use crate::error::Result;

/// Full application router: public client routes plus bearer-protected admin routes.
pub fn router(state: AppState) -> Router {
    public::router()
        .merge(admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run store work off the async executor. SQLite calls block, and writers can
/// wait on each other for the busy timeout.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
