use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{rollback::RollbackLog, state::AppState};

/// Install a fresh [`RollbackLog`] for the request and unwind it when the
/// handler answers with an error status. Successful requests only clear the
/// staged upload files.
pub async fn rollback_on_failure(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let log = RollbackLog::new();
    request.extensions_mut().insert(log.clone());

    let response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        if !log.is_empty() {
            let pending = log.len();
            let failed = log.unwind(&*state.orm, state.assets.as_ref()).await;
            tracing::info!(%status, pending, failed, "request rolled back");
        }
    } else {
        let failed = log.settle().await;
        if failed > 0 {
            tracing::warn!(%status, failed, "staged uploads not cleaned up");
        }
    }

    response
}
