//! Read-only view of the scheduler's pending tasks.

use axum::Json;
use axum::extract::State;

use super::{AppState, ClientFactory};
use crate::scheduler::PendingSnapshot;

/// Lists pending delayed actions, ordered by key.
///
/// ```text
/// GET /api/v1/pending HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// [{"repo":{"owner":"octo","repo":"widgets"},"target":12,"action":"close","delay_secs":604800,"remaining_secs":604211}]
/// ```
pub async fn pending_handler<F: ClientFactory>(
    State(app_state): State<AppState<F>>,
) -> Json<Vec<PendingSnapshot>> {
    Json(app_state.scheduler().pending())
}
