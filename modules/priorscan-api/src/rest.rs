use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use priorscan_common::ScanError;

use crate::AppState;

/// Map a pipeline error onto the HTTP surface. Conflicts and bad requests
/// are the caller's problem; upstream outages are a gateway condition.
pub fn status_for(error: &ScanError) -> StatusCode {
    match error {
        ScanError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ScanError::ScanNotFound(_) => StatusCode::NOT_FOUND,
        ScanError::RunConflict(_) => StatusCode::CONFLICT,
        ScanError::ServiceUnavailable(_) => StatusCode::BAD_GATEWAY,
        ScanError::PersistenceFailure(_) | ScanError::Anyhow(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn process_scan(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.pipeline.process(scan_id).await {
        Ok(report) => {
            info!(scan_id = %scan_id, matches = report.matches_persisted, "Scan processed");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "success": true,
                    "results": report.matches_persisted,
                })),
            )
                .into_response()
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!(scan_id = %scan_id, error = %e, "Scan processing failed");
            } else {
                warn!(scan_id = %scan_id, error = %e, "Scan processing rejected");
            }
            (
                status,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            status_for(&ScanError::InvalidRequest("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ScanError::ScanNotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ScanError::RunConflict(Uuid::new_v4())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ScanError::ServiceUnavailable("llm down".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&ScanError::PersistenceFailure("insert failed".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&ScanError::Anyhow(anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
