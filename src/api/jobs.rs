//! On-demand background jobs

use axum::{extract::State, Json};

use crate::{error::AppResult, services::overdue::ScanReport};

use super::AuthenticatedUser;

/// Run the overdue scan now
#[utoipa::path(
    post,
    path = "/jobs/overdue-scan",
    tag = "jobs",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Scan report", body = ScanReport),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn overdue_scan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ScanReport>> {
    claims.require_librarian()?;

    tracing::info!(user_id = claims.user_id, "Overdue scan triggered on demand");
    let report = state
        .services
        .overdue
        .run(crate::services::loans::today())
        .await?;
    Ok(Json(report))
}
