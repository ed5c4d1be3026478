//! Loan reports

use axum::{extract::State, Json};

use crate::{error::AppResult, models::loan::LoanReportRow};

use super::AuthenticatedUser;

/// Outstanding loans, soonest due first
#[utoipa::path(
    get,
    path = "/reports/current-loans",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current loans", body = Vec<LoanReportRow>),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn current_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanReportRow>>> {
    claims.require_librarian()?;

    let rows = state.services.reports.current_loans().await?;
    Ok(Json(rows))
}

/// Loans past their due date
#[utoipa::path(
    get,
    path = "/reports/overdue-loans",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans", body = Vec<LoanReportRow>),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn overdue_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanReportRow>>> {
    claims.require_librarian()?;

    let rows = state.services.reports.overdue_loans().await?;
    Ok(Json(rows))
}
