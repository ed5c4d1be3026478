//! Member self-service endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        loan::LoanReportRow,
        reservation::{CreateMyReservation, ReservationDetails},
        Reservation, Visibility,
    },
};

use super::AuthenticatedUser;

/// Own loan history, newest first
#[utoipa::path(
    get,
    path = "/me/loans",
    tag = "me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Loan history with book titles", body = Vec<LoanReportRow>),
        (status = 403, description = "No member record linked to this login")
    )
)]
pub async fn my_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanReportRow>>> {
    let member_id = claims.require_member()?;

    let loans = state.services.loans.member_history(member_id).await?;
    Ok(Json(loans))
}

/// Own reservations
#[utoipa::path(
    get,
    path = "/me/reservations",
    tag = "me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reservations", body = Vec<ReservationDetails>),
        (status = 403, description = "No member record linked to this login")
    )
)]
pub async fn my_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    let member_id = claims.require_member()?;

    let reservations = state
        .services
        .reservations
        .list_reservations(Visibility::Member(member_id))
        .await?;
    Ok(Json(reservations))
}

/// Reserve a book that is currently on loan
#[utoipa::path(
    post,
    path = "/me/reservations",
    tag = "me",
    security(("bearer_auth" = [])),
    request_body = CreateMyReservation,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book available, duplicate, or already borrowed")
    )
)]
pub async fn reserve(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateMyReservation>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    let member_id = claims.require_member()?;

    let created = state
        .services
        .reservations
        .create_my_reservation(member_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Cancel one of your reservations
#[utoipa::path(
    delete,
    path = "/me/reservations/{id}",
    tag = "me",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 204, description = "Reservation cancelled"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    let member_id = claims.require_member()?;

    state
        .services
        .reservations
        .cancel_my_reservation(member_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
