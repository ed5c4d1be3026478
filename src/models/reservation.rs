//! Reservation model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Reservation model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub reservation_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Reservation joined with book title and member name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ReservationDetails {
    pub id: i32,
    pub book_id: i32,
    pub book_title: Option<String>,
    pub member_id: i32,
    pub member_name: Option<String>,
    pub reservation_date: NaiveDate,
}

/// Create reservation request (librarian)
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReservation {
    pub book_id: i32,
    pub member_id: i32,
    /// Defaults to today
    pub reservation_date: Option<NaiveDate>,
}

/// Reserve a book for oneself (member)
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateMyReservation {
    pub book_id: i32,
    /// Defaults to today
    pub reservation_date: Option<NaiveDate>,
}

/// Update reservation request (absent fields are left unchanged)
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateReservation {
    pub book_id: Option<i32>,
    pub member_id: Option<i32>,
    pub reservation_date: Option<NaiveDate>,
}

impl UpdateReservation {
    /// The reservation as it would look once this update is applied
    pub fn apply_to(&self, current: &Reservation) -> Reservation {
        Reservation {
            book_id: self.book_id.unwrap_or(current.book_id),
            member_id: self.member_id.unwrap_or(current.member_id),
            reservation_date: self.reservation_date.unwrap_or(current.reservation_date),
            ..current.clone()
        }
    }
}
