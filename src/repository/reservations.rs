//! Reservations repository for database operations

use chrono::NaiveDate;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    availability::{self, ReservationCandidate},
    error::{AppError, AppResult},
    models::{
        loan::Loan,
        reservation::{Reservation, ReservationDetails, UpdateReservation},
        user::Visibility,
    },
};

use super::push_visibility;

#[derive(Clone)]
pub struct ReservationsRepository {
    pool: Pool<Postgres>,
}

impl ReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get reservation by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    /// List reservations with book titles and member names, newest first
    pub async fn list(&self, visibility: Visibility) -> AppResult<Vec<ReservationDetails>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT r.id, r.book_id, b.title AS book_title, r.member_id,
                   m.full_name AS member_name, r.reservation_date
            FROM reservations r
            LEFT JOIN books b ON r.book_id = b.id
            LEFT JOIN members m ON r.member_id = m.id
            WHERE TRUE
            "#,
        );
        push_visibility(&mut qb, "r.member_id", visibility);
        qb.push(" ORDER BY r.reservation_date DESC, r.id DESC");

        let rows = qb
            .build_query_as::<ReservationDetails>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Reservations of a (book, member) pair
    pub async fn for_book_and_member(&self, book_id: i32, member_id: i32) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE book_id = $1 AND member_id = $2 ORDER BY reservation_date, id",
        )
        .bind(book_id)
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Lock the book, then re-run every reservation rule against current rows
    async fn validate_in(
        tx: &mut Transaction<'_, Postgres>,
        candidate: &ReservationCandidate,
    ) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(candidate.book_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", candidate.book_id)))?;

        let member_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE id = $1)")
            .bind(candidate.member_id)
            .fetch_one(&mut **tx)
            .await?;
        if !member_exists {
            return Err(AppError::NotFound(format!(
                "Member with id {} not found",
                candidate.member_id
            )));
        }

        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE book_id = $1")
            .bind(candidate.book_id)
            .fetch_all(&mut **tx)
            .await?;

        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE book_id = $1 AND member_id = $2",
        )
        .bind(candidate.book_id)
        .bind(candidate.member_id)
        .fetch_all(&mut **tx)
        .await?;

        availability::validate_reservation_record(candidate, &loans, &reservations)?;
        Ok(())
    }

    /// Create a reservation
    pub async fn create(&self, book_id: i32, member_id: i32, date: NaiveDate) -> AppResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let candidate = ReservationCandidate {
            book_id,
            member_id,
            date,
            editing: None,
        };
        Self::validate_in(&mut tx, &candidate).await?;

        let created = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (book_id, member_id, reservation_date)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(member_id)
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    /// Update a reservation
    pub async fn update(&self, id: i32, update: &UpdateReservation) -> AppResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))?;

        let next = update.apply_to(&current);
        Self::validate_in(&mut tx, &ReservationCandidate::from_reservation(&next)).await?;

        let updated = sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations SET book_id = $2, member_id = $3, reservation_date = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(next.book_id)
        .bind(next.member_id)
        .bind(next.reservation_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Delete a reservation
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Reservation with id {} not found", id)));
        }

        Ok(())
    }
}
