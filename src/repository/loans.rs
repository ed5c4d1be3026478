//! Loans repository for database operations

use chrono::NaiveDate;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    availability::{self, LoanCandidate},
    error::{AppError, AppResult},
    models::{
        loan::{CreateLoan, Loan, LoanQuery, LoanReportRow, LoanScope, UpdateLoan},
        user::Visibility,
    },
};

use super::push_visibility;

const REPORT_SELECT: &str = r#"
    SELECT l.id AS loan_id, b.title AS book_title, m.full_name AS member_name,
           l.loan_date, l.return_date, l.returned_on
    FROM loans l
    LEFT JOIN books b ON l.book_id = b.id
    LEFT JOIN members m ON l.member_id = m.id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// List loans matching the query, restricted to what the caller may see
    pub async fn list(&self, query: &LoanQuery, visibility: Visibility, today: NaiveDate) -> AppResult<Vec<Loan>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM loans WHERE TRUE");

        if let Some(book_id) = query.book_id {
            qb.push(" AND book_id = ").push_bind(book_id);
        }
        if let Some(member_id) = query.member_id {
            qb.push(" AND member_id = ").push_bind(member_id);
        }
        match query.scope {
            Some(LoanScope::Current) => {
                qb.push(" AND status != 'cancelled' AND returned_on IS NULL AND return_date >= ")
                    .push_bind(today);
            }
            Some(LoanScope::Overdue) => {
                qb.push(" AND status != 'cancelled' AND returned_on IS NULL AND return_date < ")
                    .push_bind(today);
            }
            None => {}
        }
        push_visibility(&mut qb, "member_id", visibility);

        qb.push(" ORDER BY loan_date DESC, id DESC");

        let loans = qb.build_query_as::<Loan>().fetch_all(&self.pool).await?;
        Ok(loans)
    }

    /// All loans of a book
    pub async fn for_book(&self, book_id: i32) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE book_id = $1 ORDER BY loan_date, id")
            .bind(book_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    /// Lock the book row so concurrent writers for the same book serialize
    async fn lock_book(tx: &mut Transaction<'_, Postgres>, book_id: i32) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
        Ok(())
    }

    async fn ensure_member(tx: &mut Transaction<'_, Postgres>, member_id: i32) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE id = $1)")
            .bind(member_id)
            .fetch_one(&mut **tx)
            .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Member with id {} not found", member_id)));
        }
        Ok(())
    }

    async fn loans_of_book_in(tx: &mut Transaction<'_, Postgres>, book_id: i32) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE book_id = $1 ORDER BY loan_date, id")
            .bind(book_id)
            .fetch_all(&mut **tx)
            .await?;
        Ok(loans)
    }

    /// Create a new loan, re-validating availability inside the transaction
    pub async fn create(&self, loan: &CreateLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        Self::lock_book(&mut tx, loan.book_id).await?;
        Self::ensure_member(&mut tx, loan.member_id).await?;

        let existing = Self::loans_of_book_in(&mut tx, loan.book_id).await?;
        availability::validate_loan_record(&LoanCandidate::from_request(loan), &existing)?;

        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (book_id, member_id, loan_date, return_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.member_id)
        .bind(loan.loan_date)
        .bind(loan.return_date)
        .bind(loan.status.unwrap_or_default())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    /// Update a loan, re-validating availability inside the transaction
    pub async fn update(&self, id: i32, update: &UpdateLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;

        let next = update.apply_to(&current);
        if next.loan_date > next.return_date {
            return Err(AppError::Validation(
                "Return date must not be before the loan date".to_string(),
            ));
        }

        Self::lock_book(&mut tx, next.book_id).await?;
        Self::ensure_member(&mut tx, next.member_id).await?;

        let existing = Self::loans_of_book_in(&mut tx, next.book_id).await?;
        availability::validate_loan_record(&LoanCandidate::from_loan(&next), &existing)?;

        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET
                book_id = $2,
                member_id = $3,
                loan_date = $4,
                return_date = $5,
                status = $6,
                notified_overdue = CASE WHEN $5 > return_date THEN FALSE ELSE notified_overdue END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(next.book_id)
        .bind(next.member_id)
        .bind(next.loan_date)
        .bind(next.return_date)
        .bind(next.status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Record the actual return of a loan
    pub async fn mark_returned(
        &self,
        id: i32,
        returned_on: NaiveDate,
        today: NaiveDate,
    ) -> AppResult<Loan> {
        let loan = self.get_by_id(id).await?;
        loan.check_return(returned_on, today)?;

        let updated = sqlx::query_as::<_, Loan>(
            "UPDATE loans SET returned_on = $2 WHERE id = $1 AND returned_on IS NULL AND status <> 'cancelled' RETURNING *",
        )
        .bind(id)
        .bind(returned_on)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Conflict("Loan already returned or cancelled".to_string()))?;

        Ok(updated)
    }

    /// Delete a loan
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }

        Ok(())
    }

    /// Submitted, unreturned loans past due that have not been notified yet
    pub async fn pending_overdue(&self, today: NaiveDate) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE return_date < $1
              AND notified_overdue = FALSE
              AND status = 'submitted'
              AND returned_on IS NULL
            ORDER BY return_date, id
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Flag a loan as notified
    pub async fn mark_notified(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE loans SET notified_overdue = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }

        Ok(())
    }

    /// Loans whose due date has not passed, soonest due first
    pub async fn current_report(&self, today: NaiveDate) -> AppResult<Vec<LoanReportRow>> {
        let rows = sqlx::query_as::<_, LoanReportRow>(&format!(
            "{} WHERE l.return_date >= $1 AND l.returned_on IS NULL AND l.status != 'cancelled' \
             ORDER BY l.return_date ASC, l.id",
            REPORT_SELECT
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Loans past due and not returned, oldest due first
    pub async fn overdue_report(&self, today: NaiveDate) -> AppResult<Vec<LoanReportRow>> {
        let rows = sqlx::query_as::<_, LoanReportRow>(&format!(
            "{} WHERE l.return_date < $1 AND l.returned_on IS NULL AND l.status != 'cancelled' \
             ORDER BY l.return_date ASC, l.id",
            REPORT_SELECT
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Full loan history of a member, newest first
    pub async fn member_history(&self, member_id: i32) -> AppResult<Vec<LoanReportRow>> {
        let rows = sqlx::query_as::<_, LoanReportRow>(&format!(
            "{} WHERE l.member_id = $1 ORDER BY l.loan_date DESC, l.id DESC",
            REPORT_SELECT
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
