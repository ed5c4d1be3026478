//! Repository layer for database operations

pub mod books;
pub mod loans;
pub mod members;
pub mod reservations;
pub mod users;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::AppResult,
    models::{Loan, Reservation, Visibility},
};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub members: members::MembersRepository,
    pub loans: loans::LoansRepository,
    pub reservations: reservations::ReservationsRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            members: members::MembersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            reservations: reservations::ReservationsRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database, used by the readiness probe
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Append the row-level filter for `column` (a member id column)
pub(crate) fn push_visibility(qb: &mut QueryBuilder<'_, Postgres>, column: &str, visibility: Visibility) {
    match visibility {
        Visibility::All => {}
        Visibility::Member(member_id) => {
            qb.push(" AND ").push(column).push(" = ").push_bind(member_id);
        }
        Visibility::Nothing => {
            qb.push(" AND FALSE");
        }
    }
}

/// Reads the availability pre-checks need
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn loans_for_book(&self, book_id: i32) -> AppResult<Vec<Loan>>;
    async fn reservations_for(&self, book_id: i32, member_id: i32) -> AppResult<Vec<Reservation>>;
    /// Display name of a member, `None` if the member no longer exists
    async fn member_name(&self, member_id: i32) -> AppResult<Option<String>>;
}

/// Reads and writes the overdue scan needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OverdueStore: Send + Sync {
    async fn pending_overdue(&self, today: NaiveDate) -> AppResult<Vec<Loan>>;
    async fn member_email(&self, member_id: i32) -> AppResult<Option<String>>;
    async fn book_title(&self, book_id: i32) -> AppResult<Option<String>>;
    async fn mark_notified(&self, loan_id: i32) -> AppResult<()>;
}

#[async_trait]
impl AvailabilityStore for Repository {
    async fn loans_for_book(&self, book_id: i32) -> AppResult<Vec<Loan>> {
        self.loans.for_book(book_id).await
    }

    async fn reservations_for(&self, book_id: i32, member_id: i32) -> AppResult<Vec<Reservation>> {
        self.reservations.for_book_and_member(book_id, member_id).await
    }

    async fn member_name(&self, member_id: i32) -> AppResult<Option<String>> {
        let member = self.members.find_by_id(member_id).await?;
        Ok(member.map(|m| m.display_name().to_string()))
    }
}

#[async_trait]
impl OverdueStore for Repository {
    async fn pending_overdue(&self, today: NaiveDate) -> AppResult<Vec<Loan>> {
        self.loans.pending_overdue(today).await
    }

    async fn member_email(&self, member_id: i32) -> AppResult<Option<String>> {
        let member = self.members.find_by_id(member_id).await?;
        Ok(member
            .map(|m| m.email)
            .filter(|email| !email.trim().is_empty()))
    }

    async fn book_title(&self, book_id: i32) -> AppResult<Option<String>> {
        self.books.title_of(book_id).await
    }

    async fn mark_notified(&self, loan_id: i32) -> AppResult<()> {
        self.loans.mark_notified(loan_id).await
    }
}
