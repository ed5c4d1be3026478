//! Loan model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};

/// Lifecycle of a loan record; only submitted loans are chased by the overdue scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Draft,
    #[default]
    Submitted,
    Cancelled,
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: NaiveDate,
    /// Due date
    pub return_date: NaiveDate,
    /// Date the book actually came back
    pub returned_on: Option<NaiveDate>,
    pub status: LoanStatus,
    pub notified_overdue: bool,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// Whether this loan keeps the book out of the library on `date`.
    ///
    /// A loan holds its book while its due date has not passed, and past the
    /// due date for as long as it stays unreturned. Cancelled loans and loans
    /// returned on or before `date` never hold the book.
    pub fn is_outstanding_on(&self, date: NaiveDate) -> bool {
        if self.status == LoanStatus::Cancelled {
            return false;
        }
        if matches!(self.returned_on, Some(returned) if returned <= date) {
            return false;
        }
        self.return_date >= date || self.loan_date <= date
    }

    /// Whether the loan period `[loan_date, return_date]` contains `date`
    /// and the book was still held that day.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.status != LoanStatus::Cancelled
            && self.loan_date <= date
            && date <= self.return_date
            && !matches!(self.returned_on, Some(returned) if returned <= date)
    }

    /// Whether the book can be recorded as returned on `returned_on`
    pub fn check_return(&self, returned_on: NaiveDate, today: NaiveDate) -> AppResult<()> {
        if self.status == LoanStatus::Cancelled {
            return Err(AppError::Conflict("Cannot return a cancelled loan".to_string()));
        }
        if self.returned_on.is_some() {
            return Err(AppError::Conflict("Loan already returned".to_string()));
        }
        if returned_on < self.loan_date {
            return Err(AppError::Validation(
                "Return date must not be before the loan date".to_string(),
            ));
        }
        if returned_on > today {
            return Err(AppError::Validation(
                "Return date cannot be in the future".to_string(),
            ));
        }
        Ok(())
    }

    /// Past due and never returned
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != LoanStatus::Cancelled
            && self.returned_on.is_none()
            && self.return_date < today
    }
}

fn validate_period(loan_date: NaiveDate, return_date: NaiveDate) -> Result<(), ValidationError> {
    if loan_date > return_date {
        let mut err = ValidationError::new("loan_period");
        err.message = Some("Return date must not be before the loan date".into());
        return Err(err);
    }
    Ok(())
}

fn validate_create_period(loan: &CreateLoan) -> Result<(), ValidationError> {
    validate_period(loan.loan_date, loan.return_date)
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_period"))]
pub struct CreateLoan {
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: NaiveDate,
    pub return_date: NaiveDate,
    pub status: Option<LoanStatus>,
}

/// Update loan request (absent fields are left unchanged)
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateLoan {
    pub book_id: Option<i32>,
    pub member_id: Option<i32>,
    pub loan_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub status: Option<LoanStatus>,
}

impl UpdateLoan {
    /// The loan as it would look once this update is applied
    pub fn apply_to(&self, current: &Loan) -> Loan {
        Loan {
            book_id: self.book_id.unwrap_or(current.book_id),
            member_id: self.member_id.unwrap_or(current.member_id),
            loan_date: self.loan_date.unwrap_or(current.loan_date),
            return_date: self.return_date.unwrap_or(current.return_date),
            status: self.status.unwrap_or(current.status),
            ..current.clone()
        }
    }
}

/// Record the actual return of a book
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnLoan {
    /// Defaults to today
    pub returned_on: Option<NaiveDate>,
}

/// Which loans to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanScope {
    /// Due date not yet passed
    Current,
    /// Past due and not returned
    Overdue,
}

/// Loan list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub book_id: Option<i32>,
    pub member_id: Option<i32>,
    pub scope: Option<LoanScope>,
}

/// Loan joined with book title and member name, for reports
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanReportRow {
    pub loan_id: i32,
    pub book_title: Option<String>,
    pub member_name: Option<String>,
    pub loan_date: NaiveDate,
    pub return_date: NaiveDate,
    pub returned_on: Option<NaiveDate>,
}
