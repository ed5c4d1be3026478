//! Loan management service

use chrono::{NaiveDate, Utc};
use validator::Validate;

use crate::{
    availability::LoanCandidate,
    error::{AppError, AppResult},
    models::{
        loan::{CreateLoan, LoanQuery, LoanReportRow, ReturnLoan, UpdateLoan},
        Loan, Visibility,
    },
    repository::Repository,
    services::availability::AvailabilityService,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    availability: AvailabilityService,
}

impl LoansService {
    pub fn new(repository: Repository, availability: AvailabilityService) -> Self {
        Self { repository, availability }
    }

    /// List loans the caller may see
    pub async fn list_loans(&self, query: &LoanQuery, visibility: Visibility) -> AppResult<Vec<Loan>> {
        self.repository.loans.list(query, visibility, today()).await
    }

    /// Loans outside the caller's visibility are reported as missing
    pub async fn get_loan(&self, id: i32, visibility: Visibility) -> AppResult<Loan> {
        let loan = self.repository.loans.get_by_id(id).await?;
        if !visibility.permits(loan.member_id) {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }
        Ok(loan)
    }

    /// Create a new loan (lend a book)
    pub async fn create_loan(&self, loan: CreateLoan) -> AppResult<Loan> {
        loan.validate()?;

        self.availability
            .can_create_loan(&LoanCandidate::from_request(&loan))
            .await?;

        let created = self.repository.loans.create(&loan).await?;
        tracing::info!(
            loan_id = created.id,
            book_id = created.book_id,
            member_id = created.member_id,
            "Loan created"
        );
        Ok(created)
    }

    pub async fn update_loan(&self, id: i32, update: UpdateLoan) -> AppResult<Loan> {
        let current = self.repository.loans.get_by_id(id).await?;
        let next = update.apply_to(&current);

        self.availability
            .can_create_loan(&LoanCandidate::from_loan(&next))
            .await?;

        self.repository.loans.update(id, &update).await
    }

    /// Record the actual return; defaults to today
    pub async fn return_loan(&self, id: i32, request: ReturnLoan) -> AppResult<Loan> {
        let returned_on = request.returned_on.unwrap_or_else(today);
        let loan = self
            .repository
            .loans
            .mark_returned(id, returned_on, today())
            .await?;
        tracing::info!(loan_id = id, %returned_on, "Loan returned");
        Ok(loan)
    }

    pub async fn delete_loan(&self, id: i32) -> AppResult<()> {
        self.repository.loans.delete(id).await?;
        tracing::info!(loan_id = id, "Loan deleted");
        Ok(())
    }

    /// Loan history of one member, with book titles
    pub async fn member_history(&self, member_id: i32) -> AppResult<Vec<LoanReportRow>> {
        self.repository.members.get_by_id(member_id).await?;
        self.repository.loans.member_history(member_id).await
    }
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
