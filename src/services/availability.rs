//! Availability pre-checks run before loans and reservations are written

use std::sync::Arc;

use crate::{
    availability::{self, AvailabilityError, LoanCandidate, ReservationCandidate},
    error::{AppError, AppResult},
    repository::AvailabilityStore,
};

#[derive(Clone)]
pub struct AvailabilityService {
    store: Arc<dyn AvailabilityStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn AvailabilityStore>) -> Self {
        Self { store }
    }

    /// Fails with a conflict naming the current borrower when the book is
    /// still out at the candidate's loan date.
    pub async fn can_create_loan(&self, candidate: &LoanCandidate) -> AppResult<()> {
        if candidate.loan_date > candidate.return_date {
            return Err(AppError::Validation(
                "Return date must not be before the loan date".to_string(),
            ));
        }

        let loans = self.store.loans_for_book(candidate.book_id).await?;
        let Some(existing) = availability::first_conflicting_loan(candidate, &loans) else {
            return Ok(());
        };

        let holder = self
            .store
            .member_name(existing.member_id)
            .await?
            .unwrap_or_else(|| existing.member_id.to_string());

        tracing::debug!(
            book_id = candidate.book_id,
            conflicting_loan = existing.id,
            "Loan rejected: book still out"
        );

        Err(AvailabilityError::LoanedTo { holder }.into())
    }

    /// Runs the three reservation checks against the current records
    pub async fn can_create_reservation(&self, candidate: &ReservationCandidate) -> AppResult<()> {
        let loans = self.store.loans_for_book(candidate.book_id).await?;
        let reservations = self
            .store
            .reservations_for(candidate.book_id, candidate.member_id)
            .await?;

        availability::validate_reservation_record(candidate, &loans, &reservations)?;
        Ok(())
    }
}
