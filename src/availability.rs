//! Loan and reservation availability rules
//!
//! Pure checks over records already fetched from the store. They run twice
//! for every write: once as a pre-check in the service layer (with friendly
//! messages naming the current borrower), and once inside the repository
//! transaction that persists the record.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{loan::CreateLoan, Loan, LoanStatus, Reservation};

/// Why a loan or reservation cannot be written
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvailabilityError {
    #[error("You cannot loan this book because it is already loaned out to '{holder}' and has not been returned yet")]
    LoanedTo { holder: String },

    #[error("This book is already on loan (loan {loan_id}); wait until it is returned")]
    AlreadyOnLoan { loan_id: i32 },

    #[error("This book is currently available. No need to reserve it")]
    BookAvailable,

    #[error("This member has already reserved this book on {date}")]
    DuplicateReservation { date: NaiveDate },

    #[error("This member already has this book on loan on {date} and cannot reserve it")]
    AlreadyBorrowed { date: NaiveDate },
}

/// A loan about to be created or updated
#[derive(Debug, Clone, Copy)]
pub struct LoanCandidate {
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: NaiveDate,
    pub return_date: NaiveDate,
    pub status: LoanStatus,
    /// Set when the loan being edited was already returned
    pub returned_on: Option<NaiveDate>,
    /// Id of the loan being edited, excluded from the checks
    pub editing: Option<i32>,
}

impl LoanCandidate {
    pub fn from_loan(loan: &Loan) -> Self {
        Self {
            book_id: loan.book_id,
            member_id: loan.member_id,
            loan_date: loan.loan_date,
            return_date: loan.return_date,
            status: loan.status,
            returned_on: loan.returned_on,
            editing: Some(loan.id),
        }
    }

    pub fn from_request(loan: &CreateLoan) -> Self {
        Self {
            book_id: loan.book_id,
            member_id: loan.member_id,
            loan_date: loan.loan_date,
            return_date: loan.return_date,
            status: loan.status.unwrap_or_default(),
            returned_on: None,
            editing: None,
        }
    }
}

/// A reservation about to be created or updated
#[derive(Debug, Clone, Copy)]
pub struct ReservationCandidate {
    pub book_id: i32,
    pub member_id: i32,
    pub date: NaiveDate,
    pub editing: Option<i32>,
}

impl ReservationCandidate {
    pub fn from_reservation(reservation: &Reservation) -> Self {
        Self {
            book_id: reservation.book_id,
            member_id: reservation.member_id,
            date: reservation.reservation_date,
            editing: Some(reservation.id),
        }
    }
}

/// First loan of the same book still outstanding when the candidate would start.
///
/// A cancelled candidate never holds the book. A returned one only held it
/// until its return, so loans starting on or after that day are not in its way.
pub fn first_conflicting_loan<'a>(candidate: &LoanCandidate, loans: &'a [Loan]) -> Option<&'a Loan> {
    if candidate.status == LoanStatus::Cancelled {
        return None;
    }
    loans.iter().find(|l| {
        l.book_id == candidate.book_id
            && Some(l.id) != candidate.editing
            && !matches!(candidate.returned_on, Some(returned) if l.loan_date >= returned)
            && l.is_outstanding_on(candidate.loan_date)
    })
}

/// Record-level loan check, run before every persisted loan write
pub fn validate_loan_record(candidate: &LoanCandidate, loans: &[Loan]) -> Result<(), AvailabilityError> {
    match first_conflicting_loan(candidate, loans) {
        Some(existing) => Err(AvailabilityError::AlreadyOnLoan { loan_id: existing.id }),
        None => Ok(()),
    }
}

/// The three reservation checks, in order: the book is out, the reservation
/// is not a duplicate, and the member does not hold the book that day.
///
/// `loans` are the loans of the candidate's book; `reservations` are the
/// reservations of the candidate's (book, member) pair.
pub fn validate_reservation_record(
    candidate: &ReservationCandidate,
    loans: &[Loan],
    reservations: &[Reservation],
) -> Result<(), AvailabilityError> {
    let on_loan = loans
        .iter()
        .any(|l| l.book_id == candidate.book_id && l.is_outstanding_on(candidate.date));
    if !on_loan {
        return Err(AvailabilityError::BookAvailable);
    }

    let duplicate = reservations.iter().any(|r| {
        r.book_id == candidate.book_id
            && r.member_id == candidate.member_id
            && r.reservation_date == candidate.date
            && Some(r.id) != candidate.editing
    });
    if duplicate {
        return Err(AvailabilityError::DuplicateReservation { date: candidate.date });
    }

    let holds_it = loans.iter().any(|l| {
        l.book_id == candidate.book_id && l.member_id == candidate.member_id && l.covers(candidate.date)
    });
    if holds_it {
        return Err(AvailabilityError::AlreadyBorrowed { date: candidate.date });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn loan(id: i32, book_id: i32, member_id: i32, from: &str, to: &str) -> Loan {
        Loan {
            id,
            book_id,
            member_id,
            loan_date: date(from),
            return_date: date(to),
            returned_on: None,
            status: LoanStatus::Submitted,
            notified_overdue: false,
            created_at: Utc::now(),
        }
    }

    fn reservation(id: i32, book_id: i32, member_id: i32, on: &str) -> Reservation {
        Reservation {
            id,
            book_id,
            member_id,
            reservation_date: date(on),
            created_at: Utc::now(),
        }
    }

    fn loan_candidate(from: &str, to: &str) -> LoanCandidate {
        LoanCandidate {
            book_id: 1,
            member_id: 2,
            loan_date: date(from),
            return_date: date(to),
            status: LoanStatus::Submitted,
            returned_on: None,
            editing: None,
        }
    }

    fn reservation_candidate(member_id: i32, on: &str) -> ReservationCandidate {
        ReservationCandidate {
            book_id: 1,
            member_id,
            date: date(on),
            editing: None,
        }
    }

    #[test]
    fn overlapping_loan_conflicts() {
        let existing = vec![loan(10, 1, 1, "2025-07-14", "2025-07-20")];
        let result = validate_loan_record(&loan_candidate("2025-07-15", "2025-07-21"), &existing);
        assert_eq!(result, Err(AvailabilityError::AlreadyOnLoan { loan_id: 10 }));
    }

    #[test]
    fn loan_starting_on_due_date_conflicts() {
        let existing = vec![loan(10, 1, 1, "2025-07-14", "2025-07-20")];
        assert!(validate_loan_record(&loan_candidate("2025-07-20", "2025-07-25"), &existing).is_err());
    }

    #[test]
    fn loan_after_return_is_allowed() {
        let mut returned = loan(10, 1, 1, "2025-07-14", "2025-07-20");
        returned.returned_on = Some(date("2025-07-18"));
        assert!(validate_loan_record(&loan_candidate("2025-07-19", "2025-07-25"), &[returned]).is_ok());
    }

    #[test]
    fn unreturned_overdue_loan_still_blocks() {
        let existing = vec![loan(10, 1, 1, "2025-07-01", "2025-07-10")];
        assert!(validate_loan_record(&loan_candidate("2025-07-15", "2025-07-21"), &existing).is_err());
    }

    #[test]
    fn other_books_and_cancelled_loans_are_ignored() {
        let mut cancelled = loan(11, 1, 1, "2025-07-14", "2025-07-20");
        cancelled.status = LoanStatus::Cancelled;
        let existing = vec![loan(10, 2, 1, "2025-07-14", "2025-07-20"), cancelled];
        assert!(validate_loan_record(&loan_candidate("2025-07-15", "2025-07-21"), &existing).is_ok());
    }

    #[test]
    fn editing_a_loan_skips_itself() {
        let existing = vec![loan(10, 1, 2, "2025-07-14", "2025-07-20")];
        let mut candidate = loan_candidate("2025-07-14", "2025-07-22");
        candidate.editing = Some(10);
        assert!(validate_loan_record(&candidate, &existing).is_ok());
    }

    #[test]
    fn editing_a_returned_loan_ignores_later_loans() {
        let mut returned = loan(1, 1, 2, "2025-07-01", "2025-07-10");
        returned.returned_on = Some(date("2025-07-05"));
        let existing = vec![returned.clone(), loan(2, 1, 3, "2025-07-06", "2025-07-20")];

        let candidate = LoanCandidate::from_loan(&returned);
        assert!(validate_loan_record(&candidate, &existing).is_ok());
    }

    #[test]
    fn returned_loan_still_conflicts_with_loans_started_before_its_return() {
        let mut returned = loan(1, 1, 2, "2025-07-01", "2025-07-10");
        returned.returned_on = Some(date("2025-07-05"));
        let existing = vec![returned.clone(), loan(2, 1, 3, "2025-06-20", "2025-07-03")];

        let candidate = LoanCandidate::from_loan(&returned);
        assert_eq!(
            validate_loan_record(&candidate, &existing),
            Err(AvailabilityError::AlreadyOnLoan { loan_id: 2 })
        );
    }

    #[test]
    fn cancelling_a_loan_never_conflicts() {
        let mut first = loan(1, 1, 2, "2025-07-01", "2025-07-10");
        let existing = vec![first.clone(), loan(2, 1, 3, "2025-07-06", "2025-07-20")];
        assert!(validate_loan_record(&LoanCandidate::from_loan(&first), &existing).is_err());

        first.status = LoanStatus::Cancelled;
        assert!(validate_loan_record(&LoanCandidate::from_loan(&first), &existing).is_ok());
    }

    #[test]
    fn first_conflict_is_reported() {
        let mut returned = loan(10, 1, 1, "2025-07-01", "2025-07-05");
        returned.returned_on = Some(date("2025-07-05"));
        let existing = vec![
            returned,
            loan(11, 1, 3, "2025-07-14", "2025-07-20"),
            loan(12, 1, 4, "2025-07-21", "2025-07-30"),
        ];
        let hit = first_conflicting_loan(&loan_candidate("2025-07-15", "2025-07-16"), &existing);
        assert_eq!(hit.map(|l| l.id), Some(11));
    }

    #[test]
    fn reservation_while_book_out_succeeds() {
        // Unreturned loan due 2025-07-10: the book is still out on the 15th
        let loans = vec![loan(10, 1, 2, "2025-07-01", "2025-07-10")];
        assert!(validate_reservation_record(&reservation_candidate(2, "2025-07-15"), &loans, &[]).is_ok());
    }

    #[test]
    fn reservation_of_available_book_is_rejected() {
        assert_eq!(
            validate_reservation_record(&reservation_candidate(2, "2025-07-15"), &[], &[]),
            Err(AvailabilityError::BookAvailable)
        );

        let mut returned = loan(10, 1, 3, "2025-07-01", "2025-07-10");
        returned.returned_on = Some(date("2025-07-09"));
        assert_eq!(
            validate_reservation_record(&reservation_candidate(2, "2025-07-15"), &[returned], &[]),
            Err(AvailabilityError::BookAvailable)
        );
    }

    #[test]
    fn duplicate_reservation_is_rejected() {
        let loans = vec![loan(10, 1, 3, "2025-07-14", "2025-07-20")];
        let existing = vec![reservation(5, 1, 2, "2025-07-15")];
        assert_eq!(
            validate_reservation_record(&reservation_candidate(2, "2025-07-15"), &loans, &existing),
            Err(AvailabilityError::DuplicateReservation { date: date("2025-07-15") })
        );
    }

    #[test]
    fn editing_a_reservation_skips_itself() {
        let loans = vec![loan(10, 1, 3, "2025-07-14", "2025-07-20")];
        let existing = vec![reservation(5, 1, 2, "2025-07-15")];
        let mut candidate = reservation_candidate(2, "2025-07-15");
        candidate.editing = Some(5);
        assert!(validate_reservation_record(&candidate, &loans, &existing).is_ok());
    }

    #[test]
    fn borrower_cannot_reserve_own_loan() {
        let loans = vec![loan(10, 1, 2, "2025-07-14", "2025-07-20")];
        assert_eq!(
            validate_reservation_record(&reservation_candidate(2, "2025-07-16"), &loans, &[]),
            Err(AvailabilityError::AlreadyBorrowed { date: date("2025-07-16") })
        );
        // Someone else may queue for it
        assert!(validate_reservation_record(&reservation_candidate(3, "2025-07-16"), &loans, &[]).is_ok());
    }

    #[test]
    fn availability_is_checked_before_duplicates() {
        let existing = vec![reservation(5, 1, 2, "2025-07-15")];
        assert_eq!(
            validate_reservation_record(&reservation_candidate(2, "2025-07-15"), &[], &existing),
            Err(AvailabilityError::BookAvailable)
        );
    }
}
