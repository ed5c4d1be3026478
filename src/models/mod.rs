//! Data models for Bibliotheca

pub mod book;
pub mod loan;
pub mod member;
pub mod reservation;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use loan::{Loan, LoanStatus};
pub use member::Member;
pub use reservation::Reservation;
pub use user::{Role, User, UserClaims, Visibility};
