//! Loan reports and CSV export

use crate::{
    error::{AppError, AppResult},
    models::loan::LoanReportRow,
    repository::Repository,
    services::loans::today,
};

const EXPORT_HEADER: &str = "Loan ID,Book Title,Loan Date,Return Date";

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
}

impl ReportsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Outstanding loans, soonest due first
    pub async fn current_loans(&self) -> AppResult<Vec<LoanReportRow>> {
        self.repository.loans.current_report(today()).await
    }

    /// Loans past due and not returned, oldest due first
    pub async fn overdue_loans(&self) -> AppResult<Vec<LoanReportRow>> {
        self.repository.loans.overdue_report(today()).await
    }

    /// A member's loan history as CSV, newest loan first
    pub async fn member_history_csv(&self, member_id: i32) -> AppResult<String> {
        self.repository.members.get_by_id(member_id).await?;

        let rows = self.repository.loans.member_history(member_id).await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!(
                "No loans found for member {}",
                member_id
            )));
        }

        Ok(render_csv(&rows))
    }
}

/// Render loan rows with the export header, one line per loan
pub fn render_csv(rows: &[LoanReportRow]) -> String {
    let mut out = String::with_capacity(EXPORT_HEADER.len() + rows.len() * 48);
    out.push_str(EXPORT_HEADER);
    out.push('\n');

    for row in rows {
        let title = row.book_title.as_deref().unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{}\n",
            row.loan_id,
            csv_field(title),
            row.loan_date,
            row.return_date
        ));
    }

    out
}

/// Quote a field only when it holds a comma, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
