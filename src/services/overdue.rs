//! Overdue scan: remind members of loans past due, once per loan

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::Loan,
    repository::OverdueStore,
    services::{email::NotificationSink, loans::today},
};

pub const OVERDUE_SUBJECT: &str = "Library Book Overdue";

/// Outcome of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScanReport {
    pub examined: usize,
    pub notified: usize,
    pub failures: Vec<ScanFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScanFailure {
    pub loan_id: i32,
    pub reason: String,
}

#[derive(Clone)]
pub struct OverdueScan {
    store: Arc<dyn OverdueStore>,
    sink: Arc<dyn NotificationSink>,
}

impl OverdueScan {
    pub fn new(store: Arc<dyn OverdueStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { store, sink }
    }

    /// One serial pass over every unnotified overdue loan.
    ///
    /// A loan is flagged only after its reminder went out; anything that
    /// fails is left unflagged and picked up by the next run.
    pub async fn run(&self, today: NaiveDate) -> AppResult<ScanReport> {
        let loans = self.store.pending_overdue(today).await?;
        let mut report = ScanReport {
            examined: loans.len(),
            ..Default::default()
        };

        for loan in &loans {
            match self.notify(loan).await {
                Ok(()) => {
                    report.notified += 1;
                    tracing::info!(loan_id = loan.id, member_id = loan.member_id, "Overdue reminder sent");
                }
                Err(reason) => {
                    tracing::error!(loan_id = loan.id, member_id = loan.member_id, %reason, "Overdue reminder failed");
                    report.failures.push(ScanFailure {
                        loan_id: loan.id,
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            notified = report.notified,
            failed = report.failures.len(),
            "Overdue scan finished"
        );

        Ok(report)
    }

    async fn notify(&self, loan: &Loan) -> Result<(), String> {
        let email = self
            .store
            .member_email(loan.member_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("No email address for member {}", loan.member_id))?;

        let title = self
            .store
            .book_title(loan.book_id)
            .await
            .map_err(|e| e.to_string())?
            .unwrap_or_else(|| format!("book #{}", loan.book_id));

        self.sink
            .send(&[email], OVERDUE_SUBJECT, &reminder_body(&title, loan.return_date))
            .await
            .map_err(|e| e.to_string())?;

        self.store
            .mark_notified(loan.id)
            .await
            .map_err(|e| format!("Reminder sent but flag not saved: {}", e))
    }
}

pub fn reminder_body(title: &str, due: NaiveDate) -> String {
    format!(
        "Dear Member,\n\n\
         Your loan for the book \"{}\" was due on {}. Please return it as soon as possible.\n\n\
         Thank you,\nThe Library",
        title, due
    )
}

/// Run the scan now and then every `interval_hours`
pub fn spawn_scheduler(scan: OverdueScan, interval_hours: u64) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_hours.max(1) * 3600);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = scan.run(today()).await {
                tracing::error!("Overdue scan aborted: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::LoanStatus;
    use crate::repository::MockOverdueStore;
    use crate::services::email::MockNotificationSink;
    use chrono::Utc;
    use mockall::predicate::eq;
    use std::sync::Mutex;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn overdue_loan(id: i32, member_id: i32) -> Loan {
        Loan {
            id,
            book_id: 1,
            member_id,
            loan_date: date("2025-07-01"),
            return_date: date("2025-07-10"),
            returned_on: None,
            status: LoanStatus::Submitted,
            notified_overdue: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn sends_once_and_flags_the_loan() {
        let mut store = MockOverdueStore::new();
        store
            .expect_pending_overdue()
            .with(eq(date("2025-07-15")))
            .returning(|_| Ok(vec![overdue_loan(10, 2)]));
        store
            .expect_member_email()
            .with(eq(2))
            .returning(|_| Ok(Some("test@example.com".to_string())));
        store
            .expect_book_title()
            .returning(|_| Ok(Some("Dune".to_string())));
        store.expect_mark_notified().with(eq(10)).times(1).returning(|_| Ok(()));

        let mut sink = MockNotificationSink::new();
        sink.expect_send()
            .withf(|to, subject, body| {
                to.len() == 1
                    && to[0] == "test@example.com"
                    && subject == OVERDUE_SUBJECT
                    && body.contains("Dune")
                    && body.contains("2025-07-10")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let scan = OverdueScan::new(Arc::new(store), Arc::new(sink));
        let report = scan.run(date("2025-07-15")).await.unwrap();

        assert_eq!(report.examined, 1);
        assert_eq!(report.notified, 1);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn scheduler_scans_immediately_and_runs_until_aborted() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut store = MockOverdueStore::new();
        store.expect_pending_overdue().returning(move |_| {
            let _ = tx.send(());
            Ok(vec![])
        });

        let scan = OverdueScan::new(Arc::new(store), Arc::new(MockNotificationSink::new()));
        let handle = spawn_scheduler(scan, 24);

        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("first scan did not run")
            .expect("channel closed");
        assert!(!handle.is_finished());

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn missing_email_is_skipped_and_the_scan_continues() {
        let mut store = MockOverdueStore::new();
        store
            .expect_pending_overdue()
            .returning(|_| Ok(vec![overdue_loan(10, 2), overdue_loan(11, 3)]));
        store.expect_member_email().with(eq(2)).returning(|_| Ok(None));
        store
            .expect_member_email()
            .with(eq(3))
            .returning(|_| Ok(Some("other@example.com".to_string())));
        store
            .expect_book_title()
            .returning(|_| Ok(Some("Dune".to_string())));
        store.expect_mark_notified().with(eq(11)).times(1).returning(|_| Ok(()));

        let mut sink = MockNotificationSink::new();
        sink.expect_send().times(1).returning(|_, _, _| Ok(()));

        let scan = OverdueScan::new(Arc::new(store), Arc::new(sink));
        let report = scan.run(date("2025-07-15")).await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.notified, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].loan_id, 10);
    }

    #[tokio::test]
    async fn send_failure_leaves_the_loan_unflagged() {
        let mut store = MockOverdueStore::new();
        store
            .expect_pending_overdue()
            .returning(|_| Ok(vec![overdue_loan(10, 2), overdue_loan(11, 3)]));
        store
            .expect_member_email()
            .returning(|id| Ok(Some(format!("member{}@example.com", id))));
        store
            .expect_book_title()
            .returning(|_| Ok(Some("Dune".to_string())));
        store.expect_mark_notified().with(eq(11)).times(1).returning(|_| Ok(()));

        let mut sink = MockNotificationSink::new();
        sink.expect_send()
            .withf(|to, _, _| to[0] == "member2@example.com")
            .returning(|_, _, _| Err(AppError::Delivery("SMTP down".to_string())));
        sink.expect_send()
            .withf(|to, _, _| to[0] == "member3@example.com")
            .returning(|_, _, _| Ok(()));

        let scan = OverdueScan::new(Arc::new(store), Arc::new(sink));
        let report = scan.run(date("2025-07-15")).await.unwrap();

        assert_eq!(report.notified, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("SMTP down"));
    }

    #[tokio::test]
    async fn second_run_sends_nothing() {
        let notified = Arc::new(Mutex::new(Vec::<i32>::new()));

        let mut store = MockOverdueStore::new();
        let seen = notified.clone();
        store.expect_pending_overdue().returning(move |_| {
            let done = seen.lock().unwrap();
            Ok(vec![overdue_loan(10, 2)]
                .into_iter()
                .filter(|l| !done.contains(&l.id))
                .collect())
        });
        store
            .expect_member_email()
            .returning(|_| Ok(Some("test@example.com".to_string())));
        store
            .expect_book_title()
            .returning(|_| Ok(Some("Dune".to_string())));
        let flag = notified.clone();
        store.expect_mark_notified().returning(move |id| {
            flag.lock().unwrap().push(id);
            Ok(())
        });

        let mut sink = MockNotificationSink::new();
        sink.expect_send().times(1).returning(|_, _, _| Ok(()));

        let scan = OverdueScan::new(Arc::new(store), Arc::new(sink));
        let first = scan.run(date("2025-07-15")).await.unwrap();
        let second = scan.run(date("2025-07-15")).await.unwrap();

        assert_eq!(first.notified, 1);
        assert_eq!(second, ScanReport::default());
    }

    #[test]
    fn reminder_names_title_and_due_date() {
        let body = reminder_body("Dune", date("2025-07-10"));
        assert!(body.contains("\"Dune\""));
        assert!(body.contains("2025-07-10"));
    }
}
