//! API integration tests
//!
//! These run against a live server with a migrated database and Redis:
//! `cargo test -- --ignored`. The administrator credentials come from
//! `TEST_ADMIN_EMAIL` / `TEST_ADMIN_PASSWORD` and must match the server's
//! bootstrap administrator.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn admin_credentials() -> (String, String) {
    (
        std::env::var("TEST_ADMIN_EMAIL").unwrap_or_else(|_| "admin@bibliotheca.local".to_string()),
        std::env::var("TEST_ADMIN_PASSWORD").unwrap_or_else(|_| "change-me-too".to_string()),
    )
}

/// Short random suffix so repeated runs do not collide on unique columns
fn unique() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

async fn login(client: &Client, email: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Helper to get an administrator token
async fn get_auth_token(client: &Client) -> String {
    let (email, password) = admin_credentials();
    login(client, &email, &password).await
}

async fn create_book(client: &Client, token: &str) -> Value {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "title": format!("Test Book {}", unique()),
            "author": "Test Author",
            "isbn": unique(),
            "publish_date": "2020-01-01"
        }))
        .send()
        .await
        .expect("Failed to create book");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.expect("Failed to parse book")
}

async fn create_member(client: &Client, token: &str, name: &str) -> Value {
    let suffix = unique();
    let response = client
        .post(format!("{}/members", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "full_name": name,
            "membership_id": format!("TM{}", suffix),
            "email": format!("member{}@example.com", suffix),
            "phone": "123456789",
            "create_linked_identity": false
        }))
        .send()
        .await
        .expect("Failed to create member");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.expect("Failed to parse member")
}

async fn create_loan(client: &Client, token: &str, book_id: &Value, member_id: &Value, from: &str, to: &str) -> reqwest::Response {
    client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "book_id": book_id,
            "member_id": member_id,
            "loan_date": from,
            "return_date": to
        }))
        .send()
        .await
        .expect("Failed to send loan request")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness_checks_database() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();
    let (email, _) = admin_credentials();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "NotAuthenticated");
}

#[tokio::test]
#[ignore]
async fn test_get_current_user() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["roles"]
        .as_array()
        .expect("roles array")
        .iter()
        .any(|r| r == "admin"));
}

#[tokio::test]
#[ignore]
async fn test_logout_revokes_token() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .post(format!("{}/auth/logout", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_books_are_public_but_writes_need_a_token() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({ "title": "T", "author": "A", "isbn": unique() }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_isbn_conflicts() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let book = create_book(&client, &token).await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "title": "Copy", "author": "Someone", "isbn": book["isbn"] }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_member_validation() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .post(format!("{}/members", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "full_name": "Test Member",
            "membership_id": format!("TM{}", unique()),
            "email": "test@example.com",
            "phone": "12-34"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_librarian_created_member_can_log_in() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let email = format!("member{}@example.com", unique());

    let response = client
        .post(format!("{}/members", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "full_name": "Test Member",
            "membership_id": format!("TM{}", unique()),
            "email": email,
            "phone": "123456789"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/members", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "full_name": "Test Member",
            "membership_id": format!("TM{}", unique()),
            "email": email,
            "phone": "123456789",
            "password": "secret123"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    login(&client, &email, "secret123").await;
}

#[tokio::test]
#[ignore]
async fn test_overlapping_loan_is_rejected() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let book = create_book(&client, &token).await;
    let first = create_member(&client, &token, "Test Member").await;
    let second = create_member(&client, &token, "Other Member").await;

    let response = create_loan(&client, &token, &book["id"], &first["id"], "2025-07-14", "2025-07-20").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = create_loan(&client, &token, &book["id"], &second["id"], "2025-07-15", "2025-07-21").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["message"].as_str().unwrap_or_default().contains("Test Member"));
}

#[tokio::test]
#[ignore]
async fn test_inverted_loan_period_is_rejected() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let book = create_book(&client, &token).await;
    let member = create_member(&client, &token, "Test Member").await;

    let response = create_loan(&client, &token, &book["id"], &member["id"], "2025-07-20", "2025-07-14").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_returned_book_can_be_lent_again() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let book = create_book(&client, &token).await;
    let member = create_member(&client, &token, "Test Member").await;

    let response = create_loan(&client, &token, &book["id"], &member["id"], "2025-07-01", "2025-07-10").await;
    let loan: Value = response.json().await.expect("Failed to parse loan");

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan["id"]))
        .bearer_auth(&token)
        .json(&json!({ "returned_on": "2025-07-08" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = create_loan(&client, &token, &book["id"], &member["id"], "2025-07-09", "2025-07-16").await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
#[ignore]
async fn test_reservation_rules() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let book = create_book(&client, &token).await;
    let idle_book = create_book(&client, &token).await;
    let borrower = create_member(&client, &token, "Borrower").await;
    let waiting = create_member(&client, &token, "Waiting Member").await;

    let response = create_loan(&client, &token, &book["id"], &borrower["id"], "2025-07-01", "2025-07-10").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let reserve = |book_id: Value, member_id: Value| {
        client
            .post(format!("{}/reservations", BASE_URL))
            .bearer_auth(&token)
            .json(&json!({
                "book_id": book_id,
                "member_id": member_id,
                "reservation_date": "2025-07-15"
            }))
            .send()
    };

    // Unreturned loan: still out on the 15th
    let response = reserve(book["id"].clone(), waiting["id"].clone()).await.expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = reserve(book["id"].clone(), waiting["id"].clone()).await.expect("request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = reserve(idle_book["id"].clone(), waiting["id"].clone()).await.expect("request");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["message"].as_str().unwrap_or_default().contains("currently available"));
}

#[tokio::test]
#[ignore]
async fn test_register_then_duplicate_email_conflicts() {
    let client = Client::new();
    let suffix = unique();
    let email = format!("reader{}@example.com", suffix);

    let register = |membership_id: String| {
        client
            .post(format!("{}/auth/register", BASE_URL))
            .json(&json!({
                "full_name": "Test Reader",
                "membership_id": membership_id,
                "email": email,
                "phone": "+251911234567",
                "password": "reader-pass"
            }))
            .send()
    };

    let response = register(format!("TR{}", suffix)).await.expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = register(format!("TX{}", suffix)).await.expect("request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The second attempt wrote nothing
    let token = get_auth_token(&client).await;
    let members: Value = client
        .get(format!("{}/members", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("Failed to parse members");
    let count = members
        .as_array()
        .expect("members array")
        .iter()
        .filter(|m| m["email"] == email.as_str())
        .count();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore]
async fn test_member_sees_only_own_loans() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let suffix = unique();
    let email = format!("self{}@example.com", suffix);

    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "full_name": "Self Service",
            "membership_id": format!("SS{}", suffix),
            "email": email,
            "phone": "123456789",
            "password": "reader-pass"
        }))
        .send()
        .await
        .expect("request");
    let me: Value = response.json().await.expect("Failed to parse member");

    let other = create_member(&client, &token, "Other Member").await;
    let book = create_book(&client, &token).await;
    let other_book = create_book(&client, &token).await;
    create_loan(&client, &token, &book["id"], &me["id"], "2025-07-01", "2025-07-05").await;
    create_loan(&client, &token, &other_book["id"], &other["id"], "2025-07-01", "2025-07-05").await;

    let member_token = login(&client, &email, "reader-pass").await;
    let loans: Value = client
        .get(format!("{}/loans", BASE_URL))
        .bearer_auth(&member_token)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("Failed to parse loans");
    let loans = loans.as_array().expect("loans array");
    assert!(!loans.is_empty());
    assert!(loans.iter().all(|l| l["member_id"] == me["id"]));

    // Librarian-only routes stay closed
    let response = client
        .get(format!("{}/reports/current-loans", BASE_URL))
        .bearer_auth(&member_token)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_member_history_export() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let book = create_book(&client, &token).await;
    let member = create_member(&client, &token, "Test Member").await;

    let response = client
        .get(format!("{}/members/{}/loans/export", BASE_URL, member["id"]))
        .bearer_auth(&token)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    create_loan(&client, &token, &book["id"], &member["id"], "2025-07-14", "2025-07-20").await;

    let response = client
        .get(format!("{}/members/{}/loans/export", BASE_URL, member["id"]))
        .bearer_auth(&token)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .starts_with("text/csv"));

    let text = response.text().await.expect("body");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Loan ID,Book Title,Loan Date,Return Date"));
    assert!(lines.next().unwrap_or_default().ends_with("2025-07-14,2025-07-20"));
}

#[tokio::test]
#[ignore]
async fn test_overdue_scan_on_demand() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .post(format!("{}/jobs/overdue-scan", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let report: Value = response.json().await.expect("Failed to parse report");
    assert!(report["examined"].is_number());
    assert!(report["notified"].is_number());
    assert!(report["failures"].is_array());
}
