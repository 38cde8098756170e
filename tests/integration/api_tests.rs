//! API integration tests
//!
//! These expect a running server with a seeded admin account
//! (admin@pustaka.sch.id / admin123).

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:3000";

/// Helper to get an admin auth token
async fn get_auth_token(client: &Client) -> String {
    let response = client
        .post(format!("{}/api/auth/login", BASE_URL))
        .json(&json!({
            "email": "admin@pustaka.sch.id",
            "password": "admin123"
        }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["data"]["token"]
        .as_str()
        .expect("No token in response")
        .to_string()
}

/// Helper to get the authenticated user's own ID
async fn get_own_id(client: &Client, token: &str) -> i64 {
    let response = client
        .get(format!("{}/api/user/profile", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send profile request");

    let body: Value = response.json().await.expect("Failed to parse profile");
    body["data"]["id"].as_i64().expect("No user ID")
}

/// Helper to create a book and return its ID
async fn create_book(client: &Client, token: &str, number: &str) -> i64 {
    let form = reqwest::multipart::Form::new()
        .text("number", number.to_string())
        .text("title", "Test Book")
        .text("level", "X")
        .text("author", "Test Author")
        .text("titleCode", "TB")
        .text("authorCode", "TA");

    let response = client
        .post(format!("{}/api/book", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["data"]["id"].as_i64().expect("No book ID")
}

async fn delete_book(client: &Client, token: &str, id: i64) {
    let _ = client
        .delete(format!("{}/api/book/{}", BASE_URL, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await;
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
async fn test_readiness_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_login() {
    let client = Client::new();

    let response = client
        .post(format!("{}/api/auth/login", BASE_URL))
        .json(&json!({
            "email": "admin@pustaka.sch.id",
            "password": "admin123"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], true);
    assert!(body["data"]["token"].is_string());
    assert!(body["data"]["user"]["password"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/api/auth/login", BASE_URL))
        .json(&json!({
            "email": "admin@pustaka.sch.id",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/api/book", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_list_books_envelope() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/api/book?page=1&limit=10", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], true);
    assert!(body["data"].is_array());
    assert!(body["stats"]["total"].is_number());
    assert!(body["stats"]["available"].is_number());
    assert!(body["stats"]["borrowed"].is_number());
    assert!(body["filters"]["levels"].is_array());
    assert_eq!(body["pagination"]["currentPage"], 1);
    assert_eq!(body["pagination"]["itemsPerPage"], 10);
}

#[tokio::test]
#[ignore]
async fn test_borrow_return_cycle() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let user_id = get_own_id(&client, &token).await;
    let book_id = create_book(&client, &token, "CYCLE-001").await;

    // Borrow
    let response = client
        .post(format!("{}/api/borrow/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"userId": user_id}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["book"]["status"], "borrowed");
    assert_eq!(body["data"]["transaction"]["status"], "borrowed");

    // A second borrow must be rejected
    let response = client
        .post(format!("{}/api/borrow/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"userId": user_id}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // Deleting a borrowed book must be rejected
    let response = client
        .delete(format!("{}/api/book/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // Return
    let response = client
        .post(format!("{}/api/borrow/{}/return", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["book"]["status"], "available");
    assert_eq!(body["data"]["transaction"]["status"], "returned");
    assert!(body["data"]["transaction"]["returnedAt"].is_string());

    // Returning again must be rejected
    let response = client
        .post(format!("{}/api/borrow/{}/return", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // Borrowing again opens a second ledger entry
    let response = client
        .post(format!("{}/api/borrow/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"userId": user_id}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/api/borrow/{}/return", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    // Both loans are in the book's history
    let response = client
        .get(format!("{}/api/book/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["history"].as_array().map(|h| h.len()), Some(2));

    // With one loan reopened, a status-filtered listing still counts
    // both sides of the split; only the total follows the filter
    let response = client
        .post(format!("{}/api/borrow/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"userId": user_id}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let response = client
        .get(format!(
            "{}/api/borrow/transactions?status=returned&search=CYCLE-001",
            BASE_URL
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"].as_array().map(|t| t.len()), Some(2));
    assert_eq!(body["stats"]["borrowed"], 1);
    assert_eq!(body["stats"]["returned"], 2);
    assert_eq!(body["stats"]["total"], 2);
    assert_eq!(body["pagination"]["totalItems"], 2);

    let response = client
        .post(format!("{}/api/borrow/{}/return", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    delete_book(&client, &token, book_id).await;
}

#[tokio::test]
#[ignore]
async fn test_borrow_with_past_due_date() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let user_id = get_own_id(&client, &token).await;
    let book_id = create_book(&client, &token, "PAST-001").await;

    let response = client
        .post(format!("{}/api/borrow/{}/borrow", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"userId": user_id, "dueDate": "2000-01-01"}))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);

    delete_book(&client, &token, book_id).await;
}

#[tokio::test]
#[ignore]
async fn test_borrow_missing_book() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let user_id = get_own_id(&client, &token).await;

    let response = client
        .post(format!("{}/api/borrow/999999/borrow", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"userId": user_id}))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_book_number() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let book_id = create_book(&client, &token, "DUP-001").await;

    let form = reqwest::multipart::Form::new()
        .text("number", "DUP-001")
        .text("title", "Another Book")
        .text("level", "XI")
        .text("author", "Another Author")
        .text("titleCode", "AB")
        .text("authorCode", "AA");

    let response = client
        .post(format!("{}/api/book", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);

    delete_book(&client, &token, book_id).await;
}

#[tokio::test]
#[ignore]
async fn test_transactions_listing() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!(
            "{}/api/borrow/transactions?status=all&page=1&limit=5",
            BASE_URL
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"].is_array());
    assert!(body["stats"]["borrowed"].is_number());
    assert!(body["stats"]["returned"].is_number());
    assert!(body["pagination"]["totalPages"].is_number());
}

#[tokio::test]
#[ignore]
async fn test_dashboard_stats() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    for range in ["today", "yesterday", "7d", "30d", "all"] {
        let response = client
            .get(format!("{}/api/borrow/stats?range={}", BASE_URL, range))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(body["data"]["range"], range);
        assert!(body["data"]["borrowed"].is_number());
        assert!(body["data"]["books"]["total"].is_number());
        assert!(body["data"]["users"]["total"].is_number());
        assert!(body["data"]["popularBooks"].is_array());
        assert!(
            body["data"]["popularBooks"]
                .as_array()
                .map(|b| b.len() <= 5)
                .unwrap_or(false)
        );
    }

    // Unknown ranges still resolve (one-day window ending now)
    let response = client
        .get(format!("{}/api/borrow/stats?range=fortnight", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["range"], "fortnight");
    assert!(body["data"]["monthlyData"].as_array().map(|m| m.is_empty()).unwrap_or(false));

    // Omitting the range entirely falls back to the last seven days
    let response = client
        .get(format!("{}/api/borrow/stats", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["range"], "7d");
}

#[tokio::test]
#[ignore]
async fn test_get_ranges() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/api/borrow/getRange", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    let ranges = body["data"].as_array().expect("No ranges");
    assert_eq!(ranges.len(), 5);
    assert_eq!(ranges[0]["value"], "today");
}

#[tokio::test]
#[ignore]
async fn test_register_is_regular_user() {
    let client = Client::new();

    let response = client
        .post(format!("{}/api/auth/register", BASE_URL))
        .json(&json!({
            "username": "newreader",
            "email": format!("reader{}@pustaka.sch.id", std::process::id()),
            "password": "secret123"
        }))
        .send()
        .await
        .expect("Failed to send request");

    if response.status() == 201 {
        let body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(body["data"]["user"]["role"], "user");
        assert!(body["data"]["token"].is_string());
    } else {
        // Already registered from a previous run
        assert_eq!(response.status(), 409);
    }
}

#[tokio::test]
#[ignore]
async fn test_non_admin_cannot_list_users() {
    let client = Client::new();

    let email = format!("limited{}@pustaka.sch.id", std::process::id());
    let response = client
        .post(format!("{}/api/auth/register", BASE_URL))
        .json(&json!({
            "username": "limiteduser",
            "email": email,
            "password": "secret123"
        }))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    let token = body["data"]["token"].as_str().expect("No token");

    let response = client
        .get(format!("{}/api/user", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}
