//! End-to-end tests against a running server
//!
//! Start the server (`RUN_MODE=development cargo run`), then:
//! `cargo test --test api_tests -- --ignored --test-threads=1`

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn register_owner(client: &Client) -> (String, String) {
    let email = format!("{}@libris.test", unique("owner"));
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "name": "Owner",
            "email": email,
            "password": "owner-password",
            "role": "owner"
        }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), 201);

    let token = login(client, &email, "owner-password").await;
    (email, token)
}

async fn login(client: &Client, email: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn post(client: &Client, token: &str, path: &str, body: Value) -> (u16, Value) {
    let response = client
        .post(format!("{}{}", BASE_URL, path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status().as_u16();
    (status, response.json().await.unwrap_or(Value::Null))
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
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": "nobody@libris.test",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_lending_round_trip() {
    let client = Client::new();
    let (_, owner) = register_owner(&client).await;

    let (status, library) = post(
        &client,
        &owner,
        "/libraries",
        json!({ "name": "Central", "location": "Main street" }),
    )
    .await;
    assert_eq!(status, 201);
    let library_id = library["id"].as_i64().unwrap();

    let admin_email = format!("{}@libris.test", unique("admin"));
    let (status, _) = post(
        &client,
        &owner,
        "/users/admins",
        json!({
            "name": "Admin",
            "email": admin_email,
            "password": "admin-password",
            "library_ids": [library_id]
        }),
    )
    .await;
    assert_eq!(status, 201);
    let admin = login(&client, &admin_email, "admin-password").await;

    let reader_email = format!("{}@libris.test", unique("reader"));
    let (status, _) = post(
        &client,
        &admin,
        "/users/readers",
        json!({
            "name": "Reader",
            "email": reader_email,
            "password": "reader-password",
            "library_ids": [library_id]
        }),
    )
    .await;
    assert_eq!(status, 201);
    let reader = login(&client, &reader_email, "reader-password").await;

    let (status, _) = post(
        &client,
        &admin,
        &format!("/libraries/{}/books", library_id),
        json!({ "isbn": "123456789", "title": "Dune", "total_copies": 3 }),
    )
    .await;
    assert_eq!(status, 201);

    let (status, request) = post(
        &client,
        &reader,
        "/requests/issue",
        json!({ "isbn": "123456789", "library_id": library_id }),
    )
    .await;
    assert_eq!(status, 201);

    let response = client
        .put(format!("{}/requests/{}/approve", BASE_URL, request["id"]))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let book: Value = client
        .get(format!("{}/libraries/{}/books/123456789", BASE_URL, library_id))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(book["available_copies"], 2);
}
