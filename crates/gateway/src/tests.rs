//! Router tests against an in-memory SQLite database

use super::*;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use sea_orm::{ConnectOptions, ConnectionTrait, Database};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "test-admin-token";

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some("router-test-secret".to_string());
    config.auth.admin_token = Some(ADMIN_TOKEN.to_string());
    config.rate_limit.enabled = false;
    config
}

async fn test_app() -> Router {
    test_app_with(test_config()).await
}

async fn test_app_with(config: AppConfig) -> Router {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(opts).await.unwrap();
    conn.execute_unprepared("PRAGMA foreign_keys = ON")
        .await
        .unwrap();
    ensure_schema(&conn).await.unwrap();

    let state = AppState::new(Arc::new(config), DbPool::from_connection(conn)).unwrap();
    create_router(state).unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Exchange an API key for a bearer token
async fn login(app: &Router, api_key: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/sessions",
        None,
        Some(json!({ "api_key": api_key })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

/// Provision an organization and log its owner in
async fn owner_session(app: &Router, slug: &str) -> String {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/admin/organizations")
        .header(header::CONTENT_TYPE, "application/json")
        .header(admin::ADMIN_TOKEN_HEADER, ADMIN_TOKEN)
        .body(Body::from(
            json!({
                "name": format!("{slug} school"),
                "slug": slug,
                "owner": { "name": "Olive Owner", "email": format!("owner@{slug}.test") }
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    login(app, body["api_key"].as_str().unwrap()).await
}

/// Invite a member and log them in
async fn member_session(app: &Router, owner: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/people",
        Some(owner),
        Some(json!({ "name": name, "email": format!("{}@member.test", name.to_lowercase()) })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["person"]["role"], "member");
    assert!(body["person"].get("api_key_hash").is_none());
    login(app, body["api_key"].as_str().unwrap()).await
}

async fn create_account(app: &Router, token: &str, code: &str, account_type: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/accounts",
        Some(token),
        Some(json!({ "code": code, "name": format!("Account {code}"), "account_type": account_type })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_needs_no_auth() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"]["status"], "up");
}

#[tokio::test]
async fn test_rate_limit_rejects_over_burst() {
    let mut config = test_config();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst = 1;
    let app = test_app_with(config).await;

    let (status, _) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_missing_jwt_secret_is_a_configuration_error() {
    let mut config = test_config();
    config.auth.jwt_secret = None;
    let conn = Database::connect("sqlite::memory:").await.unwrap();
    let pool = DbPool::from_connection(conn);
    assert!(matches!(
        AppState::new(Arc::new(config), pool),
        Err(AppError::Configuration { .. })
    ));
}

#[tokio::test]
async fn test_authentication_errors() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, body) = send(&app, Method::GET, "/api/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_API_KEY");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/sessions",
        None,
        Some(json!({ "api_key": format!("ck_{}", "0".repeat(64)) })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_API_KEY");
}

#[tokio::test]
async fn test_provisioning_requires_admin_token() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/organizations",
        None,
        Some(json!({
            "name": "North",
            "slug": "north",
            "owner": { "name": "Olive", "email": "olive@north.test" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let owner = owner_session(&app, "north").await;
    let (status, me) = send(&app, Method::GET, "/api/me", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["organization"]["slug"], "north");
    assert_eq!(me["person"]["role"], "owner");
}

#[tokio::test]
async fn test_journal_entry_post_and_reverse_scenario() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;
    let cash = create_account(&app, &owner, "1000", "asset").await;
    let revenue = create_account(&app, &owner, "4000", "revenue").await;

    let (status, entry) = send(
        &app,
        Method::POST,
        "/api/journal-entries",
        Some(&owner),
        Some(json!({
            "description": "Tuition received",
            "entry_date": "2026-09-15",
            "lines": [
                { "account_id": cash, "debit_cents": 10000 },
                { "account_id": revenue, "credit_cents": 10000 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{entry}");
    assert_eq!(entry["status"], "draft");
    assert_eq!(entry["fiscal_period"], "2026-09");
    assert_eq!(entry["is_balanced"], true);
    let id = entry["id"].as_str().unwrap().to_string();
    let uri = format!("/api/journal-entries/{id}");

    let (status, posted) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner),
        Some(json!({ "status": "posted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{posted}");
    assert_eq!(posted["status"], "posted");
    assert!(posted["posted_at"].is_string());

    // a posted entry is immutable and cannot be posted twice
    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner),
        Some(json!({ "status": "posted" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner),
        Some(json!({ "description": "edited" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, reversed) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner),
        Some(json!({ "status": "reversed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{reversed}");
    assert_eq!(reversed["status"], "reversed");
    let reversal_id = reversed["reversed_by_entry_id"].as_str().unwrap().to_string();

    let (status, reversal) = send(
        &app,
        Method::GET,
        &format!("/api/journal-entries/{reversal_id}"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reversal["status"], "posted");
    assert_eq!(reversal["reverses_entry_id"], id.as_str());
    assert_eq!(reversal["fiscal_period"], "2026-09");
    assert_eq!(reversal["lines"][0]["account_id"], cash.as_str());
    assert_eq!(reversal["lines"][0]["credit_cents"], 10000);
    assert_eq!(reversal["lines"][0]["debit_cents"], 0);
    assert_eq!(reversal["lines"][1]["debit_cents"], 10000);

    let (status, balance) = send(
        &app,
        Method::GET,
        "/api/accounting/trial-balance?fiscal_period=2026-09",
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["is_balanced"], true);
    assert_eq!(balance["total_debit_cents"], balance["total_credit_cents"]);
}

#[tokio::test]
async fn test_unbalanced_entry_cannot_be_posted() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;
    let cash = create_account(&app, &owner, "1000", "asset").await;
    let revenue = create_account(&app, &owner, "4000", "revenue").await;

    let (_, entry) = send(
        &app,
        Method::POST,
        "/api/journal-entries",
        Some(&owner),
        Some(json!({
            "description": "Typo",
            "entry_date": "2026-09-15",
            "lines": [
                { "account_id": cash, "debit_cents": 10000 },
                { "account_id": revenue, "credit_cents": 9000 }
            ]
        })),
    )
    .await;
    let id = entry["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/journal-entries/{id}/post"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "UNBALANCED_ENTRY");

    let (_, still) = send(
        &app,
        Method::GET,
        &format!("/api/journal-entries/{id}"),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(still["status"], "draft");
}

#[tokio::test]
async fn test_rejected_post_discards_draft_edits() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;
    let cash = create_account(&app, &owner, "1000", "asset").await;
    let revenue = create_account(&app, &owner, "4000", "revenue").await;

    let (_, entry) = send(
        &app,
        Method::POST,
        "/api/journal-entries",
        Some(&owner),
        Some(json!({
            "description": "Tuition received",
            "entry_date": "2026-09-15",
            "lines": [
                { "account_id": cash, "debit_cents": 100 },
                { "account_id": revenue, "credit_cents": 100 }
            ]
        })),
    )
    .await;
    let uri = format!("/api/journal-entries/{}", entry["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner),
        Some(json!({
            "status": "posted",
            "description": "EDITED",
            "lines": [
                { "account_id": cash, "debit_cents": 100 },
                { "account_id": revenue, "credit_cents": 99 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "UNBALANCED_ENTRY");

    let (_, still) = send(&app, Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(still["status"], "draft");
    assert_eq!(still["description"], "Tuition received");
    assert_eq!(still["lines"][1]["credit_cents"], 100);
    assert_eq!(still["is_balanced"], true);

    let (status, posted) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner),
        Some(json!({ "status": "posted", "description": "EDITED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{posted}");
    assert_eq!(posted["status"], "posted");
    assert_eq!(posted["description"], "EDITED");
}

#[tokio::test]
async fn test_members_cannot_post() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;
    let member = member_session(&app, &owner, "Mia").await;
    let cash = create_account(&app, &owner, "1000", "asset").await;
    let revenue = create_account(&app, &owner, "4000", "revenue").await;

    let (_, entry) = send(
        &app,
        Method::POST,
        "/api/journal-entries",
        Some(&member),
        Some(json!({
            "description": "Fees",
            "entry_date": "2026-09-15",
            "lines": [
                { "account_id": cash, "debit_cents": 500 },
                { "account_id": revenue, "credit_cents": 500 }
            ]
        })),
    )
    .await;
    let id = entry["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/journal-entries/{id}"),
        Some(&member),
        Some(json!({ "status": "posted" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_cross_tenant_ids_are_not_found() {
    let app = test_app().await;
    let north = owner_session(&app, "north").await;
    let south = owner_session(&app, "south").await;

    let (status, lead) = send(
        &app,
        Method::POST,
        "/api/leads",
        Some(&north),
        Some(json!({ "name": "Prospective parent", "estimated_value_cents": 120000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/leads/{}", lead["id"].as_str().unwrap());

    let (status, body) = send(&app, Method::GET, &uri, Some(&south), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&south),
        Some(json!({ "status": "contacted" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, unchanged) = send(&app, Method::GET, &uri, Some(&north), None).await;
    assert_eq!(unchanged["status"], "new");

    let (_, listed) = send(&app, Method::GET, "/api/leads", Some(&south), None).await;
    assert_eq!(listed["total"], 0);
}

#[tokio::test]
async fn test_kaizen_vote_tally() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;
    let member = member_session(&app, &owner, "Mia").await;

    let (status, suggestion) = send(
        &app,
        Method::POST,
        "/api/kaizen/suggestions",
        Some(&owner),
        Some(json!({ "title": "Badge printer", "description": "Print visitor badges at the desk" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    // the author's upvote comes with the suggestion
    assert_eq!(suggestion["score"], 1);
    assert_eq!(suggestion["my_vote"], 1);
    let vote_uri = format!(
        "/api/kaizen/suggestions/{}/vote",
        suggestion["id"].as_str().unwrap()
    );

    let (_, after) = send(&app, Method::PUT, &vote_uri, Some(&member), Some(json!({ "value": -1 }))).await;
    assert_eq!(after["upvotes"], 1);
    assert_eq!(after["downvotes"], 1);
    assert_eq!(after["score"], 0);

    let (_, after) = send(&app, Method::PUT, &vote_uri, Some(&member), Some(json!({ "value": 1 }))).await;
    assert_eq!(after["score"], 2);
    assert_eq!(after["downvotes"], 0);

    let (_, after) = send(&app, Method::DELETE, &vote_uri, Some(&member), None).await;
    assert_eq!(after["score"], 1);
    assert_eq!(after["my_vote"], Value::Null);

    let (status, body) = send(&app, Method::PUT, &vote_uri, Some(&member), Some(json!({ "value": 3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_rejected_review_discards_suggestion_edits() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;

    let (_, suggestion) = send(
        &app,
        Method::POST,
        "/api/kaizen/suggestions",
        Some(&owner),
        Some(json!({ "title": "Badge printer", "description": "Print visitor badges at the desk" })),
    )
    .await;
    let uri = format!("/api/kaizen/suggestions/{}", suggestion["id"].as_str().unwrap());

    // submitted cannot jump straight to implemented
    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner),
        Some(json!({ "title": "EDITED", "status": "implemented" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (_, still) = send(&app, Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(still["status"], "submitted");
    assert_eq!(still["title"], "Badge printer");

    let (status, moved) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner),
        Some(json!({ "title": "EDITED", "status": "under_review" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{moved}");
    assert_eq!(moved["status"], "under_review");
    assert_eq!(moved["title"], "EDITED");
}

#[tokio::test]
async fn test_invoice_round_trip_and_summary() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/invoices",
        Some(&owner),
        Some(json!({
            "number": "INV-0001",
            "customer_name": "Family Silva",
            "issue_date": "2026-09-01",
            "due_date": "2026-09-30",
            "gross_cents": 50000,
            "discount_cents": 5000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["net_cents"], 45000);
    assert_eq!(created["status"], "draft");

    let (status, fetched) = send(
        &app,
        Method::GET,
        &format!("/api/invoices/{}", created["id"].as_str().unwrap()),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    for field in ["id", "number", "customer_name", "issue_date", "due_date", "gross_cents", "net_cents", "status"] {
        assert_eq!(fetched[field], created[field], "{field}");
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/invoices",
        Some(&owner),
        Some(json!({
            "number": "INV-0001",
            "customer_name": "Family Costa",
            "issue_date": "2026-09-01",
            "due_date": "2026-09-30",
            "gross_cents": 100
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE");

    let (status, summary) = send(&app, Method::GET, "/api/invoices/summary", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total"], 1);
}

#[tokio::test]
async fn test_request_body_errors() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/leads")
        .header(header::AUTHORIZATION, format!("Bearer {owner}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "INVALID_FORMAT");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/leads",
        Some(&owner),
        Some(json!({ "name": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["field"], "name");
}

#[tokio::test]
async fn test_list_pagination() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;
    for name in ["Ana", "Bruno", "Carla"] {
        send(
            &app,
            Method::POST,
            "/api/tickets",
            Some(&owner),
            Some(json!({ "subject": format!("{name} cannot log in"), "description": "Password reset" })),
        )
        .await;
    }

    let (status, page) = send(&app, Method::GET, "/api/tickets?limit=2&offset=1", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["limit"], 2);
    assert_eq!(page["offset"], 1);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);

    let (_, open) = send(&app, Method::GET, "/api/tickets?status=open", Some(&owner), None).await;
    assert_eq!(open["total"], 3);
}

#[tokio::test]
async fn test_meeting_decisions_need_a_manager() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;
    let member = member_session(&app, &owner, "Mia").await;

    let (status, meeting) = send(
        &app,
        Method::POST,
        "/api/meetings",
        Some(&member),
        Some(json!({
            "title": "Parent evening",
            "starts_at": "2026-11-03T18:00:00+00:00",
            "ends_at": "2026-11-03T20:00:00+00:00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{meeting}");
    assert_eq!(meeting["approval"], "pending");
    let decision = format!("/api/meetings/{}/decision", meeting["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::POST, &decision, Some(&member), Some(json!({ "approval": "approved" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::POST, &decision, Some(&owner), Some(json!({ "approval": "rejected" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_FIELD");

    let (status, approved) = send(&app, Method::POST, &decision, Some(&owner), Some(json!({ "approval": "approved" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["approval"], "approved");

    let (_, dashboard) = send(&app, Method::GET, "/api/dashboard", Some(&owner), None).await;
    assert_eq!(dashboard["pending_meetings"], 0);
}

#[tokio::test]
async fn test_transcript_appends_in_order() {
    let app = test_app().await;
    let owner = owner_session(&app, "north").await;
    let (_, meeting) = send(
        &app,
        Method::POST,
        "/api/meetings",
        Some(&owner),
        Some(json!({
            "title": "Staff sync",
            "starts_at": "2026-11-03T08:00:00+00:00",
            "ends_at": "2026-11-03T08:30:00+00:00"
        })),
    )
    .await;
    let uri = format!("/api/meetings/{}/transcript", meeting["id"].as_str().unwrap());

    let (status, first) = send(&app, Method::POST, &uri, Some(&owner), Some(json!({ "content": "Good morning" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["chunk_index"], 0);
    send(&app, Method::POST, &uri, Some(&owner), Some(json!({ "content": "Agenda first", "speaker": "Olive" }))).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&owner),
        Some(json!({ "content": "out of order", "chunk_index": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, transcript) = send(&app, Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(transcript["chunks"].as_array().unwrap().len(), 2);
    assert_eq!(transcript["text"], "Good morning\nAgenda first");
}
