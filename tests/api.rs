use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

use cinema_booking::{
    app,
    cache::CacheService,
    config::Config,
    database::Database,
    models::{RegisterRequest, Role, User},
    AppState,
};

struct TestApp {
    state: Arc<AppState>,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_env(&[]).await
    }

    async fn with_env(extra: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("JWT_SECRET".to_string(), "integration-secret".to_string()),
            ("BCRYPT_COST".to_string(), "4".to_string()),
            ("LEDGER_RETRY_BACKOFF_MS".to_string(), "1".to_string()),
        ]);
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        let config = Config::from_lookup(|name| vars.get(name).cloned()).unwrap();
        let db = Database::in_memory().await.unwrap();

        Self {
            state: Arc::new(AppState::with_parts(db, CacheService::disabled(), config)),
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }

    async fn user_token(&self, email: &str) -> String {
        let (status, _) = self
            .send(
                Method::POST,
                "/api/users/register",
                None,
                Some(json!({
                    "firstName": "Test",
                    "lastName": "User",
                    "email": email,
                    "password": "secret123"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .send(
                Method::POST,
                "/api/users/login",
                None,
                Some(json!({ "email": email, "password": "secret123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        let request = RegisterRequest {
            first_name: "Admin".into(),
            last_name: "System".into(),
            email: "admin@cinema.local".into(),
            password: "admin123".into(),
        };
        let hash = self.state.credentials.hash_password(&request.password).await.unwrap();
        let admin = User::insert(&request, &hash, Role::Admin, &self.state.db).await.unwrap();
        self.state.credentials.issue_token(&admin).unwrap()
    }

    /// Creates a movie with one showtime and returns the showtime id.
    async fn screening(&self, admin: &str, price: u32) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/movies",
                Some(admin),
                Some(json!({ "title": "Dune", "duration": 155, "genres": ["Sci-Fi"] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let movie_id = body["movie"]["id"].as_i64().unwrap();

        let (status, body) = self
            .send(
                Method::POST,
                "/api/showtimes",
                Some(admin),
                Some(json!({ "movieId": movie_id, "date": "2025-06-01", "time": "14:00", "price": price })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["showtime"]["id"].as_i64().unwrap()
    }

    async fn reserve(&self, token: &str, showtime_id: i64, seats: &[&str]) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/reservations",
            Some(token),
            Some(json!({ "showtimeId": showtime_id, "seats": seats })),
        )
        .await
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
}

#[tokio::test]
async fn registration_rejects_duplicates_and_bad_input() {
    let app = TestApp::new().await;
    app.user_token("ada@example.com").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/users/register",
            None,
            Some(json!({ "firstName": "A", "lastName": "B", "email": "ada@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/users/register",
            None,
            Some(json!({ "firstName": "A", "lastName": "B", "email": "not-an-email", "password": "123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["email"].is_array());
    assert!(body["details"]["password"].is_array());
}

#[tokio::test]
async fn login_and_profile() {
    let app = TestApp::new().await;
    let token = app.user_token("grace@example.com").await;

    let (status, body) = app.send(Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "grace@example.com");
    assert_eq!(body["role"], "user");
    assert!(body.get("passwordHash").is_none());

    let (status, _) = app
        .send(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "grace@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(Method::GET, "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(Method::GET, "/api/users/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_changes_need_the_admin_role() {
    let app = TestApp::new().await;
    let user = app.user_token("user@example.com").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/movies",
            Some(&user),
            Some(json!({ "title": "Barbie", "duration": 114 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::POST, "/api/movies", None, Some(json!({ "title": "Barbie", "duration": 114 })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn movies_can_be_listed_and_deleted_with_their_showtimes() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let showtime_id = app.screening(&admin, 25).await;

    let (status, body) = app.send(Method::GET, "/api/movies?search=dune", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["totalItems"], 1);
    let movie_id = body["movies"][0]["id"].as_i64().unwrap();

    let (status, body) = app.send(Method::GET, &format!("/api/showtimes/{showtime_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movie"]["title"], "Dune");
    assert_eq!(body["time"], "14:00");

    let (status, _) = app.send(Method::DELETE, &format!("/api/movies/{movie_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, &format!("/api/showtimes/{showtime_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::DELETE, &format!("/api/movies/{movie_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn showtimes_filter_by_movie_and_date() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let showtime_id = app.screening(&admin, 25).await;

    let (_, body) = app.send(Method::GET, "/api/showtimes?date=2025-06-01", None, None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = app.send(Method::GET, "/api/showtimes?date=2025-06-02", None, None).await;
    assert!(body.as_array().unwrap().is_empty());

    let movie_id = {
        let (_, body) = app.send(Method::GET, &format!("/api/showtimes/{showtime_id}"), None, None).await;
        body["movieId"].as_i64().unwrap()
    };
    let (status, body) = app.send(Method::GET, &format!("/api/showtimes/movie/{movie_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["showtimes"][0]["id"], showtime_id);
}

#[tokio::test]
async fn reservation_lifecycle() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let showtime_id = app.screening(&admin, 25).await;
    let alice = app.user_token("alice@example.com").await;
    let bob = app.user_token("bob@example.com").await;

    let (status, body) = app.reserve(&alice, showtime_id, &["A1", "A2", "A3"]).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["reservation"]["totalPrice"], 75);
    assert_eq!(body["reservation"]["status"], "confirmed");
    let reservation_id = body["reservation"]["id"].as_i64().unwrap();

    let (status, body) = app.reserve(&bob, showtime_id, &["A3", "A4"]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["unavailableSeats"], json!(["A3"]));

    let (status, body) = app
        .send(Method::GET, &format!("/api/showtimes/{showtime_id}/seats"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["occupiedSeats"], json!(["A1", "A2", "A3"]));
    assert_eq!(body["available"], 97);
    assert_eq!(body["rows"], 10);

    let (status, body) = app.send(Method::GET, "/api/reservations/my", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], reservation_id);
    assert_eq!(body[0]["movie"]["title"], "Dune");

    // bob cannot see or cancel alice's reservation
    let (status, _) = app
        .send(Method::DELETE, &format!("/api/reservations/{reservation_id}"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/reservations/{reservation_id}"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, "/api/reservations/my", Some(&alice), None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = app.reserve(&bob, showtime_id, &["A3", "A4"]).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn single_reservation_is_visible_to_its_owner_only() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let showtime_id = app.screening(&admin, 25).await;
    let owner = app.user_token("frank@example.com").await;
    let stranger = app.user_token("grace@example.com").await;

    let (_, body) = app.reserve(&owner, showtime_id, &["F1", "F2"]).await;
    let reservation_id = body["reservation"]["id"].as_i64().unwrap();
    let uri = format!("/api/reservations/{reservation_id}");

    let (status, body) = app.send(Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["id"], reservation_id);
    assert_eq!(body["seats"], json!(["F1", "F2"]));
    assert_eq!(body["showtime"]["id"], showtime_id);
    assert_eq!(body["movie"]["title"], "Dune");

    let (status, _) = app.send(Method::GET, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(Method::GET, "/api/reservations/9999", Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // cancelled reservations stay readable by their owner
    app.send(Method::DELETE, &uri, Some(&owner), None).await;
    let (status, body) = app.send(Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
async fn reservation_input_errors() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let showtime_id = app.screening(&admin, 25).await;
    let user = app.user_token("carol@example.com").await;

    let (status, _) = app.reserve(&user, showtime_id, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.reserve(&user, showtime_id, &["A1", "Z9", "B11"]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["invalidSeats"], json!(["Z9", "B11"]));

    let (status, _) = app.reserve(&user, 9999, &["A1"]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/reservations",
            None,
            Some(json!({ "showtimeId": showtime_id, "seats": ["A1"] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn releasing_after_the_showtime_is_gone() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let showtime_id = app.screening(&admin, 25).await;
    let user = app.user_token("dave@example.com").await;

    let (_, body) = app.reserve(&user, showtime_id, &["C3"]).await;
    let reservation_id = body["reservation"]["id"].as_i64().unwrap();

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/showtimes/{showtime_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, "/api/reservations/my", Some(&user), None).await;
    assert!(body[0]["showtime"].is_null());

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/reservations/{reservation_id}"), Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn delete_release_mode_removes_the_record() {
    let app = TestApp::with_env(&[("RELEASE_MODE", "delete")]).await;
    let admin = app.admin_token().await;
    let showtime_id = app.screening(&admin, 25).await;
    let user = app.user_token("erin@example.com").await;

    let (_, body) = app.reserve(&user, showtime_id, &["D4"]).await;
    let reservation_id = body["reservation"]["id"].as_i64().unwrap();

    let uri = format!("/api/reservations/{reservation_id}");
    assert_eq!(app.send(Method::DELETE, &uri, Some(&user), None).await.0, StatusCode::OK);
    assert_eq!(app.send(Method::DELETE, &uri, Some(&user), None).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_requests_for_one_seat_book_it_once() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let showtime_id = app.screening(&admin, 25).await;

    let mut tokens = Vec::new();
    for n in 0..8 {
        tokens.push(app.user_token(&format!("fan{n}@example.com")).await);
    }

    let results = futures::future::join_all(
        tokens
            .iter()
            .map(|token| app.reserve(token, showtime_id, &["E5", "E6"])),
    )
    .await;

    let created = results.iter().filter(|(s, _)| *s == StatusCode::CREATED).count();
    let conflicts = results.iter().filter(|(s, _)| *s == StatusCode::CONFLICT).count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
}
