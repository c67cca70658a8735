//! End-to-end API tests against a real Postgres.
//!
//! Run with `DATABASE_URL` pointing at a server where the test user may
//! create databases, then `cargo test -- --ignored`.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use tower::ServiceExt;

use theatre_booking::{
    app,
    cache::CacheService,
    config::Config,
    database::Database,
    models::{user::RegisterUser, User},
    services::auth::{hash_password, issue_token},
    AppState,
};

struct Harness {
    state: Arc<AppState>,
}

impl Harness {
    fn new(pool: PgPool) -> Self {
        Self::build(pool, None)
    }

    fn with_cache(pool: PgPool, cache: CacheService) -> Self {
        Self::build(pool, Some(cache))
    }

    fn build(pool: PgPool, cache: Option<CacheService>) -> Self {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "postgres://unused"),
            ("JWT_SECRET", "api-test-secret"),
            ("ENABLE_CACHE", "false"),
        ]);
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
        let state = Arc::new(AppState { db: Database::from_pool(pool), cache, config });
        Harness { state }
    }

    async fn user(&self, email: &str, is_staff: bool) -> String {
        let form = RegisterUser {
            email: email.to_string(),
            password: "password123".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        let hash = hash_password(&form.password).unwrap();
        let user = if is_staff {
            User::upsert_staff(&self.state.db.pool, email, &hash).await.unwrap()
        } else {
            User::create(&self.state.db.pool, &form, &hash).await.unwrap()
        };
        let token = issue_token(&self.state.config.jwt, &user).unwrap();
        format!("Bearer {}", token.access)
    }

    async fn call(&self, method: Method, uri: &str, auth: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, auth);
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app(self.state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Performance list plus its `X-Cache` marker.
    async fn schedule(&self, auth: &str) -> (String, Value) {
        let req = Request::builder()
            .uri("/api/theatre/performances")
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap();
        let response = app(self.state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let marker = response.headers()["x-cache"].to_str().unwrap().to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (marker, serde_json::from_slice(&bytes).unwrap())
    }

    /// First read after a write must miss, the next one must hit.
    async fn assert_schedule_refreshed(&self, auth: &str, after: &str) -> Value {
        let (marker, fresh) = self.schedule(auth).await;
        assert_eq!(marker, "MISS", "cache survived {after}");
        let (marker, cached) = self.schedule(auth).await;
        assert_eq!(marker, "HIT", "page not cached after {after}");
        assert_eq!(fresh, cached);
        fresh
    }

    async fn create(&self, uri: &str, auth: &str, body: Value) -> Value {
        let (status, body) = self.call(Method::POST, uri, auth, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "POST {uri}: {body}");
        body
    }
}

/// Hall with 2 rows of 3 seats and one performance in it.
async fn small_show(h: &Harness, staff: &str) -> (i64, i64) {
    let hall = h
        .create("/api/theatre/halls", staff, json!({"name": "Small", "rows": 2, "seats_in_row": 3}))
        .await;
    let play = h
        .create("/api/theatre/plays", staff, json!({"title": "Hamlet", "description": "Tragedy"}))
        .await;
    let performance = h
        .create(
            "/api/theatre/performances",
            staff,
            json!({"play": play["id"], "theatre_hall": hall["id"], "show_time": "2022-10-23T19:00:00Z"}),
        )
        .await;
    (hall["id"].as_i64().unwrap(), performance["id"].as_i64().unwrap())
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn play_filters_match_any_listed_id(pool: PgPool) {
    let h = Harness::new(pool);
    let staff = h.user("staff@theatre.test", true).await;

    let drama = h.create("/api/theatre/genres", &staff, json!({"name": "Drama"})).await;
    let comedy = h.create("/api/theatre/genres", &staff, json!({"name": "Comedy"})).await;
    let actor = h
        .create("/api/theatre/actors", &staff, json!({"first_name": "Ian", "last_name": "McKellen"}))
        .await;

    h.create(
        "/api/theatre/plays",
        &staff,
        json!({"title": "Both", "genres": [drama["id"], comedy["id"]], "actors": [actor["id"]]}),
    )
    .await;
    h.create("/api/theatre/plays", &staff, json!({"title": "Only drama", "genres": [drama["id"]]}))
        .await;
    h.create("/api/theatre/plays", &staff, json!({"title": "Neither"})).await;

    let uri = format!("/api/theatre/plays?genres={},{}", drama["id"], comedy["id"]);
    let (status, page) = h.call(Method::GET, &uri, &staff, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2, "a play matching two genres is listed once");

    let both = &page["results"][0];
    assert_eq!(both["actors"], json!(["Ian McKellen"]));
    assert_eq!(both["genres"], json!(["Drama", "Comedy"]));

    let (_, page) = h.call(Method::GET, "/api/theatre/plays?search=DRAMA", &staff, None).await;
    assert_eq!(page["count"], 1);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn play_with_unknown_relation_is_rejected(pool: PgPool) {
    let h = Harness::new(pool);
    let staff = h.user("staff@theatre.test", true).await;

    let (status, body) = h
        .call(
            Method::POST,
            "/api/theatre/plays",
            &staff,
            Some(json!({"title": "Ghost", "actors": [999]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["actors"][0], "Invalid pk \"999\" - object does not exist.");
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn seats_are_bounded_unique_and_counted(pool: PgPool) {
    let h = Harness::new(pool);
    let staff = h.user("staff@theatre.test", true).await;
    let viewer = h.user("viewer@theatre.test", false).await;
    let (_, performance) = small_show(&h, &staff).await;

    let reservation = h.create("/api/theatre/reservations", &viewer, json!({})).await;
    let ticket = |row: i32, seat: i32| {
        json!({"row": row, "seat": seat, "performance": performance, "reservation": reservation["id"]})
    };

    let (status, body) =
        h.call(Method::POST, "/api/theatre/tickets", &viewer, Some(ticket(3, 1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["row"][0],
        "row number must be in available range: (1, rows): (1, 2)"
    );

    let (status, body) =
        h.call(Method::POST, "/api/theatre/tickets", &viewer, Some(ticket(1, 4))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["seat"].is_array());

    h.create("/api/theatre/tickets", &viewer, ticket(2, 3)).await;
    let (status, body) =
        h.call(Method::POST, "/api/theatre/tickets", &viewer, Some(ticket(2, 3))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "The fields performance, row, seat must make a unique set.");

    let (_, page) = h.call(Method::GET, "/api/theatre/performances", &viewer, None).await;
    assert_eq!(page["results"][0]["tickets_available"], 5);

    let (_, detail) = h
        .call(Method::GET, &format!("/api/theatre/performances/{performance}"), &viewer, None)
        .await;
    assert_eq!(detail["taken_seats"], json!([{"row": 2, "seat": 3}]));
    assert_eq!(detail["tickets_available"], 5);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn reservations_are_private_to_their_owner(pool: PgPool) {
    let h = Harness::new(pool);
    let staff = h.user("staff@theatre.test", true).await;
    let alice = h.user("alice@theatre.test", false).await;
    let bob = h.user("bob@theatre.test", false).await;
    let (_, performance) = small_show(&h, &staff).await;

    let reservation = h.create("/api/theatre/reservations", &alice, json!({})).await;
    let id = reservation["id"].as_i64().unwrap();

    let (status, _) = h
        .call(Method::GET, &format!("/api/theatre/reservations/{id}"), &bob, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .call(
            Method::POST,
            "/api/theatre/tickets",
            &bob,
            Some(json!({"row": 1, "seat": 1, "performance": performance, "reservation": id})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, page) = h.call(Method::GET, "/api/theatre/reservations", &bob, None).await;
    assert_eq!(page["count"], 0);
    let (_, page) = h.call(Method::GET, "/api/theatre/reservations", &staff, None).await;
    assert_eq!(page["count"], 1);

    let (status, _) = h
        .call(Method::DELETE, &format!("/api/theatre/reservations/{id}"), &bob, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = h
        .call(Method::DELETE, &format!("/api/theatre/reservations/{id}"), &alice, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn performances_filter_by_day_and_paginate(pool: PgPool) {
    let h = Harness::new(pool);
    let staff = h.user("staff@theatre.test", true).await;
    let (hall, performance) = small_show(&h, &staff).await;

    let (_, first) = h
        .call(Method::GET, &format!("/api/theatre/performances/{performance}"), &staff, None)
        .await;
    for day in ["2022-10-24T19:00:00Z", "2022-10-25T19:00:00Z"] {
        h.create(
            "/api/theatre/performances",
            &staff,
            json!({"play": first["play"]["id"], "theatre_hall": hall, "show_time": day}),
        )
        .await;
    }

    let (_, page) = h
        .call(Method::GET, "/api/theatre/performances?date=2022-10-24", &staff, None)
        .await;
    assert_eq!(page["count"], 1);

    let (_, page) = h
        .call(Method::GET, "/api/theatre/performances?page_size=2", &staff, None)
        .await;
    assert_eq!(page["count"], 3);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(page["next"], "/api/theatre/performances?page_size=2&page=2");
    assert!(page["previous"].is_null());

    let (status, body) = h
        .call(
            Method::POST,
            "/api/theatre/performances",
            &staff,
            Some(json!({"play": first["play"]["id"], "theatre_hall": hall, "show_time": "2022-10-24T19:00:00Z"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "The fields show_time, theatre_hall must make a unique set.");
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn hall_cannot_shrink_below_sold_seats(pool: PgPool) {
    let h = Harness::new(pool);
    let staff = h.user("staff@theatre.test", true).await;
    let (hall, performance) = small_show(&h, &staff).await;

    let reservation = h.create("/api/theatre/reservations", &staff, json!({})).await;
    h.create(
        "/api/theatre/tickets",
        &staff,
        json!({"row": 2, "seat": 3, "performance": performance, "reservation": reservation["id"]}),
    )
    .await;

    let (status, _) = h
        .call(
            Method::PATCH,
            &format!("/api/theatre/halls/{hall}"),
            &staff,
            Some(json!({"rows": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = h
        .call(
            Method::PATCH,
            &format!("/api/theatre/halls/{hall}"),
            &staff,
            Some(json!({"rows": 4})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"], 4);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn register_login_and_basic_auth(pool: PgPool) {
    let h = Harness::new(pool);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/user/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"email": "New@Theatre.test", "password": "password123"}).to_string(),
        ))
        .unwrap();
    let response = app(h.state.clone()).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/user/token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"email": "new@theatre.test", "password": "password123"}).to_string(),
        ))
        .unwrap();
    let response = app(h.state.clone()).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let token: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(token["token_type"], "Bearer");

    let bearer = format!("Bearer {}", token["access"].as_str().unwrap());
    let (status, me) = h.call(Method::GET, "/api/user/me", &bearer, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "new@theatre.test");
    assert_eq!(me["is_staff"], false);
    assert!(me.get("password_hash").is_none());

    let basic = format!(
        "Basic {}",
        general_purpose::STANDARD.encode("new@theatre.test:password123")
    );
    let (status, _) = h.call(Method::GET, "/api/theatre/genres", &basic, None).await;
    assert_eq!(status, StatusCode::OK);

    let wrong = format!("Basic {}", general_purpose::STANDARD.encode("new@theatre.test:nope"));
    let (status, _) = h.call(Method::GET, "/api/theatre/genres", &wrong, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn ticket_update_rechecks_seat_and_owner(pool: PgPool) {
    let h = Harness::new(pool);
    let staff = h.user("staff@theatre.test", true).await;
    let alice = h.user("alice@theatre.test", false).await;
    let bob = h.user("bob@theatre.test", false).await;
    let (_, performance) = small_show(&h, &staff).await;

    let alices = h.create("/api/theatre/reservations", &alice, json!({})).await;
    let bobs = h.create("/api/theatre/reservations", &bob, json!({})).await;
    let ticket = h
        .create(
            "/api/theatre/tickets",
            &alice,
            json!({"row": 1, "seat": 1, "performance": performance, "reservation": alices["id"]}),
        )
        .await;
    let uri = format!("/api/theatre/tickets/{}", ticket["id"]);

    let (status, _) = h
        .call(Method::PATCH, &uri, &alice, Some(json!({"reservation": bobs["id"]})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.call(Method::PATCH, &uri, &alice, Some(json!({"row": 5}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["row"][0],
        "row number must be in available range: (1, rows): (1, 2)"
    );

    let (status, _) = h.call(Method::PATCH, &uri, &bob, Some(json!({"seat": 2}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = h
        .call(
            Method::PUT,
            &uri,
            &alice,
            Some(json!({"row": 2, "seat": 2, "performance": performance, "reservation": alices["id"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!((body["row"].as_i64(), body["seat"].as_i64()), (Some(2), Some(2)));

    let (status, _) = h
        .call(Method::PATCH, &uri, &staff, Some(json!({"reservation": bobs["id"]})))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn performance_cannot_move_into_too_small_hall(pool: PgPool) {
    let h = Harness::new(pool);
    let staff = h.user("staff@theatre.test", true).await;
    let (_, performance) = small_show(&h, &staff).await;

    let reservation = h.create("/api/theatre/reservations", &staff, json!({})).await;
    h.create(
        "/api/theatre/tickets",
        &staff,
        json!({"row": 2, "seat": 3, "performance": performance, "reservation": reservation["id"]}),
    )
    .await;

    let tiny = h
        .create("/api/theatre/halls", &staff, json!({"name": "Tiny", "rows": 1, "seats_in_row": 1}))
        .await;
    let large = h
        .create("/api/theatre/halls", &staff, json!({"name": "Large", "rows": 5, "seats_in_row": 5}))
        .await;
    let uri = format!("/api/theatre/performances/{performance}");

    let (status, body) = h
        .call(Method::PATCH, &uri, &staff, Some(json!({"theatre_hall": tiny["id"]})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"]["theatre_hall"][0],
        "1 sold ticket(s) do not fit into hall \"Tiny\"."
    );

    let (status, body) = h
        .call(Method::PATCH, &uri, &staff, Some(json!({"theatre_hall": 999})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["theatre_hall"].is_array());

    let (status, body) = h
        .call(Method::PATCH, &uri, &staff, Some(json!({"theatre_hall": large["id"]})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["theatre_hall"], large["id"]);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires DATABASE_URL and REDIS_URL"]
async fn schedule_cache_is_dropped_on_every_write(pool: PgPool) {
    let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
    let cache = CacheService::connect(&redis_url, 60).await.unwrap();
    cache.invalidate_performances().await;
    let h = Harness::with_cache(pool, cache);
    let staff = h.user("staff@theatre.test", true).await;
    let viewer = h.user("viewer@theatre.test", false).await;

    let (hall, performance) = small_show(&h, &staff).await;
    let page = h.assert_schedule_refreshed(&viewer, "performance create").await;
    assert_eq!(page["results"][0]["tickets_available"], 6);

    let reservation = h.create("/api/theatre/reservations", &viewer, json!({})).await;
    let ticket = h
        .create(
            "/api/theatre/tickets",
            &viewer,
            json!({"row": 1, "seat": 1, "performance": performance, "reservation": reservation["id"]}),
        )
        .await;
    let page = h.assert_schedule_refreshed(&viewer, "ticket create").await;
    assert_eq!(page["results"][0]["tickets_available"], 5);

    let ticket_uri = format!("/api/theatre/tickets/{}", ticket["id"]);
    let (status, _) = h.call(Method::PATCH, &ticket_uri, &viewer, Some(json!({"seat": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    h.assert_schedule_refreshed(&viewer, "ticket update").await;

    let (status, _) = h.call(Method::DELETE, &ticket_uri, &viewer, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let page = h.assert_schedule_refreshed(&viewer, "ticket delete").await;
    assert_eq!(page["results"][0]["tickets_available"], 6);

    let (status, _) = h
        .call(
            Method::PATCH,
            &format!("/api/theatre/halls/{hall}"),
            &staff,
            Some(json!({"name": "Renamed"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let page = h.assert_schedule_refreshed(&viewer, "hall update").await;
    assert_eq!(page["results"][0]["theatre_hall"], "Renamed");

    let (_, detail) = h
        .call(Method::GET, &format!("/api/theatre/performances/{performance}"), &staff, None)
        .await;
    let (status, _) = h
        .call(
            Method::PATCH,
            &format!("/api/theatre/plays/{}", detail["play"]["id"]),
            &staff,
            Some(json!({"title": "Macbeth"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let page = h.assert_schedule_refreshed(&viewer, "play update").await;
    assert_eq!(page["results"][0]["play"], "Macbeth");

    let (status, _) = h
        .call(
            Method::PATCH,
            &format!("/api/theatre/performances/{performance}"),
            &staff,
            Some(json!({"show_time": "2022-10-24T19:00:00Z"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    h.assert_schedule_refreshed(&viewer, "performance update").await;

    let (status, _) = h
        .call(
            Method::DELETE,
            &format!("/api/theatre/reservations/{}", reservation["id"]),
            &viewer,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    h.assert_schedule_refreshed(&viewer, "reservation delete").await;

    let (status, _) = h
        .call(Method::DELETE, &format!("/api/theatre/performances/{performance}"), &staff, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let page = h.assert_schedule_refreshed(&viewer, "performance delete").await;
    assert_eq!(page["count"], 0);
}
