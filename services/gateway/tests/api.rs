use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use std::sync::Arc;

use async_trait::async_trait;
use common::models::{NewPin, Pin, Profile};
use gateway::{
    AppState, MemoryBackend, create_router,
    rate_limiter::RateLimiterConfig,
    repositories::{MemoryStore, PinStore, ProfileStore, StoreError, StoreResult},
    storage::Buckets,
    upload::UploadLimits,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "pindrop-test-boundary";

struct Part {
    name: &'static str,
    file_name: Option<&'static str>,
    content_type: Option<&'static str>,
    data: Vec<u8>,
}

fn text(name: &'static str, value: &str) -> Part {
    Part {
        name,
        file_name: None,
        content_type: None,
        data: value.as_bytes().to_vec(),
    }
}

fn file(name: &'static str, file_name: &'static str, content_type: &'static str) -> Part {
    Part {
        name,
        file_name: Some(file_name),
        content_type: Some(content_type),
        data: vec![0x89, 0x50, 0x4e, 0x47, 1, 2, 3, 4],
    }
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            ),
        }
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn pin_fields(name: &str, latitude: &str, longitude: &str, visibility: &str) -> Vec<Part> {
    vec![
        text("name", name),
        text("latitude", latitude),
        text("longitude", longitude),
        text("visibility", visibility),
    ]
}

struct TestApp {
    router: Router,
    backend: MemoryBackend,
}

impl TestApp {
    fn new() -> Self {
        Self::with_sign_in_limit(RateLimiterConfig::default())
    }

    fn with_sign_in_limit(limit: RateLimiterConfig) -> Self {
        let backend = MemoryBackend::new("http://storage.test/public");
        let router = create_router(backend.state_with(
            Buckets::default(),
            UploadLimits::default(),
            limit,
        ));
        Self { router, backend }
    }

    /// App whose state is adjusted before the router is built
    fn with_state(adjust: impl FnOnce(&MemoryBackend, &mut AppState)) -> Self {
        let backend = MemoryBackend::new("http://storage.test/public");
        let mut state = backend.state();
        adjust(&backend, &mut state);
        Self {
            router: create_router(state),
            backend,
        }
    }

    fn store_calls(&self) -> usize {
        self.backend.store.calls()
    }

    fn storage_calls(&self) -> usize {
        self.backend.storage.calls()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.send(request).await
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.json(Method::GET, uri, token, None).await
    }

    async fn multipart(&self, uri: &str, token: Option<&str>, parts: &[Part]) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = builder.body(Body::from(multipart_body(parts))).unwrap();
        self.send(request).await
    }

    /// Sign up a fresh account and return its access token and id
    async fn sign_up(&self, username: &str) -> (String, Uuid) {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/auths/signup",
                None,
                Some(json!({
                    "email": format!("{}@pindrop.test", username),
                    "password": "correct horse",
                    "username": username,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "sign-up failed: {}", body);
        let token = body["session"]["access_token"].as_str().unwrap().to_string();
        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        (token, id)
    }

    async fn create_pin(&self, token: &str, parts: &[Part]) -> Value {
        let (status, body) = self.multipart("/api/pins/user", Some(token), parts).await;
        assert_eq!(status, StatusCode::CREATED, "pin creation failed: {}", body);
        body
    }

    async fn create_circle(&self, token: &str, name: &str) -> Value {
        let (status, body) = self
            .json(
                Method::POST,
                "/api/circles",
                Some(token),
                Some(json!({ "name": name, "visibility": "private" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "circle creation failed: {}", body);
        body
    }
}

fn ids(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|pin| pin["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_is_open() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn user_routes_without_token_are_rejected_before_any_store_call() {
    let app = TestApp::new();
    let pin_id = Uuid::new_v4();
    let routes = [
        (Method::GET, "/api/pins/user".to_string()),
        (Method::GET, "/api/pins/user/mine".to_string()),
        (Method::GET, format!("/api/pins/user/{}", pin_id)),
        (Method::PUT, format!("/api/pins/user/{}", pin_id)),
        (Method::DELETE, format!("/api/pins/user/{}", pin_id)),
        (Method::GET, "/api/circles".to_string()),
        (Method::GET, "/api/profiles".to_string()),
        (Method::GET, "/api/auths/me".to_string()),
    ];

    for (method, uri) in routes {
        let (status, body) = app.json(method.clone(), &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert!(body["error"].is_string());

        let (status, _) = app.json(method.clone(), &uri, Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }

    let (status, _) = app
        .multipart("/api/pins/user", None, &pin_fields("x", "1", "1", "public"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.store_calls(), 0);
    assert_eq!(app.storage_calls(), 0);
}

#[tokio::test]
async fn sign_up_creates_profile_and_session() {
    let app = TestApp::new();
    let (token, id) = app.sign_up("walker").await;

    let (status, body) = app.get("/api/auths/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id.to_string());
    assert_eq!(body["profile"]["username"], "walker");

    let (status, body) = app
        .json(
            Method::POST,
            "/api/auths/signup",
            None,
            Some(json!({
                "email": "other@pindrop.test",
                "password": "correct horse",
                "username": "walker",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username already taken");

    let (status, _) = app
        .json(
            Method::POST,
            "/api/auths/signup",
            None,
            Some(json!({
                "email": "third@pindrop.test",
                "password": "correct horse",
                "username": "no spaces allowed",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signed_out_tokens_are_refused() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("leaver").await;

    let (status, _) = app
        .json(Method::POST, "/api/auths/signout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/profiles", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_in_locks_out_after_repeated_failures() {
    let app = TestApp::with_sign_in_limit(RateLimiterConfig {
        max_attempts: 2,
        window_seconds: 300,
        lockout_seconds: 900,
    });
    app.sign_up("guarded").await;

    let attempt = |password: &'static str| {
        Some(json!({ "email": "guarded@pindrop.test", "password": password }))
    };

    let (status, _) = app
        .json(Method::POST, "/api/auths/signin", None, attempt("wrong"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .json(Method::POST, "/api/auths/signin", None, attempt("wrong"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(Method::POST, "/api/auths/signin", None, attempt("correct horse"))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn pin_creation_rejects_out_of_range_coordinates() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("mapper").await;

    for (latitude, longitude) in [("90.5", "0"), ("-91", "0"), ("0", "180.01"), ("0", "-181")] {
        let mut parts = pin_fields("Nowhere", latitude, longitude, "public");
        parts.push(file("image", "a.png", "image/png"));
        let (status, body) = app.multipart("/api/pins/user", Some(&token), &parts).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", latitude, longitude);
        assert!(body["error"].is_string());
    }

    let (status, _) = app
        .multipart(
            "/api/pins/user",
            Some(&token),
            &pin_fields("Nowhere", "north", "0", "public"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.storage_calls(), 0);
}

#[tokio::test]
async fn pin_update_rejects_out_of_range_coordinates() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("editor").await;
    let pin = app
        .create_pin(&token, &pin_fields("Harbour", "43.3", "5.36", "private"))
        .await;
    let uri = format!("/api/pins/user/{}", pin["id"].as_str().unwrap());

    for update in [json!({ "latitude": 120.0 }), json!({ "longitude": -200.0 })] {
        let (status, _) = app.json(Method::PUT, &uri, Some(&token), Some(update)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, body) = app
        .json(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "latitude": -33.9, "longitude": 151.2, "name": "Quay" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["latitude"], -33.9);
    assert_eq!(body["name"], "Quay");

    let (intruder, _) = app.sign_up("intruder").await;
    let (status, _) = app
        .json(Method::PUT, &uri, Some(&intruder), Some(json!({ "name": "Mine" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn circle_visibility_must_be_known() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("organizer").await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/circles",
            Some(&token),
            Some(json!({ "name": "Climbers", "visibility": "friends" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let circle = app.create_circle(&token, "Climbers").await;
    let uri = format!("/api/circles/{}", circle["id"].as_str().unwrap());
    let (status, _) = app
        .json(Method::PUT, &uri, Some(&token), Some(json!({ "visibility": "everyone" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .json(Method::PUT, &uri, Some(&token), Some(json!({ "visibility": "public" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["visibility"], "public");
}

#[tokio::test]
async fn joining_twice_is_a_conflict() {
    let app = TestApp::new();
    let (owner, _) = app.sign_up("owner").await;
    let (guest, guest_id) = app.sign_up("guest").await;
    let (stranger, _) = app.sign_up("stranger").await;

    let circle = app.create_circle(&owner, "Book club").await;
    let code = circle["access_code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);
    let members_uri = format!("/api/circles/{}/members", circle["id"].as_str().unwrap());

    let (status, body) = app
        .json(
            Method::POST,
            &members_uri,
            Some(&guest),
            Some(json!({ "access_code": code.to_lowercase() })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], guest_id.to_string());

    let (status, _) = app
        .json(
            Method::POST,
            &members_uri,
            Some(&guest),
            Some(json!({ "access_code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            Method::POST,
            &members_uri,
            Some(&stranger),
            Some(json!({ "access_code": "WRONGCOD" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, members) = app.get(&members_uri, Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 2);

    let (status, body) = app
        .get(&format!("/api/circles/{}", circle["id"].as_str().unwrap()), Some(&guest))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("access_code").is_none());
}

#[tokio::test]
async fn files_with_the_wrong_type_never_reach_storage() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("uploader").await;

    let mut parts = pin_fields("Beach", "44.6", "-1.2", "public");
    parts.push(file("image", "notes.txt", "text/plain"));
    let (status, body) = app.multipart("/api/pins/user", Some(&token), &parts).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("image/"));

    let mut parts = pin_fields("Beach", "44.6", "-1.2", "public");
    parts.push(file("image", "ok.png", "image/png"));
    parts.push(file("audio", "song.png", "image/png"));
    let (status, _) = app.multipart("/api/pins/user", Some(&token), &parts).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut parts = pin_fields("Beach", "44.6", "-1.2", "public");
    parts.push(file("video", "clip.mp4", "video/mp4"));
    let (status, _) = app.multipart("/api/pins/user", Some(&token), &parts).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.storage_calls(), 0);
}

#[tokio::test]
async fn pin_media_is_stored_and_removed_with_the_pin() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("recorder").await;

    let mut parts = pin_fields("Forest", "48.4", "2.7", "public");
    parts.push(file("image", "trees.jpg", "image/jpeg"));
    parts.push(file("image", "path.png", "image/png"));
    parts.push(file("audio", "birds.mp3", "audio/mpeg"));
    let pin = app.create_pin(&token, &parts).await;

    let images = pin["image_urls"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert!(
        images[0]
            .as_str()
            .unwrap()
            .starts_with("http://storage.test/public/images/recorder/image-")
    );
    assert!(pin["audio_url"].as_str().unwrap().ends_with(".mp3"));
    assert_eq!(app.backend.storage.len().await, 3);

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/api/pins/user/{}", pin["id"].as_str().unwrap()),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.backend.storage.is_empty().await);
}

#[tokio::test]
async fn too_many_images_are_rejected() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("hoarder").await;

    let mut parts = pin_fields("Gallery", "1", "1", "public");
    for _ in 0..6 {
        parts.push(file("image", "x.png", "image/png"));
    }
    let (status, _) = app.multipart("/api/pins/user", Some(&token), &parts).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.storage_calls(), 0);
}

#[tokio::test]
async fn visible_pins_are_own_public_and_shared_without_duplicates() {
    let app = TestApp::new();
    let (me, _) = app.sign_up("myself").await;
    let (neighbour, _) = app.sign_up("neighbour").await;
    let (friend, _) = app.sign_up("friend").await;
    let (outsider, _) = app.sign_up("outsider").await;

    let circle = app.create_circle(&friend, "Hikers").await;
    let (status, _) = app
        .json(
            Method::POST,
            "/api/circles/join",
            Some(&me),
            Some(json!({ "access_code": circle["access_code"] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let other_circle = app.create_circle(&outsider, "Runners").await;

    // own, and public at the same time
    let a = app.create_pin(&me, &pin_fields("A", "10", "10", "public")).await;
    let b = app
        .create_pin(&neighbour, &pin_fields("B", "11", "11", "public"))
        .await;
    let mut shared = pin_fields("C", "12", "12", "social");
    let circle_id = circle["id"].as_str().unwrap().to_string();
    shared.push(text("social_circle_ids", &circle_id));
    let c = app.create_pin(&friend, &shared).await;

    let mut elsewhere = pin_fields("D", "13", "13", "social");
    let other_id = other_circle["id"].as_str().unwrap().to_string();
    elsewhere.push(text("social_circle_ids", &other_id));
    let d = app.create_pin(&outsider, &elsewhere).await;
    app.create_pin(&neighbour, &pin_fields("E", "14", "14", "private"))
        .await;

    let (status, body) = app.get("/api/pins/user", Some(&me)).await;
    assert_eq!(status, StatusCode::OK);
    let expected: Vec<String> = [&a, &b, &c]
        .iter()
        .map(|pin| pin["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids(&body), expected);

    let (status, _) = app
        .get(&format!("/api/pins/user/{}", c["id"].as_str().unwrap()), Some(&me))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .get(&format!("/api/pins/user/{}", d["id"].as_str().unwrap()), Some(&me))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .get(&format!("/api/pins/{}", c["id"].as_str().unwrap()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/pins", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn social_pins_only_target_circles_of_the_owner() {
    let app = TestApp::new();
    let (me, _) = app.sign_up("poster").await;
    let (other, _) = app.sign_up("other").await;
    let foreign = app.create_circle(&other, "Private club").await;

    let mut parts = pin_fields("Sneaky", "1", "1", "social");
    let foreign_id = foreign["id"].as_str().unwrap().to_string();
    parts.push(text("social_circle_ids", &foreign_id));
    let (status, _) = app.multipart("/api/pins/user", Some(&me), &parts).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bounding_boxes_filter_and_must_be_complete() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("traveller").await;
    app.create_pin(&token, &pin_fields("Paris", "48.85", "2.35", "public"))
        .await;
    app.create_pin(&token, &pin_fields("Fiji", "-17.7", "178.0", "public"))
        .await;
    app.create_pin(&token, &pin_fields("Samoa", "-13.8", "-172.0", "public"))
        .await;

    let (status, _) = app.get("/api/pins?min_lat=40&min_lng=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .get("/api/pins?min_lat=40&min_lng=0&max_lat=50&max_lng=5", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Paris");

    let (status, body) = app
        .get(
            "/api/pins/user?min_lat=-20&min_lng=170&max_lat=-10&max_lng=-170",
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|pin| pin["name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Fiji", "Samoa"]);
}

#[tokio::test]
async fn avatar_upload_updates_the_profile() {
    let app = TestApp::new();
    let (token, _) = app.sign_up("portrait").await;

    let (status, body) = app
        .multipart(
            "/api/profiles/avatar",
            Some(&token),
            &[file("image", "me.png", "image/png")],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["avatar_url"],
        "http://storage.test/public/avatars/portrait/avatar.png"
    );

    let (status, _) = app
        .multipart(
            "/api/profiles/avatar",
            Some(&token),
            &[file("image", "me.pdf", "application/pdf")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.backend.storage.len().await, 1);
}

#[tokio::test]
async fn members_can_leave_and_owners_can_remove() {
    let app = TestApp::new();
    let (owner, owner_id) = app.sign_up("host").await;
    let (guest, guest_id) = app.sign_up("visitor").await;
    let (third, third_id) = app.sign_up("third").await;

    let circle = app.create_circle(&owner, "Gardeners").await;
    let circle_id = circle["id"].as_str().unwrap();
    for token in [&guest, &third] {
        let (status, _) = app
            .json(
                Method::POST,
                "/api/circles/join",
                Some(token),
                Some(json!({ "access_code": circle["access_code"] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/api/circles/{}/members/{}", circle_id, third_id),
            Some(&guest),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/api/circles/{}/members/{}", circle_id, guest_id),
            Some(&guest),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/api/circles/{}/members/{}", circle_id, third_id),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(
            Method::DELETE,
            &format!("/api/circles/{}/members/{}", circle_id, owner_id),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(&format!("/api/circles/{}", circle_id), Some(&guest))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn rejected<T>() -> StoreResult<T> {
    Err(StoreError::Configuration("write rejected".to_string()))
}

/// Profile table refusing inserts
struct ReadOnlyProfiles(Arc<MemoryStore>);

#[async_trait]
impl ProfileStore for ReadOnlyProfiles {
    async fn create(&self, _: &Profile) -> StoreResult<Profile> {
        rejected()
    }
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        ProfileStore::find_by_id(self.0.as_ref(), id).await
    }
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Profile>> {
        self.0.find_by_username(username).await
    }
    async fn update(&self, profile: &Profile) -> StoreResult<Option<Profile>> {
        ProfileStore::update(self.0.as_ref(), profile).await
    }
    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        ProfileStore::delete(self.0.as_ref(), id).await
    }
}

/// Pin table refusing inserts
struct ReadOnlyPins(Arc<MemoryStore>);

#[async_trait]
impl PinStore for ReadOnlyPins {
    async fn create(&self, _: NewPin) -> StoreResult<Pin> {
        rejected()
    }
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Pin>> {
        PinStore::find_by_id(self.0.as_ref(), id).await
    }
    async fn list_public(&self) -> StoreResult<Vec<Pin>> {
        PinStore::list_public(self.0.as_ref()).await
    }
    async fn list_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Pin>> {
        self.0.list_by_owner(owner_id).await
    }
    async fn list_public_excluding(&self, owner_id: Uuid) -> StoreResult<Vec<Pin>> {
        self.0.list_public_excluding(owner_id).await
    }
    async fn list_social_excluding(
        &self,
        owner_id: Uuid,
        circle_ids: &[Uuid],
    ) -> StoreResult<Vec<Pin>> {
        self.0.list_social_excluding(owner_id, circle_ids).await
    }
    async fn update(&self, pin: &Pin) -> StoreResult<Option<Pin>> {
        PinStore::update(self.0.as_ref(), pin).await
    }
    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        PinStore::delete(self.0.as_ref(), id).await
    }
}

#[tokio::test]
async fn failed_profile_insert_removes_the_new_account() {
    let app = TestApp::with_state(|backend, state| {
        state.profiles = Arc::new(ReadOnlyProfiles(backend.store.clone()));
    });

    let (status, body) = app
        .json(
            Method::POST,
            "/api/auths/signup",
            None,
            Some(json!({
                "email": "ghost@pindrop.test",
                "password": "correct horse",
                "username": "ghost",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");

    let (status, _) = app
        .json(
            Method::POST,
            "/api/auths/signin",
            None,
            Some(json!({ "email": "ghost@pindrop.test", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn failed_pin_insert_removes_uploaded_media() {
    let app = TestApp::with_state(|backend, state| {
        state.pins = Arc::new(ReadOnlyPins(backend.store.clone()));
    });
    let (token, _) = app.sign_up("photographer").await;

    let mut parts = pin_fields("Harbour", "43.3", "5.4", "public");
    parts.push(file("image", "boats.png", "image/png"));
    parts.push(file("audio", "gulls.mp3", "audio/mpeg"));
    let (status, _) = app.multipart("/api/pins/user", Some(&token), &parts).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.backend.storage.is_empty().await);
    assert_eq!(app.storage_calls(), 4);
}

#[tokio::test]
async fn sign_up_rejects_malformed_emails_before_the_provider() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            Method::POST,
            "/api/auths/signup",
            None,
            Some(json!({
                "email": "walker-at-pindrop",
                "password": "correct horse",
                "username": "walker",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid email format");
    assert_eq!(app.store_calls(), 0);
}
