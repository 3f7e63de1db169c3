//! API routes

mod auth;
mod books;
mod extract;
mod health;
mod types;
mod users;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::sync::Arc;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

use crate::error::ApiError;
use crate::state::{AppState, MetricsHandle};

pub use auth::{RequireAdmin, RequireAuth};

/// Room for the multipart framing and text fields around a cover image
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

async fn not_found() -> ApiError {
    ApiError::NotFound("Resource not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Prometheus exposition, served outside the versioned API
fn metrics_routes(handle: Arc<MetricsHandle>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = Arc::clone(&handle);
            async move { handle.render() }
        }),
    )
}

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let body_limit = state.max_upload_bytes + FORM_OVERHEAD_BYTES;

    let api = Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(books::routes())
        .merge(users::routes());

    let mut router = Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit));

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics_routes(handle));
    }

    // Applies to every route registered so far, so it must come last
    router
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
}

/// Strip trailing slashes before routing so `/books/` and `/books` match
pub fn normalize_paths(router: Router) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header, request::Builder};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use chrono::Duration;
    use libris_auth::{Authenticator, TokenManager, hash_password};
    use libris_core::LibraryService;
    use libris_db::{Database, NewUser};
    use libris_storage::LocalStorage;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const BOUNDARY: &str = "libris-test-boundary";

    struct TestApp {
        app: NormalizePath<Router>,
        state: AppState,
        db: Database,
        covers: TempDir,
    }

    impl TestApp {
        async fn new() -> Self {
            let db = Database::in_memory().await.unwrap();
            for (name, is_admin) in [("root", true), ("alice", false), ("bob", false)] {
                db.insert_user(NewUser {
                    name: name.to_string(),
                    email: format!("{}@example.com", name),
                    password_hash: hash_password("secret").unwrap(),
                    is_admin,
                })
                .await
                .unwrap();
            }

            let covers = tempfile::tempdir().unwrap();
            let storage = Arc::new(LocalStorage::new(covers.path()).await.unwrap());
            let library = Arc::new(LibraryService::new(db.clone(), storage));
            let auth = Authenticator::new(
                db.clone(),
                TokenManager::new("test-secret", Duration::minutes(30)),
            );
            let state = AppState::new(db.clone(), library, auth, 1024 * 1024);

            Self {
                app: normalize_paths(create_router(state.clone(), None)),
                state,
                db,
                covers,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }

        async fn login(&self, name: &str) -> String {
            let request = Request::post("/api/v1/login")
                .header(header::AUTHORIZATION, basic(name, "secret"))
                .body(Body::empty())
                .unwrap();
            let (status, body) = self.send(request).await;
            assert_eq!(status, StatusCode::OK);
            body["token"].as_str().unwrap().to_string()
        }

        async fn user_id(&self, name: &str) -> i64 {
            self.db.get_user_by_name(name).await.unwrap().unwrap().id
        }

        async fn create_book(&self, token: &str, title: &str) -> i64 {
            let request = authed("POST", "/api/v1/books", token)
                .header(header::CONTENT_TYPE, multipart_type())
                .body(book_form(title, Some(("cover.png", PNG))))
                .unwrap();
            let (status, body) = self.send(request).await;
            assert_eq!(status, StatusCode::CREATED, "{}", body);
            body["book"]["id"].as_i64().unwrap()
        }

        fn cover_files(&self) -> usize {
            std::fs::read_dir(self.covers.path()).unwrap().count()
        }
    }

    fn basic(name: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", name, password)))
    }

    fn authed(method: &str, uri: &str, token: &str) -> Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-access-token", token)
    }

    fn bare(method: &str, uri: &str, token: &str) -> Request<Body> {
        authed(method, uri, token).body(Body::empty()).unwrap()
    }

    fn public_get(uri: impl AsRef<str>) -> Request<Body> {
        Request::get(uri.as_ref()).body(Body::empty()).unwrap()
    }

    fn with_json(builder: Builder, value: Value) -> Request<Body> {
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap()
    }

    fn multipart_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    fn book_form(title: &str, image: Option<(&str, &[u8])>) -> Body {
        let mut body = Vec::new();
        let fields = [
            ("title", title),
            ("synopsis", "Spice and sandworms"),
            ("author", "Frank Herbert"),
            ("year_of_publish", "1965"),
        ];
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, data)) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Body::from(body)
    }

    #[tokio::test]
    async fn test_health_ignores_trailing_slash() {
        let app = TestApp::new().await;

        for uri in ["/api/v1/health", "/api/v1/health/"] {
            let (status, body) = app.send(public_get(uri)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "healthy");
        }
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = TestApp::new().await;
        let (status, _) = app.send(public_get("/metrics")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let handle = PrometheusBuilder::new().build_recorder().handle();
        let router = create_router(app.state.clone(), Some(Arc::new(handle)));
        let response = router.oneshot(public_get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login() {
        let app = TestApp::new().await;
        assert!(!app.login("alice").await.is_empty());

        for credentials in [basic("alice", "wrong"), basic("nobody", "secret")] {
            let request = Request::post("/api/v1/login")
                .header(header::AUTHORIZATION, credentials)
                .body(Body::empty())
                .unwrap();
            let response = app.app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
        }

        let (status, body) = app
            .send(Request::post("/api/v1/login").body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Could not verify");
    }

    #[tokio::test]
    async fn test_token_transport() {
        let app = TestApp::new().await;

        let (status, body) = app.send(public_get("/api/v1/me")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Token is missing"}));

        let (status, body) = app.send(bare("GET", "/api/v1/me", "not-a-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Token is invalid"}));

        let token = app.login("alice").await;
        let request = Request::get("/api/v1/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "alice");
        assert!(body["user"].get("password_hash").is_none());
        assert_eq!(body["books"], json!([]));
    }

    #[tokio::test]
    async fn test_admin_only_routes() {
        let app = TestApp::new().await;
        let alice = app.login("alice").await;
        let root = app.login("root").await;

        let request = authed("POST", "/api/v1/books", &alice)
            .header(header::CONTENT_TYPE, multipart_type())
            .body(book_form("Dune", Some(("cover.png", PNG))))
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Admin privileges required");
        assert_eq!(app.cover_files(), 0);

        let (status, _) = app.send(bare("GET", "/api/v1/users", &alice)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.send(bare("GET", "/api/v1/users", &root)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_book_lifecycle() {
        let app = TestApp::new().await;
        let root = app.login("root").await;

        let id = app.create_book(&root, "Dune").await;
        assert_eq!(app.cover_files(), 1);

        let (status, body) = app.send(public_get("/api/v1/books/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["books"][0]["title"], "Dune");

        let (_, body) = app.send(public_get("/api/v1/books/count")).await;
        assert_eq!(body, json!({"total": 1}));

        let response = app
            .app
            .clone()
            .oneshot(public_get(format!("/api/v1/books/{}/cover", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], PNG);

        let (status, body) = app
            .send(with_json(
                authed("PUT", &format!("/api/v1/books/{}", id), &root),
                json!({"title": "Dune Messiah", "year_of_publish": 1969}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["book"]["title"], "Dune Messiah");
        assert_eq!(body["book"]["author"], "Frank Herbert");

        let (status, _) = app
            .send(with_json(
                authed("PUT", &format!("/api/v1/books/{}", id), &root),
                json!({"year_of_publish": -1}),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/books/{}", id);
        let (status, _) = app.send(bare("DELETE", &uri, &root)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(app.cover_files(), 0);

        let (status, _) = app.send(bare("DELETE", &uri, &root)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.send(public_get(uri.as_str())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_replace_cover() {
        let app = TestApp::new().await;
        let root = app.login("root").await;
        let id = app.create_book(&root, "Dune").await;

        let (_, before) = app.send(public_get(format!("/api/v1/books/{}", id))).await;

        let request = authed("PUT", &format!("/api/v1/books/{}/cover", id), &root)
            .header(header::CONTENT_TYPE, multipart_type())
            .body(book_form("ignored", Some(("new.jpg", &[0xFF, 0xD8, 0xFF, 0xE0][..]))))
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(body["book"]["img_url"], before["book"]["img_url"]);
        assert!(body["book"]["img_url"].as_str().unwrap().ends_with(".jpg"));
        assert_eq!(app.cover_files(), 1);
    }

    #[tokio::test]
    async fn test_create_book_rejects_bad_uploads() {
        let app = TestApp::new().await;
        let root = app.login("root").await;

        for image in [None, Some(("cover.gif", b"GIF89a".as_slice()))] {
            let request = authed("POST", "/api/v1/books", &root)
                .header(header::CONTENT_TYPE, multipart_type())
                .body(book_form("Dune", image))
                .unwrap();
            let (status, _) = app.send(request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        let big = vec![0u8; 2 * 1024 * 1024];
        let request = authed("POST", "/api/v1/books", &root)
            .header(header::CONTENT_TYPE, multipart_type())
            .body(book_form("Dune", Some(("cover.png", big.as_slice()))))
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        assert_eq!(app.cover_files(), 0);
    }

    #[tokio::test]
    async fn test_registration() {
        let app = TestApp::new().await;
        let register = |body: Value| with_json(Request::post("/api/v1/users"), body);

        let (status, body) = app
            .send(register(json!({
                "name": "carol",
                "email": "carol@example.com",
                "password": "secret"
            })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["is_admin"], false);
        assert!(!app.login("carol").await.is_empty());

        for duplicate in [
            json!({"name": "carol", "email": "other@example.com", "password": "x"}),
            json!({"name": "other", "email": "carol@example.com", "password": "x"}),
        ] {
            let (status, _) = app.send(register(duplicate)).await;
            assert_eq!(status, StatusCode::CONFLICT);
        }

        let (status, _) = app
            .send(register(json!({"name": "dave", "email": "dave", "password": "x"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = Request::post("/api/v1/users")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        assert_eq!(app.db.list_users().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_user_access_rules() {
        let app = TestApp::new().await;
        let alice = app.login("alice").await;
        let root = app.login("root").await;
        let alice_id = app.user_id("alice").await;
        let bob_id = app.user_id("bob").await;

        let (status, _) = app
            .send(bare("GET", &format!("/api/v1/users/{}", bob_id), &alice))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(bare("GET", &format!("/api/v1/users/{}", alice_id), &alice))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "alice@example.com");

        let own = format!("/api/v1/users/{}", alice_id);
        let (status, _) = app
            .send(with_json(authed("PUT", &own, &alice), json!({"is_admin": true})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(with_json(authed("PUT", &own, &alice), json!({"email": "alice@books.org"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "alice@books.org");

        let (status, _) = app
            .send(with_json(authed("PUT", &own, &alice), json!({"name": "bob"})))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app
            .send(with_json(authed("PUT", &own, &root), json!({"is_admin": true})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["is_admin"], true);
    }

    #[tokio::test]
    async fn test_borrowing() {
        let app = TestApp::new().await;
        let root = app.login("root").await;
        let alice = app.login("alice").await;
        let bob = app.login("bob").await;
        let alice_id = app.user_id("alice").await;
        let book_id = app.create_book(&root, "Dune").await;

        let borrow_uri = format!("/api/v1/users/{}/books/{}", alice_id, book_id);
        let (status, body) = app.send(bare("POST", &borrow_uri, &alice)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["book"]["id"], book_id);

        let (status, _) = app.send(bare("POST", &borrow_uri, &alice)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app.send(bare("DELETE", &borrow_uri, &bob)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = app.send(bare("GET", "/api/v1/me", &alice)).await;
        assert_eq!(body["books"].as_array().unwrap().len(), 1);

        let (status, body) = app
            .send(bare(
                "GET",
                &format!("/api/v1/books/{}/borrowers", book_id),
                &root,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"][0]["name"], "alice");

        let (status, _) = app.send(bare("DELETE", &borrow_uri, &alice)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app.send(bare("DELETE", &borrow_uri, &alice)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_deleted_user_token_rejected() {
        let app = TestApp::new().await;
        let root = app.login("root").await;
        let alice = app.login("alice").await;
        let alice_id = app.user_id("alice").await;

        let (status, _) = app
            .send(bare("DELETE", &format!("/api/v1/users/{}", alice_id), &root))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = app.send(bare("GET", "/api/v1/me", &alice)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token is invalid");
    }

    #[tokio::test]
    async fn test_bad_path_and_unknown_route() {
        let app = TestApp::new().await;

        let (status, body) = app.send(public_get("/api/v1/books/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = app.send(public_get("/api/v1/nothing-here")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Resource not found");
    }

    #[tokio::test]
    async fn test_renamed_user_token_rejected() {
        let app = TestApp::new().await;
        let alice = app.login("alice").await;
        let bob = app.login("bob").await;
        let alice_uri = format!("/api/v1/users/{}", app.user_id("alice").await);
        let bob_uri = format!("/api/v1/users/{}", app.user_id("bob").await);

        let (status, _) = app
            .send(with_json(authed("PUT", &alice_uri, &alice), json!({"name": "alice2"})))
            .await;
        assert_eq!(status, StatusCode::OK);

        // Hand the freed name to bob
        let root = app.login("root").await;
        let (status, _) = app
            .send(with_json(authed("PUT", &bob_uri, &root), json!({"name": "alice"})))
            .await;
        assert_eq!(status, StatusCode::OK);

        for token in [&alice, &bob] {
            let (status, body) = app.send(bare("GET", "/api/v1/me", token)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "Token is invalid");
        }

        let renamed = app.login("alice2").await;
        let (status, body) = app.send(bare("GET", "/api/v1/me", &renamed)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "alice@example.com");
    }

    #[tokio::test]
    async fn test_wrong_method_gets_json_error() {
        let app = TestApp::new().await;
        let root = app.login("root").await;

        for request in [
            bare("PATCH", "/api/v1/books", &root),
            bare("DELETE", "/api/v1/books/count", &root),
            bare("PUT", "/api/v1/health/", &root),
        ] {
            let (status, body) = app.send(request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(body, json!({"error": "Method not allowed"}));
        }
    }

    #[tokio::test]
    async fn test_oversized_json_body() {
        let app = TestApp::new().await;
        let root = app.login("root").await;
        let id = app.create_book(&root, "Dune").await;

        let synopsis = "s".repeat(2 * 1024 * 1024);
        let (status, body) = app
            .send(with_json(
                authed("PUT", &format!("/api/v1/books/{}", id), &root),
                json!({"synopsis": synopsis}),
            ))
            .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, json!({"error": "Payload too large"}));
    }
}
