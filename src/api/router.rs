//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//!
//! Middleware stack on session routes (outermost → innermost):
//! 1. Auth validator → 2. Rate limiter (per identity) → 3. Audit logger
//!
//! Routes without a session are limited per client address.

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::core_state::CoreState;

/// Build the full application router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let cors = cors_layer(&core.config().cors_origins);
    build_router(ApiContext::new(core)).layer(cors)
}

fn build_router(ctx: ApiContext) -> Router {
    // Protected routes: require a session.
    //
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Auth → Rate limit → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/signout", post(endpoints::auth::sign_out))
        .route(
            "/profile",
            get(endpoints::profiles::get).patch(endpoints::profiles::update),
        )
        .route("/roles", get(endpoints::profiles::roles))
        .route(
            "/symptoms",
            get(endpoints::symptoms::list).post(endpoints::symptoms::create),
        )
        .route(
            "/symptoms/:id",
            get(endpoints::symptoms::detail)
                .patch(endpoints::symptoms::update)
                .delete(endpoints::symptoms::delete),
        )
        .route(
            "/symptoms/:id/notes",
            get(endpoints::symptoms::notes).post(endpoints::symptoms::add_note),
        )
        .route(
            "/messages",
            get(endpoints::messages::conversation).post(endpoints::messages::send),
        )
        .route("/messages/:id/read", post(endpoints::messages::mark_read))
        .route(
            "/assignments",
            get(endpoints::assignments::list).post(endpoints::assignments::create),
        )
        .route("/timeline", get(endpoints::timeline::get))
        .route("/dashboard", get(endpoints::dashboard::get))
        .route(
            "/storage/:bucket/*path",
            put(endpoints::storage::upload).delete(endpoints::storage::delete),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (rate-limited and audited, no session required)
    let unprotected = Router::new()
        .route("/auth/signup", post(endpoints::auth::sign_up))
        .route("/auth/signin", post(endpoints::auth::sign_in))
        .route("/health", get(endpoints::health::check))
        .route("/lookup", get(endpoints::lookup::search))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    // Public object reads
    let public_objects = Router::new()
        .route("/storage/:bucket/*path", get(endpoints::storage::read))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    // WebSocket upgrade route (token in query, rate-limited)
    let ws_routes = Router::new()
        .route("/ws/messages", get(websocket::ws_upgrade))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .merge(public_objects)
        .merge(ws_routes)
}

/// Empty list: no cross-origin access. `*`: any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow any origin");
        return cors.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(origin = %o, "Ignoring invalid CORS origin: {e}");
                None
            }
        })
        .collect();
    cors.allow_origin(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;

    fn test_state() -> (Arc<CoreState>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: tmp.path().to_path_buf(),
            pbkdf2_iterations: 1_000,
            ..AppConfig::default()
        };
        let core = CoreState::in_memory(config, &tmp.path().join("objects")).unwrap();
        (Arc::new(core), tmp)
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Sign up + sign in; returns (identity id, token).
    async fn register(app: &Router, email: &str, role: &str) -> (String, String) {
        let (status, identity) = call(
            app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({
                "email": email,
                "password": "password123",
                "display_name": email,
                "role": role,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{identity}");
        let (status, session) = call(
            app,
            "POST",
            "/api/auth/signin",
            None,
            Some(json!({ "email": email, "password": "password123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        (
            identity["id"].as_str().unwrap().to_string(),
            session["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn health_is_public() {
        let (core, _tmp) = test_state();
        let app = api_router(core);
        let (status, body) = call(&app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let (core, _tmp) = test_state();
        let app = api_router(core);
        let (status, body) = call(&app, "GET", "/api/symptoms", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");

        let (status, _) = call(&app, "GET", "/api/profile", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signup_validation_and_conflict() {
        let (core, _tmp) = test_state();
        let app = api_router(core);
        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({
                "email": "not-an-email",
                "password": "password123",
                "display_name": "X",
                "role": "patient",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

        register(&app, "pat@example.com", "patient").await;
        let (status, _) = call(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({
                "email": "pat@example.com",
                "password": "password123",
                "display_name": "Again",
                "role": "patient",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/signin",
            None,
            Some(json!({ "email": "pat@example.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn end_to_end_over_http() {
        let (core, _tmp) = test_state();
        let app = api_router(core.clone());
        let (patient_id, patient) = register(&app, "pat@example.com", "patient").await;
        let (doctor_id, doctor) = register(&app, "doc@example.com", "doctor").await;

        let (status, roles) = call(&app, "GET", "/api/roles", Some(&patient), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(roles[0]["role"], "patient");

        let (status, symptom) = call(
            &app,
            "POST",
            "/api/symptoms",
            Some(&patient),
            Some(json!({ "title": "Rash", "affected_area": "arm" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let symptom_id = symptom["id"].as_str().unwrap().to_string();

        let (_, visible) = call(&app, "GET", "/api/symptoms", Some(&doctor), None).await;
        assert_eq!(visible.as_array().unwrap().len(), 0);
        let (status, _) = call(
            &app,
            "GET",
            &format!("/api/symptoms/{symptom_id}"),
            Some(&doctor),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            "POST",
            "/api/assignments",
            Some(&patient),
            Some(json!({ "doctor_id": doctor_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, visible) = call(&app, "GET", "/api/symptoms", Some(&doctor), None).await;
        let visible = visible.as_array().unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0]["id"], symptom_id.as_str());
        assert_eq!(visible[0]["patient_id"], patient_id.as_str());

        let notes_uri = format!("/api/symptoms/{symptom_id}/notes");
        let (status, _) = call(
            &app,
            "POST",
            &notes_uri,
            Some(&doctor),
            Some(json!({ "note": "Keep it moisturised", "progress_status": "stable" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, notes) = call(&app, "GET", &notes_uri, Some(&patient), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(notes[0]["progress_status"], "stable");

        // The patient cannot write notes, the doctor cannot delete symptoms.
        let (status, _) = call(
            &app,
            "POST",
            &notes_uri,
            Some(&patient),
            Some(json!({ "note": "mine" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(
            &app,
            "DELETE",
            &format!("/api/symptoms/{symptom_id}"),
            Some(&doctor),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, timeline) = call(
            &app,
            "GET",
            &format!("/api/timeline?patient_id={patient_id}"),
            Some(&doctor),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(timeline[0]["notes"].as_array().unwrap().len(), 1);

        let (_, dash) = call(&app, "GET", "/api/dashboard", Some(&doctor), None).await;
        assert_eq!(dash["role"], "doctor");
        assert_eq!(dash["patient_symptoms"].as_array().unwrap().len(), 1);

        assert!(core.audit().entries().iter().any(|e| e.status == 403));
    }

    #[tokio::test]
    async fn messaging_and_read_flag() {
        let (core, _tmp) = test_state();
        let app = api_router(core);
        let (patient_id, patient) = register(&app, "pat@example.com", "patient").await;
        let (doctor_id, doctor) = register(&app, "doc@example.com", "doctor").await;
        let (_, eve) = register(&app, "eve@example.com", "patient").await;

        let (status, message) = call(
            &app,
            "POST",
            "/api/messages",
            Some(&patient),
            Some(json!({ "receiver_id": doctor_id, "content": "Hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let read_uri = format!("/api/messages/{}/read", message["id"].as_str().unwrap());

        let (_, convo) = call(
            &app,
            "GET",
            &format!("/api/messages?peer={patient_id}"),
            Some(&doctor),
            None,
        )
        .await;
        assert_eq!(convo.as_array().unwrap().len(), 1);
        let (_, convo) = call(
            &app,
            "GET",
            &format!("/api/messages?peer={doctor_id}"),
            Some(&eve),
            None,
        )
        .await;
        assert!(convo.as_array().unwrap().is_empty());

        let (status, _) = call(&app, "POST", &read_uri, Some(&patient), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, "POST", &read_uri, Some(&eve), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, read) = call(&app, "POST", &read_uri, Some(&doctor), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["is_read"], true);
    }

    #[tokio::test]
    async fn lookup_and_signout() {
        let (core, _tmp) = test_state();
        let app = api_router(core);
        let (_, body) = call(&app, "GET", "/api/lookup?q=itchy", None, None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "Rash");
        let (_, body) = call(&app, "GET", "/api/lookup", None, None).await;
        assert_eq!(body.as_array().unwrap().len(), 8);

        let (_, token) = register(&app, "pat@example.com", "patient").await;
        let (status, _) = call(&app, "POST", "/api/auth/signout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", "/api/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn storage_upload_read_and_owner_rules() {
        let (core, _tmp) = test_state();
        let app = api_router(core);
        let (patient_id, patient) = register(&app, "pat@example.com", "patient").await;
        let (doctor_id, doctor) = register(&app, "doc@example.com", "doctor").await;

        let upload = |uri: String, token: String| {
            let app = app.clone();
            async move {
                let request = Request::builder()
                    .method("PUT")
                    .uri(uri)
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::from("fake-png"))
                    .unwrap();
                app.oneshot(request).await.unwrap()
            }
        };

        let response = upload(
            format!("/api/storage/symptom-photos/{patient_id}/arm.png"),
            patient.clone(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = upload(
            format!("/api/storage/symptom-photos/{patient_id}/arm.png"),
            doctor.clone(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = upload(
            format!("/api/storage/avatars/{doctor_id}/me.png"),
            doctor.clone(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let request = Request::builder()
            .uri(format!("/storage/symptom-photos/{patient_id}/arm.png"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/png");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"fake-png");

        let (status, _) = call(
            &app,
            "DELETE",
            &format!("/api/storage/symptom-photos/{patient_id}/arm.png"),
            Some(&patient),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn rate_limit_returns_429() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: tmp.path().to_path_buf(),
            rate_limit_per_minute: 2,
            ..AppConfig::default()
        };
        let core = Arc::new(CoreState::in_memory(config, tmp.path()).unwrap());
        let app = api_router(core);

        for _ in 0..2 {
            let (status, _) = call(&app, "GET", "/api/health", None, None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "60");
    }

    fn limited_state(per_minute: u32) -> (Arc<CoreState>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: tmp.path().to_path_buf(),
            pbkdf2_iterations: 1_000,
            rate_limit_per_minute: per_minute,
            ..AppConfig::default()
        };
        let core = CoreState::in_memory(config, &tmp.path().join("objects")).unwrap();
        (Arc::new(core), tmp)
    }

    #[tokio::test]
    async fn forged_bearer_does_not_escape_sign_in_limit() {
        let (core, _tmp) = limited_state(2);
        let app = api_router(core);

        let mut statuses = Vec::new();
        for n in 0..10 {
            let (status, _) = call(
                &app,
                "POST",
                "/api/auth/signin",
                Some(&format!("forged-token-{n:04}")),
                Some(json!({ "email": "victim@example.com", "password": format!("guess{n}") })),
            )
            .await;
            statuses.push(status);
        }
        assert_eq!(statuses[..2], [StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED]);
        assert!(statuses[2..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn session_routes_are_limited_per_identity() {
        let (core, _tmp) = limited_state(2);
        let app = api_router(core);
        // Uses up the shared anonymous budget.
        let (_, token) = register(&app, "pat@example.com", "patient").await;

        for _ in 0..2 {
            let (status, _) = call(&app, "GET", "/api/profile", Some(&token), None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = call(&app, "GET", "/api/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        // Unresolved tokens are turned away before they count against anyone.
        let (status, _) = call(&app, "GET", "/api/profile", Some("forged"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
