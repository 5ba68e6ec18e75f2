//! HTTP routes for the relay service.
//!
//! Defines the Axum router and application state.

use crate::actors::RelayActorHandle;
use crate::config::Config;
use crate::handlers;
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer};

const ALLOW_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the relay actor that owns rooms and sessions.
    pub relay: RelayActorHandle,

    /// Service configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// - `POST /api/canaccess`, `POST /api/new`, `POST /api/join`
/// - `GET /ws` - duplex channel
/// - `GET /health`, `GET /metrics`
/// - `OPTIONS` on any path answers `200 {}`
/// - anything else answers `404 {"error":"Not found"}`
///
/// Every response carries permissive cross-origin headers.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route(
            "/api/canaccess",
            post(handlers::can_access).fallback(handlers::not_found),
        )
        .route(
            "/api/new",
            post(handlers::create_room).fallback(handlers::not_found),
        )
        .route(
            "/api/join",
            post(handlers::join_room).fallback(handlers::not_found),
        )
        .route(
            "/ws",
            get(handlers::ws_upgrade).fallback(handlers::not_found),
        )
        .route(
            "/health",
            get(handlers::health_check).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .with_state(state);

    let metrics_routes = Router::new()
        .route(
            "/metrics",
            get(handlers::metrics_handler).fallback(handlers::not_found),
        )
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer
    // 2. TraceLayer
    // 3. preflight - answers OPTIONS before routing
    // 4. header layers - applied to every response, preflight included
    api_routes
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(preflight))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
}

/// Answer any `OPTIONS` request with `200 {}`.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return (StatusCode::OK, Json(serde_json::json!({}))).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::relay::MessageRelay;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    fn test_router() -> Router {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        let state = Arc::new(AppState {
            relay: RelayActorHandle::new(MessageRelay::default(), CancellationToken::new()),
            config,
        });
        // Handle without installing a global recorder
        let handle = PrometheusBuilder::new().build_recorder().handle();
        build_routes(state, handle)
    }

    async fn call(router: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Response) {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_options_answers_empty_object_with_cors_headers() {
        let (status, response) = call(test_router(), Method::OPTIONS, "/anything", "").await;
        assert_eq!(status, StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_json(response).await, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let (status, response) = call(test_router(), Method::GET, "/nope", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Not found"})
        );
    }

    #[tokio::test]
    async fn test_wrong_method_on_api_path_is_not_found() {
        let (status, _) = call(test_router(), Method::GET, "/api/new", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_post_path_parses_body_first() {
        let (status, response) = call(test_router(), Method::POST, "/api/other", "{bad").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Invalid JSON"})
        );

        let (status, _) = call(test_router(), Method::POST, "/api/other", "{}").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_can_access() {
        let (status, response) = call(test_router(), Method::POST, "/api/canaccess", "{}").await;
        assert_eq!(status, StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());

        let (status, _) = call(test_router(), Method::POST, "/api/canaccess", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, response) = call(test_router(), Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_create_then_join_share_token() {
        let router = test_router();
        let body = r#"{"name":"roomA1","password":"secret1"}"#;

        let (status, response) = call(router.clone(), Method::POST, "/api/new", body).await;
        assert_eq!(status, StatusCode::OK);
        let created = body_json(response).await;
        assert!(created["token"].is_u64());

        let (status, response) = call(router.clone(), Method::POST, "/api/join", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_json(response).await, created);

        let (status, response) = call(router, Method::POST, "/api/new", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Room already exists"})
        );
    }
}
