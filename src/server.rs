//! Axum router construction.
//!
//! The [`app`] function wires the delivery middleware around a minimal
//! inner router.  Media requests never reach a route: the middleware
//! claims and serves them, and everything it declines falls through to
//! the inner router, whose fallback answers 404.  An application
//! embedding this crate would put its own routes behind the middleware
//! instead.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::delivery::delivery_middleware;
use crate::AppState;

/// Build the axum [`Router`] with the delivery middleware installed.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint.
        .route("/health", get(health_check))
        // Anything the delivery middleware declines lands here.
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state, delivery_middleware))
        .layer(TraceLayer::new_for_http())
}

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

/// Terminal handler for requests no mount served.
async fn not_found(req: Request) -> impl IntoResponse {
    debug!("no handler for {} {}", req.method(), req.uri().path());
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FilesystemConfig};
    use crate::delivery::Mount;
    use crate::registry::FilesystemRegistry;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use bytes::Bytes;
    use std::collections::HashMap;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let mut filesystems = HashMap::new();
        filesystems.insert(
            "media".to_string(),
            FilesystemConfig {
                backend: "memory".to_string(),
                key_prefix: "media".to_string(),
                virtual_path: "/media".to_string(),
                ..FilesystemConfig::default()
            },
        );
        let config = Config {
            server: Default::default(),
            logging: Default::default(),
            filesystems: filesystems.clone(),
        };

        let registry = Arc::new(FilesystemRegistry::new(&filesystems));
        let fs = registry.get("media").await.unwrap();
        fs.add_file("img.jpg", Bytes::from_static(b"hello world"), true)
            .await
            .unwrap();
        fs.add_file("my file.jpg", Bytes::from_static(b"spaced"), true)
            .await
            .unwrap();

        let state = Arc::new(AppState {
            config,
            registry,
            mounts: vec![Mount::new("media", "/media")],
        });
        app(state)
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app().await;
        let response = app.oneshot(request(Method::GET, "/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_serves_object_with_headers() {
        let app = test_app().await;
        let response = app
            .oneshot(request(Method::GET, "/media/img.jpg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(headers[header::CONTENT_LENGTH], "11");
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "public, must-revalidate, max-age=604800"
        );
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::VARY], "Accept-Encoding");
        assert!(headers.contains_key(header::ETAG));
        assert!(headers.contains_key(header::LAST_MODIFIED));

        assert_eq!(body_bytes(response).await.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_head_serves_headers_without_body() {
        let app = test_app().await;
        let response = app
            .oneshot(request(Method::HEAD, "/media/img.jpg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "11");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_percent_encoded_path_is_decoded() {
        let app = test_app().await;
        let response = app
            .oneshot(request(Method::GET, "/media/my%20file.jpg"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.as_ref(), b"spaced");
    }

    #[tokio::test]
    async fn test_missing_object_falls_through_to_404() {
        let app = test_app().await;
        let response = app
            .oneshot(request(Method::GET, "/media/missing.jpg"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unclaimed_path_passes_through() {
        let app = test_app().await;
        let response = app
            .oneshot(request(Method::GET, "/other/img.jpg"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_get_is_not_claimed() {
        let app = test_app().await;
        let response = app
            .oneshot(request(Method::POST, "/media/img.jpg"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_range_request_returns_partial_content() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/media/img.jpg")
                    .header(header::RANGE, "bytes=2-5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 2-5/11");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
        assert_eq!(body_bytes(response).await.as_ref(), b"llo ");
    }

    #[tokio::test]
    async fn test_suffix_range() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/media/img.jpg")
                    .header(header::RANGE, "bytes=-5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 6-10/11");
        assert_eq!(body_bytes(response).await.as_ref(), b"world");
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_returns_416() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/media/img.jpg")
                    .header(header::RANGE, "bytes=100-")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */11");
    }

    #[tokio::test]
    async fn test_invalid_range_header_is_ignored() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/media/img.jpg")
                    .header(header::RANGE, "bytes=4-2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.as_ref(), b"hello world");
    }
}
