// /forum-platform/services/upload-service/src/routes.rs

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::handlers::*;
use crate::identity::identity_middleware;
use crate::policy::UploadEndpoint;
use crate::rate_limit::rate_limit_middleware;
use crate::storage::PUBLIC_PREFIX;
use crate::AppState;

// Ruang untuk boundary dan header part di atas ukuran file
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Router lengkap upload service
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.uploader.policies().largest_ceiling() as usize + MULTIPART_OVERHEAD_BYTES;
    let timeout = Duration::from_secs(state.config.request_timeout_seconds);
    let cors = cors_layer(&state.config.cors_allowed_origins);

    // Upload routes: identity di-resolve dulu (layer terluar), lalu rate limit
    let upload_routes = Router::new()
        .route("/api/forum/posts/attachments", post(upload_post_attachment))
        .route("/api/forum/replies/attachments", post(upload_reply_attachment))
        .route("/api/notes/attachments", post(upload_note_attachment))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), identity_middleware))
        .layer(DefaultBodyLimit::max(body_limit));

    let mut app = Router::new()
        // Health endpoint
        .route("/health", get(health_check))
        .merge(upload_routes);

    // Serve file yang sudah tersimpan, temp directory tidak ikut di-serve
    for endpoint in UploadEndpoint::all() {
        let category = endpoint.category();
        app = app.nest_service(
            &format!("{}/{}", PUBLIC_PREFIX, category),
            ServeDir::new(state.config.upload_dir.join(category)),
        );
    }

    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(timeout))
            .layer(cors),
    )
    .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("CORS origin diabaikan, tidak valid: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::{
        body::{Body, Bytes},
        extract::ConnectInfo,
        http::{Request, StatusCode},
    };
    use futures::StreamExt;
    use serde_json::Value;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    const BOUNDARY: &str = "forum-test-boundary";
    const PEER: &str = "198.51.100.20:52000";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    fn test_app(dir: &tempfile::TempDir, extra: &[(&str, &str)]) -> Router {
        let mut pairs: Vec<(String, String)> = vec![(
            "UPLOAD_DIR".to_string(),
            dir.path().to_string_lossy().to_string(),
        )];
        pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let config = AppConfig::from_source(move |key| {
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap();

        create_router(AppState::from_config(config).unwrap())
    }

    fn part_header(field: &str, filename: &str, content_type: &str) -> Vec<u8> {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes()
    }

    // Request upload seperti yang dibangun server: peer address ada di ConnectInfo
    fn upload_request(uri: &str, peer: &str, body: Body) -> Request<Body> {
        let peer: SocketAddr = peer.parse().unwrap();

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .extension(ConnectInfo(peer))
            .body(body)
            .unwrap()
    }

    fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Body {
        let mut body = part_header(field, filename, content_type);
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn multipart_request(uri: &str, field: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        upload_request(uri, PEER, multipart_body(field, filename, content_type, data))
    }

    fn forwarded_jpeg(peer: &str, forwarded_for: &str) -> Request<Body> {
        let body = multipart_body("file", "a.jpg", "image/jpeg", JPEG);
        let mut request = upload_request("/api/forum/posts/attachments", peer, body);
        request
            .headers_mut()
            .insert("x-forwarded-for", forwarded_for.parse().unwrap());
        request
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(&dir, &[])
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_accepted_upload_is_stored_and_served() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir, &[]);

        let response = app
            .clone()
            .oneshot(multipart_request(
                "/api/forum/posts/attachments",
                "file",
                "my vacation (1).jpg",
                "image/jpeg",
                JPEG,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        let data = &json["data"];
        assert_eq!(data["original_name"], "my vacation (1).jpg");
        assert_eq!(data["sanitized_name"], "my_vacation__1_.jpg");
        assert_eq!(data["content_type"], "image/jpeg");
        assert_eq!(data["size_bytes"], JPEG.len() as u64);

        let stored_name = data["stored_name"].as_str().unwrap();
        let file_path = data["file_path"].as_str().unwrap();
        assert_eq!(file_path, format!("/storage/posts/{}", stored_name));
        assert_eq!(std::fs::read(dir.path().join("posts").join(stored_name)).unwrap(), JPEG);

        let served = app
            .oneshot(Request::builder().uri(file_path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(served.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(served.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], JPEG);
    }

    #[tokio::test]
    async fn test_disguised_executable_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(&dir, &[])
            .oneshot(multipart_request(
                "/api/forum/replies/attachments",
                "file",
                "invoice.pdf.exe",
                "application/pdf",
                b"%PDF-1.7",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "DOUBLE_EXTENSION");
        assert_eq!(json["details"]["reason"], "DOUBLE_EXTENSION");

        // Tidak ada file yang tersimpan
        assert_eq!(std::fs::read_dir(dir.path().join("replies")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_reply_rejects_archives() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(&dir, &[])
            .oneshot(multipart_request(
                "/api/forum/replies/attachments",
                "file",
                "bundle.zip",
                "application/zip",
                b"PK\x03\x04rest",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(response).await["error_code"], "UNSUPPORTED_TYPE");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data = vec![b'a'; 1024 * 1024 + 1];
        let response = test_app(&dir, &[("NOTE_MAX_SIZE_MB", "1")])
            .oneshot(multipart_request(
                "/api/notes/attachments",
                "file",
                "notes.txt",
                "text/plain",
                &data,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["error_code"], "SIZE_EXCEEDED");
    }

    #[tokio::test]
    async fn test_binary_in_text_rejected_when_inspection_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(&dir, &[])
            .oneshot(multipart_request(
                "/api/notes/attachments",
                "file",
                "report.txt",
                "text/plain",
                b"\x00\x01\x02\x03",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error_code"], "SIGNATURE_MISMATCH");
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(&dir, &[])
            .oneshot(multipart_request(
                "/api/forum/posts/attachments",
                "attachment",
                "vacation.jpg",
                "image/jpeg",
                JPEG,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error_code"], "NO_FILE_FOUND");
    }

    #[tokio::test]
    async fn test_rate_limit_applies_to_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir, &[("RATE_LIMIT_MAX_REQUESTS", "1")]);

        let first = app
            .clone()
            .oneshot(multipart_request("/api/forum/posts/attachments", "file", "a.jpg", "image/jpeg", JPEG))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .clone()
            .oneshot(multipart_request("/api/forum/posts/attachments", "file", "b.jpg", "image/jpeg", JPEG))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[header::RETRY_AFTER], "60");
        let json = json_body(second).await;
        assert_eq!(json["error_code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(json["details"]["retry_after_seconds"], 60);

        // Health check tidak kena rate limit
        let health = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_forwarded_for_cannot_bypass_rate_limit() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir, &[("RATE_LIMIT_MAX_REQUESTS", "1")]);

        let mut statuses = Vec::new();
        for i in 1..=5 {
            let response = app
                .clone()
                .oneshot(forwarded_jpeg(PEER, &format!("203.0.113.{i}")))
                .await
                .unwrap();
            statuses.push(response.status());
        }

        assert_eq!(statuses[0], StatusCode::CREATED);
        assert!(statuses[1..].iter().all(|status| *status == StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn test_trusted_proxy_gives_each_client_its_own_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(
            &dir,
            &[("RATE_LIMIT_MAX_REQUESTS", "1"), ("TRUSTED_PROXIES", "10.0.0.5")],
        );
        let proxy = "10.0.0.5:40000";

        let first = app.clone().oneshot(forwarded_jpeg(proxy, "203.0.113.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let other = app.clone().oneshot(forwarded_jpeg(proxy, "203.0.113.2")).await.unwrap();
        assert_eq!(other.status(), StatusCode::CREATED);

        // Entry palsu di kiri tidak mengubah hop yang ditambahkan proxy
        let spoofed = app
            .oneshot(forwarded_jpeg(proxy, "198.51.100.99, 203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(spoofed.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_timed_out_upload_releases_concurrent_slot() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(
            &dir,
            &[("MAX_CONCURRENT_UPLOADS", "1"), ("REQUEST_TIMEOUT_SECONDS", "1")],
        );

        // Body berhenti di tengah file dan tidak pernah selesai
        let mut head = part_header("file", "slow.jpg", "image/jpeg");
        head.extend_from_slice(JPEG);
        let stalled = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(head))])
            .chain(futures::stream::pending());

        let response = app
            .clone()
            .oneshot(upload_request(
                "/api/forum/posts/attachments",
                PEER,
                Body::from_stream(stalled),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let next = app
            .oneshot(multipart_request("/api/forum/posts/attachments", "file", "b.jpg", "image/jpeg", JPEG))
            .await
            .unwrap();
        assert_eq!(next.status(), StatusCode::CREATED);
    }
}
