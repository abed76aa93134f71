//! IngestServer - axum router and listener lifecycle

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use buffered_store::BufferedStore;
use contracts::{RecordSink, ServerConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{IngestError, Result};
use crate::handlers::{health, index, ping, submit};
use crate::middleware::{identify, log_requests, LoggerOptions};

/// Build the axum router over a buffered store
pub fn build_router<S>(store: Arc<BufferedStore<S>>, config: &ServerConfig) -> Router
where
    S: RecordSink + Sync + 'static,
{
    let options = LoggerOptions {
        with_referer: config.log_referer,
        with_user_agent: config.log_user_agent,
    };

    Router::new()
        .route("/", get(index))
        .route("/ping", get(ping))
        .route("/submit", post(submit::<S>))
        .route("/health", get(health::<S>))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(store)
        .layer(middleware::from_fn_with_state(options, log_requests))
        .layer(middleware::from_fn(identify))
}

/// HTTP front end of the ingestion service
pub struct IngestServer {
    config: ServerConfig,
    router: Router,
}

impl IngestServer {
    pub fn new<S>(config: ServerConfig, store: Arc<BufferedStore<S>>) -> Self
    where
        S: RecordSink + Sync + 'static,
    {
        let router = build_router(store, &config);
        Self { config, router }
    }

    /// Clone of the router (for in-process requests)
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured address and serve until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let address = self.config.addr.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| IngestError::Bind { address, source: e })?;

        self.serve(listener, cancel).await
    }

    /// Serve on an already bound listener until `cancel` fires
    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| IngestError::Serve(e.to_string()))?;
        info!(server_address = %local_addr, "Starting server");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(cancel))
            .await
            .map_err(|e| IngestError::Serve(e.to_string()))?;

        info!(server_address = %local_addr, "Server stopped");
        Ok(())
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    cancel.cancelled().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use buffered_store::StoreConfig;
    use contracts::{ContractError, EventRecord};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct MockSink {
        saved: Mutex<Vec<EventRecord>>,
    }

    impl RecordSink for MockSink {
        fn name(&self) -> &str {
            "mock"
        }

        async fn save(&self, records: &[EventRecord]) -> std::result::Result<(), ContractError> {
            self.saved.lock().unwrap().extend_from_slice(records);
            Ok(())
        }
    }

    const EVENT: &str = r#"{"client_time":"2020-12-01 23:59:00","device_id":"0287D9AA","device_os":"iOS 13.5.1","session":"ybuRi8mAUypxjbxQ","sequence":1,"event":"app_start","param_int":0,"param_str":"some text"}"#;

    fn test_app(config: &ServerConfig) -> (Arc<BufferedStore<MockSink>>, Router) {
        let store = BufferedStore::new(MockSink::default(), StoreConfig::default());
        let router = build_router(Arc::clone(&store), config);
        (store, router)
    }

    /// Request as seen behind `into_make_service_with_connect_info`
    fn http_request(method: &str, uri: &str) -> axum::http::request::Builder {
        let peer: SocketAddr = "192.0.2.10:40000".parse().unwrap();
        Request::builder()
            .method(method)
            .uri(uri)
            .extension(ConnectInfo(peer))
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn submit_request(body: impl Into<Body>) -> Request<Body> {
        http_request("POST", "/submit").body(body.into()).unwrap()
    }

    #[tokio::test]
    async fn test_index_greets_peer() {
        let (_store, app) = test_app(&ServerConfig::default());
        let request = http_request("GET", "/").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Hi, 192.0.2.10");
    }

    #[tokio::test]
    async fn test_ping_reports_time() {
        let (_store, app) = test_app(&ServerConfig::default());
        let request = http_request("GET", "/ping").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.starts_with("Server time: "));
    }

    #[tokio::test]
    async fn test_submit_buffers_valid_events() {
        let (store, app) = test_app(&ServerConfig::default());
        let body = format!("{EVENT}\n{{\"event\":\"incomplete\"}}\n{EVENT}");

        let response = app.oneshot(submit_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(store.pending_len(), 2);

        assert_eq!(store.flush().await.unwrap(), 2);
        let saved = store.sink().saved.lock().unwrap();
        assert!(saved.iter().all(|r| r.ip == "192.0.2.10"));
        assert_eq!(saved[0].server_time, saved[1].server_time);
    }

    #[tokio::test]
    async fn test_submit_uses_forwarded_address() {
        let (store, app) = test_app(&ServerConfig::default());
        let request = http_request("POST", "/submit")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::from(EVENT))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        store.flush().await.unwrap();
        assert_eq!(store.sink().saved.lock().unwrap()[0].ip, "203.0.113.9");
    }

    #[tokio::test]
    async fn test_submit_empty_body_is_created() {
        let (store, app) = test_app(&ServerConfig::default());

        let response = app.oneshot(submit_request(Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(store.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_submit_over_body_limit() {
        let config = ServerConfig {
            max_body_bytes: 16,
            ..ServerConfig::default()
        };
        let (store, app) = test_app(&config);

        let response = app.oneshot(submit_request(EVENT)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(store.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_health_reports_pending() {
        let (store, app) = test_app(&ServerConfig::default());
        let response = app
            .clone()
            .oneshot(submit_request(EVENT))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let request = http_request("GET", "/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["pending"], 1);
        assert_eq!(store.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_request_id_echoed_or_generated() {
        let (_store, app) = test_app(&ServerConfig::default());

        let request = http_request("GET", "/ping")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");

        let request = http_request("GET", "/ping").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let generated = response.headers()["x-request-id"].to_str().unwrap();
        assert_eq!(generated.len(), 36);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (_store, app) = test_app(&ServerConfig::default());
        let request = http_request("GET", "/nope").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_reports_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            addr: taken.local_addr().unwrap().to_string(),
            ..ServerConfig::default()
        };
        let store = BufferedStore::new(MockSink::default(), StoreConfig::default());
        let server = IngestServer::new(config, store);

        let result = server.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(IngestError::Bind { .. })));
    }
}
