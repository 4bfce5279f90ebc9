//! HTTP front end for the resolver.
//!
//! Routes:
//! - `GET /getlink?url=<landing page>` resolves a landing page
//! - `GET /health` reports liveness and browser engine state

mod handlers;
mod routes;

pub use handlers::{status_for, GetLinkParams, HealthResponse};
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::resolver::Resolver;
use crate::scrapers::BrowserEngine;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    /// Cancelled when the server begins shutting down.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>, shutdown: CancellationToken) -> Self {
        Self { resolver, shutdown }
    }
}

/// Start the browser engine and warm it up. Failures are logged and the
/// server runs with the impersonated strategy only.
pub async fn start_engine(engine: &BrowserEngine) {
    if !engine.is_enabled() {
        info!("Browser engine disabled, rendered fallback unavailable");
        return;
    }

    match engine.start().await {
        Ok(()) => engine.warm_up().await,
        Err(e) => warn!("Continuing without browser engine: {:#}", e),
    }
}

/// Start the web server.
pub async fn serve(config: &Config, host: &str, port: u16) -> anyhow::Result<()> {
    let engine = Arc::new(BrowserEngine::new(config.browser.clone()));
    start_engine(&engine).await;
    serve_with_engine(config, engine, host, port).await
}

/// Serve until shutdown, then close the engine whether or not serving
/// succeeded.
async fn serve_with_engine(
    config: &Config,
    engine: Arc<BrowserEngine>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let served = run_server(config, engine.clone(), host, port).await;

    engine.shutdown().await;
    info!("Server stopped");
    served
}

async fn run_server(
    config: &Config,
    engine: Arc<BrowserEngine>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    let shutdown = CancellationToken::new();
    let resolver = Arc::new(Resolver::new(config, engine));
    let app = create_router(AppState::new(resolver, shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting server at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Wait for Ctrl-C or SIGTERM, then cancel in-flight resolutions.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown requested");
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::BrowserEngineConfig;
    use crate::resolver::VariantSpec;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.browser = BrowserEngineConfig {
            enabled: false,
            ..Default::default()
        };
        config.http.timeout = 5;
        config
    }

    fn setup_test_app(config: &Config, shutdown: CancellationToken) -> axum::Router {
        let engine = Arc::new(BrowserEngine::new(config.browser.clone()));
        let resolver = Arc::new(Resolver::new(config, engine));
        create_router(AppState::new(resolver, shutdown))
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = setup_test_app(&test_config(), CancellationToken::new());
        let (status, json) = get_json(app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["browser"]["state"], "disabled");
        assert_eq!(json["variants"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_getlink_missing_url() {
        let app = setup_test_app(&test_config(), CancellationToken::new());
        let (status, json) = get_json(app, "/getlink").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing ?url parameter");
        assert_eq!(json["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn test_getlink_rejects_non_http_url() {
        let app = setup_test_app(&test_config(), CancellationToken::new());
        let (status, json) = get_json(app, "/getlink?url=ftp%3A%2F%2Fexample.com%2Ff").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn test_getlink_resolves_through_impersonated_strategy() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/go/xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<html><script>window.location.href = "{}/file/abc123";</script></html>"#,
                base
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/file/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/zfile/abc123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"<a href="/dl/abc123.zip">get</a>"#),
            )
            .mount(&server)
            .await;

        let mut config = test_config();
        config.resolver.variants = vec![
            VariantSpec::new("zfile", &format!("{}/zfile/{{id}}", base), None),
            VariantSpec::new("missing", &format!("{}/nothing/{{id}}", base), None),
        ];
        let app = setup_test_app(&config, CancellationToken::new());

        let uri = format!("/getlink?url={}/go/xyz", base);
        let (status, json) = get_json(app, &uri).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["file_id"], "abc123");
        assert_eq!(json["final_url"], format!("{}/file/abc123", base));
        assert_eq!(json["strategy"], "impersonated");
        assert_eq!(
            json["download_links"]["zfile"],
            format!("{}/dl/abc123.zip", base)
        );
        assert!(json["download_links"]["missing"].is_null());
    }

    #[tokio::test]
    async fn test_getlink_redirect_not_found_without_browser() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><title>Just a moment...</title></html>"),
            )
            .mount(&server)
            .await;

        let app = setup_test_app(&test_config(), CancellationToken::new());
        let uri = format!("/getlink?url={}/landing", server.uri());
        let (status, json) = get_json(app, &uri).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json["kind"], "redirect_not_found");
        assert_eq!(json["title"], "Just a moment...");
        assert_eq!(json["last_url"], format!("{}/landing", server.uri()));
    }

    #[tokio::test]
    async fn test_getlink_cancelled_during_shutdown() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let app = setup_test_app(&test_config(), shutdown);

        let (status, json) = get_json(app, "/getlink?url=http://127.0.0.1:9/landing").await;

        assert_eq!(status.as_u16(), 499);
        assert_eq!(json["kind"], "cancelled");
    }

    #[tokio::test]
    async fn test_serve_closes_engine_when_address_is_invalid() {
        let config = test_config();
        let engine = Arc::new(BrowserEngine::new(config.browser.clone()));

        let result = serve_with_engine(&config, engine.clone(), "not a host", 10000).await;

        assert!(result.is_err());
        assert_eq!(
            engine.status().await,
            crate::scrapers::EngineStatus::Closed
        );
    }
}
