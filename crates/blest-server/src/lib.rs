//! blest-server: HTTP transport for the BLEST runtime
//!
//! Maps one `POST` endpoint onto a [`blest_core::Router`]:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                blest-server                  │
//! ├─────────────────────────────────────────────┤
//! │  config.rs        - YAML + env configuration│
//! │  headers.rs       - security response headers│
//! │  middleware/      - tower layers            │
//! │  observability/   - logging init            │
//! │  routes.rs        - the batch endpoint      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use blest_core::{Handler, Router, RouterOptions};
//! use blest_server::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     blest_server::init_logging((&config.logging).into());
//!
//!     let mut router = Router::new(RouterOptions::from(&config.router));
//!     router.route("greet", vec![Handler::controller(|_, _| async {
//!         Ok(Some(serde_json::json!({"greeting": "hi"})))
//!     })])?;
//!
//!     serve(Arc::new(router), config).await
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use blest_core::RouterOptions;
use tokio::signal;
use tracing::{info, warn};

pub mod config;
pub mod headers;
pub mod middleware;
pub mod observability;
pub mod routes;

// Re-exports for convenience
pub use config::{ConfigLoadError, HttpSettings, LoggingSettings, RouterSettings, ServerConfig};
pub use headers::construct_http_headers;
pub use observability::{init_logging, LoggingConfig};
pub use routes::create_app;

/// Serves `router` over HTTP until SIGINT/SIGTERM.
///
/// Routers are expected to be built from `config.router` (see
/// [`RouterOptions::from`]); a router built with different options is served
/// as-is, with a warning, because route timeouts were fixed when its routes
/// were registered.
pub async fn serve(router: Arc<blest_core::Router>, config: ServerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let configured = RouterOptions::from(&config.router);
    if *router.options() != configured {
        warn!(
            configured_timeout_ms = configured.timeout_ms,
            served_timeout_ms = router.timeout_ms(),
            configured_introspection = configured.introspection,
            served_introspection = router.introspection(),
            "router configuration does not match the served router; its own options apply"
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = create_app(router, &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, url = %config.server.url, "BLEST server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
