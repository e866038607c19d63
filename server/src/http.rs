//! HTTP binding: the streamable MCP endpoint plus a liveness probe.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use tokio::net::TcpListener;
use tracing::info;

use crate::search::SearchService;
use crate::tools::HttpSearchTools;

/// Path of the liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// Path the MCP endpoint is mounted at.
pub const MCP_PATH: &str = "/mcp";

/// Build the application router.
pub fn router(service: SearchService) -> Router {
    let mcp = StreamableHttpService::new(
        move || Ok(HttpSearchTools::new(service.clone())),
        Arc::new(LocalSessionManager::default()),
        Default::default(),
    );

    Router::new()
        .route(HEALTH_PATH, get(health))
        .nest_service(MCP_PATH, mcp)
}

async fn health() -> &'static str {
    "ok"
}

/// Serve `service` on `listener` until ctrl-c.
pub async fn serve(listener: TcpListener, service: SearchService) -> std::io::Result<()> {
    info!(
        "Listening on http://{}{MCP_PATH}",
        listener.local_addr()?
    );
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
}
