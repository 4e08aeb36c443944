//! Axum-based HTTP server.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokengrid_chain::ContractRegistry;
use tokengrid_queue::WorkQueue;
use tokengrid_store::Store;
use tokengrid_sync::{OffchainContentManager, SyncContext};
use tokengrid_types::Clock;
use tokengrid_worker::WorkerMetrics;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::RpcError;
use crate::handlers;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ContractRegistry>,
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn WorkQueue>,
    pub clock: Arc<dyn Clock>,
    pub offchain: Arc<OffchainContentManager>,
    pub metrics: Arc<WorkerMetrics>,
}

impl AppState {
    pub fn new(
        ctx: &SyncContext,
        offchain: Arc<OffchainContentManager>,
        metrics: Arc<WorkerMetrics>,
    ) -> Self {
        Self {
            registry: ctx.registry.clone(),
            store: ctx.store.clone(),
            queue: ctx.queue.clone(),
            clock: ctx.clock.clone(),
            offchain,
            metrics,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/networks/:network/status", get(handlers::network_status))
        .route("/networks/:network/grid-items", get(handlers::list_grid_items))
        .route(
            "/networks/:network/grid-items/:token_id",
            get(handlers::get_grid_item),
        )
        .route(
            "/networks/:network/update-tokens",
            post(handlers::enqueue_update_tokens),
        )
        .route(
            "/networks/:network/grid-items/:token_id/update",
            post(handlers::enqueue_update_token),
        )
        .route(
            "/networks/:network/grid-items/:token_id/upload-image",
            post(handlers::enqueue_upload_image),
        )
        .route("/networks/:network/base-image", post(handlers::set_base_image))
        .route(
            "/networks/:network/groups/:group_id/content",
            post(handlers::submit_group_content),
        )
        .route("/images/:image_id/go", get(handlers::image_redirect))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct RpcServer {
    pub port: u16,
    state: AppState,
}

impl RpcServer {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Serve until the shutdown channel fires, then drain in-flight requests.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), RpcError> {
        let app = self.router();
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("HTTP server listening on {}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;
        info!("HTTP server stopped");
        Ok(())
    }
}
