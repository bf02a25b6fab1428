use axum::{
    routing::{delete, get, patch, post},
    Json, Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::api::{self, AppState};
use crate::db::Database;
use crate::error::MatchbookError;

pub struct WebServer {
    host: String,
    port: u16,
    db: Database,
}

impl WebServer {
    pub fn new(host: String, port: u16, db: Database) -> Self {
        Self { host, port, db }
    }

    pub async fn start(&self) -> Result<(), MatchbookError> {
        let app = self.create_router();

        let addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| MatchbookError::Error(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MatchbookError::Error(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("Server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                log::info!("Shutdown signal received, stopping server");
            })
            .await
            .map_err(|e| MatchbookError::Error(format!("Server error: {}", e)))?;

        log::info!("Server shutdown complete");
        Ok(())
    }

    fn create_router(&self) -> Router {
        let state = AppState::new(self.db.clone());

        Router::new()
            // Health check
            .route("/health", get(health_check))
            // Matches API
            .route("/matches", get(api::matches::list_matches))
            .route("/matches", post(api::matches::create_match))
            .route("/matches/{id}", patch(api::matches::update_match))
            .route("/matches/{id}", delete(api::matches::delete_match))
            // Deck templates API
            .route(
                "/deck-templates",
                get(api::deck_templates::list_deck_templates),
            )
            .route(
                "/deck-templates",
                post(api::deck_templates::create_deck_template),
            )
            .route(
                "/deck-templates/{id}",
                patch(api::deck_templates::update_deck_template),
            )
            .route(
                "/deck-templates/{id}",
                delete(api::deck_templates::delete_deck_template),
            )
            .with_state(state)
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "message": "matchbook is running",
    }))
}

/// Waits for a shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received SIGINT (Ctrl+C)");
        },
        _ = terminate => {
            log::info!("Received SIGTERM");
        },
    }
}
