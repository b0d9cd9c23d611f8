//! JSON API over a shared [`TransferEngine`].

pub mod error;
pub mod handlers;
pub mod request_id;

use crate::application::engine::TransferEngine;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

pub fn router(engine: Arc<TransferEngine>) -> Router {
    Router::new()
        .route("/api/v1/accounts", post(handlers::create_account))
        .route("/api/v1/accounts/{account_id}", get(handlers::get_account))
        .route("/api/v1/transactions", post(handlers::transfer_money))
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(middleware::from_fn(request_id::request_context))
        .with_state(engine)
}

/// Serves the API until Ctrl-C, letting in-flight requests finish.
pub async fn serve(engine: Arc<TransferEngine>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(
        listener,
        router(engine).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
