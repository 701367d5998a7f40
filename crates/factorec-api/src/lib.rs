//! Factorec API Library
//!
//! HTTP surface of the recommendation service: `recommend`, `retrain`,
//! `health`, `stats` and a service index, served with axum.
//!
//! Author: arkSong <arksong2018@gmail.com>
//! Version: 0.1.0
//! License: Apache-2.0/MIT

pub mod error;
pub mod handlers;
pub mod routes;

use std::{future::Future, io, net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;

use factorec_engine::RecommendationEngine;

pub use error::{ApiError, ErrorResponse};
pub use handlers::AppState;
pub use routes::create_router;

/// Bind `addr` and serve the API until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, engine: Arc<RecommendationEngine>, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(AppState::new(engine));

    let listener = TcpListener::bind(addr).await?;
    info!("🚀 Factorec listening on: {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
