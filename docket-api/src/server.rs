//! API Server setup

use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::create_router;
use crate::state::{ApiConfig, AppState};

type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Build the router with middleware applied
pub fn build_app(config: &ApiConfig, state: AppState) -> Router {
    let mut router = create_router(state).layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Create the API server
pub fn create_server(config: ApiConfig, state: AppState) -> Result<(Router, SocketAddr), ServerError> {
    let router = build_app(&config, state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    Ok((router, addr))
}

/// Run the API server
pub async fn run_server(config: ApiConfig, state: AppState) -> Result<(), ServerError> {
    let (router, addr) = create_server(config, state)?;

    tracing::info!("Docket API server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Serve on a listener shared with sibling workers until `shutdown` resolves
pub async fn serve_shared(
    listener: &std::net::TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let listener = listener.try_clone()?;
    listener.set_nonblocking(true)?;
    let listener = TcpListener::from_std(listener)?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Start server in background (for testing)
pub async fn start_background_server(config: ApiConfig, state: AppState) -> Result<SocketAddr, ServerError> {
    let (router, addr) = create_server(config, state)?;

    // Bind to get actual address (useful when port is 0)
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
