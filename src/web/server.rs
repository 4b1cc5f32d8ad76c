use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;
use crate::context::AppContext;

use super::api::{
    authenticate, bot_status, bulk_update_config, get_config, get_history, get_status,
    health_check, request_login_code, reset, submit_login_code,
};
use super::auth::require_basic_auth;

/// Builds the application router.
///
/// `/health` is open; everything under `/api` needs Basic auth. A frontend
/// directory, when given and present, is served for all other paths.
pub fn router(ctx: AppContext, static_dir: Option<&Path>) -> Router {
    let api_routes = Router::new()
        .route("/config", get(get_config))
        .route("/config/bulk", post(bulk_update_config))
        .route("/status", get(get_status))
        .route("/history", get(get_history))
        .route("/reset", post(reset))
        .route("/auth", post(authenticate))
        .route("/bot-status", get(bot_status))
        .route("/login", get(request_login_code).post(submit_login_code))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), require_basic_auth));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .with_state(ctx);

    match static_dir {
        Some(dir) if dir.is_dir() => {
            tracing::info!(dir = %dir.display(), "Serving frontend");
            app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
        }
        Some(dir) => {
            tracing::warn!(dir = %dir.display(), "Frontend directory not found, not serving it");
        }
        None => {}
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the API until `shutdown` is cancelled.
pub async fn run_server(
    ctx: AppContext,
    web_config: &WebConfig,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let app = router(ctx, web_config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(&web_config.listen).await?;
    tracing::info!("Web server listening on {}", web_config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            tracing::info!("Web server shutting down gracefully");
        })
        .await?;

    Ok(())
}
