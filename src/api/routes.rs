//! HTTP route assembly and server startup.

use std::sync::Arc;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{execution, projects, tasks, types::HealthResponse};
use crate::config::Config;
use crate::engine::Engine;
use crate::store::{create_store, DashboardStore};

/// Shared application state.
pub struct AppState {
    pub store: Arc<dyn DashboardStore>,
    pub engine: Engine,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = create_store(config.store, config.db_path.clone()).await?;
    tracing::info!(
        persistent = store.is_persistent(),
        lookback = config.status_lookback,
        "store initialized"
    );

    let engine = Engine::new(store.clone(), config.status_lookback);
    let state = Arc::new(AppState { store, engine });

    let app = router(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // Project CRUD
        .route("/api/projects", get(projects::list_projects))
        .route("/api/projects", post(projects::create_project))
        .route("/api/projects/:id", get(projects::get_project))
        .route(
            "/api/projects/:id",
            axum::routing::patch(projects::rename_project),
        )
        .route(
            "/api/projects/:id",
            axum::routing::delete(projects::delete_project),
        )
        .route("/api/projects/:id/activity", get(projects::activity_feed))
        // Task CRUD
        .route("/api/projects/:id/tasks", get(tasks::list_tasks))
        .route("/api/projects/:id/tasks", post(tasks::create_task))
        .route("/api/projects/:id/tasks/:task_id", get(tasks::get_task))
        .route(
            "/api/projects/:id/tasks/:task_id",
            axum::routing::patch(tasks::update_task),
        )
        .route(
            "/api/projects/:id/tasks/:task_id",
            axum::routing::delete(tasks::delete_task),
        )
        // Execution status engine
        .route(
            "/api/projects/:id/execution/status",
            get(execution::get_status),
        )
        .route("/api/projects/:id/execution/start", post(execution::start))
        .route("/api/projects/:id/execution/pause", post(execution::pause))
        .route("/api/projects/:id/execution/stop", post(execution::stop))
        .route(
            "/api/projects/:id/execution/respond",
            post(execution::respond),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        persistent: state.store.is_persistent(),
    })
}
