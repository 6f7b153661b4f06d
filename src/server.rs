//! HTTP server for the task list.
//!
//! The server provides:
//! - JSON endpoints for tasks and categories under `/api`
//! - The built client application for every other path, with `index.html` as the fallback
//! - Request logging and graceful shutdown on SIGINT/SIGTERM

use crate::config::{Backend, ServerConfig};
use crate::storage::{KeyValueStore, MemoryStore, RedisStore};
use crate::store::{Store, StoreError};
use crate::types::{Category, NewTask, Task, TaskPatch};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use eyre::{Context, Result};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
}

/// Error returned by handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<eyre::Report> for ApiError {
    fn from(report: eyre::Report) -> Self {
        match report.downcast_ref::<StoreError>() {
            Some(StoreError::TaskNotFound(id)) => {
                ApiError::new(StatusCode::NOT_FOUND, format!("Task not found: {}", id))
            }
            Some(StoreError::Validation(e)) => ApiError::new(StatusCode::BAD_REQUEST, e.to_string()),
            Some(StoreError::Connection { .. }) | Some(StoreError::Unavailable(_)) => {
                log::error!("Store unavailable: {:#}", report);
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Store unavailable")
            }
            _ => {
                log::error!("Request failed: {:?}", report);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Build the application router.
pub fn router(store: Store, config: &ServerConfig) -> Router {
    let client_app = ServeDir::new(config.static_dir()).fallback(ServeFile::new(config.index_path()));

    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", put(update_task).delete(delete_task))
        .route("/api/health", get(health))
        .fallback_service(client_app)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_requests))
        .with_state(AppState { store })
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.list_categories().await?))
}

async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<Category>, JsonRejection>,
) -> Result<Json<Category>, ApiError> {
    let Json(category) = payload?;
    Ok(Json(state.store.create_category(&category.name).await?))
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.store.list_tasks().await?))
}

async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(new) = payload?;
    Ok(Json(state.store.create_task(new).await?))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(patch) = payload?;
    Ok(Json(state.store.update_task(&id, patch).await?))
}

async fn delete_task(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.store.delete_task(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.store.ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// The task list server.
pub struct Server {
    config: ServerConfig,
    store: Store,
}

impl Server {
    /// Connect to the configured backend.
    ///
    /// For Redis this retries under the configured policy and fails once it is exhausted.
    pub async fn connect(config: ServerConfig) -> Result<Self> {
        let backend: Arc<dyn KeyValueStore> = match &config.backend {
            Backend::Redis { url, retry } => Arc::new(
                RedisStore::connect(url, retry)
                    .await
                    .context("Failed to connect to Redis")?,
            ),
            Backend::Memory => {
                log::warn!("Using in-memory store, data will be lost on exit");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::with_store(config, Store::new(backend)))
    }

    /// Create a server over an existing store.
    pub fn with_store(config: ServerConfig, store: Store) -> Self {
        Self { config, store }
    }

    /// Get the store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Build the router for this server.
    pub fn router(&self) -> Router {
        router(self.store.clone(), &self.config)
    }

    /// Bind the configured address and serve until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .wrap_err_with(|| format!("Failed to bind {}", addr))?;

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` completes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr().context("Failed to read local address")?;
        log::info!("Listening on http://{}", local_addr);
        log::info!("Serving client application from {}", self.config.static_dir().display());

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .context("Server error")?;

        log::info!("Server stopped");
        Ok(())
    }
}

/// Resolve when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
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
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    log::info!("Shutdown signal received");
}
