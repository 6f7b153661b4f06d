//! Shared test infrastructure for tasklist integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use tasklist::{MemoryStore, NewTask, ServerConfig, Store, Task, TaskPatch, router};
use tempfile::TempDir;
use tower::ServiceExt;

/// Entry document written into every test static directory.
pub const INDEX_HTML: &str = "<!doctype html><title>tasks</title><div id=\"root\"></div>";

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub static_dir: TempDir,
    pub backend: Arc<MemoryStore>,
    pub store: Store,
}

impl TestEnv {
    /// Create a new test environment with an empty in-memory store and a built client app.
    pub fn new() -> Self {
        let static_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(static_dir.path().join("index.html"), INDEX_HTML).expect("Failed to write index.html");
        fs::write(static_dir.path().join("app.js"), "console.log('tasks');").expect("Failed to write app.js");

        let backend = Arc::new(MemoryStore::new());
        let store = Store::new(backend.clone());
        Self {
            static_dir,
            backend,
            store,
        }
    }

    /// Server config pointing at this environment's static directory.
    pub fn config(&self) -> ServerConfig {
        ServerConfig::in_memory(self.static_dir.path())
    }

    /// Router over this environment's store.
    pub fn router(&self) -> Router {
        router(self.store.clone(), &self.config())
    }

    /// Create a task with just a title.
    pub async fn create_task(&self, title: &str) -> Task {
        self.store
            .create_task(NewTask {
                title: Some(title.to_string()),
                ..Default::default()
            })
            .await
            .expect("Failed to create task")
    }

    /// Create a task in a category.
    pub async fn create_task_in(&self, title: &str, category: &str) -> Task {
        self.store
            .create_task(NewTask {
                title: Some(title.to_string()),
                category: Some(category.to_string()),
                ..Default::default()
            })
            .await
            .expect("Failed to create task")
    }

    /// Create a task with tags.
    pub async fn create_task_with_tags(&self, title: &str, tags: &[&str]) -> Task {
        self.store
            .create_task(NewTask {
                title: Some(title.to_string()),
                tags: Some(tags.iter().map(|t| t.to_string()).collect()),
                ..Default::default()
            })
            .await
            .expect("Failed to create task")
    }

    /// Apply a patch to a task.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Task {
        self.store.update_task(id, patch).await.expect("Failed to update task")
    }

    /// Get a stored task by ID.
    pub async fn get(&self, id: &str) -> Option<Task> {
        self.store.get_task(id).await.expect("Failed to get task")
    }

    /// Get all tasks.
    pub async fn tasks(&self) -> Vec<Task> {
        self.store.list_tasks().await.expect("Failed to list tasks")
    }

    /// Get all category names, sorted.
    pub async fn categories(&self) -> Vec<String> {
        let mut categories = self.store.list_categories().await.expect("Failed to list categories");
        categories.sort();
        categories
    }

    /// Send a request through the router and decode the JSON response body.
    ///
    /// Empty bodies decode to `Value::Null`.
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.send_raw(method, uri, body).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response body is not JSON")
        };
        (status, json)
    }

    /// Send a request through the router and return the raw response body.
    pub async fn send_raw(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self.router().oneshot(request).await.expect("Router failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();
        (status, bytes)
    }

    /// Assert that a task is in the task list.
    pub async fn assert_listed(&self, task: &Task) {
        let tasks = self.tasks().await;
        assert!(
            tasks.iter().any(|t| t.id == task.id),
            "Expected task {} to be listed. Listed: {:?}",
            task.id,
            tasks.iter().map(|t| &t.id).collect::<Vec<_>>()
        );
    }

    /// Assert that a task is NOT in the task list.
    pub async fn assert_not_listed(&self, id: &str) {
        let tasks = self.tasks().await;
        assert!(
            !tasks.iter().any(|t| t.id == id),
            "Expected task {} to NOT be listed, but it was",
            id
        );
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
