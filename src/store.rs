//! High-level task and category API.

use crate::id::generate_id;
use crate::storage::KeyValueStore;
use crate::types::{Category, NewTask, Task, TaskPatch, ValidationError, normalize_category, validate_category};
use chrono::{DateTime, SubsecRound, Utc};
use eyre::{Context, Result};
use std::sync::Arc;

/// Hash holding every task, keyed by task ID.
pub const TASKS_TABLE: &str = "tasks";

/// Set holding every category name.
pub const CATEGORIES_SET: &str = "categories";

/// Errors that can occur during store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Task not found.
    TaskNotFound(String),
    /// Input failed validation.
    Validation(ValidationError),
    /// The backend could not be reached within the retry budget.
    Connection { attempts: u32, message: String },
    /// The backend is temporarily unreachable.
    Unavailable(String),
    /// The backend rejected an operation.
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::TaskNotFound(id) => write!(f, "task not found: {}", id),
            StoreError::Validation(e) => write!(f, "validation error: {}", e),
            StoreError::Connection { attempts, message } => {
                write!(f, "store connection failed after {} attempts: {}", attempts, message)
            }
            StoreError::Unavailable(message) => write!(f, "store unavailable: {}", message),
            StoreError::Backend(message) => write!(f, "store error: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

/// The task list store.
///
/// Holds no state of its own; every call goes to the backend. Cloning shares the backend.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn KeyValueStore>,
}

impl Store {
    /// Create a store over the given backend.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Check that the backend answers.
    pub async fn ping(&self) -> Result<()> {
        self.backend.ping().await
    }

    /// List every category name, unordered.
    pub async fn list_categories(&self) -> Result<Vec<String>> {
        self.backend
            .set_members(CATEGORIES_SET)
            .await
            .context("Failed to list categories")
    }

    /// Add a category. Adding an existing name is a no-op.
    pub async fn create_category(&self, name: &str) -> Result<Category> {
        validate_category(name).map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        self.backend
            .set_add(CATEGORIES_SET, name)
            .await
            .context("Failed to add category")?;

        Ok(Category { name: name.to_string() })
    }

    /// List every task, in backend iteration order.
    ///
    /// Records that cannot be decoded are skipped with a warning.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let entries = self
            .backend
            .hash_get_all(TASKS_TABLE)
            .await
            .context("Failed to list tasks")?;

        let mut tasks = Vec::with_capacity(entries.len());
        for (id, json) in entries {
            match decode_task(&id, &json) {
                Ok(task) => tasks.push(task),
                Err(e) => log::warn!("Skipping unreadable task {}: {}", id, e),
            }
        }
        Ok(tasks)
    }

    /// Get a task by ID.
    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let json = self
            .backend
            .hash_get(TASKS_TABLE, id)
            .await
            .context("Failed to read task")?;

        json.map(|json| decode_task(id, &json).wrap_err_with(|| format!("Task {} is corrupt", id)))
            .transpose()
    }

    /// Create a new task with a server-assigned ID.
    pub async fn create_task(&self, new: NewTask) -> Result<Task> {
        let now = now();
        let title = new.title.unwrap_or_default();
        let id = generate_id(&title, now);

        let task = Task {
            id,
            title,
            completed: new.completed.unwrap_or(false),
            category: normalize_category(new.category),
            tags: new.tags.unwrap_or_default(),
            updated_at: now,
        };

        // Validate before persisting
        task.validate().map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        self.put_task(&task).await.context("Failed to persist task")?;
        log::debug!("Created task {}", task.id);

        Ok(task)
    }

    /// Overlay the fields present in `patch` onto the stored task.
    ///
    /// Read-modify-write without locking: concurrent updates to one task race and the last
    /// write wins.
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let existing = self
            .get_task(id)
            .await?
            .ok_or_else(|| eyre::eyre!(StoreError::TaskNotFound(id.to_string())))?;

        patch.validate().map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        if patch.is_empty() {
            log::debug!("Empty update for task {}, refreshing timestamp only", id);
        }

        let now = now();
        let updated = Task {
            id: id.to_string(),
            title: patch.title.unwrap_or(existing.title),
            completed: patch.completed.unwrap_or(existing.completed),
            category: match patch.category {
                Some(category) => normalize_category(category),
                None => existing.category,
            },
            tags: patch.tags.unwrap_or(existing.tags),
            updated_at: now,
        };

        self.put_task(&updated)
            .await
            .context("Failed to persist updated task")?;

        Ok(updated)
    }

    /// Permanently remove a task. Its category stays in the category set.
    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let existed = self
            .backend
            .hash_delete(TASKS_TABLE, id)
            .await
            .context("Failed to delete task")?;

        if !existed {
            return Err(eyre::eyre!(StoreError::TaskNotFound(id.to_string())));
        }
        log::debug!("Deleted task {}", id);
        Ok(())
    }

    /// Write a task, then add its category to the category set.
    async fn put_task(&self, task: &Task) -> Result<()> {
        let json = serde_json::to_string(task).context("Failed to serialize task")?;
        self.backend.hash_set(TASKS_TABLE, &task.id, &json).await?;

        if let Some(category) = task.category_name() {
            self.backend.set_add(CATEGORIES_SET, category).await?;
        }
        Ok(())
    }
}

/// Current time at the precision tasks are stored with.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Decode a stored record; the hash field is the authoritative ID.
fn decode_task(id: &str, json: &str) -> Result<Task> {
    let mut task: Task = serde_json::from_str(json)?;
    task.id = id.to_string();
    Ok(task)
}
