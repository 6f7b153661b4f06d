//! Tasklist: a task list HTTP API backed by a key-value store.
//!
//! Tasks live in a Redis hash keyed by task ID; category names live in a Redis set. Writing a
//! task with a category also adds that category to the set, and nothing ever removes one.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tasklist::{MemoryStore, NewTask, Store, TaskPatch};
//!
//! # tokio_test_block_on(async {
//! let store = Store::new(Arc::new(MemoryStore::new()));
//!
//! let task = store
//!     .create_task(NewTask {
//!         title: Some("Buy milk".to_string()),
//!         category: Some("home".to_string()),
//!         ..Default::default()
//!     })
//!     .await
//!     .unwrap();
//!
//! let done = store
//!     .update_task(&task.id, TaskPatch { completed: Some(true), ..Default::default() })
//!     .await
//!     .unwrap();
//! assert!(done.completed);
//!
//! assert_eq!(store.list_categories().await.unwrap(), vec!["home".to_string()]);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

mod id;
mod store;
mod types;

pub mod config;
pub mod server;
pub mod storage;

// Re-export public API
pub use config::{Backend, ServerConfig};
pub use server::{ApiError, Server, router};
pub use storage::{KeyValueStore, MemoryStore, RedisStore, RetryPolicy};
pub use store::{CATEGORIES_SET, Store, StoreError, TASKS_TABLE};
pub use types::{Category, NewTask, Task, TaskPatch, ValidationError};
