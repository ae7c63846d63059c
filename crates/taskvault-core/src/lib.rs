//! Core task store for taskvault: markdown task files in status-named vault
//! folders, a daemon-backed fast path, and the access layer that keeps one
//! API over both.

pub mod config;
pub mod daemon;
pub mod dates;
pub mod error;
pub mod frontmatter;
pub mod ident;
pub mod store;
pub mod task;
pub mod vault;

pub use error::StoreError;
pub use store::{TaskBackend, TaskFilter, TaskStore};
pub use task::{Status, Task, TaskDraft, TaskPatch};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
