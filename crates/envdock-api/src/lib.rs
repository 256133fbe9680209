//! Backend API access for envdock
//!
//! This crate provides a typed client for the envdock backend's HTTP and
//! server-sent-event surface, behind a trait so the rest of the application
//! can be tested against a mock.

mod error;
mod http;
mod sse;
mod types;

pub use error::*;
pub use http::HttpApi;
pub use sse::{SseDecoder, SseEvent};
pub use types::*;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Trait covering every backend operation the client uses.
///
/// Each method issues exactly one HTTP request (or opens one event stream).
/// There are no retries and no backoff; a non-2xx response becomes an
/// [`ApiError::Server`] carrying the server's `detail` message.
#[async_trait]
pub trait EnvdockApi: Send + Sync {
    /// List environments, optionally filtered by folder id
    async fn list_environments(&self, folder_id: Option<&str>) -> Result<Vec<Environment>>;

    /// Create a new environment
    async fn create_environment(&self, input: &EnvironmentInput) -> Result<Environment>;

    /// Apply a partial update (rename, options, folder membership)
    async fn update_environment(&self, id: &str, patch: &EnvironmentUpdate)
        -> Result<Environment>;

    /// Delete an environment (soft or hard is backend-defined)
    async fn delete_environment(&self, id: &str) -> Result<()>;

    /// Duplicate an existing environment under a new input
    async fn duplicate_environment(&self, id: &str, input: &EnvironmentInput)
        -> Result<Environment>;

    /// Start the environment's container
    async fn activate_environment(&self, id: &str) -> Result<()>;

    /// Stop the environment's container
    async fn deactivate_environment(&self, id: &str) -> Result<()>;

    /// Open the log event stream for an environment.
    ///
    /// Raw payload chunks are forwarded to `chunks` as they arrive. The
    /// returned handle closes the connection when closed or dropped; after
    /// that no further chunks are sent.
    async fn stream_logs(
        &self,
        id: &str,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<StreamHandle>;

    /// Check whether a host path holds a valid ComfyUI installation
    async fn valid_comfyui_path(&self, path: &str) -> Result<bool>;

    /// Ask the backend to install ComfyUI at the given path
    async fn install_comfyui(&self, path: &str, branch: &str) -> Result<()>;

    /// Fetch the per-user settings singleton
    async fn user_settings(&self) -> Result<UserSettings>;

    /// Overwrite the per-user settings wholesale
    async fn update_user_settings(&self, settings: &UserSettings) -> Result<UserSettings>;

    /// List available base-image release tags
    async fn image_tags(&self) -> Result<Vec<String>>;

    /// Check whether an image reference exists locally on the backend host
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Pull an image, streaming progress percentages to `progress`.
    ///
    /// Resolves on the terminal `completed` event and errs on an `error`
    /// payload or a connection failure. Dropping the future closes the
    /// stream; after return no further progress updates are sent.
    async fn pull_image(&self, image: &str, progress: mpsc::UnboundedSender<f64>) -> Result<()>;

    /// Create a user folder
    async fn create_folder(&self, input: &FolderInput) -> Result<Folder>;

    /// Rename a user folder
    async fn update_folder(&self, id: &str, input: &FolderInput) -> Result<Folder>;

    /// Delete a user folder
    async fn delete_folder(&self, id: &str) -> Result<()>;
}

/// Handle owning a live event-stream connection.
///
/// Closing (or dropping) the handle aborts the reader task, which drops the
/// underlying response and releases the connection. The disposer runs at
/// most once per handle by construction.
pub struct StreamHandle {
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Close the stream explicitly.
    pub fn close(self) {
        // Drop runs the abort.
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
