//! Test support utilities for envdock-core
//!
//! Provides MockApi and helpers for unit testing the EnvironmentManager
//! without a running backend.

use crate::{NoticeKind, Notifier};
use async_trait::async_trait;
use envdock_api::*;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// Records which methods were called on the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    List { folder_id: Option<String> },
    Create { name: String },
    Update { id: String },
    Delete { id: String },
    Duplicate { id: String, name: String },
    Activate { id: String },
    Deactivate { id: String },
    StreamLogs { id: String },
    ValidPath { path: String },
    Install { path: String, branch: String },
    GetSettings,
    UpdateSettings,
    ImageTags,
    ImageExists { image: String },
    PullImage { image: String },
    CreateFolder { name: String },
    UpdateFolder { id: String },
    DeleteFolder { id: String },
}

/// Configurable mock backend for testing
pub struct MockApi {
    pub calls: Arc<Mutex<Vec<MockCall>>>,
    /// Result for list calls
    pub list_result: Arc<Mutex<Result<Vec<Environment>>>>,
    /// Result for create calls
    pub create_result: Arc<Mutex<Result<Environment>>>,
    /// Result for update calls
    pub update_result: Arc<Mutex<Result<Environment>>>,
    /// Result for delete calls
    pub delete_result: Arc<Mutex<Result<()>>>,
    /// Result for duplicate calls
    pub duplicate_result: Arc<Mutex<Result<Environment>>>,
    /// Result for activate calls
    pub activate_result: Arc<Mutex<Result<()>>>,
    /// Result for deactivate calls
    pub deactivate_result: Arc<Mutex<Result<()>>>,
    /// Result for path validity checks
    pub valid_path_result: Arc<Mutex<Result<bool>>>,
    /// Result for install calls
    pub install_result: Arc<Mutex<Result<()>>>,
    /// Result for user-settings fetches
    pub settings_result: Arc<Mutex<Result<UserSettings>>>,
    /// Result for tag listing
    pub tags_result: Arc<Mutex<Result<Vec<String>>>>,
    /// Result for image existence checks
    pub image_exists_result: Arc<Mutex<Result<bool>>>,
    /// Terminal result for pull calls, returned after `pull_events` drain
    pub pull_result: Arc<Mutex<Result<()>>>,
    /// Progress values a pull emits before finishing
    pub pull_events: Arc<Mutex<Vec<f64>>>,
    /// Chunks a log stream emits on open
    pub log_chunks: Arc<Mutex<Vec<String>>>,
    /// Result for folder create/update calls
    pub folder_result: Arc<Mutex<Result<Folder>>>,
    /// Result for folder delete calls
    pub delete_folder_result: Arc<Mutex<Result<()>>>,
    /// When set, activate/deactivate block until notified. Lets tests
    /// observe in-flight busy markers.
    pub lifecycle_gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl MockApi {
    /// Create a new mock with default success results
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            list_result: Arc::new(Mutex::new(Ok(Vec::new()))),
            create_result: Arc::new(Mutex::new(Ok(mock_environment("env1", "env-a")))),
            update_result: Arc::new(Mutex::new(Ok(mock_environment("env1", "env-a")))),
            delete_result: Arc::new(Mutex::new(Ok(()))),
            duplicate_result: Arc::new(Mutex::new(Ok(mock_environment("env2", "env-a-copy")))),
            activate_result: Arc::new(Mutex::new(Ok(()))),
            deactivate_result: Arc::new(Mutex::new(Ok(()))),
            valid_path_result: Arc::new(Mutex::new(Ok(true))),
            install_result: Arc::new(Mutex::new(Ok(()))),
            settings_result: Arc::new(Mutex::new(Ok(UserSettings::default()))),
            tags_result: Arc::new(Mutex::new(Ok(vec![
                "latest".to_string(),
                "v0.3.1".to_string(),
            ]))),
            image_exists_result: Arc::new(Mutex::new(Ok(true))),
            pull_result: Arc::new(Mutex::new(Ok(()))),
            pull_events: Arc::new(Mutex::new(Vec::new())),
            log_chunks: Arc::new(Mutex::new(Vec::new())),
            folder_result: Arc::new(Mutex::new(Ok(Folder {
                id: "f1".to_string(),
                name: "Projects".to_string(),
                icon: None,
            }))),
            delete_folder_result: Arc::new(Mutex::new(Ok(()))),
            lifecycle_gate: Arc::new(Mutex::new(None)),
        }
    }

    /// Record a call
    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Count calls matching a predicate
    pub fn count_calls(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    async fn wait_gate(&self) {
        let gate = self.lifecycle_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper to clone a Result<T> from an Arc<Mutex<Result<T>>>
fn clone_result<T: Clone>(r: &Arc<Mutex<Result<T>>>) -> Result<T> {
    let guard = r.lock().unwrap();
    match &*guard {
        Ok(v) => Ok(v.clone()),
        Err(e) => Err(clone_api_error(e)),
    }
}

/// Clone an ApiError (transport errors aren't cloneable)
fn clone_api_error(e: &ApiError) -> ApiError {
    match e {
        ApiError::Server { status, detail } => ApiError::Server {
            status: *status,
            detail: detail.clone(),
        },
        ApiError::InvalidResponse(s) => ApiError::InvalidResponse(s.clone()),
        ApiError::Stream(s) => ApiError::Stream(s.clone()),
        ApiError::BadUrl(s) => ApiError::BadUrl(s.clone()),
        ApiError::Transport(_) => ApiError::Stream("transport error (cloned)".to_string()),
    }
}

/// Create an Environment with sensible defaults
pub fn mock_environment(id: &str, name: &str) -> Environment {
    Environment {
        id: id.to_string(),
        name: name.to_string(),
        image: "akatzai/comfyui-env:v0.3.1".to_string(),
        status: EnvironmentStatus::Exited,
        ..Default::default()
    }
}

/// Notifier that records every notice for assertions
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Arc<Mutex<Vec<(NoticeKind, String)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_notices(&self) -> Vec<(NoticeKind, String)> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.notices.lock().unwrap().push((kind, message.to_string()));
    }
}

#[async_trait]
impl EnvdockApi for MockApi {
    async fn list_environments(&self, folder_id: Option<&str>) -> Result<Vec<Environment>> {
        self.record(MockCall::List {
            folder_id: folder_id.map(String::from),
        });
        clone_result(&self.list_result)
    }

    async fn create_environment(&self, input: &EnvironmentInput) -> Result<Environment> {
        self.record(MockCall::Create {
            name: input.name.clone(),
        });
        clone_result(&self.create_result)
    }

    async fn update_environment(
        &self,
        id: &str,
        _patch: &EnvironmentUpdate,
    ) -> Result<Environment> {
        self.record(MockCall::Update { id: id.to_string() });
        clone_result(&self.update_result)
    }

    async fn delete_environment(&self, id: &str) -> Result<()> {
        self.record(MockCall::Delete { id: id.to_string() });
        clone_result(&self.delete_result)
    }

    async fn duplicate_environment(
        &self,
        id: &str,
        input: &EnvironmentInput,
    ) -> Result<Environment> {
        self.record(MockCall::Duplicate {
            id: id.to_string(),
            name: input.name.clone(),
        });
        clone_result(&self.duplicate_result)
    }

    async fn activate_environment(&self, id: &str) -> Result<()> {
        self.record(MockCall::Activate { id: id.to_string() });
        self.wait_gate().await;
        clone_result(&self.activate_result)
    }

    async fn deactivate_environment(&self, id: &str) -> Result<()> {
        self.record(MockCall::Deactivate { id: id.to_string() });
        self.wait_gate().await;
        clone_result(&self.deactivate_result)
    }

    async fn stream_logs(
        &self,
        id: &str,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<StreamHandle> {
        self.record(MockCall::StreamLogs { id: id.to_string() });
        let scripted = self.log_chunks.lock().unwrap().clone();
        let task = tokio::spawn(async move {
            for chunk in scripted {
                if chunks.send(chunk).is_err() {
                    return;
                }
            }
            // Keep the connection "open" until the handle is dropped
            std::future::pending::<()>().await;
        });
        Ok(StreamHandle::new(task))
    }

    async fn valid_comfyui_path(&self, path: &str) -> Result<bool> {
        self.record(MockCall::ValidPath {
            path: path.to_string(),
        });
        clone_result(&self.valid_path_result)
    }

    async fn install_comfyui(&self, path: &str, branch: &str) -> Result<()> {
        self.record(MockCall::Install {
            path: path.to_string(),
            branch: branch.to_string(),
        });
        clone_result(&self.install_result)
    }

    async fn user_settings(&self) -> Result<UserSettings> {
        self.record(MockCall::GetSettings);
        clone_result(&self.settings_result)
    }

    async fn update_user_settings(&self, settings: &UserSettings) -> Result<UserSettings> {
        self.record(MockCall::UpdateSettings);
        Ok(settings.clone())
    }

    async fn image_tags(&self) -> Result<Vec<String>> {
        self.record(MockCall::ImageTags);
        clone_result(&self.tags_result)
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        self.record(MockCall::ImageExists {
            image: image.to_string(),
        });
        clone_result(&self.image_exists_result)
    }

    async fn pull_image(&self, image: &str, progress: mpsc::UnboundedSender<f64>) -> Result<()> {
        self.record(MockCall::PullImage {
            image: image.to_string(),
        });
        let events = self.pull_events.lock().unwrap().clone();
        for value in events {
            let _ = progress.send(value);
        }
        clone_result(&self.pull_result)
    }

    async fn create_folder(&self, input: &FolderInput) -> Result<Folder> {
        self.record(MockCall::CreateFolder {
            name: input.name.clone(),
        });
        clone_result(&self.folder_result)
    }

    async fn update_folder(&self, id: &str, _input: &FolderInput) -> Result<Folder> {
        self.record(MockCall::UpdateFolder { id: id.to_string() });
        clone_result(&self.folder_result)
    }

    async fn delete_folder(&self, id: &str) -> Result<()> {
        self.record(MockCall::DeleteFolder { id: id.to_string() });
        clone_result(&self.delete_folder_result)
    }
}
