//! Environment manager - coordinates all client-side state and operations
//!
//! Holds the authoritative client model behind a RwLock and exposes the
//! operations the UI drives: the polling refresh, lifecycle transitions
//! with per-environment busy markers, the creation flow, folder CRUD, and
//! user settings. Every mutation delegates to the backend and then
//! reconciles by refetching.

use crate::create::{
    duplicate_name, CreateFlow, CreateForm, CreateProgress, CreateStep, PendingCreate, LATEST_TAG,
};
use crate::folders::{is_reserved, reserved_folders, ALL_FOLDER_ID, DELETED_FOLDER_ID};
use crate::{CoreError, NoticeKind, Notifier, Result};
use envdock_api::{
    EnvdockApi, Environment, EnvironmentInput, EnvironmentUpdate, Folder, FolderInput,
    StreamHandle, UserSettings,
};
use envdock_config::GlobalConfig;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// Mutable client model, guarded by the manager's lock
struct ManagerState {
    environments: Vec<Environment>,
    settings: UserSettings,
    tags: Vec<String>,
    selected_folder: String,
    /// Ids with an activate or deactivate in flight
    activating: HashSet<String>,
    /// Ids with a delete in flight
    deleting: HashSet<String>,
    /// False until the first successful fetch, and after any failed one
    connected: bool,
    /// Sequence of the newest fetch whose result has been applied
    applied_seq: u64,
    flow: CreateFlow,
}

impl ManagerState {
    fn new() -> Self {
        Self {
            environments: Vec::new(),
            settings: UserSettings::default(),
            tags: Vec::new(),
            selected_folder: ALL_FOLDER_ID.to_string(),
            activating: HashSet::new(),
            deleting: HashSet::new(),
            connected: false,
            applied_seq: 0,
            flow: CreateFlow::new(),
        }
    }
}

/// Read-only snapshot handed to the UI each frame
#[derive(Debug, Clone)]
pub struct ViewState {
    /// Environments visible under the selected folder
    pub environments: Vec<Environment>,
    /// The full unfiltered list
    pub all_environments: Vec<Environment>,
    /// Reserved folders followed by user folders
    pub folders: Vec<Folder>,
    pub selected_folder: String,
    pub settings: UserSettings,
    pub tags: Vec<String>,
    pub activating: HashSet<String>,
    pub deleting: HashSet<String>,
    pub connected: bool,
    pub create_step: CreateStep,
}

impl ViewState {
    /// Whether a lifecycle or delete operation is in flight for this id
    pub fn is_busy(&self, id: &str) -> bool {
        self.activating.contains(id) || self.deleting.contains(id)
    }
}

/// Main environment manager
pub struct EnvironmentManager {
    api: Arc<dyn EnvdockApi>,
    notifier: Arc<dyn Notifier>,
    config: GlobalConfig,
    inner: RwLock<ManagerState>,
    /// Monotonic ticket for list fetches; stale results are dropped
    fetch_seq: AtomicU64,
    /// Single-flight guard: a refresh is skipped while one is running
    fetch_in_flight: AtomicBool,
}

impl EnvironmentManager {
    pub fn new(
        api: Arc<dyn EnvdockApi>,
        notifier: Arc<dyn Notifier>,
        config: GlobalConfig,
    ) -> Self {
        Self {
            api,
            notifier,
            config,
            inner: RwLock::new(ManagerState::new()),
            fetch_seq: AtomicU64::new(0),
            fetch_in_flight: AtomicBool::new(false),
        }
    }

    /// The backend client, for callers that drive streams directly
    pub fn api(&self) -> Arc<dyn EnvdockApi> {
        Arc::clone(&self.api)
    }

    pub fn global_config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.server.poll_interval_ms)
    }

    /// Initial load: settings, release tags, then the first environment
    /// fetch. Settings and tags are best-effort; the environment fetch
    /// decides connectivity.
    pub async fn bootstrap(&self) -> Result<()> {
        if let Err(e) = self.load_settings().await {
            warn!("Initial settings load failed: {}", e);
        }
        if let Err(e) = self.load_tags().await {
            warn!("Initial tag load failed: {}", e);
        }
        self.refresh().await
    }

    /// Fetch the environment list for the active folder and merge it in.
    /// The filter is omitted for the reserved `all` folder.
    ///
    /// At most one fetch runs at a time; callers hitting an in-flight
    /// refresh return immediately. Responses are applied in ticket order
    /// so a slow old fetch can never clobber a newer one. On failure the
    /// last good data is kept and only the connected flag drops.
    pub async fn refresh(&self) -> Result<()> {
        if self.fetch_in_flight.swap(true, Ordering::SeqCst) {
            debug!("Refresh already in flight, skipping");
            return Ok(());
        }
        let seq = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let folder = {
            let state = self.inner.read().await;
            state.selected_folder.clone()
        };
        let filter = (folder != ALL_FOLDER_ID).then_some(folder.as_str());
        let result = self.api.list_environments(filter).await;
        self.fetch_in_flight.store(false, Ordering::SeqCst);

        let mut state = self.inner.write().await;
        match result {
            Ok(environments) => {
                if seq > state.applied_seq {
                    state.applied_seq = seq;
                    state.environments = environments;
                }
                state.connected = true;
                Ok(())
            }
            Err(e) => {
                warn!("Environment refresh failed: {}", e);
                state.connected = false;
                Err(e.into())
            }
        }
    }

    /// Snapshot the model for rendering
    pub async fn view(&self) -> ViewState {
        let state = self.inner.read().await;
        let mut folders: Vec<Folder> = reserved_folders().to_vec();
        folders.extend(state.settings.folders.iter().cloned());

        ViewState {
            environments: visible_environments(&state.environments, &state.selected_folder),
            all_environments: state.environments.clone(),
            folders,
            selected_folder: state.selected_folder.clone(),
            settings: state.settings.clone(),
            tags: state.tags.clone(),
            activating: state.activating.clone(),
            deleting: state.deleting.clone(),
            connected: state.connected,
            create_step: state.flow.step.clone(),
        }
    }

    /// Change the active folder filter and fetch its contents right away
    pub async fn select_folder(&self, id: &str) {
        {
            let mut state = self.inner.write().await;
            state.selected_folder = id.to_string();
        }
        if let Err(e) = self.refresh().await {
            debug!("Post-select refresh failed: {}", e);
        }
    }

    // ==================== Lifecycle ====================

    /// Start an environment's container. The id is marked busy for the
    /// duration; other environments stay operable.
    pub async fn activate(&self, id: &str) -> Result<()> {
        {
            let mut state = self.inner.write().await;
            state.activating.insert(id.to_string());
        }

        let result = self.api.activate_environment(id).await;
        if let Err(e) = self.refresh().await {
            debug!("Post-activate refresh failed: {}", e);
        }
        {
            let mut state = self.inner.write().await;
            state.activating.remove(id);
        }

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.notifier
                    .notify(NoticeKind::Error, &format!("Activation failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// Stop an environment's container
    pub async fn deactivate(&self, id: &str) -> Result<()> {
        {
            let mut state = self.inner.write().await;
            state.activating.insert(id.to_string());
        }

        let result = self.api.deactivate_environment(id).await;
        if let Err(e) = self.refresh().await {
            debug!("Post-deactivate refresh failed: {}", e);
        }
        {
            let mut state = self.inner.write().await;
            state.activating.remove(id);
        }

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.notifier
                    .notify(NoticeKind::Error, &format!("Deactivation failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// Delete an environment (the backend decides soft vs hard)
    pub async fn delete(&self, id: &str) -> Result<()> {
        {
            let mut state = self.inner.write().await;
            state.deleting.insert(id.to_string());
        }

        let result = self.api.delete_environment(id).await;
        if let Err(e) = self.refresh().await {
            debug!("Post-delete refresh failed: {}", e);
        }
        {
            let mut state = self.inner.write().await;
            state.deleting.remove(id);
        }

        match result {
            Ok(()) => {
                self.notifier
                    .notify(NoticeKind::Success, "Environment deleted");
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .notify(NoticeKind::Error, &format!("Delete failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// Duplicate an existing environment under a fresh `-copy` name.
    /// Skips the prerequisite checks; the source's image and path are
    /// known good.
    pub async fn duplicate(&self, id: &str) -> Result<Environment> {
        let (source, existing) = {
            let state = self.inner.read().await;
            let source = state
                .environments
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .ok_or_else(|| CoreError::EnvironmentNotFound(id.to_string()))?;
            (source, state.environments.clone())
        };

        let input = EnvironmentInput {
            name: duplicate_name(&source.name, &existing),
            image: source.image.clone(),
            command: source.command.clone(),
            comfyui_path: source.comfyui_path.clone(),
            options: source.options.clone(),
            folder_ids: source
                .folder_ids
                .iter()
                .filter(|f| !is_reserved(f))
                .cloned()
                .collect(),
        };

        match self.api.duplicate_environment(id, &input).await {
            Ok(env) => {
                if let Err(e) = self.refresh().await {
                    debug!("Post-duplicate refresh failed: {}", e);
                }
                self.notifier.notify(
                    NoticeKind::Success,
                    &format!("Duplicated as '{}'", env.name),
                );
                Ok(env)
            }
            Err(e) => {
                self.notifier
                    .notify(NoticeKind::Error, &format!("Duplicate failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// Rename an environment
    pub async fn rename(&self, id: &str, name: &str) -> Result<Environment> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Name is required".to_string()));
        }
        let taken = {
            let state = self.inner.read().await;
            state
                .environments
                .iter()
                .any(|e| e.id != id && !e.is_deleted() && e.name == name)
        };
        if taken {
            return Err(CoreError::Validation(format!(
                "An environment named '{}' already exists",
                name
            )));
        }

        let patch = EnvironmentUpdate {
            name: Some(name.to_string()),
            ..Default::default()
        };
        let env = self.apply_update(id, &patch).await?;
        Ok(env)
    }

    /// Move an environment to a folder (None clears the assignment)
    pub async fn move_to_folder(&self, id: &str, folder_id: Option<&str>) -> Result<Environment> {
        if let Some(f) = folder_id {
            if is_reserved(f) {
                return Err(CoreError::Validation(
                    "Cannot assign to a reserved folder".to_string(),
                ));
            }
        }
        let patch = EnvironmentUpdate {
            folder_ids: Some(folder_id.map(String::from).into_iter().collect()),
            ..Default::default()
        };
        self.apply_update(id, &patch).await
    }

    async fn apply_update(&self, id: &str, patch: &EnvironmentUpdate) -> Result<Environment> {
        match self.api.update_environment(id, patch).await {
            Ok(env) => {
                if let Err(e) = self.refresh().await {
                    debug!("Post-update refresh failed: {}", e);
                }
                Ok(env)
            }
            Err(e) => {
                self.notifier
                    .notify(NoticeKind::Error, &format!("Update failed: {}", e));
                Err(e.into())
            }
        }
    }

    // ==================== Creation flow ====================

    /// Open the creation dialog with a form seeded from user settings
    pub async fn open_create(&self) -> CreateForm {
        let mut state = self.inner.write().await;
        state.flow.open();
        CreateForm::from_settings(&state.settings, &self.config.defaults)
    }

    pub async fn close_create(&self) {
        let mut state = self.inner.write().await;
        state.flow.close();
    }

    /// Validate and start the prerequisite sequence. Validation failures
    /// return before any request is made.
    pub async fn begin_create(&self, form: &CreateForm) -> Result<CreateProgress> {
        let (existing, selected, cached_tags) = {
            let state = self.inner.read().await;
            (
                state.environments.clone(),
                state.selected_folder.clone(),
                state.tags.clone(),
            )
        };
        form.validate(&existing)?;

        let tags = if cached_tags.is_empty() {
            self.api.image_tags().await.unwrap_or_default()
        } else {
            cached_tags
        };
        let input = form.build_input(&tags, &selected);
        let pending = PendingCreate {
            path: input.comfyui_path.clone().unwrap_or_default(),
            branch: input
                .options
                .comfyui_release
                .clone()
                .unwrap_or_else(|| LATEST_TAG.to_string()),
            image: input.image.clone(),
            input,
        };
        {
            let mut state = self.inner.write().await;
            state.tags = tags;
            state.flow.step = CreateStep::CheckingPath;
            state.flow.pending = Some(pending);
        }

        self.continue_with_path_check().await
    }

    /// User accepted the install prompt: install, then resume the sequence
    pub async fn confirm_install(&self) -> Result<CreateProgress> {
        let pending = self.pending().await?;
        debug!("Installing ComfyUI {} at {}", pending.branch, pending.path);
        match self.api.install_comfyui(&pending.path, &pending.branch).await {
            Ok(()) => self.continue_with_image_check().await,
            Err(e) => Err(self.create_failed(e.into()).await),
        }
    }

    /// User declined the install prompt; back to the form
    pub async fn decline_install(&self) {
        let mut state = self.inner.write().await;
        state.flow.abandon();
    }

    /// The image reference awaiting a pull, if the flow is parked there
    pub async fn pending_image(&self) -> Option<String> {
        let state = self.inner.read().await;
        state.flow.pending.as_ref().map(|p| p.image.clone())
    }

    /// Pull the pending image, forwarding progress. On completion the
    /// caller resumes with [`Self::pull_complete`].
    pub async fn pull_pending_image(
        &self,
        progress: mpsc::UnboundedSender<f64>,
    ) -> Result<()> {
        let pending = self.pending().await?;
        match self.api.pull_image(&pending.image, progress).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.create_failed(e.into()).await),
        }
    }

    /// Pull finished; submit the retained payload
    pub async fn pull_complete(&self) -> Result<CreateProgress> {
        self.submit_create().await
    }

    /// User cancelled the pull; back to the form
    pub async fn cancel_pull(&self) {
        let mut state = self.inner.write().await;
        state.flow.abandon();
    }

    async fn pending(&self) -> Result<PendingCreate> {
        let state = self.inner.read().await;
        state
            .flow
            .pending
            .clone()
            .ok_or_else(|| CoreError::InvalidState("No creation in progress".to_string()))
    }

    async fn continue_with_path_check(&self) -> Result<CreateProgress> {
        let pending = self.pending().await?;
        match self.api.valid_comfyui_path(&pending.path).await {
            Ok(true) => self.continue_with_image_check().await,
            Ok(false) => {
                let mut state = self.inner.write().await;
                state.flow.step = CreateStep::InstallPrereqOpen;
                Ok(CreateProgress::NeedsInstall)
            }
            Err(e) => Err(self.create_failed(e.into()).await),
        }
    }

    async fn continue_with_image_check(&self) -> Result<CreateProgress> {
        let pending = self.pending().await?;
        {
            let mut state = self.inner.write().await;
            state.flow.step = CreateStep::CheckingImage;
        }
        match self.api.image_exists(&pending.image).await {
            Ok(true) => self.submit_create().await,
            Ok(false) => {
                let mut state = self.inner.write().await;
                state.flow.step = CreateStep::PullImageOpen;
                Ok(CreateProgress::NeedsPull {
                    image: pending.image,
                })
            }
            Err(e) => Err(self.create_failed(e.into()).await),
        }
    }

    async fn submit_create(&self) -> Result<CreateProgress> {
        let pending = self.pending().await?;
        {
            let mut state = self.inner.write().await;
            state.flow.step = CreateStep::Submitting;
        }
        match self.api.create_environment(&pending.input).await {
            Ok(env) => {
                {
                    let mut state = self.inner.write().await;
                    state.flow.close();
                }
                if let Err(e) = self.refresh().await {
                    debug!("Post-create refresh failed: {}", e);
                }
                self.notifier.notify(
                    NoticeKind::Success,
                    &format!("Created environment '{}'", env.name),
                );
                Ok(CreateProgress::Created(env))
            }
            Err(e) => Err(self.create_failed(e.into()).await),
        }
    }

    /// Abort the sequence: drop the payload, return to the form, surface
    /// the error.
    async fn create_failed(&self, err: CoreError) -> CoreError {
        {
            let mut state = self.inner.write().await;
            state.flow.abandon();
        }
        self.notifier.notify(NoticeKind::Error, &err.to_string());
        err
    }

    // ==================== Folders ====================

    pub async fn create_folder(&self, name: &str) -> Result<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Folder name is required".to_string()));
        }
        let input = FolderInput {
            name: name.to_string(),
            icon: None,
        };
        match self.api.create_folder(&input).await {
            Ok(folder) => {
                if let Err(e) = self.load_settings().await {
                    debug!("Settings reload after folder create failed: {}", e);
                }
                Ok(folder)
            }
            Err(e) => {
                self.notifier
                    .notify(NoticeKind::Error, &format!("Folder create failed: {}", e));
                Err(e.into())
            }
        }
    }

    pub async fn rename_folder(&self, id: &str, name: &str) -> Result<Folder> {
        if is_reserved(id) {
            let err = CoreError::Validation("Reserved folders cannot be modified".to_string());
            self.notifier.notify(NoticeKind::Error, &err.to_string());
            return Err(err);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Folder name is required".to_string()));
        }
        let input = FolderInput {
            name: name.to_string(),
            icon: None,
        };
        match self.api.update_folder(id, &input).await {
            Ok(folder) => {
                if let Err(e) = self.load_settings().await {
                    debug!("Settings reload after folder rename failed: {}", e);
                }
                Ok(folder)
            }
            Err(e) => {
                self.notifier
                    .notify(NoticeKind::Error, &format!("Folder rename failed: {}", e));
                Err(e.into())
            }
        }
    }

    /// Delete a user folder. Reserved folders short-circuit with zero
    /// network calls. If the deleted folder was selected, selection falls
    /// back to the unfiltered view.
    pub async fn delete_folder(&self, id: &str) -> Result<()> {
        if is_reserved(id) {
            let err = CoreError::Validation("Reserved folders cannot be deleted".to_string());
            self.notifier.notify(NoticeKind::Error, &err.to_string());
            return Err(err);
        }
        match self.api.delete_folder(id).await {
            Ok(()) => {
                {
                    let mut state = self.inner.write().await;
                    if state.selected_folder == id {
                        state.selected_folder = ALL_FOLDER_ID.to_string();
                    }
                }
                if let Err(e) = self.load_settings().await {
                    debug!("Settings reload after folder delete failed: {}", e);
                }
                if let Err(e) = self.refresh().await {
                    debug!("Refresh after folder delete failed: {}", e);
                }
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .notify(NoticeKind::Error, &format!("Folder delete failed: {}", e));
                Err(e.into())
            }
        }
    }

    // ==================== Settings / tags ====================

    pub async fn load_settings(&self) -> Result<UserSettings> {
        let settings = self.api.user_settings().await?;
        let mut state = self.inner.write().await;
        state.settings = settings.clone();
        Ok(settings)
    }

    /// Overwrite the server-side settings wholesale
    pub async fn update_settings(&self, settings: UserSettings) -> Result<UserSettings> {
        match self.api.update_user_settings(&settings).await {
            Ok(saved) => {
                let mut state = self.inner.write().await;
                state.settings = saved.clone();
                Ok(saved)
            }
            Err(e) => {
                self.notifier
                    .notify(NoticeKind::Error, &format!("Settings update failed: {}", e));
                Err(e.into())
            }
        }
    }

    pub async fn load_tags(&self) -> Result<Vec<String>> {
        let tags = self.api.image_tags().await?;
        let mut state = self.inner.write().await;
        state.tags = tags.clone();
        Ok(tags)
    }

    // ==================== Logs ====================

    /// Open the log stream for an environment
    pub async fn open_logs(
        &self,
        id: &str,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<StreamHandle> {
        let handle = self.api.stream_logs(id, chunks).await?;
        Ok(handle)
    }
}

/// Filter the list for the selected folder: `all` hides soft-deleted
/// environments, `deleted` shows only them, a user folder shows its live
/// members.
fn visible_environments(environments: &[Environment], folder: &str) -> Vec<Environment> {
    environments
        .iter()
        .filter(|e| match folder {
            ALL_FOLDER_ID => !e.is_deleted(),
            DELETED_FOLDER_ID => e.is_deleted(),
            f => !e.is_deleted() && e.folder_id() == Some(f),
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use envdock_api::ApiError;
    use tokio::sync::Notify;

    struct Harness {
        manager: Arc<EnvironmentManager>,
        api: Arc<MockApi>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness() -> Harness {
        let api = Arc::new(MockApi::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = Arc::new(EnvironmentManager::new(
            Arc::clone(&api) as Arc<dyn EnvdockApi>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            GlobalConfig::default(),
        ));
        Harness {
            manager,
            api,
            notifier,
        }
    }

    fn valid_form() -> CreateForm {
        CreateForm {
            name: "env-a".to_string(),
            comfyui_path: "/opt/ComfyUI".to_string(),
            ..Default::default()
        }
    }

    fn count(api: &MockApi, pred: impl Fn(&MockCall) -> bool) -> usize {
        api.count_calls(pred)
    }

    // ==================== Refresh / reconciliation ====================

    #[tokio::test]
    async fn test_refresh_applies_list_and_connects() {
        let h = harness();
        *h.api.list_result.lock().unwrap() = Ok(vec![mock_environment("1", "a")]);

        assert!(!h.manager.view().await.connected);
        h.manager.refresh().await.unwrap();

        let view = h.manager.view().await;
        assert!(view.connected);
        assert_eq!(view.all_environments.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_data_drops_connected() {
        let h = harness();
        *h.api.list_result.lock().unwrap() = Ok(vec![mock_environment("1", "a")]);
        h.manager.refresh().await.unwrap();

        *h.api.list_result.lock().unwrap() = Err(ApiError::Stream("connection reset".into()));
        assert!(h.manager.refresh().await.is_err());

        let view = h.manager.view().await;
        assert!(!view.connected);
        assert_eq!(view.all_environments.len(), 1, "stale data must be kept");

        // Recovery restores the flag
        *h.api.list_result.lock().unwrap() = Ok(Vec::new());
        h.manager.refresh().await.unwrap();
        assert!(h.manager.view().await.connected);
    }

    // ==================== Folder filtering ====================

    fn env_in_folder(id: &str, name: &str, folder: Option<&str>) -> Environment {
        let mut env = mock_environment(id, name);
        env.folder_ids = folder.map(String::from).into_iter().collect();
        env
    }

    #[tokio::test]
    async fn test_view_filters_by_selected_folder() {
        let h = harness();
        *h.api.list_result.lock().unwrap() = Ok(vec![
            env_in_folder("1", "a", None),
            env_in_folder("2", "b", Some("f1")),
            env_in_folder("3", "c", Some("deleted")),
        ]);
        h.manager.refresh().await.unwrap();

        // "all" hides the soft-deleted one
        let view = h.manager.view().await;
        assert_eq!(view.environments.len(), 2);

        h.manager.select_folder("f1").await;
        let view = h.manager.view().await;
        assert_eq!(view.environments.len(), 1);
        assert_eq!(view.environments[0].id, "2");

        h.manager.select_folder("deleted").await;
        let view = h.manager.view().await;
        assert_eq!(view.environments.len(), 1);
        assert_eq!(view.environments[0].id, "3");
    }

    #[tokio::test]
    async fn test_select_folder_fetches_filtered_list() {
        let h = harness();
        h.manager.select_folder("f1").await;
        assert!(matches!(
            h.api.get_calls().last(),
            Some(MockCall::List { folder_id: Some(f) }) if f == "f1"
        ));

        // The periodic tick keeps the selection's filter
        h.manager.refresh().await.unwrap();
        assert!(matches!(
            h.api.get_calls().last(),
            Some(MockCall::List { folder_id: Some(f) }) if f == "f1"
        ));

        // Back to "all" drops the filter
        h.manager.select_folder("all").await;
        assert!(matches!(
            h.api.get_calls().last(),
            Some(MockCall::List { folder_id: None })
        ));
    }

    #[tokio::test]
    async fn test_view_folders_start_with_reserved() {
        let h = harness();
        *h.api.settings_result.lock().unwrap() = Ok(UserSettings {
            folders: vec![Folder {
                id: "f1".to_string(),
                name: "Projects".to_string(),
                icon: None,
            }],
            ..Default::default()
        });
        h.manager.load_settings().await.unwrap();

        let view = h.manager.view().await;
        assert_eq!(view.folders.len(), 3);
        assert_eq!(view.folders[0].id, "all");
        assert_eq!(view.folders[1].id, "deleted");
        assert_eq!(view.folders[2].id, "f1");
    }

    // ==================== Creation flow ====================

    #[tokio::test]
    async fn test_create_happy_path_one_post_one_refetch() {
        let h = harness();
        h.manager.open_create().await;

        let progress = h.manager.begin_create(&valid_form()).await.unwrap();
        assert!(matches!(progress, CreateProgress::Created(_)));

        assert_eq!(count(&h.api, |c| matches!(c, MockCall::Create { .. })), 1);
        assert_eq!(count(&h.api, |c| matches!(c, MockCall::List { .. })), 1);

        let view = h.manager.view().await;
        assert_eq!(view.create_step, CreateStep::Closed);

        let notices = h.notifier.get_notices();
        assert!(notices
            .iter()
            .any(|(k, m)| *k == NoticeKind::Success && m.contains("env-a")));
    }

    #[tokio::test]
    async fn test_create_duplicate_name_fails_before_network() {
        let h = harness();
        *h.api.list_result.lock().unwrap() = Ok(vec![mock_environment("1", "env-a")]);
        h.manager.refresh().await.unwrap();
        let calls_before = h.api.get_calls().len();

        h.manager.open_create().await;
        let result = h.manager.begin_create(&valid_form()).await;
        assert!(result.is_err());

        // Validation must not touch the network
        assert_eq!(h.api.get_calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_create_reuses_name_of_soft_deleted() {
        let h = harness();
        *h.api.list_result.lock().unwrap() =
            Ok(vec![env_in_folder("1", "env-a", Some("deleted"))]);
        h.manager.refresh().await.unwrap();

        h.manager.open_create().await;
        let progress = h.manager.begin_create(&valid_form()).await.unwrap();
        assert!(matches!(progress, CreateProgress::Created(_)));
    }

    #[tokio::test]
    async fn test_create_invalid_path_opens_install_prompt() {
        let h = harness();
        *h.api.valid_path_result.lock().unwrap() = Ok(false);

        h.manager.open_create().await;
        let progress = h.manager.begin_create(&valid_form()).await.unwrap();
        assert!(matches!(progress, CreateProgress::NeedsInstall));

        assert_eq!(count(&h.api, |c| matches!(c, MockCall::Create { .. })), 0);
        assert_eq!(
            h.manager.view().await.create_step,
            CreateStep::InstallPrereqOpen
        );
    }

    #[tokio::test]
    async fn test_confirm_install_resumes_and_creates() {
        let h = harness();
        *h.api.valid_path_result.lock().unwrap() = Ok(false);

        h.manager.open_create().await;
        h.manager.begin_create(&valid_form()).await.unwrap();

        let progress = h.manager.confirm_install().await.unwrap();
        assert!(matches!(progress, CreateProgress::Created(_)));

        // Install got the resolved release, not "latest"
        let calls = h.api.get_calls();
        let install = calls
            .iter()
            .find_map(|c| match c {
                MockCall::Install { path, branch } => Some((path.clone(), branch.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(install.0, "/opt/ComfyUI");
        assert_eq!(install.1, "v0.3.1");
        assert_eq!(count(&h.api, |c| matches!(c, MockCall::Create { .. })), 1);
    }

    #[tokio::test]
    async fn test_decline_install_returns_to_editing() {
        let h = harness();
        *h.api.valid_path_result.lock().unwrap() = Ok(false);

        h.manager.open_create().await;
        h.manager.begin_create(&valid_form()).await.unwrap();
        h.manager.decline_install().await;

        let view = h.manager.view().await;
        assert_eq!(view.create_step, CreateStep::Editing);
        assert!(h.manager.pending_image().await.is_none());
        assert_eq!(count(&h.api, |c| matches!(c, MockCall::Create { .. })), 0);
    }

    #[tokio::test]
    async fn test_missing_image_opens_pull_then_completes() {
        let h = harness();
        *h.api.image_exists_result.lock().unwrap() = Ok(false);
        *h.api.pull_events.lock().unwrap() = vec![25.0, 100.0];

        h.manager.open_create().await;
        let progress = h.manager.begin_create(&valid_form()).await.unwrap();
        let image = match progress {
            CreateProgress::NeedsPull { image } => image,
            other => panic!("expected NeedsPull, got {:?}", other),
        };
        assert_eq!(image, "akatzai/comfyui-env:v0.3.1");
        assert_eq!(h.manager.view().await.create_step, CreateStep::PullImageOpen);

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.manager.pull_pending_image(tx).await.unwrap();
        assert_eq!(rx.recv().await, Some(25.0));
        assert_eq!(rx.recv().await, Some(100.0));

        let progress = h.manager.pull_complete().await.unwrap();
        assert!(matches!(progress, CreateProgress::Created(_)));
    }

    #[tokio::test]
    async fn test_cancel_pull_drops_pending() {
        let h = harness();
        *h.api.image_exists_result.lock().unwrap() = Ok(false);

        h.manager.open_create().await;
        h.manager.begin_create(&valid_form()).await.unwrap();
        h.manager.cancel_pull().await;

        assert_eq!(h.manager.view().await.create_step, CreateStep::Editing);
        assert!(h.manager.pending_image().await.is_none());
        assert_eq!(count(&h.api, |c| matches!(c, MockCall::Create { .. })), 0);
    }

    #[tokio::test]
    async fn test_create_server_rejection_returns_to_editing() {
        let h = harness();
        *h.api.create_result.lock().unwrap() = Err(ApiError::Server {
            status: 400,
            detail: "port already allocated".to_string(),
        });

        h.manager.open_create().await;
        let result = h.manager.begin_create(&valid_form()).await;
        assert!(result.is_err());

        let view = h.manager.view().await;
        assert_eq!(view.create_step, CreateStep::Editing);

        let notices = h.notifier.get_notices();
        assert!(notices
            .iter()
            .any(|(k, m)| *k == NoticeKind::Error && m.contains("port already allocated")));
    }

    // ==================== Lifecycle busy markers ====================

    #[tokio::test]
    async fn test_activate_marks_only_target_busy() {
        let h = harness();
        let gate = Arc::new(Notify::new());
        *h.api.lifecycle_gate.lock().unwrap() = Some(Arc::clone(&gate));

        let mgr = Arc::clone(&h.manager);
        let task = tokio::spawn(async move { mgr.activate("7").await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let view = h.manager.view().await;
        assert!(view.is_busy("7"));
        assert!(!view.is_busy("42"), "other ids must stay operable");

        gate.notify_one();
        task.await.unwrap().unwrap();
        assert!(!h.manager.view().await.is_busy("7"));
    }

    #[tokio::test]
    async fn test_concurrent_lifecycle_markers_are_independent() {
        let h = harness();
        let gate = Arc::new(Notify::new());
        *h.api.lifecycle_gate.lock().unwrap() = Some(Arc::clone(&gate));

        let m1 = Arc::clone(&h.manager);
        let t1 = tokio::spawn(async move { m1.activate("7").await });
        let m2 = Arc::clone(&h.manager);
        let t2 = tokio::spawn(async move { m2.deactivate("42").await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let view = h.manager.view().await;
        assert!(view.is_busy("7"));
        assert!(view.is_busy("42"));

        gate.notify_one();
        gate.notify_one();
        t1.await.unwrap().unwrap();
        t2.await.unwrap().unwrap();

        let view = h.manager.view().await;
        assert!(!view.is_busy("7"));
        assert!(!view.is_busy("42"));
    }

    #[tokio::test]
    async fn test_activate_failure_clears_marker_and_notifies() {
        let h = harness();
        *h.api.activate_result.lock().unwrap() = Err(ApiError::Server {
            status: 500,
            detail: "no gpu".to_string(),
        });

        assert!(h.manager.activate("7").await.is_err());
        assert!(!h.manager.view().await.is_busy("7"));
        assert!(h
            .notifier
            .get_notices()
            .iter()
            .any(|(k, m)| *k == NoticeKind::Error && m.contains("no gpu")));
    }

    #[tokio::test]
    async fn test_delete_refreshes_and_clears_marker() {
        let h = harness();
        h.manager.delete("7").await.unwrap();

        assert!(!h.manager.view().await.is_busy("7"));
        assert_eq!(count(&h.api, |c| matches!(c, MockCall::Delete { .. })), 1);
        assert_eq!(count(&h.api, |c| matches!(c, MockCall::List { .. })), 1);
    }

    // ==================== Duplicate / rename ====================

    #[tokio::test]
    async fn test_duplicate_uses_copy_suffix() {
        let h = harness();
        *h.api.list_result.lock().unwrap() = Ok(vec![mock_environment("1", "env-a")]);
        h.manager.refresh().await.unwrap();

        h.manager.duplicate("1").await.unwrap();

        let calls = h.api.get_calls();
        let dup = calls
            .iter()
            .find_map(|c| match c {
                MockCall::Duplicate { id, name } => Some((id.clone(), name.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(dup.0, "1");
        assert_eq!(dup.1, "env-a-copy");
    }

    #[tokio::test]
    async fn test_duplicate_unknown_id_fails_without_network() {
        let h = harness();
        let result = h.manager.duplicate("missing").await;
        assert!(result.is_err());
        assert_eq!(
            count(&h.api, |c| matches!(c, MockCall::Duplicate { .. })),
            0
        );
    }

    #[tokio::test]
    async fn test_rename_rejects_taken_name() {
        let h = harness();
        *h.api.list_result.lock().unwrap() = Ok(vec![
            mock_environment("1", "env-a"),
            mock_environment("2", "env-b"),
        ]);
        h.manager.refresh().await.unwrap();

        assert!(h.manager.rename("2", "env-a").await.is_err());
        assert_eq!(count(&h.api, |c| matches!(c, MockCall::Update { .. })), 0);

        h.manager.rename("2", "env-c").await.unwrap();
        assert_eq!(count(&h.api, |c| matches!(c, MockCall::Update { .. })), 1);
    }

    #[tokio::test]
    async fn test_move_to_reserved_folder_rejected() {
        let h = harness();
        assert!(h.manager.move_to_folder("1", Some("all")).await.is_err());
        assert!(h.manager.move_to_folder("1", Some("deleted")).await.is_err());
        assert_eq!(count(&h.api, |c| matches!(c, MockCall::Update { .. })), 0);
    }

    // ==================== Folder CRUD ====================

    #[tokio::test]
    async fn test_delete_reserved_folder_short_circuits() {
        let h = harness();
        assert!(h.manager.delete_folder("all").await.is_err());
        assert!(h.manager.delete_folder("deleted").await.is_err());

        assert!(h.api.get_calls().is_empty(), "zero network calls expected");
        assert_eq!(h.notifier.get_notices().len(), 2);
    }

    #[tokio::test]
    async fn test_rename_reserved_folder_short_circuits() {
        let h = harness();
        assert!(h.manager.rename_folder("all", "Mine").await.is_err());
        assert!(h.api.get_calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_folder_reloads_settings() {
        let h = harness();
        h.manager.create_folder("Projects").await.unwrap();

        assert_eq!(
            count(&h.api, |c| matches!(c, MockCall::CreateFolder { .. })),
            1
        );
        assert_eq!(count(&h.api, |c| matches!(c, MockCall::GetSettings)), 1);
    }

    #[tokio::test]
    async fn test_delete_selected_folder_falls_back_to_all() {
        let h = harness();
        h.manager.select_folder("f1").await;
        h.manager.delete_folder("f1").await.unwrap();

        assert_eq!(h.manager.view().await.selected_folder, "all");
    }

    // ==================== Logs ====================

    #[tokio::test]
    async fn test_open_logs_forwards_chunks() {
        let h = harness();
        *h.api.log_chunks.lock().unwrap() =
            vec!["line1\n".to_string(), "par".to_string(), "tial".to_string()];

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = h.manager.open_logs("7", tx).await.unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("line1\n"));
        assert_eq!(rx.recv().await.as_deref(), Some("par"));
        assert_eq!(rx.recv().await.as_deref(), Some("tial"));

        handle.close();
        // Stream task aborted; the sender side is gone
        assert!(rx.recv().await.is_none());
    }
}
