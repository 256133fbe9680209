//! Environment creation flow
//!
//! The form collects inputs, then submission runs a multi-step sequence:
//! validate locally, check the ComfyUI path, check the base image, create.
//! Each missing prerequisite opens a recoverable sub-dialog; the resolved
//! payload is retained across those detours and dropped on decline/cancel.

use crate::folders;
use crate::mounts::{preset_entries, to_mount_config, EnvironmentType, MountEntry};
use crate::{CoreError, Result};
use envdock_api::{Environment, EnvironmentInput, EnvironmentOptions, MountAction, UserSettings};
use envdock_config::DefaultsConfig;

/// Image repository base images are published under
pub const IMAGE_REPO: &str = "akatzai/comfyui-env";

/// Tag meaning "newest concrete release"
pub const LATEST_TAG: &str = "latest";

/// Where the creation sequence currently stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CreateStep {
    /// Dialog closed, no submission in progress
    #[default]
    Closed,
    /// Form open for input
    Editing,
    /// Awaiting the path validity check
    CheckingPath,
    /// Path invalid; install prompt open
    InstallPrereqOpen,
    /// Awaiting the image existence check
    CheckingImage,
    /// Image missing; pull progress dialog open
    PullImageOpen,
    /// Awaiting the create request
    Submitting,
}

/// Payload retained while prerequisite sub-dialogs are open
#[derive(Debug, Clone)]
pub struct PendingCreate {
    pub input: EnvironmentInput,
    pub path: String,
    pub branch: String,
    pub image: String,
}

/// State machine for one pass through the creation sequence
#[derive(Debug, Default)]
pub struct CreateFlow {
    pub step: CreateStep,
    pub pending: Option<PendingCreate>,
}

impl CreateFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) {
        self.step = CreateStep::Editing;
        self.pending = None;
    }

    /// Back out of a prerequisite dialog; the form stays open but the
    /// resolved payload is dropped.
    pub fn abandon(&mut self) {
        self.step = CreateStep::Editing;
        self.pending = None;
    }

    pub fn close(&mut self) {
        self.step = CreateStep::Closed;
        self.pending = None;
    }

    pub fn is_open(&self) -> bool {
        self.step != CreateStep::Closed
    }
}

/// Outcome of driving the flow one step forward
#[derive(Debug)]
pub enum CreateProgress {
    /// Path check failed; caller should present the install prompt
    NeedsInstall,
    /// Image check failed; caller should start a pull and show progress
    NeedsPull { image: String },
    /// Environment created and the list refreshed
    Created(Environment),
}

/// Controlled inputs of the creation form
#[derive(Debug, Clone)]
pub struct CreateForm {
    pub name: String,
    /// Release tag, `latest` or a concrete tag
    pub release: String,
    pub comfyui_path: String,
    pub port: String,
    pub runtime: String,
    pub command: String,
    pub environment_type: EnvironmentType,
    pub mounts: Vec<MountEntry>,
}

impl Default for CreateForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            release: LATEST_TAG.to_string(),
            comfyui_path: String::new(),
            port: "8188".to_string(),
            runtime: "nvidia".to_string(),
            command: String::new(),
            environment_type: EnvironmentType::Default,
            mounts: preset_entries(EnvironmentType::Default),
        }
    }
}

impl CreateForm {
    /// Seed the form from server-side user settings, falling back to local
    /// defaults for anything unset.
    pub fn from_settings(settings: &UserSettings, defaults: &DefaultsConfig) -> Self {
        let mut form = Self::default();
        form.comfyui_path = settings
            .comfyui_path
            .clone()
            .or_else(|| defaults.comfyui_path.clone())
            .unwrap_or_default();
        form.port = settings.port.unwrap_or(defaults.port).to_string();
        form.runtime = settings
            .runtime
            .clone()
            .unwrap_or_else(|| defaults.runtime.clone());
        form.command = settings.command.clone().unwrap_or_default();
        form
    }

    /// Select a preset, replacing the mount table; `Custom` keeps the
    /// current rows untouched.
    pub fn set_environment_type(&mut self, ty: EnvironmentType) {
        if ty != EnvironmentType::Custom {
            self.mounts = preset_entries(ty);
        }
        self.environment_type = ty;
    }

    /// Flip one row's action. Any row edit demotes the preset to `Custom`.
    pub fn set_mount_action(&mut self, index: usize, action: MountAction) {
        if let Some(entry) = self.mounts.get_mut(index) {
            entry.action = action;
            self.environment_type = EnvironmentType::Custom;
        }
    }

    pub fn add_mount(&mut self, entry: MountEntry) {
        self.mounts.push(entry);
        self.environment_type = EnvironmentType::Custom;
    }

    pub fn remove_mount(&mut self, index: usize) {
        if index < self.mounts.len() {
            self.mounts.remove(index);
            self.environment_type = EnvironmentType::Custom;
        }
    }

    /// Client-side validation; runs before any network call.
    ///
    /// Soft-deleted environments do not hold their name, so reusing one is
    /// allowed.
    pub fn validate(&self, existing: &[Environment]) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Name is required".to_string()));
        }
        if self.comfyui_path.trim().is_empty() {
            return Err(CoreError::Validation("ComfyUI path is required".to_string()));
        }
        if self.port.parse::<u16>().is_err() {
            return Err(CoreError::Validation(format!(
                "Invalid port: {}",
                self.port
            )));
        }
        if existing
            .iter()
            .any(|e| !e.is_deleted() && e.name == name)
        {
            return Err(CoreError::Validation(format!(
                "An environment named '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    /// Resolve `latest` to the newest concrete tag so the created
    /// environment is pinned to what it actually runs.
    pub fn resolved_release(&self, tags: &[String]) -> String {
        if self.release != LATEST_TAG {
            return self.release.clone();
        }
        tags.iter()
            .filter(|t| t.as_str() != LATEST_TAG)
            .max_by_key(|t| tag_version_key(t))
            .cloned()
            .unwrap_or_else(|| LATEST_TAG.to_string())
    }

    /// Full image reference for the selected release
    pub fn image(&self, tags: &[String]) -> String {
        format!("{}:{}", IMAGE_REPO, self.resolved_release(tags))
    }

    /// Build the request payload. A non-reserved selected folder becomes
    /// the new environment's folder assignment.
    pub fn build_input(&self, tags: &[String], selected_folder: &str) -> EnvironmentInput {
        let release = self.resolved_release(tags);
        let command = self.command.trim();
        let folder_ids = if folders::is_reserved(selected_folder) {
            Vec::new()
        } else {
            vec![selected_folder.to_string()]
        };

        EnvironmentInput {
            name: self.name.trim().to_string(),
            image: format!("{}:{}", IMAGE_REPO, release),
            command: (!command.is_empty()).then(|| command.to_string()),
            comfyui_path: Some(self.comfyui_path.trim().to_string()),
            options: EnvironmentOptions {
                comfyui_release: Some(release),
                port: Some(self.port.clone()),
                runtime: Some(self.runtime.clone()),
                mount_config: to_mount_config(&self.mounts),
                ..Default::default()
            },
            folder_ids,
        }
    }
}

/// Pick a free name for a duplicate by appending `-copy` until no live
/// environment holds it.
pub fn duplicate_name(base: &str, existing: &[Environment]) -> String {
    let taken = |name: &str| existing.iter().any(|e| !e.is_deleted() && e.name == name);
    let mut candidate = format!("{}-copy", base);
    while taken(&candidate) {
        candidate.push_str("-copy");
    }
    candidate
}

/// Sort key treating a tag as its sequence of numeric runs, so `v0.10.0`
/// orders above `v0.9.1`.
fn tag_version_key(tag: &str) -> Vec<u64> {
    let mut key = Vec::new();
    let mut current = String::new();
    for ch in tag.chars() {
        if ch.is_ascii_digit() {
            current.push(ch);
        } else if !current.is_empty() {
            key.push(current.parse().unwrap_or(0));
            current.clear();
        }
    }
    if !current.is_empty() {
        key.push(current.parse().unwrap_or(0));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str, folder_ids: Vec<&str>) -> Environment {
        Environment {
            id: name.to_string(),
            name: name.to_string(),
            image: "img".to_string(),
            folder_ids: folder_ids.into_iter().map(String::from).collect(),
            ..Default::default()
        }
    }

    fn valid_form() -> CreateForm {
        CreateForm {
            name: "env-a".to_string(),
            comfyui_path: "/opt/ComfyUI".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_requires_name_and_path() {
        let mut form = CreateForm::default();
        assert!(form.validate(&[]).is_err());

        form.name = "env-a".to_string();
        assert!(form.validate(&[]).is_err());

        form.comfyui_path = "/opt/ComfyUI".to_string();
        assert!(form.validate(&[]).is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_live_name() {
        let form = valid_form();
        let existing = vec![env("env-a", vec![])];
        let result = form.validate(&existing);
        assert!(result.is_err());
        assert!(format!("{}", result.unwrap_err()).contains("already exists"));
    }

    #[test]
    fn test_validate_allows_name_of_deleted() {
        let form = valid_form();
        let existing = vec![env("env-a", vec!["deleted"])];
        assert!(form.validate(&existing).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_port() {
        let mut form = valid_form();
        form.port = "eighty".to_string();
        assert!(form.validate(&[]).is_err());
        form.port = "99999".to_string();
        assert!(form.validate(&[]).is_err());
    }

    #[test]
    fn test_resolved_release_picks_newest_concrete() {
        let form = CreateForm::default();
        let tags = vec![
            "latest".to_string(),
            "v0.2.0".to_string(),
            "v0.10.0".to_string(),
            "v0.9.1".to_string(),
        ];
        assert_eq!(form.resolved_release(&tags), "v0.10.0");
    }

    #[test]
    fn test_resolved_release_respects_explicit_tag() {
        let mut form = CreateForm::default();
        form.release = "v0.2.0".to_string();
        let tags = vec!["v0.9.0".to_string()];
        assert_eq!(form.resolved_release(&tags), "v0.2.0");
    }

    #[test]
    fn test_resolved_release_no_tags_falls_back() {
        let form = CreateForm::default();
        assert_eq!(form.resolved_release(&[]), "latest");
    }

    #[test]
    fn test_mount_edit_demotes_to_custom() {
        let mut form = CreateForm::default();
        assert_eq!(form.environment_type, EnvironmentType::Default);

        form.set_mount_action(0, MountAction::Copy);
        assert_eq!(form.environment_type, EnvironmentType::Custom);
        assert_eq!(form.mounts[0].action, MountAction::Copy);

        // Reselecting the preset restores its exact rows
        form.set_environment_type(EnvironmentType::Default);
        assert_eq!(form.mounts, preset_entries(EnvironmentType::Default));
    }

    #[test]
    fn test_selecting_custom_keeps_rows() {
        let mut form = CreateForm::default();
        let before = form.mounts.clone();
        form.set_environment_type(EnvironmentType::Custom);
        assert_eq!(form.mounts, before);
    }

    #[test]
    fn test_build_input_assigns_selected_folder() {
        let form = valid_form();
        let input = form.build_input(&[], "f1");
        assert_eq!(input.folder_ids, vec!["f1".to_string()]);
    }

    #[test]
    fn test_build_input_skips_reserved_folders() {
        let form = valid_form();
        assert!(form.build_input(&[], "all").folder_ids.is_empty());
        assert!(form.build_input(&[], "deleted").folder_ids.is_empty());
    }

    #[test]
    fn test_build_input_image_and_options() {
        let form = valid_form();
        let tags = vec!["latest".to_string(), "v0.3.1".to_string()];
        let input = form.build_input(&tags, "all");
        assert_eq!(input.image, "akatzai/comfyui-env:v0.3.1");
        assert_eq!(input.options.comfyui_release.as_deref(), Some("v0.3.1"));
        assert_eq!(input.options.port.as_deref(), Some("8188"));
        assert_eq!(input.options.runtime.as_deref(), Some("nvidia"));
        assert!(input.command.is_none());
        assert_eq!(input.options.mount_config.len(), 4);
    }

    #[test]
    fn test_duplicate_name_appends_until_free() {
        let existing = vec![env("env-a", vec![]), env("env-a-copy", vec![])];
        assert_eq!(duplicate_name("env-a", &existing), "env-a-copy-copy");

        let existing = vec![env("env-a", vec![])];
        assert_eq!(duplicate_name("env-a", &existing), "env-a-copy");
    }

    #[test]
    fn test_flow_abandon_drops_pending() {
        let mut flow = CreateFlow::new();
        flow.open();
        flow.step = CreateStep::InstallPrereqOpen;
        flow.pending = Some(PendingCreate {
            input: EnvironmentInput::default(),
            path: "/opt/ComfyUI".to_string(),
            branch: "v0.3.1".to_string(),
            image: "akatzai/comfyui-env:v0.3.1".to_string(),
        });

        flow.abandon();
        assert_eq!(flow.step, CreateStep::Editing);
        assert!(flow.pending.is_none());
    }
}
