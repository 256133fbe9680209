//! State for the environment creation dialog
//!
//! Wraps the core CreateForm with field focus, in-place text editing, and
//! the preset/mount-row interactions.

use crate::widgets::TextInputState;
use envdock_api::MountAction;
use envdock_core::{CreateForm, EnvironmentType, MountEntry, LATEST_TAG};

/// Focusable rows of the creation dialog, in navigation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateField {
    Name,
    Release,
    Path,
    Port,
    Runtime,
    Command,
    EnvType,
    Mounts,
}

impl CreateField {
    pub const ORDER: [CreateField; 8] = [
        Self::Name,
        Self::Release,
        Self::Path,
        Self::Port,
        Self::Runtime,
        Self::Command,
        Self::EnvType,
        Self::Mounts,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Release => "Release",
            Self::Path => "ComfyUI Path",
            Self::Port => "Port",
            Self::Runtime => "Runtime",
            Self::Command => "Command",
            Self::EnvType => "Environment Type",
            Self::Mounts => "Mounts",
        }
    }

    /// Whether this field edits free text (as opposed to cycling choices)
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Self::Name | Self::Path | Self::Port | Self::Runtime | Self::Command
        )
    }

    fn index(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }
}

/// Creation dialog state
pub struct CreateDialogState {
    pub form: CreateForm,
    pub field: CreateField,
    /// A text field is being edited in place
    pub editing: bool,
    pub input: TextInputState,
    /// Selected row inside the mount table
    pub mount_row: usize,
    /// Last validation error, shown inline
    pub error: Option<String>,
}

impl CreateDialogState {
    pub fn new(form: CreateForm) -> Self {
        Self {
            form,
            field: CreateField::Name,
            editing: false,
            input: TextInputState::new(),
            mount_row: 0,
            error: None,
        }
    }

    pub fn next_field(&mut self) {
        let idx = (self.field.index() + 1) % CreateField::ORDER.len();
        self.field = CreateField::ORDER[idx];
    }

    pub fn prev_field(&mut self) {
        let idx = self.field.index();
        let idx = if idx == 0 {
            CreateField::ORDER.len() - 1
        } else {
            idx - 1
        };
        self.field = CreateField::ORDER[idx];
    }

    /// Current display value of a field
    pub fn field_value(&self, field: CreateField) -> String {
        match field {
            CreateField::Name => self.form.name.clone(),
            CreateField::Release => self.form.release.clone(),
            CreateField::Path => self.form.comfyui_path.clone(),
            CreateField::Port => self.form.port.clone(),
            CreateField::Runtime => self.form.runtime.clone(),
            CreateField::Command => self.form.command.clone(),
            CreateField::EnvType => self.form.environment_type.label().to_string(),
            CreateField::Mounts => format!("{} entries", self.form.mounts.len()),
        }
    }

    /// Start editing the focused text field
    pub fn begin_edit(&mut self) {
        if self.field.is_text() {
            self.input = TextInputState::with_value(&self.field_value(self.field));
            self.editing = true;
        }
    }

    /// Write the edit buffer back into the form
    pub fn commit_edit(&mut self) {
        if !self.editing {
            return;
        }
        let value = self.input.value().to_string();
        match self.field {
            CreateField::Name => self.form.name = value,
            CreateField::Path => self.form.comfyui_path = value,
            CreateField::Port => self.form.port = value,
            CreateField::Runtime => self.form.runtime = value,
            CreateField::Command => self.form.command = value,
            _ => {}
        }
        self.editing = false;
        self.error = None;
    }

    pub fn cancel_edit(&mut self) {
        self.editing = false;
    }

    /// Step the environment type selector; applies the preset's mounts
    pub fn cycle_env_type(&mut self, forward: bool) {
        let all = EnvironmentType::ALL;
        let idx = all
            .iter()
            .position(|t| *t == self.form.environment_type)
            .unwrap_or(0);
        let idx = if forward {
            (idx + 1) % all.len()
        } else {
            (idx + all.len() - 1) % all.len()
        };
        self.form.set_environment_type(all[idx]);
        self.mount_row = 0;
    }

    /// Step the release selector through `latest` plus the concrete tags
    pub fn cycle_release(&mut self, tags: &[String], forward: bool) {
        let mut options: Vec<&str> = vec![LATEST_TAG];
        options.extend(tags.iter().map(String::as_str).filter(|t| *t != LATEST_TAG));

        let idx = options
            .iter()
            .position(|t| *t == self.form.release)
            .unwrap_or(0);
        let idx = if forward {
            (idx + 1) % options.len()
        } else {
            (idx + options.len() - 1) % options.len()
        };
        self.form.release = options[idx].to_string();
    }

    pub fn mount_up(&mut self) {
        self.mount_row = self.mount_row.saturating_sub(1);
    }

    pub fn mount_down(&mut self) {
        if !self.form.mounts.is_empty() {
            self.mount_row = (self.mount_row + 1).min(self.form.mounts.len() - 1);
        }
    }

    /// Flip the selected row between mount and copy
    pub fn toggle_mount_action(&mut self) {
        if let Some(entry) = self.form.mounts.get(self.mount_row) {
            let flipped = match entry.action {
                MountAction::Mount => MountAction::Copy,
                MountAction::Copy => MountAction::Mount,
            };
            self.form.set_mount_action(self.mount_row, flipped);
        }
    }

    pub fn remove_mount_row(&mut self) {
        self.form.remove_mount(self.mount_row);
        if self.mount_row >= self.form.mounts.len() && self.mount_row > 0 {
            self.mount_row -= 1;
        }
    }

    pub fn add_mount_row(&mut self, directory: &str) {
        self.form.add_mount(MountEntry {
            directory: directory.to_string(),
            action: MountAction::Mount,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialog() -> CreateDialogState {
        CreateDialogState::new(CreateForm::default())
    }

    #[test]
    fn test_field_navigation_wraps() {
        let mut d = dialog();
        assert_eq!(d.field, CreateField::Name);
        d.prev_field();
        assert_eq!(d.field, CreateField::Mounts);
        d.next_field();
        assert_eq!(d.field, CreateField::Name);
    }

    #[test]
    fn test_edit_commit_writes_back() {
        let mut d = dialog();
        d.begin_edit();
        assert!(d.editing);
        for c in "env-a".chars() {
            d.input.insert(c);
        }
        d.commit_edit();
        assert_eq!(d.form.name, "env-a");
        assert!(!d.editing);
    }

    #[test]
    fn test_cancel_edit_discards() {
        let mut d = dialog();
        d.form.name = "keep".to_string();
        d.field = CreateField::Name;
        d.begin_edit();
        d.input.set_value("discard");
        d.cancel_edit();
        assert_eq!(d.form.name, "keep");
    }

    #[test]
    fn test_begin_edit_ignored_for_choice_fields() {
        let mut d = dialog();
        d.field = CreateField::EnvType;
        d.begin_edit();
        assert!(!d.editing);
    }

    #[test]
    fn test_cycle_env_type_applies_preset() {
        let mut d = dialog();
        d.cycle_env_type(true);
        assert_eq!(d.form.environment_type, EnvironmentType::DefaultPlus);
        assert_eq!(d.form.mounts.len(), 5);

        // Stepping back re-applies the Default preset
        d.cycle_env_type(false);
        assert_eq!(d.form.environment_type, EnvironmentType::Default);
        assert_eq!(d.form.mounts.len(), 4);

        // Backwards past the start wraps to Custom, keeping the rows
        d.cycle_env_type(false);
        assert_eq!(d.form.environment_type, EnvironmentType::Custom);
        assert_eq!(d.form.mounts.len(), 4);
    }

    #[test]
    fn test_cycle_release_includes_latest_once() {
        let mut d = dialog();
        let tags = vec!["latest".to_string(), "v0.3.1".to_string(), "v0.2.0".to_string()];
        d.cycle_release(&tags, true);
        assert_eq!(d.form.release, "v0.3.1");
        d.cycle_release(&tags, true);
        assert_eq!(d.form.release, "v0.2.0");
        d.cycle_release(&tags, true);
        assert_eq!(d.form.release, "latest");
    }

    #[test]
    fn test_toggle_mount_demotes_preset() {
        let mut d = dialog();
        d.toggle_mount_action();
        assert_eq!(d.form.environment_type, EnvironmentType::Custom);
        assert_eq!(d.form.mounts[0].action, MountAction::Copy);
    }

    #[test]
    fn test_remove_mount_row_clamps_selection() {
        let mut d = dialog();
        let last = d.form.mounts.len() - 1;
        d.mount_row = last;
        d.remove_mount_row();
        assert_eq!(d.mount_row, last - 1);
    }
}
