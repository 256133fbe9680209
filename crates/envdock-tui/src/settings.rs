//! State for the user settings dialog
//!
//! Edits the server-side settings singleton as plain strings and rebuilds
//! a UserSettings on save. The folders collection is owned by the folder
//! manager and passed through untouched.

use crate::widgets::TextInputState;
use envdock_api::UserSettings;

/// Editable rows of the settings dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    ComfyuiPath,
    Runtime,
    Port,
    Command,
}

impl SettingsField {
    pub const ORDER: [SettingsField; 4] = [
        Self::ComfyuiPath,
        Self::Runtime,
        Self::Port,
        Self::Command,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::ComfyuiPath => "ComfyUI Path",
            Self::Runtime => "Runtime",
            Self::Port => "Default Port",
            Self::Command => "Default Command",
        }
    }
}

/// Settings dialog state
pub struct SettingsState {
    pub comfyui_path: String,
    pub runtime: String,
    pub port: String,
    pub command: String,
    pub field: SettingsField,
    pub editing: bool,
    pub input: TextInputState,
    pub error: Option<String>,
}

impl SettingsState {
    pub fn from_settings(settings: &UserSettings) -> Self {
        Self {
            comfyui_path: settings.comfyui_path.clone().unwrap_or_default(),
            runtime: settings.runtime.clone().unwrap_or_default(),
            port: settings.port.map(|p| p.to_string()).unwrap_or_default(),
            command: settings.command.clone().unwrap_or_default(),
            field: SettingsField::ComfyuiPath,
            editing: false,
            input: TextInputState::new(),
            error: None,
        }
    }

    pub fn next_field(&mut self) {
        let idx = self.index();
        self.field = SettingsField::ORDER[(idx + 1) % SettingsField::ORDER.len()];
    }

    pub fn prev_field(&mut self) {
        let idx = self.index();
        let len = SettingsField::ORDER.len();
        self.field = SettingsField::ORDER[(idx + len - 1) % len];
    }

    pub fn field_value(&self, field: SettingsField) -> &str {
        match field {
            SettingsField::ComfyuiPath => &self.comfyui_path,
            SettingsField::Runtime => &self.runtime,
            SettingsField::Port => &self.port,
            SettingsField::Command => &self.command,
        }
    }

    pub fn begin_edit(&mut self) {
        self.input = TextInputState::with_value(self.field_value(self.field));
        self.editing = true;
    }

    pub fn commit_edit(&mut self) {
        if !self.editing {
            return;
        }
        let value = self.input.value().to_string();
        match self.field {
            SettingsField::ComfyuiPath => self.comfyui_path = value,
            SettingsField::Runtime => self.runtime = value,
            SettingsField::Port => self.port = value,
            SettingsField::Command => self.command = value,
        }
        self.editing = false;
        self.error = None;
    }

    pub fn cancel_edit(&mut self) {
        self.editing = false;
    }

    /// Rebuild the settings payload, carrying the existing folders through
    pub fn build(&self, current: &UserSettings) -> Result<UserSettings, String> {
        let port = if self.port.trim().is_empty() {
            None
        } else {
            Some(
                self.port
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| format!("Invalid port: {}", self.port))?,
            )
        };

        let opt = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };

        Ok(UserSettings {
            comfyui_path: opt(&self.comfyui_path),
            runtime: opt(&self.runtime),
            port,
            command: opt(&self.command),
            folders: current.folders.clone(),
        })
    }

    fn index(&self) -> usize {
        SettingsField::ORDER
            .iter()
            .position(|f| *f == self.field)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envdock_api::Folder;

    fn settings() -> UserSettings {
        UserSettings {
            comfyui_path: Some("/opt/ComfyUI".to_string()),
            runtime: Some("nvidia".to_string()),
            port: Some(8188),
            command: None,
            folders: vec![Folder {
                id: "f1".to_string(),
                name: "Projects".to_string(),
                icon: None,
            }],
        }
    }

    #[test]
    fn test_round_trip_preserves_folders() {
        let current = settings();
        let state = SettingsState::from_settings(&current);
        let built = state.build(&current).unwrap();
        assert_eq!(built, current);
    }

    #[test]
    fn test_edit_port_rejects_garbage() {
        let current = settings();
        let mut state = SettingsState::from_settings(&current);
        state.field = SettingsField::Port;
        state.begin_edit();
        state.input.set_value("not-a-port");
        state.commit_edit();

        assert!(state.build(&current).is_err());
    }

    #[test]
    fn test_empty_fields_become_none() {
        let current = settings();
        let mut state = SettingsState::from_settings(&current);
        state.comfyui_path.clear();
        state.port.clear();

        let built = state.build(&current).unwrap();
        assert!(built.comfyui_path.is_none());
        assert!(built.port.is_none());
        assert_eq!(built.folders.len(), 1);
    }

    #[test]
    fn test_field_navigation_wraps() {
        let current = settings();
        let mut state = SettingsState::from_settings(&current);
        state.prev_field();
        assert_eq!(state.field, SettingsField::Command);
        state.next_field();
        assert_eq!(state.field, SettingsField::ComfyuiPath);
    }
}
