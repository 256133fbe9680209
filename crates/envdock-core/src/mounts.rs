//! Mount presets for the creation form
//!
//! Each environment type maps to a fixed set of ComfyUI directories and
//! how each is brought into the container. Editing any row demotes the
//! selection to `Custom`; re-selecting a preset restores its exact rows.

use envdock_api::MountAction;
use std::collections::BTreeMap;

/// Preset selector shown in the creation form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentType {
    #[default]
    Default,
    DefaultPlus,
    Basic,
    Isolated,
    /// Sentinel for a hand-edited mount table; never applies a preset
    Custom,
}

impl EnvironmentType {
    pub const ALL: [EnvironmentType; 5] = [
        Self::Default,
        Self::DefaultPlus,
        Self::Basic,
        Self::Isolated,
        Self::Custom,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::DefaultPlus => "Default+",
            Self::Basic => "Basic",
            Self::Isolated => "Isolated",
            Self::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One row of the mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub directory: String,
    pub action: MountAction,
}

impl MountEntry {
    fn new(directory: &str, action: MountAction) -> Self {
        Self {
            directory: directory.to_string(),
            action,
        }
    }
}

/// The mount rows a preset stands for. `Custom` has no preset and yields
/// an empty table; callers keep the user's edited rows instead.
pub fn preset_entries(ty: EnvironmentType) -> Vec<MountEntry> {
    use MountAction::*;
    match ty {
        EnvironmentType::Default => vec![
            MountEntry::new("user", Mount),
            MountEntry::new("models", Mount),
            MountEntry::new("output", Mount),
            MountEntry::new("input", Mount),
        ],
        EnvironmentType::DefaultPlus => vec![
            MountEntry::new("custom_nodes", Copy),
            MountEntry::new("user", Mount),
            MountEntry::new("models", Mount),
            MountEntry::new("output", Mount),
            MountEntry::new("input", Mount),
        ],
        EnvironmentType::Basic => vec![
            MountEntry::new("models", Mount),
            MountEntry::new("output", Mount),
            MountEntry::new("input", Mount),
        ],
        EnvironmentType::Isolated | EnvironmentType::Custom => Vec::new(),
    }
}

/// Collapse mount rows into the wire shape
pub fn to_mount_config(entries: &[MountEntry]) -> BTreeMap<String, MountAction> {
    entries
        .iter()
        .map(|e| (e.directory.clone(), e.action))
        .collect()
}
