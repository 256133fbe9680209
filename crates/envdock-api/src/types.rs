//! Wire types for the envdock backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Reported container status of an environment.
///
/// The vocabulary is open-ended on the wire; anything unrecognized parses
/// as `Unknown` rather than failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentStatus {
    Created,
    Running,
    Exited,
    Dead,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl EnvironmentStatus {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// What to do with a ComfyUI directory when creating an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountAction {
    /// Bind-mount the host directory into the container
    Mount,
    /// Copy the host directory into the container at creation
    Copy,
}

impl std::fmt::Display for MountAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mount => write!(f, "mount"),
            Self::Copy => write!(f, "copy"),
        }
    }
}

/// Open options map attached to an environment.
///
/// Known keys are typed; anything else round-trips through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comfyui_release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    /// Directory name -> action; ordered for stable serialization
    pub mount_config: BTreeMap<String, MountAction>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// The reserved folder id marking soft-deleted environments
pub const DELETED_FOLDER_ID: &str = "deleted";

/// One managed container environment, as returned by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: EnvironmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comfyui_path: Option<String>,
    pub options: EnvironmentOptions,
    /// Server-populated metadata (timestamps, base image label, ...)
    pub metadata: HashMap<String, serde_json::Value>,
    /// Whether this environment was derived from another one
    pub duplicate: bool,
    /// Zero or one folder membership tag; "deleted" means soft-deleted
    #[serde(rename = "folderIds")]
    pub folder_ids: Vec<String>,
}

impl Environment {
    /// Whether the environment sits in the soft-delete bin
    pub fn is_deleted(&self) -> bool {
        self.folder_ids.iter().any(|f| f == DELETED_FOLDER_ID)
    }

    /// The single folder membership, if any
    pub fn folder_id(&self) -> Option<&str> {
        self.folder_ids.first().map(String::as_str)
    }

    /// Creation timestamp from server metadata, if present and parseable
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get("created_at")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// Base image label from server metadata
    pub fn base_image(&self) -> Option<&str> {
        self.metadata.get("base_image").and_then(|v| v.as_str())
    }
}

/// Write-side projection for creating (or duplicating) an environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInput {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comfyui_path: Option<String>,
    pub options: EnvironmentOptions,
    #[serde(rename = "folderIds", default, skip_serializing_if = "Vec::is_empty")]
    pub folder_ids: Vec<String>,
}

/// Partial patch for `PUT /environments/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<EnvironmentOptions>,
    #[serde(rename = "folderIds", skip_serializing_if = "Option::is_none")]
    pub folder_ids: Option<Vec<String>>,
}

/// A named partition of environments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Write-side folder projection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Per-user settings singleton, owned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comfyui_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub folders: Vec<Folder>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_open_vocabulary() {
        let env: Environment =
            serde_json::from_str(r#"{"id":"1","name":"a","image":"i","status":"restarting"}"#)
                .unwrap();
        assert_eq!(env.status, EnvironmentStatus::Unknown);

        let env: Environment =
            serde_json::from_str(r#"{"id":"1","name":"a","image":"i","status":"running"}"#)
                .unwrap();
        assert!(env.status.is_running());
    }

    #[test]
    fn test_folder_ids_wire_name() {
        let env: Environment = serde_json::from_str(
            r#"{"id":"1","name":"a","image":"i","folderIds":["deleted"]}"#,
        )
        .unwrap();
        assert!(env.is_deleted());
        assert_eq!(env.folder_id(), Some("deleted"));

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["folderIds"][0], "deleted");
        assert!(json.get("folder_ids").is_none());
    }

    #[test]
    fn test_options_round_trip() {
        let mut options = EnvironmentOptions {
            comfyui_release: Some("v0.3.1".to_string()),
            port: Some("8188".to_string()),
            runtime: Some("nvidia".to_string()),
            ..Default::default()
        };
        options
            .mount_config
            .insert("models".to_string(), MountAction::Mount);
        options
            .mount_config
            .insert("custom_nodes".to_string(), MountAction::Copy);

        let json = serde_json::to_string(&options).unwrap();
        let back: EnvironmentOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
        assert_eq!(
            back.mount_config.get("custom_nodes"),
            Some(&MountAction::Copy)
        );
    }

    #[test]
    fn test_options_preserves_unknown_keys() {
        let json = r#"{"port":"8188","gpu_count":"2"}"#;
        let options: EnvironmentOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.port.as_deref(), Some("8188"));
        assert_eq!(
            options.extra.get("gpu_count").and_then(|v| v.as_str()),
            Some("2")
        );
    }

    #[test]
    fn test_update_omits_absent_fields() {
        let patch = EnvironmentUpdate {
            name: Some("renamed".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["name"], "renamed");
        assert!(json.get("options").is_none());
        assert!(json.get("folderIds").is_none());
    }

    #[test]
    fn test_input_omits_empty_folder_ids() {
        let input = EnvironmentInput {
            name: "env-a".to_string(),
            image: "img:latest".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("folderIds").is_none());
    }

    #[test]
    fn test_metadata_accessors() {
        let mut env = Environment::default();
        env.metadata.insert(
            "created_at".to_string(),
            serde_json::json!("2025-01-15T10:30:00Z"),
        );
        env.metadata
            .insert("base_image".to_string(), serde_json::json!("img:v1"));

        assert!(env.created_at().is_some());
        assert_eq!(env.base_image(), Some("img:v1"));
    }
}
