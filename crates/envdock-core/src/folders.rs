//! Reserved folder model
//!
//! Two synthetic folders exist outside the persisted set: `all` (the
//! unfiltered view) and `deleted` (the soft-delete bin). They are rendered
//! alongside user folders but never sent to the backend's folder endpoints.

use envdock_api::Folder;

pub const ALL_FOLDER_ID: &str = "all";
pub const DELETED_FOLDER_ID: &str = envdock_api::DELETED_FOLDER_ID;

pub const ALL_FOLDER_NAME: &str = "All Environments";
pub const DELETED_FOLDER_NAME: &str = "Recently Deleted";

/// The two synthetic folders, in display order
pub fn reserved_folders() -> [Folder; 2] {
    [
        Folder {
            id: ALL_FOLDER_ID.to_string(),
            name: ALL_FOLDER_NAME.to_string(),
            icon: None,
        },
        Folder {
            id: DELETED_FOLDER_ID.to_string(),
            name: DELETED_FOLDER_NAME.to_string(),
            icon: None,
        },
    ]
}

/// Whether a folder id names one of the reserved synthetic folders
pub fn is_reserved(id: &str) -> bool {
    id == ALL_FOLDER_ID || id == DELETED_FOLDER_ID
}
