//! Outcome payloads handed back to the caller.

use crate::error::FolderError;
use crate::types::FolderType;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FolderResultDetail {
    /// Slash-joined path of the resulting or pre-existing folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub msg: String,
}

/// Successful (changed or unchanged) reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderOutcome {
    pub changed: bool,
    pub result: FolderResultDetail,
}

impl FolderOutcome {
    pub fn changed(path: Option<String>, msg: impl Into<String>) -> Self {
        Self {
            changed: true,
            result: FolderResultDetail { path, msg: msg.into() },
        }
    }

    pub fn unchanged(path: Option<String>, msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            result: FolderResultDetail { path, msg: msg.into() },
        }
    }
}

/// Failed reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderFailure {
    pub failed: bool,
    pub changed: bool,
    pub msg: String,
}

impl From<&FolderError> for FolderFailure {
    fn from(e: &FolderError) -> Self {
        Self {
            failed: true,
            changed: false,
            msg: e.message.clone(),
        }
    }
}

/// Render either side as the JSON document the caller consumes.
pub fn to_json(result: &Result<FolderOutcome, FolderError>) -> serde_json::Value {
    let rendered = match result {
        Ok(outcome) => serde_json::to_value(outcome),
        Err(e) => serde_json::to_value(FolderFailure::from(e)),
    };
    rendered.unwrap_or_else(|e| serde_json::json!({ "failed": true, "msg": e.to_string() }))
}

// ── Messages ────────────────────────────────────────────────────────

pub(crate) fn already_exists(folder_name: &str, parent: Option<&str>) -> String {
    match parent {
        Some(p) => format!("Folder {folder_name} already exists under parent folder {p}"),
        None => format!("Folder {folder_name} already exists"),
    }
}

pub(crate) fn lifecycle(folder_name: &str, folder_type: FolderType, parent: Option<&str>, verb: &str) -> String {
    match parent {
        Some(p) => format!("Folder '{folder_name}' of type '{folder_type}' under '{p}' {verb}."),
        None => format!("Folder '{folder_name}' of type '{folder_type}' {verb}."),
    }
}

pub(crate) fn absent(folder_name: &str, folder_type: FolderType, parent: Option<&str>) -> String {
    lifecycle(folder_name, folder_type, parent, "does not exist")
}
