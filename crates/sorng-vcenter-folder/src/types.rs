//! Shared types for vCenter folder management.

use crate::error::{FolderError, FolderResult};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// vCenter limits entity names to 79 characters.
pub const MAX_FOLDER_NAME_CHARS: usize = 79;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level configuration for connecting to a vCenter server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VsphereConfig {
    /// vCenter hostname / IP (e.g. "vcenter.lab.local"), or a full base URL
    pub host: String,
    /// Port (default 443)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username (e.g. "administrator@vsphere.local")
    pub username: String,
    /// Password
    pub password: String,
    /// Skip TLS certificate verification (self-signed labs)
    #[serde(default)]
    pub insecure: bool,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// VI/JSON API release segment (`/sdk/vim25/{release}/...`)
    #[serde(default = "default_api_release")]
    pub api_release: String,
    /// Upper bound on waiting for a destroy task to finish
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    /// Delay between task-info polls
    #[serde(default = "default_task_poll_interval")]
    pub task_poll_interval_ms: u64,
}

fn default_port() -> u16 { 443 }
fn default_timeout() -> u64 { 30 }
fn default_api_release() -> String { "8.0.1.0".to_string() }
fn default_task_timeout() -> u64 { 3600 }
fn default_task_poll_interval() -> u64 { 500 }

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            port: default_port(),
            insecure: false,
            timeout_secs: default_timeout(),
            api_release: default_api_release(),
            task_timeout_secs: default_task_timeout(),
            task_poll_interval_ms: default_task_poll_interval(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Folder category / desired state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One of the four parallel folder trees under a datacenter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FolderType {
    #[default]
    Vm,
    Host,
    Datastore,
    Network,
}

impl FolderType {
    pub const ALL: [FolderType; 4] = [Self::Vm, Self::Host, Self::Datastore, Self::Network];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::Host => "host",
            Self::Datastore => "datastore",
            Self::Network => "network",
        }
    }

    /// Datacenter property holding this category's root folder.
    pub fn datacenter_property(&self) -> &'static str {
        match self {
            Self::Vm => "vmFolder",
            Self::Host => "hostFolder",
            Self::Datastore => "datastoreFolder",
            Self::Network => "networkFolder",
        }
    }
}

impl fmt::Display for FolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolderType {
    type Err = FolderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vm" => Ok(Self::Vm),
            "host" => Ok(Self::Host),
            "datastore" => Ok(Self::Datastore),
            "network" => Ok(Self::Network),
            other => Err(FolderError::config(format!(
                "value of folder_type must be one of: datastore, host, network, vm, got: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl FromStr for DesiredState {
    type Err = FolderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(FolderError::config(format!(
                "value of state must be one of: present, absent, got: {other}"
            ))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Inventory objects
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Managed object reference (e.g. `Folder:group-v3`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ObjectRef {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self { kind: kind.into(), value: value.into() }
    }

    pub fn folder(moid: impl Into<String>) -> Self {
        Self::new("Folder", moid)
    }

    pub fn is_folder(&self) -> bool {
        self.kind == "Folder"
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Set of object kinds a folder may contain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct ChildTypeSignature(pub BTreeSet<String>);

impl ChildTypeSignature {
    pub fn contains(&self, kind: &str) -> bool {
        self.0.contains(kind)
    }
}

impl<S: Into<String>> FromIterator<S> for ChildTypeSignature {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Minimal view of any inventory object, enough to walk towards the root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryNode {
    pub moref: ObjectRef,
    pub name: String,
    #[serde(default)]
    pub parent: Option<ObjectRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Folder {
    pub moref: ObjectRef,
    pub name: String,
    pub child_type: ChildTypeSignature,
    /// Lookup-only back-reference; the folder is owned by the platform.
    #[serde(default)]
    pub parent: Option<ObjectRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Datacenter {
    pub moref: ObjectRef,
    pub name: String,
    pub vm_folder: ObjectRef,
    pub host_folder: ObjectRef,
    pub datastore_folder: ObjectRef,
    pub network_folder: ObjectRef,
}

impl Datacenter {
    pub fn root_folder(&self, folder_type: FolderType) -> &ObjectRef {
        match folder_type {
            FolderType::Vm => &self.vm_folder,
            FolderType::Host => &self.host_folder,
            FolderType::Datastore => &self.datastore_folder,
            FolderType::Network => &self.network_folder,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handle to an asynchronous vCenter task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRef(pub ObjectRef);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskInfo {
    pub state: TaskState,
    #[serde(default)]
    pub message: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Request
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Desired folder state for one invocation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FolderRequest {
    #[serde(alias = "datacenter_name")]
    pub datacenter: String,
    pub folder_name: String,
    #[serde(default)]
    pub folder_type: FolderType,
    /// `/`-delimited chain of folder names, or a single name.
    #[serde(default)]
    pub parent_folder: Option<String>,
    /// Managed object id of the parent folder.
    #[serde(default)]
    pub parent_folder_moid: Option<String>,
    #[serde(default)]
    pub state: DesiredState,
    #[serde(default, alias = "_ansible_check_mode")]
    pub check_mode: bool,
}

/// How the caller addressed the parent folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentSpec {
    /// Direct managed object id.
    Moid(String),
    /// Single folder name directly under the category root.
    Name(String),
    /// Multi-segment path, walked one segment at a time.
    Path { raw: String, segments: Vec<String> },
}

impl ParentSpec {
    /// Parse a caller-supplied parent folder expression.
    pub fn parse_path(raw: &str) -> FolderResult<Self> {
        if !raw.contains('/') {
            return Ok(Self::Name(raw.to_string()));
        }
        let segments: Vec<String> = raw
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        match segments.len() {
            0 => Err(FolderError::config(format!(
                "parent_folder '{raw}' does not name any folder"
            ))),
            _ => Ok(Self::Path { raw: raw.to_string(), segments }),
        }
    }
}

impl FolderRequest {
    /// Reject malformed requests before any inventory call is made.
    pub fn validate(&self) -> FolderResult<()> {
        if self.datacenter.trim().is_empty() {
            return Err(FolderError::config("missing required argument: datacenter"));
        }
        if self.folder_name.is_empty() {
            return Err(FolderError::config("missing required argument: folder_name"));
        }
        if self.folder_name.chars().count() > MAX_FOLDER_NAME_CHARS {
            return Err(FolderError::config(
                "Failed to manage folder as folder_name can only contain 80 characters.",
            ));
        }
        if non_empty(&self.parent_folder).is_some() && non_empty(&self.parent_folder_moid).is_some() {
            return Err(FolderError::config(
                "parameters are mutually exclusive: parent_folder|parent_folder_moid",
            ));
        }
        self.parent_spec().map(|_| ())
    }

    /// The parent addressing form, if any. Empty strings count as unset.
    pub fn parent_spec(&self) -> FolderResult<Option<ParentSpec>> {
        if let Some(moid) = non_empty(&self.parent_folder_moid) {
            return Ok(Some(ParentSpec::Moid(moid.to_string())));
        }
        match non_empty(&self.parent_folder) {
            Some(raw) => ParentSpec::parse_path(raw).map(Some),
            None => Ok(None),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
