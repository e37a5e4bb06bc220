//! Command-line surface.

use crate::config::ModuleArgs;

use clap::builder::BoolishValueParser;
use clap::Parser;
use sorng_vcenter_folder::types::{DesiredState, FolderType};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "vcenter-folder")]
#[command(version, about = "Create or remove a folder in a vCenter datacenter", long_about = None)]
pub struct Cli {
    /// JSON or YAML file holding module arguments; flags override its values
    #[arg(long, value_name = "PATH")]
    pub args_file: Option<PathBuf>,

    /// vCenter hostname or IP
    #[arg(long, env = "VMWARE_HOST")]
    pub hostname: Option<String>,

    #[arg(long, env = "VMWARE_USER")]
    pub username: Option<String>,

    #[arg(long, env = "VMWARE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, env = "VMWARE_PORT")]
    pub port: Option<u16>,

    /// Verify the vCenter TLS certificate
    #[arg(long, env = "VMWARE_VALIDATE_CERTS", value_parser = BoolishValueParser::new())]
    pub validate_certs: Option<bool>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// VI/JSON API release, e.g. 8.0.1.0
    #[arg(long)]
    pub api_release: Option<String>,

    /// Give up waiting for a removal task after this many seconds
    #[arg(long)]
    pub task_timeout_secs: Option<u64>,

    #[arg(long, visible_alias = "datacenter-name")]
    pub datacenter: Option<String>,

    /// Folder name (case sensitive, at most 79 characters)
    #[arg(long)]
    pub folder_name: Option<String>,

    /// vm, host, datastore or network
    #[arg(long)]
    pub folder_type: Option<FolderType>,

    /// Parent folder name or path such as "tier1/tier2"
    #[arg(long, conflicts_with = "parent_folder_moid")]
    pub parent_folder: Option<String>,

    /// Managed object id of the parent folder
    #[arg(long)]
    pub parent_folder_moid: Option<String>,

    /// present or absent
    #[arg(long)]
    pub state: Option<DesiredState>,

    /// Report what would change without changing it
    #[arg(long)]
    pub check_mode: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Flag values as module arguments; unset flags stay `None`.
    pub fn to_args(&self) -> ModuleArgs {
        ModuleArgs {
            hostname: self.hostname.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            port: self.port,
            validate_certs: self.validate_certs,
            timeout_secs: self.timeout_secs,
            api_release: self.api_release.clone(),
            task_timeout_secs: self.task_timeout_secs,
            datacenter: self.datacenter.clone(),
            folder_name: self.folder_name.clone(),
            folder_type: self.folder_type,
            parent_folder: self.parent_folder.clone(),
            parent_folder_moid: self.parent_folder_moid.clone(),
            state: self.state,
            check_mode: self.check_mode.then_some(true),
        }
    }
}
