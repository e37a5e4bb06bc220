//! Module arguments: args-file loading, flag overrides, and conversion
//! into the connection config and folder request.

use serde::{Deserialize, Serialize};
use sorng_vcenter_folder::error::{FolderError, FolderResult};
use sorng_vcenter_folder::types::{DesiredState, FolderRequest, FolderType, VsphereConfig};
use std::path::Path;

/// Every option the tool accepts. All fields are optional so a file and
/// the command line can each supply part of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModuleArgs {
    #[serde(default, alias = "host")]
    pub hostname: Option<String>,
    #[serde(default, alias = "user", alias = "admin")]
    pub username: Option<String>,
    #[serde(default, alias = "pass", alias = "pwd")]
    pub password: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub validate_certs: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub api_release: Option<String>,
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,
    #[serde(default, alias = "datacenter_name")]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub folder_type: Option<FolderType>,
    #[serde(default)]
    pub parent_folder: Option<String>,
    #[serde(default)]
    pub parent_folder_moid: Option<String>,
    #[serde(default)]
    pub state: Option<DesiredState>,
    #[serde(default, alias = "_ansible_check_mode")]
    pub check_mode: Option<bool>,
}

/// Read module arguments from a JSON (`.json`) or YAML file.
pub fn load_args_file(path: &Path) -> FolderResult<ModuleArgs> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| FolderError::config(format!("Failed to read args file {}: {e}", path.display())))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&text)
            .map_err(|e| FolderError::config(format!("Invalid JSON in {}: {e}", path.display())))
    } else {
        serde_yaml::from_str(&text)
            .map_err(|e| FolderError::config(format!("Invalid YAML in {}: {e}", path.display())))
    }
}

impl ModuleArgs {
    /// Values set in `overrides` win.
    pub fn merge(self, overrides: ModuleArgs) -> ModuleArgs {
        ModuleArgs {
            hostname: overrides.hostname.or(self.hostname),
            username: overrides.username.or(self.username),
            password: overrides.password.or(self.password),
            port: overrides.port.or(self.port),
            validate_certs: overrides.validate_certs.or(self.validate_certs),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            api_release: overrides.api_release.or(self.api_release),
            task_timeout_secs: overrides.task_timeout_secs.or(self.task_timeout_secs),
            datacenter: overrides.datacenter.or(self.datacenter),
            folder_name: overrides.folder_name.or(self.folder_name),
            folder_type: overrides.folder_type.or(self.folder_type),
            parent_folder: overrides.parent_folder.or(self.parent_folder),
            parent_folder_moid: overrides.parent_folder_moid.or(self.parent_folder_moid),
            state: overrides.state.or(self.state),
            check_mode: overrides.check_mode.or(self.check_mode),
        }
    }

    /// The folder request alone; connection settings are not needed for it.
    pub fn request(&self) -> FolderResult<FolderRequest> {
        let request = FolderRequest {
            datacenter: required(&self.datacenter, "datacenter")?,
            folder_name: required(&self.folder_name, "folder_name")?,
            folder_type: self.folder_type.unwrap_or_default(),
            parent_folder: self.parent_folder.clone(),
            parent_folder_moid: self.parent_folder_moid.clone(),
            state: self.state.unwrap_or_default(),
            check_mode: self.check_mode.unwrap_or(false),
        };
        request.validate()?;
        Ok(request)
    }

    /// Connection settings, falling back to `VsphereConfig` defaults.
    pub fn vsphere_config(&self) -> FolderResult<VsphereConfig> {
        let defaults = VsphereConfig::default();
        Ok(VsphereConfig {
            host: required(&self.hostname, "hostname")?,
            username: required(&self.username, "username")?,
            password: required(&self.password, "password")?,
            port: self.port.unwrap_or(defaults.port),
            insecure: !self.validate_certs.unwrap_or(true),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            api_release: self.api_release.clone().unwrap_or(defaults.api_release),
            task_timeout_secs: self.task_timeout_secs.unwrap_or(defaults.task_timeout_secs),
            task_poll_interval_ms: defaults.task_poll_interval_ms,
        })
    }
}

fn required(value: &Option<String>, name: &str) -> FolderResult<String> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FolderError::config(format!("missing required argument: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_yaml_args() {
        let file = write_temp(
            ".yml",
            "hostname: vc.lab\nusername: admin\npassword: secret\ndatacenter_name: DC0\nfolder_name: f1\nfolder_type: host\nvalidate_certs: false\n",
        );
        let args = load_args_file(file.path()).unwrap();
        let request = args.request().unwrap();
        assert_eq!(request.datacenter, "DC0");
        assert_eq!(request.folder_type, FolderType::Host);
        assert!(args.vsphere_config().unwrap().insecure);
    }

    #[test]
    fn loads_json_args() {
        let file = write_temp(
            ".json",
            r#"{"datacenter":"DC0","folder_name":"f1","state":"absent","_ansible_check_mode":true}"#,
        );
        let request = load_args_file(file.path()).unwrap().request().unwrap();
        assert_eq!(request.state, DesiredState::Absent);
        assert!(request.check_mode);
    }

    #[test]
    fn flags_override_file() {
        let file = ModuleArgs {
            datacenter: Some("DC0".into()),
            folder_name: Some("f1".into()),
            folder_type: Some(FolderType::Datastore),
            ..Default::default()
        };
        let flags = ModuleArgs {
            folder_name: Some("f2".into()),
            ..Default::default()
        };
        let merged = file.merge(flags);
        assert_eq!(merged.folder_name.as_deref(), Some("f2"));
        assert_eq!(merged.folder_type, Some(FolderType::Datastore));
    }

    #[test]
    fn missing_values_are_config_errors() {
        let err = ModuleArgs::default().request().unwrap_err();
        assert!(err.is_config());
        assert_eq!(err.message, "missing required argument: datacenter");
        assert!(ModuleArgs::default().vsphere_config().unwrap_err().is_config());
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let err = load_args_file(Path::new("/nonexistent/args.yml")).unwrap_err();
        assert!(err.is_config());
    }
}
