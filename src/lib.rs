//! vcenter-folder: command-line front end for `sorng-vcenter-folder`.

pub mod cli;
pub mod config;
pub mod logging;

use cli::Cli;
use config::ModuleArgs;

use log::warn;
use sorng_vcenter_folder::error::FolderResult;
use sorng_vcenter_folder::report::FolderOutcome;
use sorng_vcenter_folder::service::FolderService;

/// Merge the args file (if any) with the flags.
pub fn module_args(cli: &Cli) -> FolderResult<ModuleArgs> {
    let base = match &cli.args_file {
        Some(path) => config::load_args_file(path)?,
        None => ModuleArgs::default(),
    };
    Ok(base.merge(cli.to_args()))
}

/// One invocation: validate, connect, reconcile, disconnect.
pub async fn run(cli: &Cli) -> FolderResult<FolderOutcome> {
    let args = module_args(cli)?;
    let request = args.request()?;
    let vsphere = args.vsphere_config()?;

    let mut service = FolderService::connect(&vsphere).await?;
    let result = service.ensure(&request).await;
    if let Err(e) = service.disconnect().await {
        warn!("Failed to close vCenter session: {e}");
    }
    result
}
