//! Logging initialisation.
//!
//! Library crates log through the `log` facade; the subscriber installed
//! here bridges those records and writes everything to stderr so stdout
//! carries only the JSON result.

use sorng_vcenter_folder::error::{FolderError, FolderResult};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging(verbose: bool) -> FolderResult<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!("vcenter_folder={level},sorng_vcenter_folder={level}"))
        })
        .map_err(|e| FolderError::config(format!("Failed to create log filter: {e}")))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| FolderError::config(format!("Failed to install log subscriber: {e}")))
}
