use clap::Parser;
use std::process::ExitCode;
use vcenter_folder::cli::Cli;
use vcenter_folder::logging;

use sorng_vcenter_folder::report;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("{e}");
    }

    let result = vcenter_folder::run(&cli).await;
    println!("{}", report::to_json(&result));

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
