//! Cloud-config server binary

use clap::Parser;
use tracing::error;

use cloud_config_server::cli::Cli;
use cloud_config_server::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_telemetry(TelemetryConfig {
        json: cli.log_json,
    }) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = cli.run().await {
        error!(error = %e, "cloud-config-server failed");
        std::process::exit(1);
    }
}
