use crate::cli::JourneyTunnelScenarioCli;
use clap::Parser;

/// Initialise the CLI and logging for the journey tunnel runner.
///
/// Logging goes through `env_logger`, so the output is controlled with `RUST_LOG`.
pub fn init() -> JourneyTunnelScenarioCli {
    env_logger::init();

    JourneyTunnelScenarioCli::parse()
}
