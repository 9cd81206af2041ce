//! Binary entrypoint for the NotiKeys macOS app.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*};

/// Background runtime wiring (composition root).
mod runtime;

#[derive(Parser, Debug)]
#[command(
    name = "notikeys",
    about = "Respond to macOS notifications with keyboard shortcuts",
    version
)]
/// Command-line interface for the `notikeys` binary.
struct Cli {
    /// Logging controls.
    #[command(flatten)]
    logs: logging::LogArgs,
}

#[tokio::main]
async fn main() -> notikeys_engine::Result<()> {
    let cli = Cli::parse();
    let spec = logging::compute_spec(
        cli.logs.trace,
        cli.logs.debug,
        cli.logs.log_level.as_deref(),
        cli.logs.log_filter.as_deref(),
    );
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(logging::env_filter_from_spec(&spec))
        .init();

    runtime::run().await
}
