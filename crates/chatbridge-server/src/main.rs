use anyhow::Result;
use chatbridge::BridgeConfig;
use chatbridge_server::logging::init_logging;
use chatbridge_server::modes;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Bridges a desktop chat client to a backend service through the accessibility tree"
)]
struct Args {
    /// YAML configuration file; missing means defaults
    #[arg(short, long, default_value = "config.yaml", env = "CHATBRIDGE_CONFIG")]
    config: PathBuf,

    /// Resolve the main window, count unread sessions and exit
    #[arg(long, conflicts_with_all = ["inspect", "self_test"])]
    dry_run: bool,

    /// Log the main window's full control tree and exit
    #[arg(long, conflicts_with = "self_test")]
    inspect: bool,

    /// Serve the HTTP endpoints for a few seconds and exit
    #[arg(long)]
    self_test: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = BridgeConfig::load(&args.config)?;
    let _log_guard = init_logging(&config.logging)?;
    info!("configuration loaded from {}", args.config.display());

    let code = if args.dry_run {
        modes::dry_run(&config)?
    } else if args.inspect {
        modes::inspect_run(&config)?
    } else if args.self_test {
        modes::self_test(&config).await?
    } else {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("cannot listen for Ctrl-C: {}", e);
                return;
            }
            info!("received shutdown signal, stopping...");
            on_signal.cancel();
        });
        modes::run_bridge(config, cancel).await?
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
