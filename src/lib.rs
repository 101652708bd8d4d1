//! Stasis - hold a pose to start recording, hold another to stop.
//!
//! This is the main library crate. It provides the pose classifier, the
//! gesture-debounced recording lifecycle, capture and export, and the replay
//! harness behind the `stasis` binary.

pub mod capture;
pub mod export;
pub mod pose;
pub mod recorder;
pub mod replay;
pub mod settings;
pub mod utils;

use replay::{ReplayArgs, ReplayOutcome};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging and run the replay harness from the command line
pub fn run() {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stasis_lib=debug,stasis=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stasis v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_replay() {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_replay() -> anyhow::Result<()> {
    let args = ReplayArgs::parse(std::env::args().skip(1))?;
    let settings = replay::load_settings()?;
    let script = replay::load_script(&args.script)?;

    let runtime = tokio::runtime::Runtime::new()?;
    match runtime.block_on(replay::replay(&settings, script, &args.output_dir))? {
        ReplayOutcome::Exported(receipt) => {
            tracing::info!(
                "Saved {} ({} bytes, {})",
                receipt.path.display(),
                receipt.bytes,
                receipt.mime_type
            );
        }
        ReplayOutcome::NoRecording(state) => {
            tracing::warn!("Script ended without a recording (state {:?})", state);
        }
    }
    Ok(())
}
