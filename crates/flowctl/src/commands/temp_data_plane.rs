//! `temp-data-plane`: run the local ephemeral data-plane supervisor (C9)
//! until signaled. A first SIGINT/SIGTERM requests a graceful stop; a
//! second SIGINT while that stop is in flight escalates to a hard kill.

use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

const GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug, clap::Args)]
pub struct TempDataPlaneArgs {
    /// Keep the supervisor's working directory (including its builds root)
    /// at this path instead of an ephemeral temp directory, and leave it in
    /// place on exit.
    #[arg(long)]
    pub tempdir: Option<PathBuf>,
}

pub async fn run(args: TempDataPlaneArgs) -> anyhow::Result<()> {
    let binaries = dataplane::Binaries::locate().context("locating data-plane binaries")?;
    let workdir = match args.tempdir {
        Some(path) => dataplane::Workdir::persistent(path).context("preparing --tempdir")?,
        None => dataplane::Workdir::ephemeral().context("creating ephemeral working directory")?,
    };

    let mut plane = dataplane::DataPlane::start(
        &binaries,
        workdir,
        dataplane::Address::ephemeral_tcp()?,
        dataplane::Address::ephemeral_tcp()?,
    )
    .await
    .context("starting local data plane")?;

    // Machine-parseable, so scripts driving this command (e.g. the E2E
    // harness) can discover where to dial without scraping log lines.
    println!("BROKER_ADDRESS={}", plane.broker_address.endpoint_url());
    println!("CONSUMER_ADDRESS={}", plane.consumer_address.endpoint_url());
    println!("BUILDS_ROOT=file://{}", plane.builds_root().display());
    tracing::info!(
        broker = %plane.broker_address.endpoint_url(),
        consumer = %plane.consumer_address.endpoint_url(),
        "local data plane is ready",
    );

    wait_for_shutdown_signal().await;
    tracing::info!("stopping local data plane");

    let still_alive = tokio::select! {
        outcome = plane.stop_gracefully(GRACE_PERIOD) => outcome,
        _ = wait_for_second_sigint() => {
            tracing::warn!("second interrupt received, escalating to SIGKILL");
            Vec::new()
        }
    };
    if !still_alive.is_empty() {
        tracing::warn!(?still_alive, "graceful stop timed out, escalating to SIGKILL");
    }
    plane.kill().await;

    Ok(())
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("registering SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

async fn wait_for_second_sigint() {
    let _ = tokio::signal::ctrl_c().await;
}
