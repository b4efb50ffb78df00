//! `test`: end-to-end exercise of the activation path against a disposable
//! local data plane -- build, activate, wait for the dataflow to settle,
//! then delete -- all torn down on exit. Per-step document injection and
//! output verification (the `TestSpec` step semantics themselves) ride the
//! same activation path but are not reimplemented here; this orchestrator's
//! scope stops at proving the path, not at being a derivation test runner.

use crate::connector_driver::DockerDialer;
use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(60);
const GRACE_PERIOD: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, clap::Args)]
pub struct TestArgs {
    /// Path to the catalog source file to build and test.
    #[arg(long)]
    pub source: PathBuf,
    /// Container network joined by connector processes this run dials.
    #[arg(long, default_value = "flow-test")]
    pub network: String,
}

pub async fn run(args: TestArgs) -> anyhow::Result<()> {
    tokio::time::timeout(DEADLINE, run_inner(args)).await.context("test run did not complete within its deadline")?
}

async fn run_inner(args: TestArgs) -> anyhow::Result<()> {
    let binaries = dataplane::Binaries::locate().context("locating data-plane binaries")?;
    let workdir = dataplane::Workdir::ephemeral().context("creating ephemeral working directory")?;

    let mut plane = dataplane::DataPlane::start(
        &binaries,
        workdir,
        dataplane::Address::ephemeral_tcp()?,
        dataplane::Address::ephemeral_tcp()?,
    )
    .await
    .context("starting local data plane")?;

    let result = run_against_plane(&args, &plane).await;

    let still_alive = plane.stop_gracefully(GRACE_PERIOD).await;
    if !still_alive.is_empty() {
        tracing::warn!(?still_alive, "graceful stop timed out, escalating to SIGKILL");
    }
    plane.kill().await;

    result
}

async fn run_against_plane(args: &TestArgs, plane: &dataplane::DataPlane) -> anyhow::Result<()> {
    let build_id = uuid::Uuid::new_v4().simple().to_string();
    let build_dir = tempfile::tempdir().context("creating temp build directory")?;
    let build_db = build_dir.path().join(&build_id);

    super::build::run(super::build::BuildArgs {
        build_id: build_id.clone(),
        build_db: build_db.clone(),
        source: args.source.clone(),
    })
    .await
    .context("building catalog source")?;

    plane
        .move_build_into(&build_db)
        .await
        .context("installing build into the local plane's builds root")?;

    let broker_auth = gazette::Auth::new(None).context("building broker auth")?;
    let broker_router =
        gazette::journal::JournalRouter::new(&plane.broker_address.endpoint_url(), broker_auth, "", None)
            .context("building broker router")?;
    let journal_client = gazette::journal::Client::new(broker_router);

    let consumer_auth = gazette::Auth::new(None).context("building consumer auth")?;
    let consumer_router =
        gazette::shard::ShardRouter::new(&plane.consumer_address.endpoint_url(), consumer_auth, "", None)
            .context("building consumer router")?;
    let shard_client = gazette::shard::Client::new(consumer_router);

    let builds_root = format!("file://{}", plane.builds_root().display());
    let mut build = build_artifact::Build::open(&builds_root, &build_id)
        .with_context(|| format!("opening build {build_id}"))?;
    let selection = activate::selection::load(&mut build, &[], true, false)
        .context("loading selection")?;

    let dialer = DockerDialer::new(&selection.tasks);

    activate::activate(
        &journal_client,
        &shard_client,
        &dialer,
        &selection,
        &args.network,
        activate::OpsTemplates {
            logs: None,
            stats: None,
        },
        1,
        false,
        false,
    )
    .await
    .context("activating catalog under test")?;

    let mut graph = dataflow::Graph::discover(&selection, &shard_client)
        .await
        .context("discovering dataflow graph")?;
    dataflow::wait_until_settled(&shard_client, &mut graph, POLL_INTERVAL)
        .await
        .context("waiting for dataflow to settle")?;

    activate::delete(
        &journal_client,
        &shard_client,
        &dialer,
        &selection,
        &args.network,
        false,
    )
    .await
    .context("deleting catalog under test")?;

    dialer.shutdown().await;
    tracing::info!(build_id = %build_id, "test run passed");

    Ok(())
}
