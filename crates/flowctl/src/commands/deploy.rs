//! `deploy`: build a catalog source and activate it against an already-
//! running data plane (e.g. one started by `temp-data-plane`), optionally
//! waiting for the dataflow to settle and tearing the deployment back down
//! once it has.

use crate::clients::{BrokerArgs, ConsumerArgs};
use crate::commands::{build::BuildArgs, SelectionArgs};
use crate::connector_driver::DockerDialer;
use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(5 * 60);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, clap::Args)]
pub struct DeployArgs {
    /// Path to the catalog source file to build and deploy.
    #[arg(long)]
    pub source: PathBuf,
    /// Build ID to assign; a fresh one is generated when omitted.
    #[arg(long = "build-id")]
    pub build_id: Option<String>,
    /// Destination path for the built SQLite artifact; a temp file is used
    /// when omitted.
    #[arg(long = "build-db")]
    pub build_db: Option<PathBuf>,
    /// Container network joined by connector processes this run dials.
    #[arg(long, default_value = "flow-test")]
    pub network: String,
    #[arg(long = "consumer.debug-address", env = "CONSUMER_DEBUG_ADDRESS", default_value = "127.0.0.1:6060")]
    pub consumer_debug_address: String,
    /// Wait for the deployed dataflow to settle before returning.
    #[arg(long)]
    pub wait: bool,
    /// After waiting (implies `--wait`), delete everything this run
    /// activated.
    #[arg(long)]
    pub cleanup: bool,

    #[command(flatten)]
    pub broker: BrokerArgs,
    #[command(flatten)]
    pub consumer: ConsumerArgs,
}

pub async fn run(args: DeployArgs) -> anyhow::Result<()> {
    let build_id = args
        .build_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    let build_dir = tempfile::tempdir().context("creating temp build directory")?;
    let build_db = args
        .build_db
        .unwrap_or_else(|| build_dir.path().join(&build_id));

    super::build::run(BuildArgs {
        build_id: build_id.clone(),
        build_db,
        source: args.source,
    })
    .await
    .context("building catalog source")?;

    let journal_client = crate::clients::build_broker_client(&args.broker).await?;
    let shard_client = crate::clients::build_consumer_client(&args.consumer).await?;

    let selection = super::load_selection(
        &args.consumer_debug_address,
        &build_id,
        &SelectionArgs {
            all: true,
            all_derivations: false,
            names: Vec::new(),
        },
    )
    .await?;

    let dialer = DockerDialer::new(&selection.tasks);

    tokio::time::timeout(
        DEFAULT_DEADLINE,
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
        ),
    )
    .await
    .context("activation did not complete within its deadline")??;

    if args.wait || args.cleanup {
        let mut graph = dataflow::Graph::discover(&selection, &shard_client)
            .await
            .context("discovering dataflow graph")?;
        tokio::time::timeout(
            DEFAULT_DEADLINE,
            dataflow::wait_until_settled(&shard_client, &mut graph, POLL_INTERVAL),
        )
        .await
        .context("dataflow did not settle within its deadline")??;
        tracing::info!(build_id = %build_id, "deployed dataflow settled");
    }

    if args.cleanup {
        tokio::time::timeout(
            DEFAULT_DEADLINE,
            activate::delete(
                &journal_client,
                &shard_client,
                &dialer,
                &selection,
                &args.network,
                false,
            ),
        )
        .await
        .context("cleanup deletion did not complete within its deadline")??;
        tracing::info!(build_id = %build_id, "deployment cleaned up");
    }

    dialer.shutdown().await;
    tracing::info!(build_id = %build_id, "deployment complete");
    Ok(())
}
