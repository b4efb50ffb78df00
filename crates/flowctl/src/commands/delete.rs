//! `api delete`: retract a build's collections and tasks from a live data
//! plane (C3 -> C4 -> C6 -> C5, deletions committed before retraction).

use super::SelectionArgs;
use crate::clients::{BrokerArgs, ConsumerArgs};
use crate::connector_driver::DockerDialer;
use anyhow::Context;
use std::time::Duration;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, clap::Args)]
pub struct DeleteArgs {
    /// Build ID to delete by.
    #[arg(long = "build-id")]
    pub build_id: String,
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// Plan and log changes without applying them.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Container network joined by connector processes this run dials.
    #[arg(long, default_value = "flow-test")]
    pub network: String,
    #[arg(long = "consumer.debug-address", env = "CONSUMER_DEBUG_ADDRESS", default_value = "127.0.0.1:6060")]
    pub consumer_debug_address: String,

    #[command(flatten)]
    pub broker: BrokerArgs,
    #[command(flatten)]
    pub consumer: ConsumerArgs,
}

pub async fn run(args: DeleteArgs) -> anyhow::Result<()> {
    let journal_client = crate::clients::build_broker_client(&args.broker).await?;
    let shard_client = crate::clients::build_consumer_client(&args.consumer).await?;

    let selection = super::load_selection(
        &args.consumer_debug_address,
        &args.build_id,
        &args.selection,
    )
    .await?;

    let dialer = DockerDialer::new(&selection.tasks);

    let outcome = tokio::time::timeout(
        DEFAULT_DEADLINE,
        activate::delete(
            &journal_client,
            &shard_client,
            &dialer,
            &selection,
            &args.network,
            args.dry_run,
        ),
    )
    .await
    .context("deletion did not complete within its deadline")?;

    dialer.shutdown().await;
    let retracted = outcome?;

    for outcome in &retracted {
        println!("{}: {}", outcome.task_name, outcome.action_description);
    }
    tracing::info!(build_id = %args.build_id, retracted = retracted.len(), "deletion complete");

    Ok(())
}
