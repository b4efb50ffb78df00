//! `api activate`: reconcile a build's collections and tasks against a live
//! data plane (C3 -> C5 -> C4 -> C6 -> C8 -> C7), per SPEC_FULL §5's 5
//! minute default deadline.

use super::SelectionArgs;
use crate::clients::{BrokerArgs, ConsumerArgs};
use crate::connector_driver::DockerDialer;
use anyhow::Context;
use std::time::Duration;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, clap::Args)]
pub struct ActivateArgs {
    /// Build ID to activate.
    #[arg(long = "build-id")]
    pub build_id: String,
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// Number of initial key-range splits for newly-created task shards.
    /// Must be a power of two.
    #[arg(long = "initial-splits", default_value_t = 1)]
    pub initial_splits: usize,
    /// Plan and log changes without applying them.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Skip waiting for shards to reach a healthy primary after committing.
    #[arg(long = "no-wait")]
    pub no_wait: bool,
    /// Container network joined by connector processes this run dials.
    #[arg(long, default_value = "flow-test")]
    pub network: String,
    /// Address of the consumer's debug introspection endpoint, used to
    /// discover the builds root (C1).
    #[arg(long = "consumer.debug-address", env = "CONSUMER_DEBUG_ADDRESS", default_value = "127.0.0.1:6060")]
    pub consumer_debug_address: String,

    #[command(flatten)]
    pub broker: BrokerArgs,
    #[command(flatten)]
    pub consumer: ConsumerArgs,
}

pub async fn run(args: ActivateArgs) -> anyhow::Result<()> {
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
            args.initial_splits,
            args.dry_run,
            args.no_wait,
        ),
    )
    .await
    .context("activation did not complete within its deadline")?;

    dialer.shutdown().await;
    let applied = outcome?;

    for outcome in &applied {
        println!("{}: {}", outcome.task_name, outcome.action_description);
    }
    tracing::info!(build_id = %args.build_id, applied = applied.len(), "activation complete");

    Ok(())
}
