//! `api await`: block until a build's activated tasks have read through
//! everything their upstreams have published (C10).

use super::SelectionArgs;
use crate::clients::{BrokerArgs, ConsumerArgs};
use anyhow::Context;
use std::time::Duration;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(5 * 60);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, clap::Args)]
pub struct AwaitArgs {
    /// Build ID whose tasks to wait on.
    #[arg(long = "build-id")]
    pub build_id: String,
    #[command(flatten)]
    pub selection: SelectionArgs,
    #[arg(long = "consumer.debug-address", env = "CONSUMER_DEBUG_ADDRESS", default_value = "127.0.0.1:6060")]
    pub consumer_debug_address: String,

    #[command(flatten)]
    pub broker: BrokerArgs,
    #[command(flatten)]
    pub consumer: ConsumerArgs,
}

pub async fn run(args: AwaitArgs) -> anyhow::Result<()> {
    // Dataflow settling reads live shard progress only; the broker client
    // isn't used here, but is still validated up front so a misconfigured
    // endpoint fails before the (possibly lengthy) wait rather than after.
    let _journal_client = crate::clients::build_broker_client(&args.broker).await?;
    let shard_client = crate::clients::build_consumer_client(&args.consumer).await?;

    let selection = super::load_selection(
        &args.consumer_debug_address,
        &args.build_id,
        &args.selection,
    )
    .await?;

    let mut graph = dataflow::Graph::discover(&selection, &shard_client)
        .await
        .context("discovering dataflow graph")?;

    tokio::time::timeout(
        DEFAULT_DEADLINE,
        dataflow::wait_until_settled(&shard_client, &mut graph, POLL_INTERVAL),
    )
    .await
    .context("dataflow did not settle within its deadline")??;

    tracing::info!(build_id = %args.build_id, "dataflow settled");
    Ok(())
}
