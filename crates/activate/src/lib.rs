//! The activation/deactivation orchestrator: reconciles a built catalog's
//! collections, captures, derivations, and materializations against a live
//! data plane (the journal broker and the consumer shard runtime).
//!
//! Control flow for activation: [`endpoint`] pre-applies captures and
//! materializations, [`planner`] computes the desired journal and shard
//! changes, [`executor`] commits them in three phases and unassigns any
//! shard left in a failed state, and [`readiness`] waits for every shard to
//! reach a healthy primary. Deletion runs the same pipeline in reverse:
//! [`executor`] commits deletions first, then [`endpoint`] retracts
//! captures and materializations with empty bindings.

pub mod endpoint;
pub mod executor;
pub mod planner;
pub mod readiness;
pub mod selection;

use proto_gazette::broker;
use selection::{Selection, Task};

/// Templates shared by every task and collection in a build, used to seed
/// the ops (logs/stats) partitions that every active task writes into.
pub struct OpsTemplates<'a> {
    pub logs: Option<&'a broker::JournalSpec>,
    pub stats: Option<&'a broker::JournalSpec>,
}

/// Activate every collection and task in `selection` against the data
/// plane: C5 pre-applies endpoints, C4 plans changes, C6 commits them and
/// C8 unassigns failed shards, and C7 waits for readiness unless `no_wait`.
pub async fn activate(
    journal_client: &gazette::journal::Client,
    shard_client: &gazette::shard::Client,
    dialer: &impl endpoint::ConnectorDialer,
    selection: &Selection,
    connector_network: &str,
    ops: OpsTemplates<'_>,
    initial_splits: usize,
    dry_run: bool,
    no_wait: bool,
) -> anyhow::Result<Vec<endpoint::Applied>> {
    // C5: the external endpoint must exist before shards begin writing to it.
    let applied =
        endpoint::apply_selection(dialer, &selection.tasks, connector_network, dry_run, false)
            .await?;

    // C4: plan every collection's partitions, and every task's shards.
    let mut changes = Vec::new();

    for (name, spec) in &selection.collections {
        let (partition_template, task_template) = planner::collection_template(Some(spec))?;

        let partitions = planner::fetch_partition_splits(journal_client, name).await?;
        changes.extend(planner::partition_changes(partition_template, partitions)?);

        if task_template.is_some() {
            let (shards, recovery, ops_logs, ops_stats) = planner::fetch_task_splits(
                journal_client,
                shard_client,
                proto_flow::ops::TaskType::Derivation,
                name,
                ops.logs,
                ops.stats,
            )
            .await?;
            let shards = planner::apply_initial_splits(task_template, initial_splits, shards)?;
            changes.extend(planner::task_changes(
                task_template,
                shards,
                recovery,
                ops_logs,
                ops_stats,
            )?);
        }
    }

    for task in &selection.tasks {
        let task_template = match task {
            Task::Capture { spec, .. } => planner::capture_template(Some(spec))?,
            Task::Materialization { spec, .. } => planner::materialization_template(Some(spec))?,
            Task::Derivation { .. } => continue, // Already planned via `collections` above.
        };

        let (shards, recovery, ops_logs, ops_stats) = planner::fetch_task_splits(
            journal_client,
            shard_client,
            task.task_type(),
            task.name(),
            ops.logs,
            ops.stats,
        )
        .await?;
        let shards = planner::apply_initial_splits(task_template, initial_splits, shards)?;
        changes.extend(planner::task_changes(
            task_template,
            shards,
            recovery,
            ops_logs,
            ops_stats,
        )?);
    }

    // C6 + C8: commit journal upserts, shard changes, journal deletes, then
    // unassign any upserted shard currently stuck in a failed state.
    executor::apply_changes(journal_client, shard_client, changes, dry_run).await?;

    // C7: wait for every enabled task's shards to reach a healthy primary.
    if !dry_run && !no_wait {
        for task in &selection.tasks {
            let Some(shard_template) = task.shard_template() else {
                continue;
            };
            if shard_template.disable {
                continue;
            }
            readiness::wait_until_ready(shard_client, task.task_type(), task.name()).await?;
        }
    }

    Ok(applied)
}

/// Delete every collection and task in `selection` from the data plane: C6
/// commits the deletions first, then C5 retracts captures and
/// materializations with empty bindings.
pub async fn delete(
    journal_client: &gazette::journal::Client,
    shard_client: &gazette::shard::Client,
    dialer: &impl endpoint::ConnectorDialer,
    selection: &Selection,
    connector_network: &str,
    dry_run: bool,
) -> anyhow::Result<Vec<endpoint::Applied>> {
    let mut changes = Vec::new();

    for (name, _spec) in &selection.collections {
        let partitions = planner::fetch_partition_splits(journal_client, name).await?;
        changes.extend(planner::partition_changes(None, partitions)?);
    }

    for task in &selection.tasks {
        let (shards, recovery, ops_logs, ops_stats) = planner::fetch_task_splits(
            journal_client,
            shard_client,
            task.task_type(),
            task.name(),
            None,
            None,
        )
        .await?;
        changes.extend(planner::task_changes(
            None,
            shards,
            recovery,
            ops_logs,
            ops_stats,
        )?);
    }

    executor::apply_changes(journal_client, shard_client, changes, dry_run).await?;

    let applied =
        endpoint::apply_selection(dialer, &selection.tasks, connector_network, dry_run, true)
            .await?;

    Ok(applied)
}
