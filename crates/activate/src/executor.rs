//! Three-Phase Executor (C6) and Failed-Shard Unassigner (C8): commits a
//! Change Planner's output against the data plane in the ordering the
//! core's correctness depends on -- journal upserts, then shard changes,
//! then journal deletes -- and unassigns any shard left in a failed state
//! immediately after.

use crate::planner::Change;
use anyhow::Context;
use proto_gazette::{broker, consumer};

/// The metadata store's maximum entries per transaction. Each phase is
/// chunked into batches no larger than this and applied sequentially.
const TRANSACTION_SIZE: usize = 127;

/// Commit `changes` to the data plane across the three mandated phases. When
/// `dry_run` is set, no RPCs are issued; the changes that would have been
/// committed are logged at info level in phase order instead.
pub async fn apply_changes(
    journal_client: &gazette::journal::Client,
    shard_client: &gazette::shard::Client,
    changes: impl IntoIterator<Item = Change>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut journal_deletes = Vec::new();
    let mut journal_upserts = Vec::new();
    let mut shard_deletes = Vec::new();
    let mut shard_upserts = Vec::new();

    for change in changes {
        match change {
            Change::Journal(change @ broker::apply_request::Change { upsert: None, .. }) => {
                journal_deletes.push(change)
            }
            Change::Shard(change @ consumer::apply_request::Change { upsert: None, .. }) => {
                shard_deletes.push(change)
            }
            Change::Journal(change) => journal_upserts.push(change),
            Change::Shard(change) => shard_upserts.push(change),
        }
    }

    if journal_upserts.is_empty()
        && journal_deletes.is_empty()
        && shard_upserts.is_empty()
        && shard_deletes.is_empty()
    {
        tracing::info!("no changes to apply");
        return Ok(());
    }

    // Any shard being upsert-ed may currently be assigned to a primary
    // that's in a failed state. We'll unassign it after its spec lands so
    // the consumer runtime re-places it from a clean starting point.
    let mut unassign_ids: Vec<_> = shard_upserts
        .iter()
        .map(|c| c.upsert.as_ref().unwrap().id.clone())
        .collect();

    if dry_run {
        for change in &journal_upserts {
            tracing::info!(journal = %change.upsert.as_ref().unwrap().name, "would upsert journal");
        }
        for change in &shard_upserts {
            tracing::info!(shard = %change.upsert.as_ref().unwrap().id, "would upsert shard");
        }
        for change in &shard_deletes {
            tracing::info!(shard = %change.delete, "would delete shard");
        }
        for change in &journal_deletes {
            tracing::info!(journal = %change.delete, "would delete journal");
        }
        return Ok(());
    }

    // Phase 1: journal upserts. New recovery logs and partitions must exist
    // before any shard that depends on them is touched.
    while !journal_upserts.is_empty() {
        let bound = TRANSACTION_SIZE.max(journal_upserts.len()) - TRANSACTION_SIZE;

        journal_client
            .apply(broker::ApplyRequest {
                changes: journal_upserts.split_off(bound),
            })
            .await
            .context("activating JournalSpec upserts")?;
    }
    std::mem::drop(journal_upserts);

    // Phase 2: shard inserts, updates, and deletes, in either order.
    while !shard_upserts.is_empty() {
        let bound = TRANSACTION_SIZE.max(shard_upserts.len()) - TRANSACTION_SIZE;

        shard_client
            .apply(consumer::ApplyRequest {
                changes: shard_upserts.split_off(bound),
                ..Default::default()
            })
            .await
            .context("activating ShardSpec upserts")?;
    }
    std::mem::drop(shard_upserts);

    while !shard_deletes.is_empty() {
        let bound = TRANSACTION_SIZE.max(shard_deletes.len()) - TRANSACTION_SIZE;

        shard_client
            .apply(consumer::ApplyRequest {
                changes: shard_deletes.split_off(bound),
                ..Default::default()
            })
            .await
            .context("activating ShardSpec deletions")?;
    }
    std::mem::drop(shard_deletes);

    // Phase 3: journal deletes, once their referencing shards are gone.
    while !journal_deletes.is_empty() {
        let bound = TRANSACTION_SIZE.max(journal_deletes.len()) - TRANSACTION_SIZE;

        journal_client
            .apply(broker::ApplyRequest {
                changes: journal_deletes.split_off(bound),
            })
            .await
            .context("activating JournalSpec deletions")?;
    }
    std::mem::drop(journal_deletes);

    // C8: unassign any upserted shard that's currently stuck in a failed state.
    while !unassign_ids.is_empty() {
        let bound = TRANSACTION_SIZE.max(unassign_ids.len()) - TRANSACTION_SIZE;

        shard_client
            .unassign(consumer::UnassignRequest {
                shards: unassign_ids.split_off(bound),
                only_failed: true,
                dry_run: false,
            })
            .await
            .context("unassigning activated, previously failed shards")?;
    }
    std::mem::drop(unassign_ids);

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_transaction_size_matches_metadata_store_limit() {
        assert_eq!(TRANSACTION_SIZE, 127);
    }

    #[test]
    fn test_batch_bound_drains_small_vectors_in_one_shot() {
        let mut v: Vec<i32> = (0..50).collect();
        let bound = TRANSACTION_SIZE.max(v.len()) - TRANSACTION_SIZE;
        assert_eq!(bound, 0);
        let batch = v.split_off(bound);
        assert_eq!(batch.len(), 50);
        assert!(v.is_empty());
    }

    #[test]
    fn test_batch_bound_chunks_large_vectors() {
        let mut v: Vec<i32> = (0..300).collect();
        let mut batches = Vec::new();
        while !v.is_empty() {
            let bound = TRANSACTION_SIZE.max(v.len()) - TRANSACTION_SIZE;
            batches.push(v.split_off(bound).len());
        }
        assert_eq!(batches, vec![127, 127, 46]);
    }
}
