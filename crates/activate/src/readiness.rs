//! Readiness Poller (C7): after a non-dry-run activation, waits for every
//! shard of a task to reach a stable, serving primary before returning
//! control to the caller.

use proto_gazette::{broker, consumer};
use std::time::Duration;

/// Poll the given task's shards until each has a primary member whose
/// self-reported replica status is `PRIMARY`. Breaks out of the inner
/// per-shard loop on the first shard found not-yet-ready and starts a
/// fresh attempt over the whole task, per the back-off schedule:
/// immediate, then 50ms x2, then 1s x2, then 5s thereafter.
pub async fn wait_until_ready(
    shard_client: &gazette::shard::Client,
    task_type: proto_flow::ops::TaskType,
    task_name: &str,
) -> anyhow::Result<()> {
    let list_req = consumer::ListRequest {
        selector: Some(broker::LabelSelector {
            include: Some(labels::build_set([
                (labels::TASK_TYPE, task_type.as_str_name()),
                (labels::TASK_NAME, task_name),
            ])),
            exclude: None,
        }),
        ..Default::default()
    };

    let mut attempt: usize = 0;
    loop {
        tokio::time::sleep(backoff(attempt)).await;
        attempt += 1;

        let listing = shard_client.list(list_req.clone()).await?;

        let mut all_ready = !listing.shards.is_empty();
        for shard in &listing.shards {
            if !shard_is_ready(shard) {
                all_ready = false;
                break;
            }
        }
        if all_ready {
            return Ok(());
        }
    }
}

fn shard_is_ready(shard: &consumer::list_response::Shard) -> bool {
    let Some(route) = &shard.route else {
        return false;
    };
    if route.primary < 0 {
        return false;
    }
    let Some(status) = shard.status.get(route.primary as usize) else {
        return false;
    };
    // A numeric `>=` comparison would also admit `FAILED`, which sorts
    // above `PRIMARY` in this enum. A failed primary is never ready.
    status.code() == consumer::replica_status::Code::Primary
}

fn backoff(attempt: usize) -> Duration {
    match attempt {
        0 => Duration::ZERO,
        1 | 2 => Duration::from_millis(50),
        3 | 4 => Duration::from_secs(1),
        _ => Duration::from_secs(5),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proto_gazette::broker::Route;
    use proto_gazette::consumer::{replica_status::Code, ReplicaStatus};

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff(0), Duration::ZERO);
        assert_eq!(backoff(1), Duration::from_millis(50));
        assert_eq!(backoff(2), Duration::from_millis(50));
        assert_eq!(backoff(3), Duration::from_secs(1));
        assert_eq!(backoff(4), Duration::from_secs(1));
        assert_eq!(backoff(5), Duration::from_secs(5));
        assert_eq!(backoff(50), Duration::from_secs(5));
    }

    fn shard_with(primary: i32, codes: Vec<Code>) -> consumer::list_response::Shard {
        consumer::list_response::Shard {
            spec: None,
            mod_revision: 1,
            route: Some(Route {
                members: Vec::new(),
                primary,
                endpoints: Vec::new(),
            }),
            status: codes
                .into_iter()
                .map(|code| ReplicaStatus {
                    code: code as i32,
                    errors: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_shard_is_ready_requires_assigned_primary() {
        let shard = shard_with(-1, vec![Code::Backfill]);
        assert!(!shard_is_ready(&shard));
    }

    #[test]
    fn test_shard_is_ready_requires_primary_status_exactly() {
        let backfilling = shard_with(0, vec![Code::Backfill]);
        assert!(!shard_is_ready(&backfilling));

        let primary = shard_with(0, vec![Code::Primary]);
        assert!(shard_is_ready(&primary));
    }

    #[test]
    fn test_shard_is_ready_rejects_failed_primary() {
        // FAILED sorts above PRIMARY in the enum's wire ordering; a naive
        // `>=` comparison would wrongly call this ready.
        let failed = shard_with(0, vec![Code::Failed]);
        assert!(!shard_is_ready(&failed));
    }

    #[test]
    fn test_shard_is_ready_missing_route() {
        let shard = consumer::list_response::Shard {
            spec: None,
            mod_revision: 1,
            route: None,
            status: Vec::new(),
        };
        assert!(!shard_is_ready(&shard));
    }
}
