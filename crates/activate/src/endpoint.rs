//! Endpoint Applier (C5): drives the connector `Apply` RPC for each capture
//! and materialization in a selection. Connector process transport (dialing
//! the container that backs a task) is an opaque Connector Driver outside
//! this crate's scope; callers supply an already-connected [`connector::Client`]
//! per task.

use crate::selection::Task;
use anyhow::Context;
use connector::Client;
use proto_flow::{connector as wire, flow};

/// The outcome of a single task's Apply call.
pub struct Applied {
    pub task_name: String,
    pub action_description: String,
}

/// Dials the connector container backing a capture or materialization task.
/// Implemented by the caller, since container transport is an opaque
/// Connector Driver outside this crate's scope.
#[async_trait::async_trait]
pub trait ConnectorDialer {
    async fn dial(&self, task_name: &str, network: &str) -> anyhow::Result<Client>;
}

/// Drive Apply for every capture and materialization task in `tasks`, one at
/// a time, skipping derivations and disabled tasks. `network` is the
/// caller-specified container network new connector processes are joined to.
pub async fn apply_selection(
    dialer: &impl ConnectorDialer,
    tasks: &[Task],
    network: &str,
    dry_run: bool,
    retract: bool,
) -> anyhow::Result<Vec<Applied>> {
    let mut applied = Vec::new();

    for task in tasks {
        if matches!(task, Task::Derivation { .. }) {
            continue;
        }
        let Some(shard_template) = task.shard_template() else {
            continue;
        };
        if shard_template.disable {
            tracing::info!(task = task.name(), "task is disabled, skipping Apply");
            continue;
        }

        let mut client = dialer
            .dial(task.name(), network)
            .await
            .with_context(|| format!("dialing connector for {}", task.name()))?;

        if let Some(outcome) = apply_task(&mut client, task, dry_run, retract).await? {
            tracing::info!(
                task = %outcome.task_name,
                action = %outcome.action_description,
                "applied connector endpoint",
            );
            applied.push(outcome);
        }
    }

    Ok(applied)
}

enum Spec<'a> {
    Capture(&'a flow::CaptureSpec),
    Materialization(&'a flow::MaterializationSpec),
}

/// Drive Apply for a single capture or materialization task. Returns `None`
/// without calling the connector if the task's shard template is disabled.
/// `retract` forces an empty-bindings request, per the deletion contract.
pub async fn apply_task(
    client: &mut Client,
    task: &Task,
    dry_run: bool,
    retract: bool,
) -> anyhow::Result<Option<Applied>> {
    let spec = match task {
        Task::Capture { spec, .. } => Spec::Capture(spec),
        Task::Materialization { spec, .. } => Spec::Materialization(spec),
        Task::Derivation { .. } => return Ok(None),
    };

    let shard_template = task
        .shard_template()
        .with_context(|| format!("task {} is missing its shard template", task.name()))?;

    if shard_template.disable {
        tracing::info!(task = task.name(), "task is disabled, skipping Apply");
        return Ok(None);
    }

    let version = shard_template
        .labels
        .as_ref()
        .map(|set| labels::values(set, labels::BUILD))
        .and_then(|values| values.first())
        .map(|label| label.value.clone())
        .unwrap_or_default();

    let mut req = wire::ApplyRequest {
        version,
        dry_run,
        ..Default::default()
    };

    match spec {
        Spec::Capture(spec) => {
            let mut spec = spec.clone();
            if retract {
                spec.bindings.clear();
            }
            req.capture = Some(spec);
        }
        Spec::Materialization(spec) => {
            let mut spec = spec.clone();
            if retract {
                spec.bindings.clear();
            }
            req.materialization = Some(spec);
        }
    }

    let resp = client
        .apply(req)
        .await
        .with_context(|| format!("applying connector endpoint for {}", task.name()))?;

    Ok(Some(Applied {
        task_name: task.name().to_string(),
        action_description: resp.action_description,
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use proto_flow::flow;
    use proto_gazette::consumer::ShardSpec;

    fn capture_task(disable: bool, build: &str) -> Task {
        Task::Capture {
            name: "acme/capture".to_string(),
            spec: flow::CaptureSpec {
                name: "acme/capture".to_string(),
                connector_type: "IMAGE".to_string(),
                config_json: "{}".to_string(),
                bindings: vec![flow::capture_spec::Binding {
                    resource_config_json: "{}".to_string(),
                    resource_path: vec!["a".to_string()],
                    collection: None,
                    backfill: false,
                    state_key: None,
                }],
                shard_template: Some(ShardSpec {
                    id: "capture/acme/capture/0000".to_string(),
                    disable,
                    labels: Some(labels::build_set([(labels::BUILD, build)])),
                    ..Default::default()
                }),
                recovery_log_template: None,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_disabled_task_has_no_connector_call_path() {
        let task = capture_task(true, "1111");
        let shard_template = task.shard_template().unwrap();
        assert!(shard_template.disable);
    }

    #[test]
    fn test_version_label_extraction() {
        let task = capture_task(false, "deadbeef");
        let shard_template = task.shard_template().unwrap();
        let version = shard_template
            .labels
            .as_ref()
            .map(|set| labels::values(set, labels::BUILD))
            .and_then(|values| values.first())
            .map(|label| label.value.clone())
            .unwrap_or_default();
        assert_eq!(version, "deadbeef");
    }

    #[test]
    fn test_retract_clears_bindings() {
        let task = capture_task(false, "1111");
        if let Task::Capture { spec, .. } = &task {
            let mut retracted = spec.clone();
            retracted.bindings.clear();
            assert!(retracted.bindings.is_empty());
            assert_eq!(spec.bindings.len(), 1);
        } else {
            panic!("expected a capture task");
        }
    }
}
