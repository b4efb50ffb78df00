//! Dataflow-Settled Waiter (C10): watches capture -> derivation ->
//! materialization progress through the consumer's `Stat` RPC until every
//! task has read through the latest offsets its upstreams have published.
//! Used by `api await` and by test execution, which additionally injects
//! documents and verifies outputs at specified steps using this same graph.
//!
//! This component never mutates anything; it only reads shard progress
//! until quiescence, and carries no timeout of its own -- the caller
//! supplies a deadline (typically via `tokio::time::timeout`).

use activate::selection::{Selection, Task};
use anyhow::Context;
use proto_flow::ops::TaskType;
use proto_gazette::{broker, consumer};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task {0} has no running shards to stat")]
    NoShards(String),
}

/// One running shard of a capture, derivation, or materialization task.
/// Splits of the same task each get their own node, since each is polled
/// independently.
#[derive(Clone, Debug)]
pub struct Node {
    pub task_name: String,
    pub task_type: TaskType,
    pub shard_id: String,
    /// Collection names this shard reads from. A capture's sole upstream
    /// is the synthetic `{taskName}/eof` pseudo-journal, tracked directly
    /// in its initial pending offsets rather than as a `reads` entry.
    pub reads: Vec<String>,
    /// Collection name this shard writes into, if any. Materializations
    /// write nothing and so are never a propagation source.
    pub writes: Option<String>,
}

/// The dataflow graph over one build's running tasks: nodes are shards,
/// edges encode "this shard reads from that collection". Propagation is
/// pass-based rather than topological, so cycles (a derivation reading its
/// own output, or a collection materialized back into one of its own
/// sources) simply pick up new pending offsets in a later pass instead of
/// needing a sort.
pub struct Graph {
    nodes: Vec<Node>,
    /// Index from a written collection name to the node indices that read it.
    consumers: HashMap<String, Vec<usize>>,
    /// Per-node journal offsets it must read through before it's caught up,
    /// keyed by upstream journal name. Cleared once satisfied.
    pending: Vec<HashMap<String, i64>>,
}

impl Graph {
    /// Assemble a graph from an already-loaded [`Selection`], resolving
    /// each task's live shard ids (and splits) through a `List` against the
    /// consumer.
    pub async fn discover(
        selection: &Selection,
        shard_client: &gazette::shard::Client,
    ) -> anyhow::Result<Self> {
        let collection_readers = build_collection_readers(selection);

        let mut nodes = Vec::new();
        for task in &selection.tasks {
            let reads = collection_readers
                .get(task.name())
                .cloned()
                .unwrap_or_default();
            let writes = match task {
                Task::Capture { spec, .. } => spec
                    .bindings
                    .iter()
                    .find_map(|b| b.collection.as_ref())
                    .map(|c| c.name.clone()),
                Task::Derivation { name, .. } => Some(name.clone()),
                Task::Materialization { .. } => None,
            };

            let shards = list_shards(shard_client, task.task_type(), task.name()).await?;
            if shards.is_empty() {
                return Err(Error::NoShards(task.name().to_string()).into());
            }
            for shard in shards {
                let Some(shard_id) = shard.spec.map(|spec| spec.id) else {
                    continue;
                };
                nodes.push(Node {
                    task_name: task.name().to_string(),
                    task_type: task.task_type(),
                    shard_id,
                    reads: reads.clone(),
                    writes: writes.clone(),
                });
            }
        }

        Ok(Self::build(nodes))
    }

    /// Build a graph over an already-resolved node set. Exposed directly so
    /// tests (and callers with their own shard discovery) can construct a
    /// graph without a live consumer.
    pub fn build(nodes: Vec<Node>) -> Self {
        let mut consumers: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            for read in &node.reads {
                consumers.entry(read.clone()).or_default().push(index);
            }
        }

        let mut pending = vec![HashMap::new(); nodes.len()];
        for (index, node) in nodes.iter().enumerate() {
            if node.task_type == TaskType::Capture {
                pending[index].insert(format!("{}/eof", node.task_name), 1);
            }
        }

        Self {
            nodes,
            consumers,
            pending,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.pending.iter().all(|p| p.is_empty())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

/// Map each task name to the collection names it reads from: a
/// derivation's transform sources, or a materialization binding's source
/// collection. Captures have no entry here; their sole upstream is the
/// synthetic eof pseudo-journal seeded in [`Graph::build`].
fn build_collection_readers(selection: &Selection) -> HashMap<String, Vec<String>> {
    let mut readers: HashMap<String, Vec<String>> = HashMap::new();

    for (_, spec) in &selection.collections {
        let Some(derivation) = &spec.derivation else {
            continue;
        };
        let sources = readers.entry(spec.name.clone()).or_default();
        for transform in &derivation.transforms {
            if let Some(collection) = &transform.collection {
                sources.push(collection.name.clone());
            }
        }
    }

    for task in &selection.tasks {
        if let Task::Materialization { name, spec } = task {
            let sources = readers.entry(name.clone()).or_default();
            for binding in &spec.bindings {
                if let Some(collection) = &binding.collection {
                    sources.push(collection.name.clone());
                }
            }
        }
    }

    readers
}

async fn list_shards(
    shard_client: &gazette::shard::Client,
    task_type: TaskType,
    task_name: &str,
) -> gazette::Result<Vec<consumer::list_response::Shard>> {
    let listing = shard_client
        .list(consumer::ListRequest {
            selector: Some(broker::LabelSelector {
                include: Some(labels::build_set([
                    (labels::TASK_TYPE, task_type.as_str_name()),
                    (labels::TASK_NAME, task_name),
                ])),
                exclude: None,
            }),
        })
        .await?;
    Ok(listing.shards)
}

/// Poll every node with a pending stat, one pass at a time, sleeping
/// `poll_interval` between passes, until the graph is settled.
pub async fn wait_until_settled(
    shard_client: &gazette::shard::Client,
    graph: &mut Graph,
    poll_interval: Duration,
) -> anyhow::Result<()> {
    while !graph.is_settled() {
        let mut newly_published = Vec::new();

        for index in 0..graph.nodes.len() {
            if graph.pending[index].is_empty() {
                continue;
            }
            let node = &graph.nodes[index];

            let resp = shard_client
                .stat(consumer::StatRequest {
                    shard: node.shard_id.clone(),
                    read_through: graph.pending[index].clone(),
                })
                .await
                .with_context(|| format!("stat'ing shard {}", node.shard_id))?;

            let caught_up = graph.pending[index].iter().all(|(journal, offset)| {
                resp.read_through.get(journal).copied().unwrap_or(0) >= *offset
            });

            if caught_up {
                graph.pending[index].clear();
                if let Some(collection) = &node.writes {
                    newly_published.push((collection.clone(), resp.publish_at.clone()));
                }
            }
        }

        propagate(graph, newly_published);

        if !graph.is_settled() {
            tokio::time::sleep(poll_interval).await;
        }
    }

    Ok(())
}

/// Record each newly-settled node's published offsets as pending reads on
/// every node consuming its collection, raising (never lowering) an
/// already-pending offset.
fn propagate(graph: &mut Graph, newly_published: Vec<(String, HashMap<String, i64>)>) {
    for (collection, publish_at) in newly_published {
        let Some(consumer_indices) = graph.consumers.get(&collection).cloned() else {
            continue;
        };
        for consumer_index in consumer_indices {
            let entry = &mut graph.pending[consumer_index];
            for (journal, offset) in &publish_at {
                if !journal.starts_with(collection.as_str()) {
                    continue; // Not a partition of this written collection.
                }
                let slot = entry.entry(journal.clone()).or_insert(0);
                if *offset > *slot {
                    *slot = *offset;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn node(name: &str, task_type: TaskType, shard_id: &str, reads: &[&str], writes: Option<&str>) -> Node {
        Node {
            task_name: name.to_string(),
            task_type,
            shard_id: shard_id.to_string(),
            reads: reads.iter().map(|s| s.to_string()).collect(),
            writes: writes.map(String::from),
        }
    }

    #[test]
    fn test_capture_seeds_pending_eof() {
        let graph = Graph::build(vec![node(
            "acme/capture",
            TaskType::Capture,
            "capture/acme/capture/0000",
            &[],
            Some("acme/collection"),
        )]);
        assert!(!graph.is_settled());
        assert_eq!(
            graph.pending[0].get("acme/capture/eof"),
            Some(&1),
        );
    }

    #[test]
    fn test_derivation_and_materialization_start_with_no_pending() {
        let graph = Graph::build(vec![
            node(
                "acme/derived",
                TaskType::Derivation,
                "derivation/acme/derived/0000",
                &["acme/collection"],
                Some("acme/derived"),
            ),
            node(
                "acme/materialize",
                TaskType::Materialization,
                "materialize/acme/materialize/0000",
                &["acme/derived"],
                None,
            ),
        ]);
        assert!(graph.is_settled());
    }

    #[test]
    fn test_propagate_raises_downstream_pending_from_publish_at() {
        let mut graph = Graph::build(vec![
            node(
                "acme/capture",
                TaskType::Capture,
                "capture/acme/capture/0000",
                &[],
                Some("acme/collection"),
            ),
            node(
                "acme/derived",
                TaskType::Derivation,
                "derivation/acme/derived/0000",
                &["acme/collection"],
                Some("acme/derived"),
            ),
        ]);

        let mut publish_at = HashMap::new();
        publish_at.insert("acme/collection/pivot=00".to_string(), 42);
        publish_at.insert("unrelated/collection/pivot=00".to_string(), 7);

        propagate(&mut graph, vec![("acme/collection".to_string(), publish_at)]);

        assert_eq!(
            graph.pending[1].get("acme/collection/pivot=00"),
            Some(&42),
        );
        assert_eq!(graph.pending[1].len(), 1);
    }

    #[test]
    fn test_propagate_never_lowers_an_existing_pending_offset() {
        let mut graph = Graph::build(vec![
            node(
                "acme/capture",
                TaskType::Capture,
                "capture/acme/capture/0000",
                &[],
                Some("acme/collection"),
            ),
            node(
                "acme/derived",
                TaskType::Derivation,
                "derivation/acme/derived/0000",
                &["acme/collection"],
                Some("acme/derived"),
            ),
        ]);
        graph.pending[1].insert("acme/collection/pivot=00".to_string(), 100);

        let mut publish_at = HashMap::new();
        publish_at.insert("acme/collection/pivot=00".to_string(), 42);
        propagate(&mut graph, vec![("acme/collection".to_string(), publish_at)]);

        assert_eq!(graph.pending[1].get("acme/collection/pivot=00"), Some(&100));
    }
}
