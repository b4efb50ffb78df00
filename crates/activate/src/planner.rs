//! Change Planner (C4): given current broker/shard state and a desired
//! task set, computes the ordered journal and shard change lists that the
//! Three-Phase Executor (C6) commits.

use anyhow::Context;
use proto_flow::flow;
use proto_gazette::{
    broker::{self, journal_spec, JournalSpec, LabelSelector, LabelSet},
    consumer::{self, ShardSpec},
};
use serde_json::json;
use std::collections::BTreeMap;

/// A Shard or Journal change to be applied.
#[derive(Debug, serde::Serialize)]
pub enum Change {
    Shard(consumer::apply_request::Change),
    Journal(broker::apply_request::Change),
}

/// JournalSplit describes a collection partition or a shard recovery log,
/// as currently listed from the broker.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct JournalSplit {
    pub name: String,
    pub labels: LabelSet,
    pub mod_revision: i64,
    pub suspend: Option<journal_spec::Suspend>,
}

/// ShardSplit describes a task partition, as currently listed from the
/// consumer.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ShardSplit {
    pub id: String,
    pub labels: LabelSet,
    pub mod_revision: i64,
}

#[derive(Copy, Clone, Debug)]
pub struct TaskTemplate<'a> {
    pub shard: &'a ShardSpec,
    pub recovery: &'a JournalSpec,
}

/// Map a CaptureSpec into its activation TaskTemplate.
pub fn capture_template(
    task_spec: Option<&flow::CaptureSpec>,
) -> anyhow::Result<Option<TaskTemplate>> {
    let Some(task_spec) = task_spec else {
        return Ok(None);
    };

    let shard_template = task_spec
        .shard_template
        .as_ref()
        .context("CaptureSpec missing shard_template")?;
    let recovery_template = task_spec
        .recovery_log_template
        .as_ref()
        .context("CaptureSpec missing recovery_log_template")?;

    Ok(Some(TaskTemplate {
        shard: shard_template,
        recovery: recovery_template,
    }))
}

/// Map a MaterializationSpec into its activation TaskTemplate.
pub fn materialization_template(
    task_spec: Option<&flow::MaterializationSpec>,
) -> anyhow::Result<Option<TaskTemplate>> {
    let Some(task_spec) = task_spec else {
        return Ok(None);
    };

    let shard_template = task_spec
        .shard_template
        .as_ref()
        .context("MaterializationSpec missing shard_template")?;
    let recovery_template = task_spec
        .recovery_log_template
        .as_ref()
        .context("MaterializationSpec missing recovery_log_template")?;

    Ok(Some(TaskTemplate {
        shard: shard_template,
        recovery: recovery_template,
    }))
}

/// Map a CollectionSpec into its activation partition template and, if a
/// derivation, its activation TaskTemplate.
pub fn collection_template(
    task_spec: Option<&flow::CollectionSpec>,
) -> anyhow::Result<(Option<&JournalSpec>, Option<TaskTemplate>)> {
    let Some(task_spec) = task_spec else {
        return Ok((None, None));
    };

    let partition_template = task_spec
        .partition_template
        .as_ref()
        .context("CollectionSpec missing partition_template")?;

    let task_template = if let Some(derivation) = &task_spec.derivation {
        let shard_template = derivation
            .shard_template
            .as_ref()
            .context("CollectionSpec.Derivation missing shard_template")?;
        let recovery_template = derivation
            .recovery_log_template
            .as_ref()
            .context("CollectionSpec.Derivation missing recovery_log_template")?;

        Some(TaskTemplate {
            shard: shard_template,
            recovery: recovery_template,
        })
    } else {
        None
    };

    Ok((Some(partition_template), task_template))
}

pub async fn fetch_task_splits(
    journal_client: &gazette::journal::Client,
    shard_client: &gazette::shard::Client,
    task_type: proto_flow::ops::TaskType,
    task_name: &str,
    ops_logs_template: Option<&broker::JournalSpec>,
    ops_stats_template: Option<&broker::JournalSpec>,
) -> anyhow::Result<(
    Vec<ShardSplit>,                                  // Shards.
    Vec<JournalSplit>,                                // Recovery logs.
    (String, Option<JournalSpec>, Vec<JournalSplit>), // Ops logs.
    (String, Option<JournalSpec>, Vec<JournalSplit>), // Ops stats.
)> {
    let (list_shards, list_recovery) = list_task_request(task_type, task_name);
    let list_ops_logs = list_ops_journal(journal_client, task_type, task_name, ops_logs_template);
    let list_ops_stats = list_ops_journal(journal_client, task_type, task_name, ops_stats_template);

    // List task shards, shard recovery logs, task ops logs, and task ops stats concurrently.
    let (shards, recovery, ops_logs, ops_stats) = futures::join!(
        shard_client.list(list_shards),
        journal_client.list(list_recovery),
        list_ops_logs,
        list_ops_stats,
    );

    let shards = unpack_shard_listing(shards?)?;
    let recovery = unpack_journal_listing(recovery?)?;

    if !is_sorted_by(&shards, |shard| &shard.id) {
        anyhow::bail!("shards are not sorted by id");
    }
    if !is_sorted_by(&recovery, |recovery| &recovery.name) {
        anyhow::bail!("recovery logs are not sorted by name");
    }

    Ok((shards, recovery, ops_logs?, ops_stats?))
}

pub async fn fetch_partition_splits(
    journal_client: &gazette::journal::Client,
    collection: &str,
) -> anyhow::Result<Vec<JournalSplit>> {
    let list_partitions = list_partitions_request(collection);

    let partitions = journal_client.list(list_partitions).await?;
    let partitions = unpack_journal_listing(partitions)?;

    if !is_sorted_by(&partitions, |partition| &partition.name) {
        anyhow::bail!("partitions are not sorted by name");
    }

    Ok(partitions)
}

fn is_sorted_by<T, K: PartialOrd>(items: &[T], key: impl Fn(&T) -> K) -> bool {
    items.windows(2).all(|w| key(&w[0]) <= key(&w[1]))
}

/// Build ListRequests of a Task's shard splits and recovery logs.
fn list_task_request(
    task_type: proto_flow::ops::TaskType,
    task_name: &str,
) -> (consumer::ListRequest, broker::ListRequest) {
    let list_shards = consumer::ListRequest {
        selector: Some(LabelSelector {
            include: Some(labels::build_set([
                (labels::TASK_TYPE, task_type.as_str_name()),
                (labels::TASK_NAME, task_name),
            ])),
            exclude: None,
        }),
        ..Default::default()
    };
    let list_recovery = broker::ListRequest {
        selector: Some(LabelSelector {
            include: Some(labels::build_set([
                (labels::CONTENT_TYPE, labels::CONTENT_TYPE_RECOVERY_LOG),
                (labels::TASK_TYPE, task_type.as_str_name()),
                (labels::TASK_NAME, task_name),
            ])),
            exclude: None,
        }),
        ..Default::default()
    };
    (list_shards, list_recovery)
}

/// Build a ListRequest of a collection's partitions.
fn list_partitions_request(collection: &str) -> broker::ListRequest {
    broker::ListRequest {
        selector: Some(LabelSelector {
            include: Some(labels::build_set([
                ("name:prefix", format!("{collection}/").as_str()),
                (labels::COLLECTION, collection),
            ])),
            exclude: None,
        }),
        ..Default::default()
    }
}

fn unpack_shard_listing(resp: consumer::ListResponse) -> anyhow::Result<Vec<ShardSplit>> {
    let mut v = Vec::new();

    for resp in resp.shards {
        let Some(mut spec) = resp.spec else {
            anyhow::bail!("listing response is missing spec");
        };
        let Some(set) = spec.labels.take() else {
            anyhow::bail!("listing response spec is missing labels");
        };
        v.push(ShardSplit {
            id: spec.id,
            labels: set,
            mod_revision: resp.mod_revision,
        });
    }
    Ok(v)
}

fn unpack_journal_listing(resp: broker::ListResponse) -> anyhow::Result<Vec<JournalSplit>> {
    let mut v = Vec::new();

    for resp in resp.journals {
        let Some(mut spec) = resp.spec else {
            anyhow::bail!("listing response is missing spec");
        };
        let Some(set) = spec.labels.take() else {
            anyhow::bail!("listing response spec is missing labels");
        };
        v.push(JournalSplit {
            name: spec.name,
            labels: set,
            mod_revision: resp.mod_revision,
            suspend: spec.suspend,
        });
    }
    Ok(v)
}

/// Determine the consumer shard and broker recovery and ops journal changes
/// required to converge the desired splits towards the `template`.
pub fn task_changes<'a>(
    template: Option<TaskTemplate<'a>>,
    shards: Vec<ShardSplit>,
    recovery: Vec<JournalSplit>,
    ops_logs: (String, Option<JournalSpec>, Vec<JournalSplit>),
    ops_stats: (String, Option<JournalSpec>, Vec<JournalSplit>),
) -> anyhow::Result<Vec<Change>> {
    let (ops_logs_name, ops_logs_spec, ops_logs_splits) = ops_logs;
    let (ops_stats_name, ops_stats_spec, ops_stats_splits) = ops_stats;

    let mut recovery: BTreeMap<_, _> = recovery
        .into_iter()
        .map(|mut split| (std::mem::take(&mut split.name), split))
        .collect();

    let mut changes = Vec::new();
    let mut active = false;

    for ShardSplit {
        id,
        labels: split,
        mod_revision: shard_revision,
    } in shards
    {
        let template = match template {
            Some(template) if id.starts_with(&template.shard.id) => template,

            // Delete shards where `template` is None or the template prefix isn't matched.
            _ => {
                changes.push(Change::Shard(consumer::apply_request::Change {
                    expect_mod_revision: shard_revision,
                    upsert: None,
                    delete: id,
                }));
                continue;
            }
        };

        // Sanity-check that the current split matches its implied shard Id.
        let expect_id = format!(
            "{}/{}",
            template.shard.id,
            labels::shard::id_suffix(&split)?
        );
        if id != expect_id {
            anyhow::bail!("shard {id} doesn't match its expected Id, which is {expect_id}");
        }

        let mut shard_spec = ShardSpec {
            id,
            ..template.shard.clone()
        };

        // Next resolve the shard's recovery-log JournalSpec.
        let recovery_name = format!("{}/{}", shard_spec.recovery_log_prefix, shard_spec.id);
        let recovery_split = recovery.remove(&recovery_name).unwrap_or_default();

        let recovery_spec = JournalSpec {
            name: recovery_name,
            suspend: recovery_split.suspend, // Must be passed through.
            ..template.recovery.clone()
        };

        // Resolve the labels of the ShardSpec by merging labels managed by
        // the control-plane versus the data-plane.
        let mut shard_labels = shard_spec.labels.take().unwrap_or_default();

        let build = labels::values(&shard_labels, labels::BUILD)
            .first()
            .map(|l| l.value.clone())
            .unwrap_or_default();

        for label in &split.labels {
            if label.name == labels::BUILD && label.value > build {
                anyhow::bail!(
                    "current ShardSpec {} has a newer build then the template ({} vs {})",
                    shard_spec.id,
                    label.value,
                    build
                );
            } else if !labels::is_data_plane_label(&label.name) {
                continue;
            }
            shard_labels = labels::add_value(shard_labels, &label.name, &label.value);

            // A shard which is actively being split from another parent
            // (source) shard should not have hot standbys, since we must
            // complete the split workflow to even know what hints they
            // should begin recovery log replay from.
            if label.name == labels::SPLIT_SOURCE {
                shard_spec.hot_standbys = 0
            }
        }
        shard_labels = labels::set_value(shard_labels, labels::LOGS_JOURNAL, &ops_logs_name);
        shard_labels = labels::set_value(shard_labels, labels::STATS_JOURNAL, &ops_stats_name);
        shard_spec.labels = Some(shard_labels);

        changes.push(Change::Shard(consumer::apply_request::Change {
            expect_mod_revision: shard_revision,
            upsert: Some(shard_spec),
            delete: String::new(),
        }));
        changes.push(Change::Journal(broker::apply_request::Change {
            expect_mod_revision: recovery_split.mod_revision,
            upsert: Some(recovery_spec),
            delete: String::new(),
        }));

        active = true;
    }

    // Any remaining recovery logs are not paired with an active shard, and are deleted.
    for (name, JournalSplit { mod_revision, .. }) in recovery {
        changes.push(Change::Journal(broker::apply_request::Change {
            expect_mod_revision: mod_revision,
            upsert: None,
            delete: name,
        }));
    }

    // Apply ops partitions iff the task is active.
    if active {
        changes.extend(ops_journal_changes(ops_logs_spec, ops_logs_splits));
        changes.extend(ops_journal_changes(ops_stats_spec, ops_stats_splits));
    }

    Ok(changes)
}

/// Determine the broker partition changes required to converge the desired
/// `partitions` towards the `template`.
pub fn partition_changes(
    template: Option<&broker::JournalSpec>,
    partitions: Vec<JournalSplit>,
) -> anyhow::Result<Vec<Change>> {
    let mut changes = Vec::new();

    for JournalSplit {
        name,
        labels: split,
        mod_revision,
        suspend,
    } in partitions
    {
        let template = match template {
            Some(template) if name.starts_with(&template.name) => template,

            // Delete journals where `template` is None or the template prefix isn't matched.
            _ => {
                changes.push(Change::Journal(broker::apply_request::Change {
                    expect_mod_revision: mod_revision,
                    upsert: None,
                    delete: name.clone(),
                }));
                continue;
            }
        };

        // Sanity-check that the current split matches its implied journal name.
        let expect_name = format!(
            "{}/{}",
            template.name,
            labels::partition::name_suffix(&split)?
        );
        if name != expect_name {
            anyhow::bail!("journal {name} doesn't match its expected name, which is {expect_name}");
        }

        let mut spec = JournalSpec {
            name,
            suspend, // Must be passed through.
            ..template.clone()
        };
        let mut spec_labels = spec.labels.take().unwrap_or_default();

        let build = labels::values(&spec_labels, labels::BUILD)
            .first()
            .map(|l| l.value.clone())
            .unwrap_or_default();

        for label in &split.labels {
            if label.name == labels::BUILD && label.value > build {
                anyhow::bail!(
                    "current JournalSpec {} has a newer build then the template ({} vs {})",
                    spec.name,
                    label.value,
                    build
                );
            } else if !labels::is_data_plane_label(&label.name) {
                continue;
            }
            spec_labels = labels::add_value(spec_labels, &label.name, &label.value);
        }
        spec.labels = Some(spec_labels);

        changes.push(Change::Journal(broker::apply_request::Change {
            expect_mod_revision: mod_revision,
            upsert: Some(spec),
            delete: String::new(),
        }));
    }

    Ok(changes)
}

pub fn ops_partition_spec(
    task_type: proto_flow::ops::TaskType,
    task_name: &str,
    template: &JournalSpec,
) -> JournalSpec {
    let mut spec = template.clone();
    let set = spec.labels.take().unwrap_or_default();
    let set = labels::partition::encode_key_range(set, 0, u32::MAX);
    let set = labels::partition::add_value(set, "name", &json!(task_name)).unwrap();
    let set = labels::partition::add_value(set, "kind", &json!(task_type.as_str_name())).unwrap();

    spec.name = format!(
        "{}/{}",
        spec.name,
        labels::partition::name_suffix(&set).unwrap()
    );
    spec.labels = Some(set);

    spec
}

fn list_ops_journal_request(
    task_type: proto_flow::ops::TaskType,
    task_name: &str,
    template: &JournalSpec,
) -> (broker::ListRequest, JournalSpec) {
    let spec = ops_partition_spec(task_type, task_name, template);

    let list_req = broker::ListRequest {
        selector: Some(LabelSelector {
            include: Some(labels::build_set([("name", spec.name.as_str())])),
            exclude: None,
        }),
        ..Default::default()
    };

    (list_req, spec)
}

async fn list_ops_journal(
    journal_client: &gazette::journal::Client,
    task_type: proto_flow::ops::TaskType,
    task_name: &str,
    template: Option<&JournalSpec>,
) -> anyhow::Result<(String, Option<JournalSpec>, Vec<JournalSplit>)> {
    let Some(template) = template else {
        // `local` redirects task logs to application logs (for testing contexts).
        return Ok(("local".to_string(), None, Vec::new()));
    };

    let (request, spec) = list_ops_journal_request(task_type, task_name, template);
    let splits = unpack_journal_listing(journal_client.list(request).await?)?;
    Ok((spec.name.clone(), Some(spec), splits))
}

fn ops_journal_changes(spec: Option<JournalSpec>, splits: Vec<JournalSplit>) -> Option<Change> {
    let spec = spec?;

    // If the journal exists then there's nothing to do (we don't update it).
    if !splits.is_empty() {
        return None;
    }
    Some(Change::Journal(broker::apply_request::Change {
        upsert: Some(spec),
        expect_mod_revision: 0, // Will be created.
        delete: String::new(),
    }))
}

/// Invent `initial_splits` contiguous key-range shards for a task being
/// activated for the first time.
pub fn apply_initial_splits<'a>(
    template: Option<TaskTemplate<'a>>,
    initial_splits: usize,
    mut shards: Vec<ShardSplit>,
) -> anyhow::Result<Vec<ShardSplit>> {
    let Some(template) = template else {
        return Ok(shards);
    };
    if template.shard.disable {
        return Ok(shards);
    }
    if shards
        .iter()
        .any(|split| split.id.starts_with(&template.shard.id))
    {
        return Ok(shards);
    }
    // The task is being upsert-ed, it's not disabled, and no current shards
    // have its template prefix.

    for pivot in 0..initial_splits {
        let range = flow::RangeSpec {
            key_begin: ((1u64 << 32) * (pivot as u64) / initial_splits as u64) as u32,
            key_end: (((1u64 << 32) * (pivot as u64 + 1)) / initial_splits as u64 - 1) as u32,
            r_clock_begin: 0,
            r_clock_end: u32::MAX,
        };
        let labels = labels::shard::encode_range_spec(LabelSet::default(), &range);
        let id = format!(
            "{}/{}",
            template.shard.id,
            labels::shard::id_suffix(&labels)?
        );
        shards.push(ShardSplit {
            id,
            labels,
            mod_revision: 0,
        });
    }

    Ok(shards)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_list_partition_request() {
        insta::assert_debug_snapshot!(list_partitions_request("the/collection"))
    }

    #[test]
    fn test_list_task_request() {
        insta::assert_debug_snapshot!(list_task_request(
            proto_flow::ops::TaskType::Derivation,
            "the/derivation",
        ),)
    }

    fn shard_template(id: &str, disable: bool) -> ShardSpec {
        ShardSpec {
            id: id.to_string(),
            recovery_log_prefix: "recovery".to_string(),
            hint_prefix: "hints".to_string(),
            hint_backups: 2,
            disable,
            hot_standbys: 1,
            ..Default::default()
        }
    }

    fn recovery_template(name: &str) -> JournalSpec {
        JournalSpec {
            name: name.to_string(),
            replication: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_initial_splits_invents_contiguous_ranges() {
        let shard = shard_template("derivation/acme/widgets", false);
        let recovery = recovery_template("recovery/derivation/acme/widgets");
        let template = TaskTemplate {
            shard: &shard,
            recovery: &recovery,
        };

        let shards = apply_initial_splits(Some(template), 4, Vec::new()).unwrap();
        assert_eq!(shards.len(), 4);

        let ranges: Vec<_> = shards
            .iter()
            .map(|s| labels::shard::decode_range_spec(&s.labels).unwrap())
            .collect();
        assert_eq!(ranges[0].key_begin, 0);
        assert_eq!(ranges[3].key_end, u32::MAX);
        for w in ranges.windows(2) {
            assert_eq!(w[0].key_end + 1, w[1].key_begin);
        }
    }

    #[test]
    fn test_apply_initial_splits_skips_disabled() {
        let shard = shard_template("derivation/acme/widgets", true);
        let recovery = recovery_template("recovery/derivation/acme/widgets");
        let template = TaskTemplate {
            shard: &shard,
            recovery: &recovery,
        };

        let shards = apply_initial_splits(Some(template), 4, Vec::new()).unwrap();
        assert!(shards.is_empty());
    }

    #[test]
    fn test_task_changes_deletes_shard_without_matching_template() {
        let shard = shard_template("derivation/acme/widgets", false);
        let recovery = recovery_template("recovery/derivation/acme/widgets");
        let template = TaskTemplate {
            shard: &shard,
            recovery: &recovery,
        };

        let stray = ShardSplit {
            id: "derivation/acme/other/0000".to_string(),
            labels: LabelSet::default(),
            mod_revision: 42,
        };

        let changes = task_changes(
            Some(template),
            vec![stray],
            Vec::new(),
            ("local".to_string(), None, Vec::new()),
            ("local".to_string(), None, Vec::new()),
        )
        .unwrap();

        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::Shard(c) => {
                assert_eq!(c.delete, "derivation/acme/other/0000");
                assert_eq!(c.expect_mod_revision, 42);
                assert!(c.upsert.is_none());
            }
            _ => panic!("expected a shard delete"),
        }
    }

    #[test]
    fn test_partition_changes_rejects_a_newer_concurrent_build() {
        let template = JournalSpec {
            name: "acme/widgets".to_string(),
            replication: 3,
            labels: Some(labels::build_set([(labels::BUILD, "1000")])),
            ..Default::default()
        };

        let labels = labels::partition::encode_key_range(
            labels::build_set([(labels::BUILD, "1111")]),
            0,
            u32::MAX,
        );
        let name = format!(
            "acme/widgets/{}",
            labels::partition::name_suffix(&labels).unwrap()
        );

        let split = JournalSplit {
            name,
            labels,
            mod_revision: 7,
            suspend: None,
        };

        let err = partition_changes(Some(&template), vec![split]).unwrap_err();
        assert!(err.to_string().contains("newer build"));
    }
}
