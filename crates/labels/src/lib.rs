// NOTE constants in this file must be mirrored in
// go/labels/labels.go
// See that file for descriptions of each label.

use proto_gazette::broker::{Label, LabelSet};

pub mod partition;
pub mod shard;

// JournalSpec & ShardSpec labels.
pub const BUILD: &str = "estuary.dev/build";
pub const COLLECTION: &str = "estuary.dev/collection";
pub const CORDON: &str = "estuary.dev/cordon";
pub const FIELD_PREFIX: &str = "estuary.dev/field/";
pub const KEY_BEGIN: &str = "estuary.dev/key-begin";
pub const KEY_BEGIN_MIN: &str = "00000000";
pub const KEY_END: &str = "estuary.dev/key-end";
pub const KEY_END_MAX: &str = "ffffffff";
pub const MANAGED_BY_FLOW: &str = "estuary.dev/flow";

// ShardSpec labels.
pub const TASK_NAME: &str = "estuary.dev/task-name";
pub const TASK_TYPE: &str = "estuary.dev/task-type";
pub const TASK_TYPE_CAPTURE: &str = "capture";
pub const TASK_TYPE_DERIVATION: &str = "derivation";
pub const TASK_TYPE_MATERIALIZATION: &str = "materialization";
pub const RCLOCK_BEGIN: &str = "estuary.dev/rclock-begin";
pub const RCLOCK_BEGIN_MIN: &str = KEY_BEGIN;
pub const RCLOCK_END: &str = "estuary.dev/rclock-end";
pub const RCLOCK_END_MAX: &str = KEY_END_MAX;
pub const SPLIT_TARGET: &str = "estuary.dev/split-target";
pub const SPLIT_SOURCE: &str = "estuary.dev/split-source";
pub const LOG_LEVEL: &str = "estuary.dev/log-level";
pub const LOGS_JOURNAL: &str = "estuary.dev/logs-journal";
pub const STATS_JOURNAL: &str = "estuary.dev/stats-journal";
// Shard labels related to network connectivity to shards.
pub const HOSTNAME: &str = "estuary.dev/hostname";
pub const EXPOSE_PORT: &str = "estuary.dev/expose-port";
pub const PORT_PROTO_PREFIX: &str = "estuary.dev/port-proto/";
pub const PORT_PUBLIC_PREFIX: &str = "estuary.dev/port-public/";

// A used subset of Gazette labels, defined in go.gazette.dev/core/labels/labels.go.
pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_TYPE_JSON_LINES: &str = "application/x-ndjson";
pub const CONTENT_TYPE_RECOVERY_LOG: &str = "application/x-gazette-recoverylog";

pub const MANAGED_BY: &str = "app.gazette.dev/managed-by";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("expected one label for {0} (got {1:?})")]
    ExpectedOne(String, Vec<Label>),
    #[error("label {0} value is empty but shouldn't be")]
    ValueEmpty(String),
    #[error("invalid value {value:?} for label {name}")]
    InvalidValue { name: String, value: String },
    #[error("both split-source {0} and split-target {1} are set but shouldn't be")]
    SplitSourceAndTarget(String, String),
    #[error("value is not a type representable by a partitioned label")]
    InvalidValueType,
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

/// Build a LabelSet from an iterator of (name, value) pairs.
/// Labels are sorted and de-duplicated per Gazette's LabelSet invariant.
pub fn build_set<'s>(iter: impl IntoIterator<Item = (&'s str, &'s str)>) -> LabelSet {
    let mut set = LabelSet::default();
    for (name, value) in iter {
        set = add_value(set, name, value);
    }
    set
}

/// Return all Label values having the given name, in their LabelSet order.
pub fn values<'s>(set: &'s LabelSet, name: &str) -> &'s [Label] {
    let begin = set.labels.partition_point(|l| l.name.as_str() < name);
    let end = begin + set.labels[begin..].partition_point(|l| l.name.as_str() == name);
    &set.labels[begin..end]
}

/// Return all Label values having the given name.
pub fn range<'s>(set: &'s LabelSet, name: &str) -> &'s [Label] {
    values(set, name)
}

/// Add a label value, preserving the LabelSet's sorted-by-name-then-value invariant.
/// Unlike set_value, this does not remove any other values already set under `name`.
pub fn add_value(mut set: LabelSet, name: &str, value: &str) -> LabelSet {
    let index = set
        .labels
        .partition_point(|l| (l.name.as_str(), l.value.as_str()) < (name, value));

    if set
        .labels
        .get(index)
        .map(|l| l.name == name && l.value == value)
        != Some(true)
    {
        set.labels.insert(
            index,
            Label {
                name: name.to_string(),
                value: value.to_string(),
                prefix: false,
            },
        );
    }
    set
}

/// Set a single label value, removing any other values previously set under `name`.
pub fn set_value(set: LabelSet, name: &str, value: &str) -> LabelSet {
    add_value(remove(set, name), name, value)
}

/// Remove all label values having the given name.
pub fn remove(mut set: LabelSet, name: &str) -> LabelSet {
    set.labels.retain(|l| l.name != name);
    set
}

/// Returns true if `name` is a label owned and recomputed by the reconciliation
/// process itself, rather than being user- or operator-supplied. Such labels
/// are never copied forward from a desired ShardSpec/JournalSpec when
/// reconciling against the current listing -- they're recomputed fresh on
/// every pass instead.
pub fn is_data_plane_label(name: &str) -> bool {
    name == BUILD
        || name == CORDON
        || name == LOGS_JOURNAL
        || name == STATS_JOURNAL
        || name == SPLIT_SOURCE
        || name == SPLIT_TARGET
}

pub(crate) fn percent_encoding(s: &str) -> percent_encoding::PercentEncode<'_> {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC)
}

pub(crate) fn expect_one<'s>(set: &'s LabelSet, name: &str) -> Result<&'s str, Error> {
    let labels = values(set, name);

    if labels.len() != 1 {
        Err(Error::ExpectedOne(name.to_string(), labels.to_vec()))
    } else if labels[0].value.is_empty() {
        Err(Error::ValueEmpty(name.to_string()))
    } else {
        Ok(labels[0].value.as_str())
    }
}

pub(crate) fn maybe_one<'s>(set: &'s LabelSet, name: &str) -> Result<&'s str, Error> {
    let labels = values(set, name);

    if labels.len() > 1 {
        Err(Error::ExpectedOne(name.to_string(), labels.to_vec()))
    } else if labels.is_empty() {
        Ok("")
    } else if labels[0].value.is_empty() {
        Err(Error::ValueEmpty(name.to_string()))
    } else {
        Ok(labels[0].value.as_str())
    }
}

pub(crate) fn expect_one_u32(set: &LabelSet, name: &str) -> Result<u32, Error> {
    let value = expect_one(set, name)?;

    let (8, Ok(parsed)) = (value.len(), u32::from_str_radix(value, 16)) else {
        return Err(Error::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        });
    };
    Ok(parsed)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_add_set_remove() {
        let set = build_set([("b", "2"), ("a", "1")]);
        assert_eq!(
            set.labels
                .iter()
                .map(|l| (l.name.as_str(), l.value.as_str()))
                .collect::<Vec<_>>(),
            vec![("a", "1"), ("b", "2")],
        );

        let set = add_value(set, "a", "0");
        assert_eq!(values(&set, "a").len(), 2);

        let set = set_value(set, "a", "9");
        assert_eq!(
            values(&set, "a"),
            &[Label {
                name: "a".to_string(),
                value: "9".to_string(),
                prefix: false
            }]
        );

        let set = remove(set, "a");
        assert!(values(&set, "a").is_empty());
    }
}
