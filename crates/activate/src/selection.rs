//! Selection & Task Loader (C3): resolves user intent (explicit names / all
//! / all-derivations) against a build artifact into the exact set of
//! collections and tasks to reconcile.

use anyhow::Context;
use proto_flow::flow;
use std::collections::BTreeMap;

/// Task is a typed sum over the three catalog entities which are reconciled
/// to shards. A derivation also appears in [`Selection::collections`],
/// reflecting its dual nature as both a collection and a task.
pub enum Task {
    Capture {
        name: String,
        spec: flow::CaptureSpec,
    },
    Derivation {
        name: String,
        spec: flow::CollectionSpec,
    },
    Materialization {
        name: String,
        spec: flow::MaterializationSpec,
    },
}

impl Task {
    pub fn name(&self) -> &str {
        match self {
            Task::Capture { name, .. } => name,
            Task::Derivation { name, .. } => name,
            Task::Materialization { name, .. } => name,
        }
    }

    pub fn shard_template(&self) -> Option<&proto_gazette::consumer::ShardSpec> {
        match self {
            Task::Capture { spec, .. } => spec.shard_template.as_ref(),
            Task::Derivation { spec, .. } => {
                spec.derivation.as_ref().and_then(|d| d.shard_template.as_ref())
            }
            Task::Materialization { spec, .. } => spec.shard_template.as_ref(),
        }
    }

    pub fn task_type(&self) -> proto_flow::ops::TaskType {
        match self {
            Task::Capture { .. } => proto_flow::ops::TaskType::Capture,
            Task::Derivation { .. } => proto_flow::ops::TaskType::Derivation,
            Task::Materialization { .. } => proto_flow::ops::TaskType::Materialization,
        }
    }
}

pub struct Selection {
    pub collections: Vec<(String, flow::CollectionSpec)>,
    pub tasks: Vec<Task>,
}

/// Load the collections and tasks named by `names`, or all of them when
/// `all` is set, or just derivations when `all_derivations` is set.
pub fn load(
    build: &mut build_artifact::Build,
    names: &[String],
    all: bool,
    all_derivations: bool,
) -> anyhow::Result<Selection> {
    let mut found: BTreeMap<&str, usize> = names.iter().map(|n| (n.as_str(), 0)).collect();

    let mut collections = Vec::new();
    let mut tasks = Vec::new();

    for row in build.collections().context("loading collections")? {
        let is_derivation = row.spec.derivation.is_some();
        let wanted = all
            || (all_derivations && is_derivation)
            || found.contains_key(row.collection.as_str());

        if !wanted {
            continue;
        }
        if let Some(count) = found.get_mut(row.collection.as_str()) {
            *count += 1;
        }

        if is_derivation {
            tasks.push(Task::Derivation {
                name: row.collection.clone(),
                spec: row.spec.clone(),
            });
        }
        collections.push((row.collection, row.spec));
    }

    for row in build.captures().context("loading captures")? {
        let wanted = all || found.contains_key(row.capture.as_str());
        if !wanted {
            continue;
        }
        if let Some(count) = found.get_mut(row.capture.as_str()) {
            *count += 1;
        }
        tasks.push(Task::Capture {
            name: row.capture,
            spec: row.spec,
        });
    }

    for row in build
        .materializations()
        .context("loading materializations")?
    {
        let wanted = all || found.contains_key(row.materialization.as_str());
        if !wanted {
            continue;
        }
        if let Some(count) = found.get_mut(row.materialization.as_str()) {
            *count += 1;
        }
        tasks.push(Task::Materialization {
            name: row.materialization,
            spec: row.spec,
        });
    }

    let missing: Vec<&str> = found
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();

    if !missing.is_empty() {
        anyhow::bail!("named entities were not found in the build: {missing:?}");
    }

    Ok(Selection { collections, tasks })
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let conn = rusqlite::Connection::open(dir.path().join("build-id")).unwrap();
        conn.execute_batch(
            "CREATE TABLE built_collections (collection TEXT PRIMARY KEY, spec TEXT);
             CREATE TABLE built_captures (capture TEXT PRIMARY KEY, spec TEXT);
             CREATE TABLE built_materializations (materialization TEXT PRIMARY KEY, spec TEXT);
             CREATE TABLE built_tests (test TEXT PRIMARY KEY, spec TEXT);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO built_collections VALUES ('acme/plain', ?1)",
            rusqlite::params![serde_json::json!({"name": "acme/plain", "key": ["/id"]}).to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO built_collections VALUES ('acme/derived', ?1)",
            rusqlite::params![serde_json::json!({
                "name": "acme/derived",
                "key": ["/id"],
                "derivation": {"connectorType": "SQLITE", "configJson": "{}"},
            })
            .to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO built_captures VALUES ('acme/capture', ?1)",
            rusqlite::params![serde_json::json!({"name": "acme/capture", "connectorType": "IMAGE", "configJson": "{}"}).to_string()],
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_names_must_all_be_found() {
        let dir = fixture();
        let mut build =
            build_artifact::Build::open(dir.path().to_str().unwrap(), "build-id").unwrap();

        let err = load(
            &mut build,
            &["acme/capture".to_string(), "nonexistent".to_string()],
            false,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_all_loads_everything() {
        let dir = fixture();
        let mut build =
            build_artifact::Build::open(dir.path().to_str().unwrap(), "build-id").unwrap();

        let selection = load(&mut build, &[], true, false).unwrap();
        assert_eq!(selection.collections.len(), 2);
        assert_eq!(selection.tasks.len(), 2); // capture + derivation
    }

    #[test]
    fn test_all_derivations_excludes_plain_collections_and_captures() {
        let dir = fixture();
        let mut build =
            build_artifact::Build::open(dir.path().to_str().unwrap(), "build-id").unwrap();

        let selection = load(&mut build, &[], false, true).unwrap();
        assert_eq!(selection.collections.len(), 1);
        assert_eq!(selection.collections[0].0, "acme/derived");
        assert_eq!(selection.tasks.len(), 1);
        assert_eq!(selection.tasks[0].name(), "acme/derived");
    }

    #[test]
    fn test_named_capture_only() {
        let dir = fixture();
        let mut build =
            build_artifact::Build::open(dir.path().to_str().unwrap(), "build-id").unwrap();

        let selection = load(&mut build, &["acme/capture".to_string()], false, false).unwrap();
        assert_eq!(selection.collections.len(), 0);
        assert_eq!(selection.tasks.len(), 1);
    }
}
