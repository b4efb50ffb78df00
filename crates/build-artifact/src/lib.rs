//! Read-only access to a built catalog's embedded relational store (C1).
//!
//! A build is an immutable file, keyed by Build ID, produced upstream by the
//! Build Service and never written to by this crate. `Build::open` performs
//! the scoped acquisition and `Build::extract` is the sole read primitive;
//! the table-specific accessors below are convenience wrappers over it.

pub mod builds_root;

use proto_flow::flow;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("build {0} was not found under the builds root")]
    NotFound(String),
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
    #[error("catalog spec for {0} is not valid JSON")]
    Json(String, #[source] serde_json::Error),
}

pub struct CollectionRow {
    pub collection: String,
    pub spec: flow::CollectionSpec,
}

pub struct CaptureRow {
    pub capture: String,
    pub spec: flow::CaptureSpec,
}

pub struct MaterializationRow {
    pub materialization: String,
    pub spec: flow::MaterializationSpec,
}

pub struct TestRow {
    pub test: String,
    pub spec: flow::TestSpec,
}

/// Build is a scoped, read-only handle onto a build artifact's relational
/// store. It is held open for the lifetime of one CLI invocation.
pub struct Build {
    conn: rusqlite::Connection,
    build_id: String,
}

impl Build {
    /// Open the build artifact named `build_id` under `builds_root`.
    /// `builds_root` is a local directory path (a `file://` URL with its
    /// scheme stripped is also accepted, for callers holding a URL obtained
    /// from [`builds_root::discover`]).
    pub fn open(builds_root: &str, build_id: &str) -> Result<Self> {
        let path = std::path::Path::new(builds_root.trim_start_matches("file://")).join(build_id);

        if !path.exists() {
            return Err(Error::NotFound(build_id.to_string()));
        }
        let conn = rusqlite::Connection::open_with_flags(
            &path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?;
        tracing::debug!(build_id, path = %path.display(), "opened build artifact");

        Ok(Self {
            conn,
            build_id: build_id.to_string(),
        })
    }

    /// Run `f` with read-only access to the catalog store. All reads taken
    /// inside a single `extract` call observe a consistent snapshot.
    pub fn extract<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> rusqlite::Result<T>,
    {
        let txn = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Deferred)?;
        let out = f(&txn)?;
        txn.commit()?;
        Ok(out)
    }

    pub fn collections(&mut self) -> Result<Vec<CollectionRow>> {
        self.extract(|txn| {
            let mut stmt =
                txn.prepare("SELECT collection, spec FROM built_collections ORDER BY collection")?;
            query_rows(&mut stmt, |collection, spec| CollectionRow { collection, spec })
        })
    }

    pub fn captures(&mut self) -> Result<Vec<CaptureRow>> {
        self.extract(|txn| {
            let mut stmt =
                txn.prepare("SELECT capture, spec FROM built_captures ORDER BY capture")?;
            query_rows(&mut stmt, |capture, spec| CaptureRow { capture, spec })
        })
    }

    /// Collections which additionally carry a derivation, reflecting their
    /// dual nature as both a collection and a task.
    pub fn derivations(&mut self) -> Result<Vec<CollectionRow>> {
        self.extract(|txn| {
            let mut stmt = txn.prepare(
                "SELECT collection, spec FROM built_collections \
                 WHERE json_extract(spec, '$.derivation') IS NOT NULL \
                 ORDER BY collection",
            )?;
            query_rows(&mut stmt, |collection, spec| CollectionRow { collection, spec })
        })
    }

    pub fn materializations(&mut self) -> Result<Vec<MaterializationRow>> {
        self.extract(|txn| {
            let mut stmt = txn.prepare(
                "SELECT materialization, spec FROM built_materializations ORDER BY materialization",
            )?;
            query_rows(&mut stmt, |materialization, spec| MaterializationRow {
                materialization,
                spec,
            })
        })
    }

    pub fn tests(&mut self) -> Result<Vec<TestRow>> {
        self.extract(|txn| {
            let mut stmt = txn.prepare("SELECT test, spec FROM built_tests ORDER BY test")?;
            query_rows(&mut stmt, |test, spec| TestRow { test, spec })
        })
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }
}

fn query_rows<T, Spec, F>(
    stmt: &mut rusqlite::Statement,
    wrap: F,
) -> rusqlite::Result<Vec<T>>
where
    Spec: serde::de::DeserializeOwned,
    F: Fn(String, Spec) -> T,
{
    let rows = stmt.query_map([], |row| {
        let name: String = row.get(0)?;
        let spec_json: String = row.get(1)?;
        Ok((name, spec_json))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (name, spec_json) = row?;
        let spec: Spec = serde_json::from_str(&spec_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;
        out.push(wrap(name, spec));
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let conn = rusqlite::Connection::open(dir.path().join("abcdefghi")).unwrap();

        conn.execute_batch(
            "CREATE TABLE built_collections (collection TEXT PRIMARY KEY, spec TEXT);
             CREATE TABLE built_captures (capture TEXT PRIMARY KEY, spec TEXT);
             CREATE TABLE built_materializations (materialization TEXT PRIMARY KEY, spec TEXT);
             CREATE TABLE built_tests (test TEXT PRIMARY KEY, spec TEXT);",
        )
        .unwrap();

        conn.execute(
            "INSERT INTO built_collections (collection, spec) VALUES (?1, ?2)",
            rusqlite::params![
                "acme/widgets",
                serde_json::json!({"name": "acme/widgets", "key": ["/id"]}).to_string()
            ],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO built_collections (collection, spec) VALUES (?1, ?2)",
            rusqlite::params![
                "acme/derived",
                serde_json::json!({
                    "name": "acme/derived",
                    "key": ["/id"],
                    "derivation": {"connectorType": "SQLITE", "configJson": "{}"},
                })
                .to_string()
            ],
        )
        .unwrap();

        dir
    }

    #[test]
    fn test_open_missing_build_fails_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Build::open(dir.path().to_str().unwrap(), "deadbeef1").unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == "deadbeef1"));
    }

    #[test]
    fn test_collections_and_derivations() {
        let dir = fixture();
        let mut build = Build::open(dir.path().to_str().unwrap(), "abcdefghi").unwrap();

        let collections = build.collections().unwrap();
        assert_eq!(collections.len(), 2);

        let derivations = build.derivations().unwrap();
        assert_eq!(derivations.len(), 1);
        assert_eq!(derivations[0].collection, "acme/derived");

        let captures = build.captures().unwrap();
        assert!(captures.is_empty());
    }
}
