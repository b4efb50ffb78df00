//! `api build`: invoke the opaque Build Service. Catalog compilation (schema
//! checking, code generation, packaging into a queryable SQLite artifact)
//! is explicitly out of this orchestrator's scope (SPEC_FULL §1); this
//! command only locates and drives the external `flow-build` binary that
//! performs it, the same way the data-plane supervisor locates `etcd` /
//! `gazette` / `flow-consumer` as sibling binaries rather than reimplementing
//! them.

use anyhow::Context;
use std::path::PathBuf;

#[derive(Debug, clap::Args)]
pub struct BuildArgs {
    /// Build ID to assign the produced artifact.
    #[arg(long = "build-id")]
    pub build_id: String,
    /// Destination path for the built SQLite artifact.
    #[arg(long = "build-db")]
    pub build_db: PathBuf,
    /// Path to the catalog source file to build.
    #[arg(long)]
    pub source: PathBuf,
}

pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    let build_bin = locate_bin::locate("flow-build").context("locating flow-build")?;

    tracing::info!(
        build_id = %args.build_id,
        build_db = %args.build_db.display(),
        source = %args.source.display(),
        "invoking the build service",
    );

    let status = tokio::process::Command::new(&build_bin)
        .arg("--build-id")
        .arg(&args.build_id)
        .arg("--build-db")
        .arg(&args.build_db)
        .arg("--source")
        .arg(&args.source)
        .status()
        .await
        .context("spawning flow-build")?;

    anyhow::ensure!(status.success(), "flow-build exited with {status}");

    tracing::info!(build_id = %args.build_id, "build complete");
    Ok(())
}
