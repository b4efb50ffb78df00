//! Subcommand implementations. Each module owns the `clap::Args` struct for
//! its command plus a `run` entry point; `crate::run` dispatches into these
//! after initializing logging.

pub mod activate;
pub mod await_cmd;
pub mod build;
pub mod delete;
pub mod deploy;
pub mod temp_data_plane;
pub mod test_cmd;

use anyhow::Context;

/// Selection flags shared by `api activate`, `api delete`, and `api await`
/// (C3): an explicit name list, or `--all`/`--all-derivations`.
#[derive(Debug, clap::Args)]
pub struct SelectionArgs {
    /// Select every collection and task in the build.
    #[arg(long)]
    pub all: bool,
    /// Select every derivation in the build (in addition to `--name`s).
    #[arg(long = "all-derivations")]
    pub all_derivations: bool,
    /// Select a specific collection or task by catalog name. Repeatable.
    #[arg(long = "name")]
    pub names: Vec<String>,
}

/// Opens the named build and loads `selection`'s chosen collections/tasks
/// (C1 + C3), discovering the builds root from the consumer's debug
/// endpoint first.
pub async fn load_selection(
    consumer_debug_address: &str,
    build_id: &str,
    selection: &SelectionArgs,
) -> anyhow::Result<activate::selection::Selection> {
    let builds_root = build_artifact::builds_root::discover(consumer_debug_address)
        .await
        .context("discovering builds root")?;

    let mut build = build_artifact::Build::open(&builds_root, build_id)
        .with_context(|| format!("opening build {build_id}"))?;

    activate::selection::load(
        &mut build,
        &selection.names,
        selection.all,
        selection.all_derivations,
    )
    .context("loading selection")
}
