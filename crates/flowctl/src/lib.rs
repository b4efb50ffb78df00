//! `flowctl`: the activation/deactivation orchestrator's command-line
//! surface (SPEC_FULL §6). `main.rs` is a thin shim over [`run`] so the CLI
//! shape stays testable as a library.

pub mod clients;
pub mod commands;
pub mod connector_driver;
pub mod logging;

use clap::Parser;
use logging::LogArgs;

#[derive(Debug, Parser)]
#[command(name = "flowctl", author, version, about = "Activate and deactivate Flow catalogs against a data plane")]
pub struct Flowctl {
    #[command(flatten)]
    pub log: LogArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
#[command(rename_all = "kebab-case")]
pub enum Command {
    /// Operate on a single build against a running data plane.
    Api(ApiArgs),
    /// Run the local ephemeral data-plane supervisor until signaled.
    TempDataPlane(commands::temp_data_plane::TempDataPlaneArgs),
    /// Build, activate, await settlement, and delete a catalog against a
    /// disposable local data plane.
    Test(commands::test_cmd::TestArgs),
    /// Build and activate a catalog against an already-running data plane.
    Deploy(commands::deploy::DeployArgs),
}

#[derive(Debug, clap::Args)]
pub struct ApiArgs {
    #[command(subcommand)]
    pub command: ApiCommand,
}

#[derive(Debug, clap::Subcommand)]
#[command(rename_all = "kebab-case")]
pub enum ApiCommand {
    /// Reconcile a build's collections and tasks against the data plane.
    Activate(commands::activate::ActivateArgs),
    /// Retract a build's collections and tasks from the data plane.
    Delete(commands::delete::DeleteArgs),
    /// Wait for a build's dataflow to settle.
    Await(commands::await_cmd::AwaitArgs),
    /// Run the Build Service to produce a queryable build artifact.
    Build(commands::build::BuildArgs),
}

/// Parses arguments, initializes logging, and dispatches to the selected
/// subcommand. Exit status maps to SPEC_FULL §7/§8: zero on success
/// (including "no changes to apply"), non-zero on any fatal error.
pub async fn run() -> anyhow::Result<()> {
    let cli = Flowctl::parse();
    logging::init_logging(&cli.log);

    match cli.command {
        Command::Api(api) => match api.command {
            ApiCommand::Activate(args) => commands::activate::run(args).await,
            ApiCommand::Delete(args) => commands::delete::run(args).await,
            ApiCommand::Await(args) => commands::await_cmd::run(args).await,
            ApiCommand::Build(args) => commands::build::run(args).await,
        },
        Command::TempDataPlane(args) => commands::temp_data_plane::run(args).await,
        Command::Test(args) => commands::test_cmd::run(args).await,
        Command::Deploy(args) => commands::deploy::run(args).await,
    }
}
