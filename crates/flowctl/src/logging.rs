//! Logging setup shared by every subcommand, matching the teacher's
//! `flow_cli_common::LogArgs` shape: a `--log.level`/`--log.format` pair of
//! global flags, with format auto-detected from whether stderr is a TTY.

use std::io::IsTerminal;

#[derive(Debug, clap::Args)]
pub struct LogArgs {
    /// The log verbosity. One of trace|debug|info|warn|error.
    #[arg(long = "log.level", default_value = "info", global = true)]
    pub level: String,

    #[arg(long = "log.format", value_enum, global = true)]
    pub format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogFormat {
    /// Newline-delimited JSON, suited to machine parsing.
    Json,
    /// Plain text with no colors.
    Text,
    /// Plain text with ANSI colors, for interactive terminals.
    Color,
}

fn default_log_format() -> LogFormat {
    if std::io::stderr().is_terminal() {
        LogFormat::Color
    } else {
        LogFormat::Json
    }
}

/// Initializes the global `tracing` subscriber. Must be called at most once
/// per process; every subcommand does so before doing any other work.
pub fn init_logging(args: &LogArgs) {
    let env_filter = tracing_subscriber::EnvFilter::try_new(&args.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false);

    match args.format.unwrap_or_else(default_log_format) {
        LogFormat::Json => {
            builder.json().flatten_event(true).init();
        }
        LogFormat::Text => {
            builder.compact().with_ansi(false).init();
        }
        LogFormat::Color => {
            builder.compact().with_ansi(true).init();
        }
    }
}
