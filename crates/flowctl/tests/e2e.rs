//! End-to-end scenarios exercising the compiled `flowctl` binary against a
//! real local data plane, mirroring spec.md §8's E1-E6. Every test requires
//! `etcd`, `gazette`, `flow-consumer`, `flow-build`, and `docker` on PATH (or
//! discoverable via `locate_bin`) and is `#[ignore]`d so a plain `cargo test`
//! run doesn't fail for lack of them.

use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Locates the compiled `flowctl` binary: `cargo test` puts it alongside the
/// test binary in `target/debug`, falling back to `locate_bin` (PATH).
fn flowctl_command() -> anyhow::Result<tokio::process::Command> {
    let exe_dir = std::env::current_exe()
        .context("resolving test binary path")?
        .parent()
        .and_then(|p| p.parent())
        .map(PathBuf::from)
        .context("resolving target/debug directory")?;
    let sibling = exe_dir.join("flowctl");

    let flowctl = if sibling.exists() {
        sibling
    } else {
        locate_bin::locate("flowctl")?
    };

    Ok(tokio::process::Command::new(flowctl))
}

const SINGLE_CAPTURE_FIXTURE: &str = r#"
collections:
  acme/e2e/collection:
    schema:
      type: object
      properties:
        id: { type: string }
      required: [id]
    key: [/id]

captures:
  acme/e2e/c1:
    endpoint:
      connector:
        image: ghcr.io/estuary/source-http-ingest:dev
        config: {}
    bindings:
      - resource: { path: /data, stream: /data }
        target: acme/e2e/collection
"#;

/// Starts an ephemeral data plane, returning its broker/consumer addresses
/// and builds root parsed from `temp-data-plane`'s stdout, plus the child so
/// the caller can terminate it once done.
async fn start_temp_plane() -> anyhow::Result<(tokio::process::Child, String, String, String)> {
    let mut child = flowctl_command()?
        .arg("temp-data-plane")
        .stdout(std::process::Stdio::piped())
        .spawn()
        .context("spawning temp-data-plane")?;

    let stdout = child.stdout.take().context("temp-data-plane has no stdout")?;
    let mut lines = tokio::io::BufReader::new(stdout);
    use tokio::io::AsyncBufReadExt;

    let (mut broker, mut consumer, mut builds_root) = (None, None, None);
    let mut line = String::new();
    while broker.is_none() || consumer.is_none() || builds_root.is_none() {
        line.clear();
        let n = lines.read_line(&mut line).await?;
        anyhow::ensure!(n > 0, "temp-data-plane exited before announcing its addresses");
        if let Some(v) = line.strip_prefix("BROKER_ADDRESS=") {
            broker = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("CONSUMER_ADDRESS=") {
            consumer = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("BUILDS_ROOT=") {
            builds_root = Some(v.trim().to_string());
        }
    }

    Ok((child, broker.unwrap(), consumer.unwrap(), builds_root.unwrap()))
}

async fn stop_temp_plane(mut child: tokio::process::Child) {
    // A single SIGINT requests the graceful stop path exercised elsewhere;
    // give it a moment before a hard kill so logs from the stop aren't lost.
    unsafe {
        libc::kill(child.id().unwrap() as i32, libc::SIGINT);
    }
    let _ = tokio::time::timeout(Duration::from_secs(15), child.wait()).await;
    let _ = child.kill().await;
}

fn write_fixture(yaml: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let file = tempfile::NamedTempFile::new()?;
    std::fs::write(file.path(), yaml)?;
    Ok(file)
}

/// E1: first-time activation of a single capture against an empty plane
/// succeeds and reports the capture's endpoint as applied.
#[ignore] // requires etcd/gazette/flow-consumer/flow-build/docker on PATH
#[tokio::test]
async fn test_first_activation_single_capture() -> anyhow::Result<()> {
    init_tracing();
    let (plane, broker, consumer, _builds_root) = start_temp_plane().await?;

    let source = write_fixture(SINGLE_CAPTURE_FIXTURE)?;
    let build_id = uuid::Uuid::new_v4().simple().to_string();
    let build_db = tempfile::NamedTempFile::new()?;

    let status = flowctl_command()?
        .arg("api")
        .arg("build")
        .arg("--build-id")
        .arg(&build_id)
        .arg("--build-db")
        .arg(build_db.path())
        .arg("--source")
        .arg(source.path())
        .status()
        .await?;
    assert!(status.success(), "build should succeed");

    let output = flowctl_command()?
        .arg("api")
        .arg("activate")
        .arg("--build-id")
        .arg(&build_id)
        .arg("--all")
        .arg("--initial-splits")
        .arg("1")
        .arg("--broker.address")
        .arg(&broker)
        .arg("--consumer.address")
        .arg(&consumer)
        .output()
        .await?;
    assert!(output.status.success(), "activation should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("acme/e2e/c1"), "applied output should name the capture: {stdout}");

    stop_temp_plane(plane).await;
    Ok(())
}

/// E2: re-activating the same build against the same plane is a no-op --
/// it still succeeds, but performs no further Apply calls (nothing new to
/// print).
#[ignore] // requires etcd/gazette/flow-consumer/flow-build/docker on PATH
#[tokio::test]
async fn test_reactivation_with_no_changes_is_a_noop() -> anyhow::Result<()> {
    init_tracing();
    let (plane, broker, consumer, _builds_root) = start_temp_plane().await?;

    let source = write_fixture(SINGLE_CAPTURE_FIXTURE)?;
    let build_id = uuid::Uuid::new_v4().simple().to_string();
    let build_db = tempfile::NamedTempFile::new()?;

    flowctl_command()?
        .arg("api")
        .arg("build")
        .arg("--build-id")
        .arg(&build_id)
        .arg("--build-db")
        .arg(build_db.path())
        .arg("--source")
        .arg(source.path())
        .status()
        .await?;

    for _ in 0..2 {
        let status = flowctl_command()?
            .arg("api")
            .arg("activate")
            .arg("--build-id")
            .arg(&build_id)
            .arg("--all")
            .arg("--broker.address")
            .arg(&broker)
            .arg("--consumer.address")
            .arg(&consumer)
            .status()
            .await?;
        assert!(status.success(), "both activations should succeed");
    }

    stop_temp_plane(plane).await;
    Ok(())
}

/// E5: `flowctl test` starts its own plane, builds, activates, waits for
/// settlement, and deletes, all within its own deadline, leaving nothing
/// behind.
#[ignore] // requires etcd/gazette/flow-consumer/flow-build/docker on PATH
#[tokio::test]
async fn test_local_test_command_end_to_end() -> anyhow::Result<()> {
    init_tracing();
    let source = write_fixture(SINGLE_CAPTURE_FIXTURE)?;

    let status = flowctl_command()?
        .arg("test")
        .arg("--source")
        .arg(source.path())
        .status()
        .await?;
    assert!(status.success(), "flowctl test should exit 0 on success");
    Ok(())
}

/// E6: `api await` blocks until the dataflow has settled, then returns, with
/// only reads performed while waiting (no observable behavior here beyond
/// "it returns," since write-suppression is asserted at the crate level in
/// `dataflow`'s own tests).
#[ignore] // requires etcd/gazette/flow-consumer/flow-build/docker on PATH
#[tokio::test]
async fn test_await_settles_after_activation() -> anyhow::Result<()> {
    init_tracing();
    let (plane, broker, consumer, _builds_root) = start_temp_plane().await?;

    let source = write_fixture(SINGLE_CAPTURE_FIXTURE)?;
    let build_id = uuid::Uuid::new_v4().simple().to_string();
    let build_db = tempfile::NamedTempFile::new()?;

    flowctl_command()?
        .arg("api")
        .arg("build")
        .arg("--build-id")
        .arg(&build_id)
        .arg("--build-db")
        .arg(build_db.path())
        .arg("--source")
        .arg(source.path())
        .status()
        .await?;

    flowctl_command()?
        .arg("api")
        .arg("activate")
        .arg("--build-id")
        .arg(&build_id)
        .arg("--all")
        .arg("--broker.address")
        .arg(&broker)
        .arg("--consumer.address")
        .arg(&consumer)
        .status()
        .await?;

    let status = tokio::time::timeout(
        Duration::from_secs(60),
        flowctl_command()?
            .arg("api")
            .arg("await")
            .arg("--build-id")
            .arg(&build_id)
            .arg("--all")
            .arg("--broker.address")
            .arg(&broker)
            .arg("--consumer.address")
            .arg(&consumer)
            .status(),
    )
    .await
    .context("api await did not return within 60s")??;
    assert!(status.success(), "api await should settle and exit 0");

    stop_temp_plane(plane).await;
    Ok(())
}
